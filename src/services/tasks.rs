//! Task list that receives pomodoro credit

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::TaskError,
    storage::{load_json, save_json, KeyValueStore, ACTIVE_TASK_KEY, TASKS_KEY},
};

pub type TaskId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub estimated_pomodoros: u32,
    pub completed_pomodoros: u32,
    pub is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pomodoro count of a task after crediting it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskProgress {
    pub id: TaskId,
    pub title: String,
    pub completed_pomodoros: u32,
    pub estimated_pomodoros: u32,
}

impl TaskProgress {
    pub fn reached_estimate(&self) -> bool {
        self.completed_pomodoros >= self.estimated_pomodoros
    }
}

/// Contract the timer uses to credit focus sessions to a task
pub trait TaskProvider: Send + Sync {
    fn active_task_id(&self) -> Option<TaskId>;

    fn increment_completed_pomodoros(&self, id: &TaskId) -> Result<TaskProgress, TaskError>;

    fn mark_task_complete(&self, id: &TaskId) -> Result<(), TaskError>;
}

#[derive(Debug, Default, Clone)]
struct Board {
    tasks: Vec<Task>,
    active: Option<TaskId>,
}

/// Task list persisted through the key/value store
pub struct TaskBoard {
    store: Arc<dyn KeyValueStore>,
    board: Mutex<Board>,
}

impl TaskBoard {
    /// Load tasks and the active task id; unreadable data starts empty
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let tasks = load_json::<Vec<Task>>(store.as_ref(), TASKS_KEY)
            .unwrap_or_else(|e| {
                warn!("Failed to load tasks, starting empty: {}", e);
                None
            })
            .unwrap_or_default();
        let active = load_json::<TaskId>(store.as_ref(), ACTIVE_TASK_KEY)
            .unwrap_or_else(|e| {
                warn!("Failed to load active task: {}", e);
                None
            })
            .filter(|id| tasks.iter().any(|task| &task.id == id));

        Self {
            store,
            board: Mutex::new(Board { tasks, active }),
        }
    }

    pub fn list(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.lock().tasks.iter().find(|task| task.id == id).cloned()
    }

    pub fn active_task(&self) -> Option<Task> {
        let board = self.lock();
        let id = board.active.as_ref()?;
        board.tasks.iter().find(|task| &task.id == id).cloned()
    }

    /// Add a task; the first task added becomes the active one
    pub fn add_task(
        &self,
        title: String,
        estimated_pomodoros: u32,
        notes: Option<String>,
    ) -> Result<Task, TaskError> {
        if estimated_pomodoros == 0 {
            return Err(TaskError::InvalidEstimate);
        }
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4().to_string(),
            title,
            estimated_pomodoros,
            completed_pomodoros: 0,
            is_completed: false,
            notes,
            created_at: now,
            updated_at: now,
        };

        let mut board = self.lock();
        let mut next = board.clone();
        next.tasks.push(task.clone());
        if next.active.is_none() {
            next.active = Some(task.id.clone());
        }
        self.commit(&mut board, next)?;
        info!(id = %task.id, title = %task.title, "task added");
        Ok(task)
    }

    pub fn set_active_task(&self, id: Option<TaskId>) -> Result<(), TaskError> {
        let mut board = self.lock();
        if let Some(id) = &id {
            if !board.tasks.iter().any(|task| &task.id == id) {
                return Err(TaskError::NotFound(id.clone()));
            }
        }
        let next = Board {
            tasks: board.tasks.clone(),
            active: id,
        };
        self.commit(&mut board, next)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Board> {
        self.board.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Write `next` and only then make it the in-memory board
    fn commit(&self, board: &mut Board, next: Board) -> Result<(), TaskError> {
        save_json(self.store.as_ref(), TASKS_KEY, &next.tasks)?;
        match &next.active {
            Some(id) => save_json(self.store.as_ref(), ACTIVE_TASK_KEY, id)?,
            None => self.store.remove(ACTIVE_TASK_KEY)?,
        }
        *board = next;
        Ok(())
    }

    fn update<F, T>(&self, id: &str, f: F) -> Result<T, TaskError>
    where
        F: FnOnce(&mut Task) -> T,
    {
        let mut board = self.lock();
        let mut next = board.clone();
        let task = next
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
        let result = f(task);
        task.updated_at = Utc::now();
        self.commit(&mut board, next)?;
        Ok(result)
    }
}

impl TaskProvider for TaskBoard {
    fn active_task_id(&self) -> Option<TaskId> {
        self.lock().active.clone()
    }

    fn increment_completed_pomodoros(&self, id: &TaskId) -> Result<TaskProgress, TaskError> {
        self.update(id, |task| {
            task.completed_pomodoros = task.completed_pomodoros.saturating_add(1);
            TaskProgress {
                id: task.id.clone(),
                title: task.title.clone(),
                completed_pomodoros: task.completed_pomodoros,
                estimated_pomodoros: task.estimated_pomodoros,
            }
        })
    }

    fn mark_task_complete(&self, id: &TaskId) -> Result<(), TaskError> {
        self.update(id, |task| task.is_completed = true)?;
        info!(%id, "task marked complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::StoreError, storage::MemoryStore};

    /// Store whose writes can be switched off
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        failing: std::sync::atomic::AtomicBool,
    }

    impl FlakyStore {
        fn check(&self, key: &str) -> Result<(), StoreError> {
            if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(StoreError::Io {
                    key: key.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            Ok(())
        }
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key)
        }
        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.check(key)?;
            self.inner.set(key, value)
        }
        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.check(key)?;
            self.inner.remove(key)
        }
    }

    #[test]
    fn failed_writes_leave_memory_unchanged() {
        let store = Arc::new(FlakyStore::default());
        let board = TaskBoard::load(store.clone());
        let task = board.add_task("Write report".into(), 1, None).unwrap();

        store.failing.store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(matches!(
            board.increment_completed_pomodoros(&task.id),
            Err(TaskError::Store(_))
        ));
        assert!(board.mark_task_complete(&task.id).is_err());
        assert!(board.add_task("Second".into(), 1, None).is_err());
        assert!(board.set_active_task(None).is_err());

        let current = board.get(&task.id).unwrap();
        assert_eq!(current.completed_pomodoros, 0);
        assert!(!current.is_completed);
        assert_eq!(board.list().len(), 1);
        assert_eq!(board.active_task_id(), Some(task.id.clone()));

        store.failing.store(false, std::sync::atomic::Ordering::SeqCst);
        let progress = board.increment_completed_pomodoros(&task.id).unwrap();
        assert_eq!(progress.completed_pomodoros, 1);
    }

    fn board() -> (Arc<MemoryStore>, TaskBoard) {
        let store = Arc::new(MemoryStore::new());
        let board = TaskBoard::load(store.clone());
        (store, board)
    }

    #[test]
    fn first_task_becomes_active() {
        let (_, board) = board();
        let first = board.add_task("Write report".into(), 2, None).unwrap();
        board.add_task("Review PR".into(), 1, None).unwrap();
        assert_eq!(board.active_task_id(), Some(first.id));
    }

    #[test]
    fn crediting_reaches_the_estimate() {
        let (_, board) = board();
        let task = board.add_task("Write report".into(), 2, None).unwrap();
        let progress = board.increment_completed_pomodoros(&task.id).unwrap();
        assert!(!progress.reached_estimate());
        let progress = board.increment_completed_pomodoros(&task.id).unwrap();
        assert!(progress.reached_estimate());
        board.mark_task_complete(&task.id).unwrap();
        let stored = board.get(&task.id).unwrap();
        assert!(stored.is_completed);
        assert_eq!(stored.completed_pomodoros, 2);
    }

    #[test]
    fn unknown_tasks_are_reported() {
        let (_, board) = board();
        let missing = "nope".to_string();
        assert!(matches!(
            board.increment_completed_pomodoros(&missing),
            Err(TaskError::NotFound(_))
        ));
        assert!(board.set_active_task(Some(missing)).is_err());
        assert!(matches!(
            board.add_task("zero".into(), 0, None),
            Err(TaskError::InvalidEstimate)
        ));
    }

    #[test]
    fn tasks_reload_from_the_store() {
        let (store, board) = board();
        let task = board.add_task("Plan sprint".into(), 3, Some("notes".into())).unwrap();
        board.increment_completed_pomodoros(&task.id).unwrap();

        let reloaded = TaskBoard::load(store);
        assert_eq!(reloaded.active_task_id(), Some(task.id.clone()));
        assert_eq!(reloaded.get(&task.id).unwrap().completed_pomodoros, 1);
    }
}
