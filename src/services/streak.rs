//! Daily focus streak tracking

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::{
    error::StoreError,
    storage::{load_json, save_json, KeyValueStore, STREAK_KEY},
};

/// Streak lengths (in days) worth celebrating
pub const STREAK_MILESTONES: [u32; 8] = [3, 7, 14, 21, 30, 60, 90, 100];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct StreakData {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_completed_date: Option<NaiveDate>,
    pub completed_dates: Vec<NaiveDate>,
}

impl StreakData {
    /// Credit `day`; returns false when the day was already credited
    pub fn record(&mut self, day: NaiveDate) -> bool {
        if self.completed_dates.contains(&day) {
            return false;
        }
        self.completed_dates.push(day);

        let yesterday = day.checked_sub_days(Days::new(1));
        self.current_streak = match self.last_completed_date {
            Some(last) if Some(last) == yesterday => self.current_streak.saturating_add(1),
            Some(last) if last == day => self.current_streak,
            _ => 1,
        };
        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.last_completed_date = Some(day);
        true
    }

    pub fn milestone(&self) -> Option<u32> {
        STREAK_MILESTONES
            .contains(&self.current_streak)
            .then_some(self.current_streak)
    }
}

/// Outcome of recording a completed focus session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakUpdate {
    pub data: StreakData,
    /// False when the day had already been credited
    pub newly_recorded: bool,
    pub milestone: Option<u32>,
}

/// Records completed focus sessions, at most once per calendar day
pub trait StreakRecorder: Send + Sync {
    fn record_completed_focus_session(&self, day: NaiveDate) -> Result<StreakUpdate, StoreError>;
}

pub struct StreakTracker {
    store: Arc<dyn KeyValueStore>,
    data: Mutex<StreakData>,
}

impl StreakTracker {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let data = load_json::<StreakData>(store.as_ref(), STREAK_KEY)
            .unwrap_or_else(|e| {
                warn!("Failed to load streak data, starting fresh: {}", e);
                None
            })
            .unwrap_or_default();
        Self {
            store,
            data: Mutex::new(data),
        }
    }

    pub fn data(&self) -> StreakData {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl StreakRecorder for StreakTracker {
    fn record_completed_focus_session(&self, day: NaiveDate) -> Result<StreakUpdate, StoreError> {
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = data.clone();
        if !next.record(day) {
            return Ok(StreakUpdate {
                data: next,
                newly_recorded: false,
                milestone: None,
            });
        }

        save_json(self.store.as_ref(), STREAK_KEY, &next)?;
        *data = next.clone();
        info!(%day, current = next.current_streak, longest = next.longest_streak, "streak recorded");
        let milestone = next.milestone();
        Ok(StreakUpdate {
            data: next,
            newly_recorded: true,
            milestone,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn recording_twice_on_the_same_day_counts_once() {
        let tracker = StreakTracker::load(Arc::new(MemoryStore::new()));
        let first = tracker.record_completed_focus_session(day(4)).unwrap();
        let second = tracker.record_completed_focus_session(day(4)).unwrap();
        assert!(first.newly_recorded);
        assert!(!second.newly_recorded);
        assert_eq!(first.data, second.data);
        assert_eq!(tracker.data().current_streak, 1);
        assert_eq!(tracker.data().completed_dates, vec![day(4)]);
    }

    #[test]
    fn consecutive_days_extend_and_gaps_restart() {
        let mut data = StreakData::default();
        data.record(day(1));
        data.record(day(2));
        data.record(day(3));
        assert_eq!(data.current_streak, 3);
        assert_eq!(data.milestone(), Some(3));

        data.record(day(6));
        assert_eq!(data.current_streak, 1);
        assert_eq!(data.longest_streak, 3);
        assert_eq!(data.milestone(), None);
    }

    #[test]
    fn streak_survives_reload() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let tracker = StreakTracker::load(store.clone());
        tracker.record_completed_focus_session(day(10)).unwrap();

        let reloaded = StreakTracker::load(store);
        let update = reloaded.record_completed_focus_session(day(11)).unwrap();
        assert_eq!(update.data.current_streak, 2);
        assert_eq!(update.data.last_completed_date, Some(day(11)));
    }
}
