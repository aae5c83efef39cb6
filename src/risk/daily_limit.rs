use chrono::NaiveDate;
use std::collections::HashMap;

/// Orders placed per calendar day
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyTradeCounter {
    counts: HashMap<NaiveDate, u32>,
}

impl DailyTradeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_for(&self, day: NaiveDate) -> u32 {
        self.counts.get(&day).copied().unwrap_or(0)
    }

    /// Record one placed order, returning the new count for the day
    pub fn increment(&mut self, day: NaiveDate) -> u32 {
        let count = self.counts.entry(day).or_insert(0);
        *count += 1;
        *count
    }

    /// Orders still allowed on `day` under `max_per_day`
    pub fn remaining(&self, day: NaiveDate, max_per_day: u32) -> u32 {
        max_per_day.saturating_sub(self.count_for(day))
    }

    /// Drop every day but `today`, keeping today's count (or zero).
    ///
    /// Idempotent: a second call on the same day changes nothing.
    pub fn reset_to(&mut self, today: NaiveDate) {
        let count = self.count_for(today);
        self.counts.clear();
        self.counts.insert(today, count);
    }

    /// Number of days with an entry
    pub fn days_tracked(&self) -> usize {
        self.counts.len()
    }
}
