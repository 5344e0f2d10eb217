use crate::models::{CompletedDays, UserRecord};
use crate::plan::PlanDay;
use chrono::NaiveDate;

/// Completed days and start-date override for the signed-in user.
///
/// Purely in memory; the session mirrors every mutation to the record store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressStore {
    completed: CompletedDays,
    start_override: Option<NaiveDate>,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips `day` and returns whether it is now completed.
    pub fn toggle(&mut self, day: PlanDay) -> bool {
        if self.completed.remove(day) {
            false
        } else {
            self.completed.insert(day);
            true
        }
    }

    pub fn replace_all(&mut self, completed: CompletedDays, start_override: Option<NaiveDate>) {
        self.completed = completed;
        self.start_override = start_override;
    }

    pub fn replace_with_record(&mut self, record: UserRecord) {
        self.replace_all(record.completed_days, record.start_date);
    }

    pub fn clear(&mut self) {
        self.replace_all(CompletedDays::new(), None);
    }

    /// Marks every day in `from..=to` and returns how many were newly added.
    /// Bounds are clamped to the plan; an inverted range marks nothing.
    pub fn mark_range(&mut self, from: i64, to: i64) -> usize {
        let from = PlanDay::clamped(from).get();
        let to = PlanDay::clamped(to).get();
        (from..=to)
            .filter_map(|day| PlanDay::new(i64::from(day)))
            .filter(|day| self.completed.insert(*day))
            .count()
    }

    pub fn set_start_override(&mut self, start: NaiveDate) {
        self.start_override = Some(start);
    }

    pub fn start_override(&self) -> Option<NaiveDate> {
        self.start_override
    }

    pub fn effective_start(&self, default_start: NaiveDate) -> NaiveDate {
        self.start_override.unwrap_or(default_start)
    }

    pub fn is_completed(&self, day: PlanDay) -> bool {
        self.completed.contains(day)
    }

    /// Lookup by raw day number; anything outside the plan is incomplete.
    pub fn is_completed_raw(&self, day: i64) -> bool {
        PlanDay::new(day).is_some_and(|day| self.is_completed(day))
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn to_record(&self) -> UserRecord {
        UserRecord {
            completed_days: self.completed.clone(),
            start_date: self.start_override,
        }
    }
}
