use crate::models::StatsResponse;
use crate::plan::{PLAN_DAYS, day_of_year};
use crate::progress::ProgressStore;
use chrono::NaiveDate;

/// Stats as of `today`, which callers take from the session's clock.
pub fn build_stats_at(today: NaiveDate, progress: &ProgressStore, default_start: NaiveDate) -> StatsResponse {
    let start = progress.effective_start(default_start);
    let completed = progress.completed_count();

    StatsResponse {
        completed,
        remaining: i64::from(PLAN_DAYS) - completed as i64,
        streak: streak(progress, day_of_year(today, start)),
        completion_percent: completion_percent(completed),
    }
}

/// Consecutive completed days walking back from `today_day`; stops at the
/// first gap or before day 1.
pub fn streak(progress: &ProgressStore, today_day: i64) -> u32 {
    let mut count = 0;
    let mut day = today_day;
    while day >= 1 && progress.is_completed_raw(day) {
        count += 1;
        day -= 1;
    }
    count
}

pub fn completion_percent(completed: usize) -> u8 {
    let percent = (completed as f64 / f64::from(PLAN_DAYS) * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}
