use chrono::NaiveDateTime;

pub const COMPLETE: i32 = 100;

/// Percentage of a course's videos the user has completed, rounded to the
/// nearest integer and capped at 100. A course without videos is at 0.
pub fn progress_percentage(completed: i64, total: i64) -> i32 {
    if total <= 0 {
        return 0;
    }

    let completed = completed.clamp(0, total) as f64;
    let percentage = (completed * 100.0 / total as f64).round() as i32;
    percentage.min(COMPLETE)
}

/// The enrollment keeps its first completion time while it stays at 100 and
/// loses it as soon as progress drops below.
pub fn completion_time(
    progress: i32,
    previous: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> Option<NaiveDateTime> {
    if progress >= COMPLETE {
        Some(previous.unwrap_or(now))
    } else {
        None
    }
}
