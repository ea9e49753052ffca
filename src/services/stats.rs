use chrono::NaiveDate;

use crate::models::{Course, UserStats};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Streak {
    pub current: u32,
    pub longest: u32,
}

/// Streaks over distinct activity days. The current streak may end yesterday
/// so a learner is not reset before they have had a chance to study today.
pub fn compute_streak(days: &[NaiveDate], today: NaiveDate) -> Streak {
    let mut days: Vec<NaiveDate> = days.iter().copied().filter(|d| *d <= today).collect();
    days.sort_unstable();
    days.dedup();

    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in &days {
        run = match previous {
            Some(prev) if prev.succ_opt() == Some(*day) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(*day);
    }

    let current = match days.last() {
        Some(last) if *last == today || last.succ_opt() == Some(today) => run,
        _ => 0,
    };

    Streak { current, longest }
}

pub fn build_user_stats(courses: &[Course], days: &[NaiveDate], today: NaiveDate) -> UserStats {
    let total_lessons: usize = courses.iter().map(Course::total_lessons).sum();
    let completed_lessons: usize = courses.iter().map(Course::completed_lessons).sum();
    let progress_percent = if total_lessons == 0 {
        0
    } else {
        ((completed_lessons as f64 / total_lessons as f64) * 100.0).round() as u8
    };
    let streak = compute_streak(days, today);

    UserStats {
        courses: courses.len(),
        total_lessons,
        completed_lessons,
        progress_percent,
        current_streak: streak.current,
        longest_streak: streak.longest,
        last_active_day: days
            .iter()
            .filter(|d| **d <= today)
            .max()
            .map(|d| d.format("%Y-%m-%d").to_string()),
    }
}
