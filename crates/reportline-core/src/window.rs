//! Date window generation
//!
//! A report span is partitioned into inclusive `[start, end]` windows of a
//! fixed number of days. The last window is clipped to the span end.

use std::fmt;
use std::num::NonZeroU32;

use chrono::{Days, NaiveDate};

/// Inclusive calendar date range used as a query partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Number of days covered (both ends included).
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// `YYYY-MM-DD_to_YYYY-MM-DD`, the form embedded in output file names.
    pub fn label(&self) -> String {
        format!(
            "{}_to_{}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Lazy iterator over the windows covering `[start, end]`.
///
/// Window `i` spans `[start + i*step, min(start + (i+1)*step - 1, end)]`.
/// An `end` before `start` yields nothing.
#[derive(Debug, Clone)]
pub struct DateWindows {
    next_start: Option<NaiveDate>,
    end: NaiveDate,
    step: NonZeroU32,
}

impl DateWindows {
    pub fn new(start: NaiveDate, end: NaiveDate, step: NonZeroU32) -> Self {
        Self {
            next_start: Some(start),
            end,
            step,
        }
    }
}

impl Iterator for DateWindows {
    type Item = DateWindow;

    fn next(&mut self) -> Option<DateWindow> {
        let start = self.next_start?;
        if start > self.end {
            self.next_start = None;
            return None;
        }

        let step = Days::new(u64::from(self.step.get()));
        // Overflow past chrono's max date ends the sequence after this window
        let following = start.checked_add_days(step);
        let window_end = following
            .and_then(|d| d.pred_opt())
            .map_or(self.end, |d| d.min(self.end));

        self.next_start = following;
        Some(DateWindow::new(start, window_end))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.next_start {
            Some(start) if start <= self.end => {
                let days = (self.end - start).num_days() as u64 + 1;
                let step = u64::from(self.step.get());
                let n = days.div_ceil(step) as usize;
                (n, Some(n))
            }
            _ => (0, Some(0)),
        }
    }
}

impl ExactSizeIterator for DateWindows {}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn step(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn weekly_windows_clip_last() {
        let windows: Vec<_> = DateWindows::new(d(2023, 1, 1), d(2023, 1, 10), step(7)).collect();
        assert_eq!(
            windows,
            vec![
                DateWindow::new(d(2023, 1, 1), d(2023, 1, 7)),
                DateWindow::new(d(2023, 1, 8), d(2023, 1, 10)),
            ]
        );
    }

    #[test]
    fn daily_windows_are_single_days() {
        let windows: Vec<_> = DateWindows::new(d(2023, 2, 27), d(2023, 3, 2), step(1)).collect();
        assert_eq!(windows.len(), 4);
        assert!(windows.iter().all(|w| w.start == w.end));
        assert_eq!(windows[2].start, d(2023, 3, 1));
    }

    #[test]
    fn end_before_start_is_empty() {
        let mut windows = DateWindows::new(d(2023, 1, 10), d(2023, 1, 1), step(7));
        assert_eq!(windows.len(), 0);
        assert!(windows.next().is_none());
    }

    #[test]
    fn single_day_span() {
        let windows: Vec<_> = DateWindows::new(d(2023, 5, 5), d(2023, 5, 5), step(30)).collect();
        assert_eq!(windows, vec![DateWindow::new(d(2023, 5, 5), d(2023, 5, 5))]);
    }

    #[test]
    fn exact_multiple_has_no_partial_window() {
        let windows: Vec<_> = DateWindows::new(d(2023, 1, 1), d(2023, 1, 14), step(7)).collect();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].end, d(2023, 1, 14));
    }

    #[test]
    fn windows_are_contiguous_and_cover_span() {
        let start = d(2017, 5, 15);
        let end = d(2023, 8, 7);
        for n in [1, 2, 7, 30, 365, 5000] {
            let windows: Vec<_> = DateWindows::new(start, end, step(n)).collect();
            assert_eq!(windows.first().unwrap().start, start);
            assert_eq!(windows.last().unwrap().end, end);
            for pair in windows.windows(2) {
                assert_eq!(pair[0].end.succ_opt().unwrap(), pair[1].start);
            }
            let covered: i64 = windows.iter().map(DateWindow::days).sum();
            assert_eq!(covered, (end - start).num_days() + 1);
        }
    }

    #[test]
    fn size_hint_matches_count() {
        let windows = DateWindows::new(d(2023, 1, 1), d(2023, 3, 1), step(7));
        let hint = windows.len();
        assert_eq!(hint, windows.count());
    }

    #[test]
    fn label_format() {
        let w = DateWindow::new(d(2023, 1, 8), d(2023, 1, 10));
        assert_eq!(w.label(), "2023-01-08_to_2023-01-10");
        assert_eq!(w.to_string(), "2023-01-08 to 2023-01-10");
    }
}
