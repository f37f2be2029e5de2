use chrono::{Local, NaiveDate};

/// Source of "today" for the played/future judgment.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Basis {
    Dated(NaiveDate),
    /// No date was found; treated as played.
    Defaulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub is_future: bool,
    pub basis: Basis,
}

impl Classification {
    pub fn is_defaulted(&self) -> bool {
        self.basis == Basis::Defaulted
    }
}

/// A date strictly after `today` is future; on or before is played. Without a
/// date the record is assumed played, which callers should surface.
pub fn classify(date: Option<NaiveDate>, today: NaiveDate) -> Classification {
    match date {
        Some(date) => Classification {
            is_future: date > today,
            basis: Basis::Dated(date),
        },
        None => Classification {
            is_future: false,
            basis: Basis::Defaulted,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn strictly_after_today_is_future() {
        let today = day(2025, 3, 1);
        assert!(classify(Some(day(2025, 3, 2)), today).is_future);
        assert!(!classify(Some(day(2025, 3, 1)), today).is_future);
        assert!(!classify(Some(day(2024, 12, 31)), today).is_future);
    }

    #[test]
    fn monotonic_over_a_range_of_dates() {
        let today = day(2025, 3, 1);
        let mut seen_future = false;
        for offset in -40..40 {
            let date = today + chrono::Duration::days(offset);
            let c = classify(Some(date), today);
            assert_eq!(c.is_future, offset > 0);
            // once future, later dates stay future
            if seen_future {
                assert!(c.is_future);
            }
            seen_future |= c.is_future;
        }
    }

    #[test]
    fn missing_date_defaults_to_played() {
        let c = classify(None, day(2025, 3, 1));
        assert!(!c.is_future);
        assert!(c.is_defaulted());
    }

    #[test]
    fn fixed_clock_reports_its_day() {
        assert_eq!(FixedClock(day(2024, 8, 3)).today(), day(2024, 8, 3));
    }
}
