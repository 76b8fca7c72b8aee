use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

const SEPARATOR: &str = " - ";
const ACCEPTED_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];

/// Internship dates parsed from the wizard's free-form `"start - end"` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PeriodRange {
    /// Never fails: malformed input, or a side that does not parse, becomes `today`.
    pub fn parse(raw: &str, today: NaiveDate) -> Self {
        let fallback = Self {
            start: today,
            end: today,
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return fallback;
        }

        let parts: Vec<&str> = trimmed.split(SEPARATOR).collect();
        let [start_raw, end_raw] = parts.as_slice() else {
            warn!(
                period = trimmed,
                "period is not of the form 'YYYY-MM-DD - YYYY-MM-DD'; using today"
            );
            return fallback;
        };

        let start = parse_date(start_raw).unwrap_or_else(|| {
            warn!(value = *start_raw, "unparseable period start; using today");
            today
        });
        let end = parse_date(end_raw).unwrap_or_else(|| {
            warn!(value = *end_raw, "unparseable period end; using today");
            today
        });

        if start > end {
            warn!(%start, %end, "period starts after it ends");
        }

        Self { start, end }
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    ACCEPTED_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).expect("valid date")
    }

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn parses_iso_range() {
        let range = PeriodRange::parse("2024-05-01 - 2024-07-31", today());
        assert_eq!(range.start, ymd(2024, 5, 1));
        assert_eq!(range.end, ymd(2024, 7, 31));
    }

    #[test]
    fn accepts_french_day_first_dates() {
        let range = PeriodRange::parse(" 01/06/2024 - 30/08/2024 ", today());
        assert_eq!(range.start, ymd(2024, 6, 1));
        assert_eq!(range.end, ymd(2024, 8, 30));
    }

    #[test]
    fn malformed_strings_fall_back_to_today() {
        for raw in [
            "",
            "   ",
            "juin à août",
            "2024-05-01",
            "2024-05-01 to 2024-07-31",
            "2024-05-01 - 2024-06-01 - 2024-07-01",
        ] {
            let range = PeriodRange::parse(raw, today());
            assert_eq!(range.start, today(), "input {raw:?}");
            assert_eq!(range.end, today(), "input {raw:?}");
        }
    }

    #[test]
    fn falls_back_per_side() {
        let range = PeriodRange::parse("2024-05-01 - bientôt", today());
        assert_eq!(range.start, ymd(2024, 5, 1));
        assert_eq!(range.end, today());

        let range = PeriodRange::parse("2024-02-30 - 2024-07-31", today());
        assert_eq!(range.start, today());
        assert_eq!(range.end, ymd(2024, 7, 31));
    }

    #[test]
    fn keeps_inverted_ranges() {
        let range = PeriodRange::parse("2024-07-31 - 2024-05-01", today());
        assert_eq!(range.start, ymd(2024, 7, 31));
        assert_eq!(range.end, ymd(2024, 5, 1));
    }
}
