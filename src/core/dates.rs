//! Month chunking of download date ranges.
use chrono::{Datelike, NaiveDate};

use crate::error::{Error, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)?)
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

pub fn last_day_of_month(date: NaiveDate) -> Option<NaiveDate> {
    first_of_next_month(date)?.pred_opt()
}

/// Split `[start, end]` into per-month chunks.
///
/// The first chunk starts at `start`, the last one ends at `end`, and every
/// month boundary in between closes a chunk on the month's last day.
pub fn split_by_month(start: NaiveDate, end: NaiveDate) -> Result<Vec<(NaiveDate, NaiveDate)>> {
    if start > end {
        return Err(Error::InvalidArgument {
            arg: "date range",
            value: format!("{start} > {end}"),
        });
    }

    let overflow = || Error::InvalidArgument {
        arg: "date range",
        value: format!("{start}..{end} leaves the supported calendar"),
    };

    let mut chunks = Vec::new();
    let mut begin = start;
    loop {
        let next = first_of_next_month(begin).ok_or_else(overflow)?;
        if next > end {
            break;
        }
        chunks.push((begin, last_day_of_month(begin).ok_or_else(overflow)?));
        begin = next;
    }
    chunks.push((begin, end));
    Ok(chunks)
}

/// [`split_by_month`] over `YYYY-MM-DD` strings
pub fn split_by_month_str(start: &str, end: &str) -> Result<Vec<(String, String)>> {
    let chunks = split_by_month(parse_date(start)?, parse_date(end)?)?;
    Ok(chunks
        .into_iter()
        .map(|(a, b)| {
            (
                a.format(DATE_FORMAT).to_string(),
                b.format(DATE_FORMAT).to_string(),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn three_month_range() {
        let chunks = split_by_month_str("2021-01-15", "2021-03-10").unwrap();
        assert_eq!(
            chunks,
            vec![
                ("2021-01-15".to_string(), "2021-01-31".to_string()),
                ("2021-02-01".to_string(), "2021-02-28".to_string()),
                ("2021-03-01".to_string(), "2021-03-10".to_string()),
            ]
        );
    }

    #[test]
    fn single_month_and_single_day() {
        assert_eq!(
            split_by_month(d(2020, 2, 3), d(2020, 2, 29)).unwrap(),
            vec![(d(2020, 2, 3), d(2020, 2, 29))]
        );
        assert_eq!(
            split_by_month(d(2020, 5, 5), d(2020, 5, 5)).unwrap(),
            vec![(d(2020, 5, 5), d(2020, 5, 5))]
        );
    }

    #[test]
    fn crosses_year_end() {
        assert_eq!(
            split_by_month(d(2020, 12, 20), d(2021, 1, 2)).unwrap(),
            vec![(d(2020, 12, 20), d(2020, 12, 31)), (d(2021, 1, 1), d(2021, 1, 2))]
        );
    }

    #[test]
    fn end_on_month_start_gets_own_chunk() {
        assert_eq!(
            split_by_month(d(2021, 1, 10), d(2021, 2, 1)).unwrap(),
            vec![(d(2021, 1, 10), d(2021, 1, 31)), (d(2021, 2, 1), d(2021, 2, 1))]
        );
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = split_by_month(d(2021, 3, 1), d(2021, 2, 1)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert!(matches!(split_by_month_str("2021-13-01", "2021-14-01"), Err(Error::DateParse(_))));
    }

    #[test]
    fn last_day_handles_leap_years() {
        assert_eq!(last_day_of_month(d(2024, 2, 10)), Some(d(2024, 2, 29)));
        assert_eq!(last_day_of_month(d(2023, 2, 10)), Some(d(2023, 2, 28)));
        assert_eq!(last_day_of_month(d(2023, 12, 1)), Some(d(2023, 12, 31)));
    }
}
