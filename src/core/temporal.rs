//! Purpose: Human-readable renderings of `Date`, `Datetime`, and `Time` physical values.
//! Exports: `date_to_text`, `date_from_text`, `datetime_to_text`, `datetime_from_text`,
//!          `time_to_text`, `time_from_text`.
//! Role: Used only by the text codec; physical integers stay the source of truth.
//! Invariants: `*_to_text` returns `None` when the value lies outside years 0..=9999 (or outside
//!             one day for `Time`); callers then emit the bare integer instead.
//! Invariants: Parsing is exact: a datetime string finer than the column unit is rejected.
use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, Time};

use crate::core::dtype::TimeUnit;
use crate::core::error::{Error, ErrorKind};

/// Julian day number of 1970-01-01.
const UNIX_EPOCH_JULIAN_DAY: i32 = 2_440_588;
const NANOS_PER_DAY: i64 = 86_400 * 1_000_000_000;
const MIN_YEAR: i32 = 0;
const MAX_YEAR: i32 = 9999;

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[hour]:[minute]:[second].[subsecond digits:9]");

fn in_text_range(year: i32) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&year)
}

fn format_failed(err: time::error::Format) -> Error {
    Error::new(ErrorKind::Internal)
        .with_message("temporal formatting failed")
        .with_source(err)
}

fn parse_failed(kind: &str, text: &str, err: impl std::error::Error + Send + Sync + 'static) -> Error {
    Error::malformed(format!("invalid {kind} literal {text:?}")).with_source(err)
}

pub(crate) fn date_to_text(days: i32) -> Result<Option<String>, Error> {
    let Some(julian) = UNIX_EPOCH_JULIAN_DAY.checked_add(days) else {
        return Ok(None);
    };
    let Ok(date) = Date::from_julian_day(julian) else {
        return Ok(None);
    };
    if !in_text_range(date.year()) {
        return Ok(None);
    }
    date.format(DATE_FORMAT)
        .map(Some)
        .map_err(format_failed)
}

pub(crate) fn date_from_text(text: &str) -> Result<i32, Error> {
    let date = Date::parse(text, DATE_FORMAT)
        .map_err(|err| parse_failed("date", text, err))?;
    Ok(date.to_julian_day() - UNIX_EPOCH_JULIAN_DAY)
}

pub(crate) fn datetime_to_text(value: i64, unit: TimeUnit) -> Result<Option<String>, Error> {
    let nanos = i128::from(value) * unit.nanos_per_unit();
    let Ok(instant) = OffsetDateTime::from_unix_timestamp_nanos(nanos) else {
        return Ok(None);
    };
    if !in_text_range(instant.year()) {
        return Ok(None);
    }
    instant.format(&Rfc3339).map(Some).map_err(format_failed)
}

pub(crate) fn datetime_from_text(text: &str, unit: TimeUnit) -> Result<i64, Error> {
    let instant = OffsetDateTime::parse(text, &Rfc3339)
        .map_err(|err| parse_failed("datetime", text, err))?;
    let nanos = instant.unix_timestamp_nanos();
    let per_unit = unit.nanos_per_unit();
    if nanos % per_unit != 0 {
        return Err(Error::malformed(format!(
            "datetime literal {text:?} is finer than {unit}"
        )));
    }
    i64::try_from(nanos / per_unit)
        .map_err(|_| Error::malformed(format!("datetime literal {text:?} overflows {unit}")))
}

pub(crate) fn time_to_text(nanos: i64) -> Result<Option<String>, Error> {
    if !(0..NANOS_PER_DAY).contains(&nanos) {
        return Ok(None);
    }
    let seconds = nanos / 1_000_000_000;
    let subsec = (nanos % 1_000_000_000) as u32;
    let Ok(time) = Time::from_hms_nano(
        (seconds / 3600) as u8,
        ((seconds / 60) % 60) as u8,
        (seconds % 60) as u8,
        subsec,
    ) else {
        return Ok(None);
    };
    time.format(TIME_FORMAT)
        .map(Some)
        .map_err(format_failed)
}

pub(crate) fn time_from_text(text: &str) -> Result<i64, Error> {
    let time = Time::parse(text, TIME_FORMAT)
        .map_err(|err| parse_failed("time", text, err))?;
    let (hour, minute, second, nano) = time.as_hms_nano();
    let seconds = i64::from(hour) * 3600 + i64::from(minute) * 60 + i64::from(second);
    Ok(seconds * 1_000_000_000 + i64::from(nano))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_render_as_calendar_days() {
        assert_eq!(date_to_text(0).expect("fmt").as_deref(), Some("1970-01-01"));
        assert_eq!(date_to_text(-1).expect("fmt").as_deref(), Some("1969-12-31"));
        assert_eq!(date_from_text("2000-02-29").expect("parse"), 11_016);
    }

    #[test]
    fn out_of_range_dates_fall_back() {
        assert_eq!(date_to_text(i32::MAX).expect("fmt"), None);
        assert_eq!(date_to_text(i32::MIN).expect("fmt"), None);
    }

    #[test]
    fn datetimes_are_utc_rfc3339() {
        let text = datetime_to_text(1_500, TimeUnit::Milliseconds)
            .expect("fmt")
            .expect("in range");
        assert_eq!(text, "1970-01-01T00:00:01.5Z");
        assert_eq!(
            datetime_from_text(&text, TimeUnit::Milliseconds).expect("parse"),
            1_500
        );
        assert_eq!(datetime_to_text(i64::MAX, TimeUnit::Milliseconds).expect("fmt"), None);
    }

    #[test]
    fn offsets_are_normalized_on_parse() {
        let value = datetime_from_text("1970-01-01T01:00:00+01:00", TimeUnit::Microseconds)
            .expect("parse");
        assert_eq!(value, 0);
    }

    #[test]
    fn sub_unit_precision_is_rejected() {
        let err = datetime_from_text("1970-01-01T00:00:00.000001Z", TimeUnit::Milliseconds)
            .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn times_have_nanosecond_digits() {
        let nanos = 13 * 3_600_000_000_000 + 5 * 60_000_000_000 + 7_000_000_123;
        let text = time_to_text(nanos).expect("fmt").expect("in range");
        assert_eq!(text, "13:05:07.000000123");
        assert_eq!(time_from_text(&text).expect("parse"), nanos);
        assert_eq!(time_to_text(NANOS_PER_DAY).expect("fmt"), None);
        assert_eq!(time_to_text(-1).expect("fmt"), None);
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(
            date_from_text("yesterday").expect_err("should fail").kind(),
            ErrorKind::MalformedInput
        );
        assert!(time_from_text("25:00:00.000000000").is_err());
    }
}
