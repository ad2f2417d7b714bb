//! Shared parameter defaults and validators.

use chrono::NaiveDate;

use crate::govinfo::normalize::FIRST_PAGE_CURSOR;
use crate::govinfo::DateRange;
use crate::tools::ParamError;

/// Largest page the upstream accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Highest plausible Congress number.
pub const MAX_CONGRESS: u32 = 200;

pub const fn default_page_size() -> u32 {
    50
}

pub fn default_offset_mark() -> String {
    FIRST_PAGE_CURSOR.to_string()
}

pub fn page_size(value: u32) -> Result<u32, ParamError> {
    if (1..=MAX_PAGE_SIZE).contains(&value) {
        Ok(value)
    } else {
        Err(ParamError::invalid(
            "page_size",
            format!("must be between 1 and {MAX_PAGE_SIZE}"),
        ))
    }
}

pub fn congress(name: &'static str, value: u32) -> Result<u32, ParamError> {
    if (1..=MAX_CONGRESS).contains(&value) {
        Ok(value)
    } else {
        Err(ParamError::invalid(
            name,
            format!("must be between 1 and {MAX_CONGRESS}"),
        ))
    }
}

/// Requires a non-blank string and returns it trimmed.
pub fn required<'a>(name: &'static str, value: &'a str) -> Result<&'a str, ParamError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ParamError::invalid(name, "is required"))
    } else {
        Ok(trimmed)
    }
}

/// Treats blank strings as absent.
pub fn optional(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Requires a non-blank cursor and returns it as given.
pub fn offset_mark(value: &str) -> Result<&str, ParamError> {
    if value.trim().is_empty() {
        Err(ParamError::invalid("offset_mark", "is required"))
    } else {
        Ok(value)
    }
}

/// Parses a `YYYY-MM-DD` date.
pub fn date(name: &'static str, value: &str) -> Result<NaiveDate, ParamError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ParamError::invalid(name, format!("'{value}' is not a YYYY-MM-DD date")))
}

/// Parses an optional `YYYY-MM-DD` date; blank means absent.
pub fn optional_date(name: &'static str, value: &str) -> Result<Option<NaiveDate>, ParamError> {
    optional(value).map(|v| date(name, v)).transpose()
}

/// Builds an inclusive date range.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Result<DateRange, ParamError> {
    DateRange::new(start, end)
        .ok_or_else(|| ParamError::invalid("end_date", "must not be before start_date"))
}

/// A cursor belongs to one partition, so continuing past the first page is
/// only possible for ranges that fit in a single upstream request.
pub fn range_cursor(range: &DateRange, max_days: u32, offset_mark: &str) -> Result<(), ParamError> {
    if offset_mark != FIRST_PAGE_CURSOR && range.partitions(max_days).len() > 1 {
        return Err(ParamError::invalid(
            "offset_mark",
            format!(
                "a cursor continues a single partition; narrow the range to at most \
                 {max_days} days using that partition's dates"
            ),
        ));
    }
    Ok(())
}
