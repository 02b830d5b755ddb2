//! Date and time helpers backed by `chrono`.
//!
//! Date arguments may be strings (RFC 3339, RFC 2822, `YYYY-MM-DD HH:MM:SS`,
//! `YYYY-MM-DD`) or integer Unix timestamps. A missing argument, an empty
//! string or `"now"` means the current local time.

use crate::function::{args, FuncMap, FunctionError};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde_json::Value;

const RFC1123: &str = "%a, %d %b %Y %H:%M:%S %Z";
const RFC1123Z: &str = "%a, %d %b %Y %H:%M:%S %z";
const RFC822: &str = "%d %b %y %H:%M %Z";
const RFC822Z: &str = "%d %b %y %H:%M %z";

/// Builds the table of date helpers: `year`, `rfc3339`, `rfc1123`,
/// `rfc1123z`, `rfc822`, `rfc822z` and `datefmt`.
pub fn time_functions() -> FuncMap {
    FuncMap::new()
        .with("year", |args| optional_date(args, "%Y"))
        .with("rfc3339", |args| {
            args::expect_len(args, 0, 1)?;
            let date = date_arg(args, 0)?;
            Ok(Value::String(
                date.to_rfc3339_opts(SecondsFormat::Secs, true),
            ))
        })
        .with("rfc1123", |args| optional_date(args, RFC1123))
        .with("rfc1123z", |args| optional_date(args, RFC1123Z))
        .with("rfc822", |args| optional_date(args, RFC822))
        .with("rfc822z", |args| optional_date(args, RFC822Z))
        .with("datefmt", datefmt)
}

fn optional_date(args: &[Value], format: &str) -> Result<Value, FunctionError> {
    args::expect_len(args, 0, 1)?;
    let date = date_arg(args, 0)?;
    format_date(&date, format).map(Value::String)
}

/// `datefmt date out_format [in_format]`
fn datefmt(args: &[Value]) -> Result<Value, FunctionError> {
    args::expect_len(args, 2, 3)?;
    let out_format = args::string(args, 1)?;

    let date = if args.len() == 3 {
        let input = args::string(args, 0)?;
        let in_format = args::string(args, 2)?;
        parse_with_format(input, in_format)?
    } else {
        date_arg(args, 0)?
    };

    format_date(&date, out_format).map(Value::String)
}

fn date_arg(args: &[Value], index: usize) -> Result<DateTime<FixedOffset>, FunctionError> {
    match args.get(index) {
        None => Ok(now()),
        Some(Value::String(s)) => parse_date(s),
        Some(Value::Number(n)) => {
            let secs = n
                .as_i64()
                .ok_or_else(|| args::type_error(index, "a date", args.get(index)))?;
            DateTime::from_timestamp(secs, 0)
                .map(|dt| dt.fixed_offset())
                .ok_or_else(|| FunctionError::InvalidDate {
                    input: n.to_string(),
                    reason: "timestamp out of range".to_string(),
                })
        }
        other => Err(args::type_error(index, "a date", other)),
    }
}

fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

/// Parse a date using the general rules described in the module docs.
pub(crate) fn parse_date(input: &str) -> Result<DateTime<FixedOffset>, FunctionError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("now") {
        return Ok(now());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Ok(dt);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc().fixed_offset());
    }
    match NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        Ok(date) => Ok(date.and_time(NaiveTime::MIN).and_utc().fixed_offset()),
        Err(_) => Err(FunctionError::InvalidDate {
            input: input.to_string(),
            reason: "expected RFC 3339, RFC 2822 or YYYY-MM-DD".to_string(),
        }),
    }
}

/// Parse with an explicit strftime format. Formats without an offset are
/// read as UTC and date-only formats as midnight.
fn parse_with_format(input: &str, format: &str) -> Result<DateTime<FixedOffset>, FunctionError> {
    if let Ok(dt) = DateTime::parse_from_str(input, format) {
        return Ok(dt);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
        return Ok(naive.and_utc().fixed_offset());
    }
    NaiveDate::parse_from_str(input, format)
        .map(|date| date.and_time(NaiveTime::MIN).and_utc().fixed_offset())
        .map_err(|e| FunctionError::InvalidDate {
            input: input.to_string(),
            reason: format!("does not match '{}': {}", format, e),
        })
}

fn format_date(date: &DateTime<FixedOffset>, format: &str) -> Result<String, FunctionError> {
    // chrono panics while displaying a malformed format
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(FunctionError::InvalidFormat {
            format: format.to_string(),
        });
    }

    if date.offset().local_minus_utc() == 0 {
        Ok(date.with_timezone(&Utc).format(format).to_string())
    } else {
        Ok(date.format(format).to_string())
    }
}
