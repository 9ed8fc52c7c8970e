//! `os` library: wall clock, process clock and date formatting

use super::{arg, check_string, check_table, sync};
use crate::error::{LuaError, LuaResult};
use crate::interp::{Deferred, Frame, LuaFunction, MultiValue, TableRef, Value};
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc};
use std::fmt::Write;
use std::time::Instant;

pub(super) fn library() -> TableRef {
    let started = Instant::now();
    TableRef::from_pairs([
        ("time", sync("time", time)),
        (
            "clock",
            LuaFunction::builtin("clock", move |_: &Frame, _| {
                Deferred::ok(MultiValue::one(started.elapsed().as_secs_f64()))
            }),
        ),
        ("date", sync("date", date)),
    ])
}

fn date_field(table: &TableRef, name: &str, default: Option<i64>) -> LuaResult<i64> {
    match table.raw_get_str(name) {
        Value::Nil => default.ok_or_else(|| {
            LuaError::argument(format!("field '{name}' missing in date table"))
        }),
        value => value
            .as_integer()
            .ok_or_else(|| LuaError::argument(format!("field '{name}' is not an integer"))),
    }
}

/// Seconds since the epoch, now or for a local date table.
fn time(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    if arg(&args, 0).is_nil() {
        return Ok(MultiValue::one(Utc::now().timestamp()));
    }
    let table = check_table(&args, 0, "time")?;
    let year = date_field(&table, "year", None)?;
    let month = date_field(&table, "month", None)?;
    let day = date_field(&table, "day", None)?;
    let hour = date_field(&table, "hour", Some(12))?;
    let min = date_field(&table, "min", Some(0))?;
    let sec = date_field(&table, "sec", Some(0))?;
    let fields = (
        i32::try_from(year),
        u32::try_from(month),
        u32::try_from(day),
        u32::try_from(hour),
        u32::try_from(min),
        u32::try_from(sec),
    );
    let local = match fields {
        (Ok(y), Ok(mo), Ok(d), Ok(h), Ok(mi), Ok(s)) => Local.with_ymd_and_hms(y, mo, d, h, mi, s).earliest(),
        _ => None,
    };
    match local {
        Some(dt) => Ok(MultiValue::one(dt.timestamp())),
        None => Ok(MultiValue::one(Value::Nil)),
    }
}

/// `date([format [, time]])`. A leading `!` selects UTC; `*t` returns the
/// fields as a table.
fn date(_: &Frame, args: Vec<Value>) -> LuaResult<MultiValue> {
    let format = match arg(&args, 0) {
        Value::Nil => "%c".into(),
        _ => check_string(&args, 0, "date")?,
    };
    let utc = match arg(&args, 1) {
        Value::Nil => Utc::now(),
        other => {
            let secs = other
                .as_integer()
                .ok_or_else(|| LuaError::bad_argument(2, "date", "number", other.type_name()))?;
            DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| LuaError::argument("bad argument #2 to 'date' (time out of range)"))?
        }
    };
    match format.strip_prefix('!') {
        Some(rest) => render(utc, rest),
        None => render(utc.with_timezone(&Local), &format),
    }
}

fn render<Tz: TimeZone>(dt: DateTime<Tz>, format: &str) -> LuaResult<MultiValue>
where
    Tz::Offset: std::fmt::Display,
{
    if format.starts_with("*t") {
        return Ok(MultiValue::one(TableRef::from_pairs([
            ("year", Value::from(dt.year() as i64)),
            ("month", Value::from(dt.month() as i64)),
            ("day", Value::from(dt.day() as i64)),
            ("hour", Value::from(dt.hour() as i64)),
            ("min", Value::from(dt.minute() as i64)),
            ("sec", Value::from(dt.second() as i64)),
            ("wday", Value::from(dt.weekday().number_from_sunday() as i64)),
            ("yday", Value::from(dt.ordinal() as i64)),
            ("isdst", Value::Boolean(false)),
        ])));
    }
    let mut out = String::new();
    write!(out, "{}", dt.format(format))
        .map_err(|_| LuaError::argument(format!("bad argument #1 to 'date' (invalid format '{format}')")))?;
    Ok(MultiValue::one(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(value: f64) -> Value {
        Value::Number(value)
    }

    #[test]
    fn test_time_now_is_integral() {
        let now = time(&Frame::lost(), vec![]).unwrap().first();
        assert!(now.as_integer().is_some_and(|t| t > 1_600_000_000));
    }

    #[test]
    fn test_date_utc_format() {
        let out = date(&Frame::lost(), vec![Value::from("!%Y-%m-%d %H:%M:%S"), n(86_400.0)]).unwrap();
        assert_eq!(out.first(), Value::from("1970-01-02 00:00:00"));
    }

    #[test]
    fn test_date_table_fields() {
        let out = date(&Frame::lost(), vec![Value::from("!*t"), n(0.0)]).unwrap();
        let Value::Table(t) = out.first() else { panic!("expected a table") };
        assert_eq!(t.raw_get_str("year"), n(1970.0));
        assert_eq!(t.raw_get_str("month"), n(1.0));
        // 1970-01-01 was a Thursday
        assert_eq!(t.raw_get_str("wday"), n(5.0));
        assert_eq!(t.raw_get_str("yday"), n(1.0));
    }

    #[test]
    fn test_time_round_trips_local_date() {
        let fields = TableRef::from_pairs([
            ("year", n(2024.0)),
            ("month", n(2.0)),
            ("day", n(29.0)),
            ("hour", n(10.0)),
        ]);
        let stamp = time(&Frame::lost(), vec![Value::Table(fields)]).unwrap().first();
        let back = date(&Frame::lost(), vec![Value::from("%Y-%m-%d %H"), stamp]).unwrap();
        assert_eq!(back.first(), Value::from("2024-02-29 10"));
    }

    #[test]
    fn test_time_requires_day() {
        let fields = TableRef::from_pairs([("year", n(2024.0)), ("month", n(1.0))]);
        let err = time(&Frame::lost(), vec![Value::Table(fields)]).unwrap_err();
        assert_eq!(err.message, "field 'day' missing in date table");
    }

    #[test]
    fn test_date_rejects_bad_time() {
        assert!(date(&Frame::lost(), vec![Value::Nil, Value::from("soon")]).is_err());
    }
}
