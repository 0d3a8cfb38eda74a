// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, Months, NaiveDate};
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::models::{EventKind, NamedEvent};

pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_HORIZON_MONTHS: i64 = 24;

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

/// Accepts `YYYY-MM` (first of the month) or a full `YYYY-MM-DD`.
pub fn parse_event_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    if s.len() == 7 {
        return NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
            .with_context(|| format!("Invalid month '{}', expected YYYY-MM", s));
    }
    parse_date(s)
}

pub fn parse_decimal(s: &str) -> Result<Decimal> {
    s.trim()
        .parse::<Decimal>()
        .with_context(|| format!("Invalid decimal '{}'", s))
}

pub fn parse_f64(s: &str) -> Result<f64> {
    let v = s
        .trim()
        .parse::<f64>()
        .with_context(|| format!("Invalid number '{}'", s))?;
    if !v.is_finite() {
        return Err(anyhow!("Invalid number '{}'", s));
    }
    Ok(v)
}

/// Parses `item=amount`.
pub fn parse_assignment(s: &str) -> Result<(String, f64)> {
    let (id, amount) = s
        .split_once('=')
        .with_context(|| format!("Invalid assignment '{}', expected ITEM=AMOUNT", s))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(anyhow!("Invalid assignment '{}', item id is empty", s));
    }
    Ok((id.to_string(), parse_f64(amount)?))
}

/// Parses `item:YYYY-MM[-DD]:amount[:name]` into a fresh event.
pub fn parse_event_arg(s: &str, kind: EventKind) -> Result<NamedEvent> {
    let parts: Vec<&str> = s.splitn(4, ':').collect();
    if parts.len() < 3 {
        return Err(anyhow!(
            "Invalid event '{}', expected ITEM:YYYY-MM:AMOUNT[:NAME]",
            s
        ));
    }
    let item = parts[0].trim();
    if item.is_empty() {
        return Err(anyhow!("Invalid event '{}', item id is empty", s));
    }
    let date = parse_event_date(parts[1])?;
    let amount = parse_f64(parts[2])?;
    let name = parts
        .get(3)
        .map(|n| n.trim().to_string())
        .unwrap_or_else(|| kind.as_str().to_string());
    Ok(NamedEvent::new(item, kind, date, amount, name))
}

pub fn decimal_to_f64(d: Decimal) -> Option<f64> {
    d.to_f64()
}

pub fn f64_to_money(v: f64) -> Option<Decimal> {
    Decimal::from_f64(v).map(|d| d.round_dp(2))
}

pub fn fmt_money(v: f64, ccy: &str) -> String {
    format!("{} {:.2}", ccy, v)
}

/// Whole calendar months from `start` to `end`; a trailing partial month is
/// not counted and an `end` before `start` yields 0.
pub fn months_between(start: NaiveDate, end: NaiveDate) -> i64 {
    if end <= start {
        return 0;
    }
    let mut months = i64::from(end.year() - start.year()) * 12 + i64::from(end.month())
        - i64::from(start.month());
    while months > 0 {
        let reached = u32::try_from(months)
            .ok()
            .and_then(|m| start.checked_add_months(Months::new(m)))
            .is_some_and(|d| d <= end);
        if reached {
            break;
        }
        months -= 1;
    }
    months
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // If v is an array, stream each element; else stream single line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}

pub fn required_arg<'a>(m: &'a clap::ArgMatches, name: &str) -> Result<&'a str> {
    m.get_one::<String>(name)
        .map(|s| s.trim())
        .with_context(|| format!("Missing required argument --{}", name))
}

// Settings
pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let v: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key=?1",
            params![key],
            |r| r.get(0),
        )
        .optional()?;
    Ok(v)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub fn get_currency(conn: &Connection) -> Result<String> {
    Ok(get_setting(conn, "currency")?.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()))
}

pub fn get_horizon_months(conn: &Connection) -> Result<i64> {
    match get_setting(conn, "horizon_months")? {
        Some(s) => s
            .parse::<i64>()
            .with_context(|| format!("Invalid horizon_months setting '{}'", s)),
        None => Ok(DEFAULT_HORIZON_MONTHS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn months_between_counts_whole_months() {
        assert_eq!(months_between(d(2026, 1, 15), d(2026, 1, 15)), 0);
        assert_eq!(months_between(d(2026, 1, 15), d(2026, 2, 14)), 0);
        assert_eq!(months_between(d(2026, 1, 15), d(2026, 2, 15)), 1);
        assert_eq!(months_between(d(2026, 1, 31), d(2026, 2, 28)), 1);
        assert_eq!(months_between(d(2026, 3, 1), d(2028, 2, 1)), 23);
        assert_eq!(months_between(d(2026, 3, 1), d(2025, 2, 1)), 0);
    }

    #[test]
    fn event_args_parse_with_default_name() {
        let e = parse_event_arg("vacation:2027-03:500", EventKind::Deposit).unwrap();
        assert_eq!(e.item_id, "vacation");
        assert_eq!(e.date, d(2027, 3, 1));
        assert_eq!(e.amount, 500.0);
        assert_eq!(e.name, "deposit");

        let e = parse_event_arg("ef:2027-03-15:80:New job", EventKind::RateChange).unwrap();
        assert_eq!(e.date, d(2027, 3, 15));
        assert_eq!(e.name, "New job");

        assert!(parse_event_arg("ef:2027-03", EventKind::Deposit).is_err());
        assert!(parse_event_arg(":2027-03:1", EventKind::Deposit).is_err());
    }

    #[test]
    fn assignments_trim_and_validate() {
        assert_eq!(
            parse_assignment(" car = 1200.50 ").unwrap(),
            ("car".to_string(), 1200.5)
        );
        assert!(parse_assignment("car").is_err());
        assert!(parse_assignment("car=abc").is_err());
        assert!(parse_assignment("car=inf").is_err());
    }

    #[test]
    fn money_rounds_to_cents() {
        assert_eq!(fmt_money(199.999, "USD"), "USD 200.00");
        assert_eq!(fmt_money(-12.3, "EUR"), "EUR -12.30");
        assert_eq!(f64_to_money(10.005).map(|d| d.scale() <= 2), Some(true));
    }
}
