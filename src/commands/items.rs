// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, anyhow};
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::items::{ItemSource, SqliteItemSource};
use crate::models::StashItem;
use crate::utils::{
    get_currency, maybe_print_json, parse_date, parse_decimal, pretty_table, required_arg,
};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("rm", sub)) => {
            let id = required_arg(sub, "id")?;
            SqliteItemSource::new(conn).remove(id)?;
            println!("Removed goal '{}'", id);
        }
        _ => {}
    }
    Ok(())
}

fn add(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let id = required_arg(sub, "id")?.to_string();
    let name = required_arg(sub, "name")?.to_string();
    if id.is_empty() || name.is_empty() {
        return Err(anyhow!("Goal id and name must not be empty"));
    }
    let balance = parse_decimal(required_arg(sub, "balance")?)?;
    let monthly = parse_decimal(required_arg(sub, "monthly")?)?;
    let apy = parse_decimal(required_arg(sub, "apy")?)?;
    if apy <= Decimal::NEGATIVE_ONE {
        return Err(anyhow!("APY must be greater than -1, got {}", apy));
    }
    let target_amount = match sub.get_one::<String>("target") {
        Some(s) => Some(parse_decimal(s)?),
        None => None,
    };
    let target_date = match sub.get_one::<String>("target-date") {
        Some(s) => Some(parse_date(s.trim())?),
        None => None,
    };
    let color = sub.get_one::<String>("color").map(|s| s.trim().to_string());

    let item = StashItem {
        id,
        name,
        balance,
        target_amount,
        monthly_contribution: monthly,
        apy,
        target_date,
        color,
    };
    SqliteItemSource::new(conn).upsert(&item)?;
    println!(
        "Saved goal '{}' ({}) balance {} {}",
        item.name,
        item.id,
        get_currency(conn)?,
        item.balance.round_dp(2)
    );
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let items = SqliteItemSource::new(conn).items()?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &items)? {
        return Ok(());
    }
    let rows = items
        .into_iter()
        .map(|i| {
            vec![
                i.id,
                i.name,
                format!("{:.2}", i.balance),
                i.target_amount
                    .map(|t| format!("{:.2}", t))
                    .unwrap_or_else(|| "-".into()),
                format!("{:.2}", i.monthly_contribution),
                format!("{}", i.apy),
                i.target_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".into()),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Id", "Name", "Balance", "Target", "Monthly", "APY", "Target date"],
            rows
        )
    );
    Ok(())
}
