// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, anyhow};
use rusqlite::Connection;

use crate::commands::planner;
use crate::models::FundsInputs;
use crate::utils::{fmt_money, get_currency, parse_assignment, parse_f64, pretty_table};

pub fn handle(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let allocs = assignments(sub, "alloc")?;
    let monthly = assignments(sub, "monthly")?;
    if allocs.is_empty() && monthly.is_empty() {
        return Err(anyhow!("Nothing to distribute; pass --alloc or --monthly"));
    }
    let funds = FundsInputs {
        available_amount: sub.get_one::<String>("available").map(|s| parse_f64(s)).transpose()?,
        left_to_budget: sub
            .get_one::<String>("left-to-budget")
            .map(|s| parse_f64(s))
            .transpose()?,
    };
    let ccy = get_currency(conn)?;

    let mut planner = planner(conn);
    let session = planner.session_mut();
    session.enter_distribute()?;
    session.set_funds_inputs(funds)?;
    for (item, amount) in &allocs {
        session.set_stashed_allocation(item, *amount)?;
    }
    for (item, amount) in &monthly {
        session.set_monthly_allocation(item, *amount)?;
    }

    if sub.get_flag("dry-run") {
        match planner.remaining_to_distribute()? {
            Some(left) => println!("Remaining to distribute: {}", fmt_money(left, &ccy)),
            None => println!("No --available pool given; balances are unchecked"),
        }
        match planner.remaining_to_budget()? {
            Some(left) => println!("Remaining to budget: {}", fmt_money(left, &ccy)),
            None => println!("No --left-to-budget given; monthly changes are unchecked"),
        }
        planner.session_mut().exit_mode(true)?;
        return Ok(());
    }

    let summary = planner.commit_distribution()?;
    planner.session_mut().exit_mode(false)?;

    let mut rows: Vec<Vec<String>> = summary
        .balances
        .iter()
        .map(|(id, v)| vec![id.clone(), "balance".into(), format!("{:.2}", v)])
        .collect();
    rows.extend(
        summary
            .monthly
            .iter()
            .map(|(id, v)| vec![id.clone(), "monthly".into(), format!("{:.2}", v)]),
    );
    let value_header = format!("New value ({})", ccy);
    println!(
        "{}",
        pretty_table(&["Goal", "Field", value_header.as_str()], rows)
    );
    Ok(())
}

fn assignments(sub: &clap::ArgMatches, name: &str) -> Result<Vec<(String, f64)>> {
    sub.get_many::<String>(name)
        .into_iter()
        .flatten()
        .map(|s| parse_assignment(s))
        .collect()
}
