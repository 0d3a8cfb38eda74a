// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use rusqlite::Connection;

use crate::commands::{apply_scenario, planner, start_date};
use crate::utils::{maybe_print_json, parse_date, pretty_table, required_arg};

pub fn handle(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let start = start_date(sub)?;
    let date = parse_date(required_arg(sub, "date")?)?;

    let mut planner = planner(conn);
    apply_scenario(&mut planner, sub.get_one::<String>("scenario"))?;
    let configs = planner.item_configs()?;
    let states = planner.card_states(start, Some(date))?;

    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &states)? {
        return Ok(());
    }
    let rows = states
        .iter()
        .zip(&configs)
        .map(|(s, c)| {
            vec![
                c.name.clone(),
                format!("{:.2}", s.projected_balance),
                s.projected_status.to_string(),
                format!("{:.1}%", s.projected_progress_percent),
                s.months_from_now.to_string(),
                format!("{:.2}", s.interest_earned),
                format!("{:.2}", s.projected_monthly_target),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Goal", "Balance", "Status", "Progress", "Months", "Interest", "Monthly"],
            rows
        )
    );
    Ok(())
}
