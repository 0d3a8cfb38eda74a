// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result, anyhow};
use chrono::Months;
use rusqlite::Connection;
use tracing::info;

use crate::commands::{apply_scenario, planner, start_date};
use crate::models::{StashItemConfig, TimelineDataPoint};
use crate::projection::Resolution;
use crate::utils::{get_horizon_months, maybe_print_json, parse_date, pretty_table};

pub fn handle(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let start = start_date(sub)?;
    let end = match (sub.get_one::<String>("end"), sub.get_one::<i64>("months")) {
        (Some(e), _) => parse_date(e.trim())?,
        (None, months) => {
            let months = match months {
                Some(m) => *m,
                None => get_horizon_months(conn)?,
            };
            let months = u32::try_from(months)
                .map_err(|_| anyhow!("Horizon must be a positive number of months"))?;
            start
                .checked_add_months(Months::new(months))
                .context("Horizon end is out of range")?
        }
    };
    let resolution = sub
        .get_one::<String>("resolution")
        .map(|r| r.parse::<Resolution>())
        .transpose()?;

    let mut planner = planner(conn);
    apply_scenario(&mut planner, sub.get_one::<String>("scenario"))?;
    let configs = planner.item_configs()?;
    let timeline = planner.project(start, end, resolution)?;

    if let Some(path) = sub.get_one::<String>("csv") {
        write_csv(path, &configs, &timeline)?;
        info!(path = %path, rows = timeline.len(), "timeline exported");
        println!("Exported {} steps to {}", timeline.len(), path);
    }

    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &timeline)? {
        return Ok(());
    }
    let mut headers = vec!["Date"];
    headers.extend(configs.iter().map(|c| c.name.as_str()));
    let rows = timeline
        .iter()
        .map(|p| {
            let mut row = vec![p.date.to_string()];
            row.extend(
                configs
                    .iter()
                    .map(|c| format!("{:.2}", p.balances.get(&c.item_id).copied().unwrap_or_default())),
            );
            row
        })
        .collect();
    println!("{}", pretty_table(&headers, rows));
    Ok(())
}

/// One row per step and item.
pub fn write_csv(
    path: &str,
    configs: &[StashItemConfig],
    timeline: &[TimelineDataPoint],
) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Cannot write CSV to {}", path))?;
    wtr.write_record(["date", "item_id", "name", "balance", "interest_earned", "monthly_contribution"])?;
    for point in timeline {
        for c in configs {
            let get = |m: &std::collections::BTreeMap<String, f64>| {
                format!("{:.2}", m.get(&c.item_id).copied().unwrap_or_default())
            };
            wtr.write_record([
                point.date.to_string(),
                c.item_id.clone(),
                c.name.clone(),
                get(&point.balances),
                get(&point.interest_earned),
                get(&point.contributions),
            ])?;
        }
    }
    wtr.flush()?;
    Ok(())
}
