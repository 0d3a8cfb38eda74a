// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result, anyhow};
use rusqlite::Connection;

use crate::commands::{SqlitePlanner, apply_scenario, planner};
use crate::models::{EventKind, FundsInputs};
use crate::planner::SaveResult;
use crate::scenarios::{Hypothesis, ScenarioStore};
use crate::utils::{
    maybe_print_json, parse_assignment, parse_event_arg, parse_f64, pretty_table, required_arg,
};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("save", sub)) => save(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("show", sub)) => show(conn, sub)?,
        Some(("rm", sub)) => remove(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn save(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let name = required_arg(sub, "name")?;
    let mut planner = planner(conn);
    match sub.get_one::<String>("from") {
        Some(from) => apply_scenario(&mut planner, Some(from))?,
        None => planner.session_mut().enter_hypothesize()?,
    }
    apply_overrides(&mut planner, sub)?;

    match planner.save_scenario(name, sub.get_flag("yes"))? {
        SaveResult::Saved(id) => {
            let events = planner.session().timeline_events().len();
            println!("Saved scenario '{}' ({}) with {} event(s)", name, id, events);
            Ok(())
        }
        SaveResult::NeedsConfirmation { existing_name, .. } => Err(anyhow!(
            "A different scenario named '{}' already exists; pass --yes to overwrite it",
            existing_name
        )),
    }
}

fn apply_overrides(planner: &mut SqlitePlanner<'_>, sub: &clap::ArgMatches) -> Result<()> {
    let session = planner.session_mut();
    for raw in sub.get_many::<String>("balance").into_iter().flatten() {
        let (item, amount) = parse_assignment(raw)?;
        session.set_stashed_allocation(&item, amount)?;
    }
    for raw in sub.get_many::<String>("monthly").into_iter().flatten() {
        let (item, amount) = parse_assignment(raw)?;
        session.set_monthly_allocation(&item, amount)?;
    }
    for raw in sub.get_many::<String>("apy").into_iter().flatten() {
        let (item, apy) = parse_assignment(raw)?;
        if apy <= -1.0 {
            return Err(anyhow!("APY for '{}' must be greater than -1", item));
        }
        session.set_item_apy(&item, apy)?;
    }
    for (flag, kind) in [
        ("deposit", EventKind::Deposit),
        ("rate-change", EventKind::RateChange),
    ] {
        for raw in sub.get_many::<String>(flag).into_iter().flatten() {
            session.add_timeline_event(parse_event_arg(raw, kind)?)?;
        }
    }

    let mut funds: FundsInputs = session.funds();
    if let Some(v) = sub.get_one::<String>("available") {
        funds.available_amount = Some(parse_f64(v)?);
    }
    if let Some(v) = sub.get_one::<String>("left-to-budget") {
        funds.left_to_budget = Some(parse_f64(v)?);
    }
    session.set_funds_inputs(funds)?;
    Ok(())
}

fn find(conn: &Connection, name: &str) -> Result<Hypothesis> {
    let store = crate::scenarios::SqliteScenarioStore::new(conn);
    store
        .find_by_name(name)?
        .with_context(|| format!("Scenario '{}' not found", name))
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let scenarios = planner(conn).list_scenarios()?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &scenarios)? {
        return Ok(());
    }
    let rows = scenarios
        .into_iter()
        .map(|h| {
            let s = &h.snapshot;
            vec![
                h.name.clone(),
                h.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                (s.stashed_allocations.len() + s.monthly_allocations.len()).to_string(),
                s.timeline_events.len().to_string(),
                s.item_apys.len().to_string(),
                h.id,
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Name", "Updated", "Allocations", "Events", "APY overrides", "Id"],
            rows
        )
    );
    Ok(())
}

fn show(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let h = find(conn, required_arg(sub, "name")?)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &h)? {
        return Ok(());
    }
    let s = &h.snapshot;
    let mut rows = Vec::new();
    let overrides = [
        ("balance", &s.stashed_allocations),
        ("monthly", &s.monthly_allocations),
        ("apy", &s.item_apys),
    ];
    for (field, map) in overrides {
        for (item, v) in map.iter() {
            let value = if field == "apy" {
                v.to_string()
            } else {
                format!("{:.2}", v)
            };
            rows.push(vec![
                item.to_string(),
                field.to_string(),
                "-".into(),
                value,
                String::new(),
            ]);
        }
    }
    for e in &s.timeline_events {
        rows.push(vec![
            e.item_id.clone(),
            e.kind.as_str().into(),
            e.date.to_string(),
            format!("{:.2}", e.amount),
            e.name.clone(),
        ]);
    }
    println!("Scenario '{}' ({})", h.name, h.id);
    println!("{}", pretty_table(&["Goal", "Kind", "Date", "Value", "Name"], rows));
    Ok(())
}

fn remove(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let h = find(conn, required_arg(sub, "name")?)?;
    planner(conn).delete_scenario(&h.id)?;
    println!("Removed scenario '{}'", h.name);
    Ok(())
}
