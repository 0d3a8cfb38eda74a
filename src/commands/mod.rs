// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod config;
pub mod cursor;
pub mod distribute;
pub mod items;
pub mod project;
pub mod scenarios;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;

use crate::items::SqliteItemSource;
use crate::planner::{LoadOutcome, Planner};
use crate::scenarios::{ScenarioStore, SqliteScenarioStore};
use crate::utils::parse_date;

pub type SqlitePlanner<'a> = Planner<SqliteItemSource<'a>, SqliteScenarioStore<'a>>;

pub fn planner(conn: &Connection) -> SqlitePlanner<'_> {
    Planner::new(SqliteItemSource::new(conn), SqliteScenarioStore::new(conn))
}

pub(crate) fn start_date(sub: &clap::ArgMatches) -> Result<NaiveDate> {
    match sub.get_one::<String>("start") {
        Some(s) => parse_date(s.trim()),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

/// Enters hypothesize mode and loads the named scenario, if one was given.
pub(crate) fn apply_scenario(planner: &mut SqlitePlanner<'_>, name: Option<&String>) -> Result<()> {
    let Some(name) = name else {
        return Ok(());
    };
    let hypothesis = planner
        .store()
        .find_by_name(name.trim())?
        .with_context(|| format!("Scenario '{}' not found", name.trim()))?;
    planner.session_mut().enter_hypothesize()?;
    match planner.load_scenario(&hypothesis.id, false)? {
        LoadOutcome::Loaded => Ok(()),
        LoadOutcome::NeedsConfirmation => Err(anyhow::anyhow!(
            "Session has unsaved changes; refusing to load '{}'",
            hypothesis.name
        )),
    }
}
