// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, anyhow};
use rusqlite::Connection;

use crate::utils::{get_currency, get_horizon_months, pretty_table, required_arg, set_setting};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("show", _)) => {
            let rows = vec![
                vec!["currency".to_string(), get_currency(conn)?],
                vec!["horizon_months".to_string(), get_horizon_months(conn)?.to_string()],
            ];
            println!("{}", pretty_table(&["Key", "Value"], rows));
        }
        Some(("set", sub)) => {
            let key = required_arg(sub, "key")?;
            let value = required_arg(sub, "value")?;
            let value = match key {
                "currency" => value.to_uppercase(),
                "horizon_months" => {
                    let months: i64 = value
                        .parse()
                        .map_err(|_| anyhow!("Invalid horizon_months '{}'", value))?;
                    if !(1..=crate::projection::MAX_HORIZON_MONTHS).contains(&months) {
                        return Err(anyhow!(
                            "horizon_months must be between 1 and {}",
                            crate::projection::MAX_HORIZON_MONTHS
                        ));
                    }
                    months.to_string()
                }
                other => return Err(anyhow!("Unknown setting '{}'", other)),
            };
            set_setting(conn, key, &value)?;
            println!("Set {} = {}", key, value);
        }
        _ => {}
    }
    Ok(())
}
