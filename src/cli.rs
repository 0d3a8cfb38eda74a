// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, crate_version};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print pretty JSON"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json")
            .help("Print one JSON object per line"),
    )
}

fn repeated(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .action(ArgAction::Append)
        .value_name("ITEM=AMOUNT")
        .help(help)
}

fn start_arg() -> Arg {
    Arg::new("start")
        .long("start")
        .value_name("YYYY-MM-DD")
        .help("Projection start (defaults to today)")
}

fn scenario_arg() -> Arg {
    Arg::new("scenario")
        .long("scenario")
        .value_name("NAME")
        .help("Apply a saved scenario before projecting")
}

pub fn build_cli() -> Command {
    Command::new("stashcast")
        .version(crate_version!())
        .about("Savings goal projections, what-if scenarios, and allocation planning")
        .subcommand(Command::new("init").about("Create the local database"))
        .subcommand(
            Command::new("config")
                .about("Show or change settings")
                .subcommand(Command::new("show"))
                .subcommand(
                    Command::new("set")
                        .arg(
                            Arg::new("key")
                                .long("key")
                                .required(true)
                                .value_parser(["currency", "horizon_months"]),
                        )
                        .arg(Arg::new("value").long("value").required(true)),
                ),
        )
        .subcommand(
            Command::new("item")
                .about("Manage savings goals")
                .subcommand(
                    Command::new("add")
                        .about("Add or replace a savings goal")
                        .arg(Arg::new("id").long("id").required(true))
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(Arg::new("balance").long("balance").required(true))
                        .arg(Arg::new("monthly").long("monthly").default_value("0"))
                        .arg(Arg::new("target").long("target"))
                        .arg(
                            Arg::new("apy")
                                .long("apy")
                                .default_value("0")
                                .help("Annual yield as a fraction, e.g. 0.045"),
                        )
                        .arg(Arg::new("target-date").long("target-date").value_name("YYYY-MM-DD"))
                        .arg(Arg::new("color").long("color")),
                )
                .subcommand(json_flags(Command::new("list")))
                .subcommand(Command::new("rm").arg(Arg::new("id").long("id").required(true))),
        )
        .subcommand(json_flags(
            Command::new("project")
                .about("Project goal balances over time")
                .arg(start_arg())
                .arg(
                    Arg::new("months")
                        .long("months")
                        .value_parser(clap::value_parser!(i64))
                        .conflicts_with("end")
                        .help("Horizon in months (defaults to the horizon_months setting)"),
                )
                .arg(Arg::new("end").long("end").value_name("YYYY-MM-DD"))
                .arg(
                    Arg::new("resolution")
                        .long("resolution")
                        .value_parser(["daily", "monthly", "yearly"]),
                )
                .arg(scenario_arg())
                .arg(
                    Arg::new("csv")
                        .long("csv")
                        .value_name("PATH")
                        .help("Also write the timeline to a CSV file"),
                ),
        ))
        .subcommand(json_flags(
            Command::new("cursor")
                .about("Projected goal state on a date")
                .arg(
                    Arg::new("date")
                        .long("date")
                        .required(true)
                        .value_name("YYYY-MM-DD"),
                )
                .arg(start_arg())
                .arg(scenario_arg()),
        ))
        .subcommand(
            Command::new("distribute")
                .about("Move available funds into goals")
                .arg(repeated("alloc", "New absolute balance for a goal"))
                .arg(repeated("monthly", "New monthly contribution for a goal"))
                .arg(Arg::new("available").long("available"))
                .arg(Arg::new("left-to-budget").long("left-to-budget"))
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Show the remaining pool without committing"),
                ),
        )
        .subcommand(
            Command::new("scenario")
                .about("Saved what-if scenarios")
                .subcommand(
                    Command::new("save")
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(
                            Arg::new("from")
                                .long("from")
                                .value_name("NAME")
                                .help("Start from an existing scenario"),
                        )
                        .arg(repeated("balance", "Hypothetical balance for a goal"))
                        .arg(repeated("monthly", "Hypothetical monthly contribution"))
                        .arg(repeated("apy", "APY override, e.g. ef=0.045"))
                        .arg(
                            Arg::new("deposit")
                                .long("deposit")
                                .action(ArgAction::Append)
                                .value_name("ITEM:YYYY-MM:AMOUNT[:NAME]"),
                        )
                        .arg(
                            Arg::new("rate-change")
                                .long("rate-change")
                                .action(ArgAction::Append)
                                .value_name("ITEM:YYYY-MM:AMOUNT[:NAME]"),
                        )
                        .arg(Arg::new("available").long("available"))
                        .arg(Arg::new("left-to-budget").long("left-to-budget"))
                        .arg(
                            Arg::new("yes")
                                .long("yes")
                                .action(ArgAction::SetTrue)
                                .help("Overwrite a different scenario with the same name"),
                        ),
                )
                .subcommand(json_flags(Command::new("list")))
                .subcommand(json_flags(
                    Command::new("show").arg(Arg::new("name").long("name").required(true)),
                ))
                .subcommand(Command::new("rm").arg(Arg::new("name").long("name").required(true))),
        )
}
