// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A savings goal as the budgeting service reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StashItem {
    pub id: String,
    pub name: String,
    pub balance: Decimal,
    pub target_amount: Option<Decimal>,
    pub monthly_contribution: Decimal,
    pub apy: Decimal, // fraction, 0.04 == 4%
    pub target_date: Option<NaiveDate>,
    pub color: Option<String>,
}

/// Normalized per-item input to the projection engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StashItemConfig {
    pub item_id: String,
    pub name: String,
    pub target_amount: Option<f64>,
    pub starting_balance: f64,
    pub monthly_contribution: f64,
    pub apy: f64,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Deposit,
    RateChange,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Deposit => "deposit",
            EventKind::RateChange => "rate_change",
        }
    }
}

/// A dated change to one goal's trajectory.
///
/// For `Deposit` the amount is added once; for `RateChange` it becomes the
/// monthly contribution from that date on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedEvent {
    pub id: String,
    pub item_id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub date: NaiveDate,
    pub amount: f64,
    pub name: String,
}

impl NamedEvent {
    pub fn new(
        item_id: impl Into<String>,
        kind: EventKind,
        date: NaiveDate,
        amount: f64,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: new_event_id(),
            item_id: item_id.into(),
            kind,
            date,
            amount,
            name: name.into(),
        }
    }
}

pub fn new_event_id() -> String {
    Uuid::new_v4().to_string()
}

/// Partial update for a timeline event; `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPatch {
    pub item_id: Option<String>,
    pub kind: Option<EventKind>,
    pub date: Option<NaiveDate>,
    pub amount: Option<f64>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineDataPoint {
    pub date: NaiveDate,
    pub balances: BTreeMap<String, f64>,
    pub interest_earned: BTreeMap<String, f64>,
    /// Monthly contribution in force at this step.
    pub contributions: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectedStatus {
    Funded,
    Ahead,
    OnTrack,
    Behind,
}

impl fmt::Display for ProjectedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProjectedStatus::Funded => "funded",
            ProjectedStatus::Ahead => "ahead",
            ProjectedStatus::OnTrack => "on_track",
            ProjectedStatus::Behind => "behind",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedCardState {
    pub item_id: String,
    pub projected_balance: f64,
    pub projected_status: ProjectedStatus,
    pub projected_progress_percent: f64,
    pub months_from_now: i64,
    pub interest_earned: f64,
    pub projected_monthly_target: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Normal,
    Distribute,
    Hypothesize,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::Normal => "normal",
            Mode::Distribute => "distribute",
            Mode::Hypothesize => "hypothesize",
        };
        f.write_str(s)
    }
}

/// Caller-supplied "available funds" figures; opaque to the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FundsInputs {
    pub available_amount: Option<f64>,
    pub left_to_budget: Option<f64>,
}
