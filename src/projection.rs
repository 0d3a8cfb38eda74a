// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Balance projection for savings goals.
//!
//! [`project`] walks a fixed date grid from `start` to `end` and, per item and
//! per step, applies contribution changes, the pro-rated contribution, one-off
//! deposits and then compounding interest. Step 0 is always the unmodified
//! starting state.

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProjectionError;
use crate::models::{EventKind, NamedEvent, StashItemConfig, TimelineDataPoint};
use crate::utils::months_between;

pub const MAX_HORIZON_MONTHS: i64 = 50 * 12;
pub const MAX_DAILY_HORIZON_MONTHS: i64 = 5 * 12;
const DAILY_POLICY_MONTHS: i64 = 2 * 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Daily,
    Monthly,
    Yearly,
}

impl Resolution {
    /// Finest resolution that keeps the step count interactive for this horizon.
    pub fn for_horizon(start: NaiveDate, end: NaiveDate) -> Self {
        let months = months_between(start, end);
        if months <= DAILY_POLICY_MONTHS {
            Resolution::Daily
        } else if months <= MAX_DAILY_HORIZON_MONTHS {
            Resolution::Monthly
        } else {
            Resolution::Yearly
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Daily => "daily",
            Resolution::Monthly => "monthly",
            Resolution::Yearly => "yearly",
        }
    }

    /// Fraction of a year covered by one step.
    pub fn step_fraction(self) -> f64 {
        match self {
            Resolution::Daily => 1.0 / 365.0,
            Resolution::Monthly => 1.0 / 12.0,
            Resolution::Yearly => 1.0,
        }
    }

    /// Multiplier applied to a monthly contribution for one step.
    pub fn contribution_factor(self) -> f64 {
        match self {
            Resolution::Daily => 1.0 / 30.0,
            Resolution::Monthly => 1.0,
            Resolution::Yearly => 12.0,
        }
    }

    /// Date of grid step `step`, always measured from `start` so month-end
    /// clamping never accumulates.
    pub fn step_date(self, start: NaiveDate, step: u32) -> Option<NaiveDate> {
        match self {
            Resolution::Daily => start.checked_add_days(Days::new(u64::from(step))),
            Resolution::Monthly => start.checked_add_months(Months::new(step)),
            Resolution::Yearly => start.checked_add_months(Months::new(step.checked_mul(12)?)),
        }
    }

    /// Coarsest resolution whose grid from `start` lands exactly on `date`.
    pub fn coarsest_containing(start: NaiveDate, date: NaiveDate) -> Self {
        [Resolution::Yearly, Resolution::Monthly]
            .into_iter()
            .find(|r| r.grid_contains(start, date))
            .unwrap_or(Resolution::Daily)
    }

    pub fn grid_contains(self, start: NaiveDate, date: NaiveDate) -> bool {
        if date < start {
            return false;
        }
        let months = months_between(start, date);
        match self {
            Resolution::Daily => true,
            Resolution::Monthly => u32::try_from(months)
                .ok()
                .and_then(|m| self.step_date(start, m))
                == Some(date),
            Resolution::Yearly => {
                months % 12 == 0
                    && u32::try_from(months / 12)
                        .ok()
                        .and_then(|y| self.step_date(start, y))
                        == Some(date)
            }
        }
    }
}

impl FromStr for Resolution {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Resolution::Daily),
            "monthly" => Ok(Resolution::Monthly),
            "yearly" => Ok(Resolution::Yearly),
            other => Err(ProjectionError::UnknownResolution(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RunningState {
    balance: f64,
    interest: f64,
    contribution: f64,
    step_rate: f64,
}

pub fn project(
    items: &[StashItemConfig],
    events: &[NamedEvent],
    start: NaiveDate,
    end: NaiveDate,
    resolution: Resolution,
) -> Result<Vec<TimelineDataPoint>, ProjectionError> {
    validate(items, start, end, resolution)?;

    let ordered = ordered_events(events);
    let mut states: Vec<RunningState> = items
        .iter()
        .map(|item| RunningState {
            balance: item.starting_balance,
            interest: 0.0,
            contribution: item.monthly_contribution,
            step_rate: (1.0 + item.apy).powf(resolution.step_fraction()) - 1.0,
        })
        .collect();

    // Contribution changes that already happened set the baseline; earlier
    // deposits are part of the starting balance.
    let mut cursor = ordered.partition_point(|e| e.date <= start);
    for event in &ordered[..cursor] {
        if event.kind != EventKind::RateChange {
            continue;
        }
        if let Some(idx) = items.iter().position(|i| i.item_id == event.item_id) {
            states[idx].contribution = event.amount;
        }
    }

    let mut timeline = vec![data_point(start, items, &states)];
    let factor = resolution.contribution_factor();
    let mut step: u32 = 1;
    while let Some(date) = resolution.step_date(start, step) {
        if date > end {
            break;
        }
        let upper = cursor + ordered[cursor..].partition_point(|e| e.date <= date);
        let window = &ordered[cursor..upper];

        for (item, state) in items.iter().zip(states.iter_mut()) {
            let item_events = || window.iter().filter(|e| e.item_id == item.item_id);
            for event in item_events().filter(|e| e.kind == EventKind::RateChange) {
                state.contribution = event.amount;
            }
            state.balance += state.contribution * factor;
            for event in item_events().filter(|e| e.kind == EventKind::Deposit) {
                state.balance += event.amount;
            }
            let interest = state.balance * state.step_rate;
            state.balance += interest;
            state.interest += interest;
        }

        timeline.push(data_point(date, items, &states));
        cursor = upper;
        step += 1;
    }

    debug!(
        items = items.len(),
        events = events.len(),
        steps = timeline.len(),
        resolution = resolution.as_str(),
        "projection computed"
    );
    Ok(timeline)
}

fn validate(
    items: &[StashItemConfig],
    start: NaiveDate,
    end: NaiveDate,
    resolution: Resolution,
) -> Result<(), ProjectionError> {
    if end < start {
        return Err(ProjectionError::EndBeforeStart { start, end });
    }
    let months = months_between(start, end);
    if months > MAX_HORIZON_MONTHS {
        return Err(ProjectionError::HorizonTooLong {
            months,
            max: MAX_HORIZON_MONTHS,
        });
    }
    if resolution == Resolution::Daily && months > MAX_DAILY_HORIZON_MONTHS {
        return Err(ProjectionError::DailyHorizonTooLong {
            months,
            max: MAX_DAILY_HORIZON_MONTHS,
        });
    }
    for item in items {
        let fields = [
            ("starting balance", item.starting_balance),
            ("monthly contribution", item.monthly_contribution),
            ("apy", item.apy),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(ProjectionError::NonFinite {
                    item_id: item.item_id.clone(),
                    field,
                });
            }
        }
        if item.apy <= -1.0 {
            return Err(ProjectionError::InvalidApy {
                item_id: item.item_id.clone(),
                apy: item.apy,
            });
        }
    }
    Ok(())
}

/// Events by date; the stable sort keeps insertion order for same-day events.
fn ordered_events(events: &[NamedEvent]) -> Vec<&NamedEvent> {
    let mut ordered: Vec<&NamedEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.date);
    ordered
}

fn data_point(
    date: NaiveDate,
    items: &[StashItemConfig],
    states: &[RunningState],
) -> TimelineDataPoint {
    let mut balances = BTreeMap::new();
    let mut interest_earned = BTreeMap::new();
    let mut contributions = BTreeMap::new();
    for (item, state) in items.iter().zip(states) {
        balances.insert(item.item_id.clone(), state.balance);
        interest_earned.insert(item.item_id.clone(), state.interest);
        contributions.insert(item.item_id.clone(), state.contribution);
    }
    TimelineDataPoint {
        date,
        balances,
        interest_earned,
        contributions,
    }
}

/// Remembers the last projection and returns it while the inputs are unchanged.
#[derive(Debug, Default)]
pub struct ProjectionCache {
    key: Option<u64>,
    timeline: Vec<TimelineDataPoint>,
    hits: u64,
}

impl ProjectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(
        &mut self,
        items: &[StashItemConfig],
        events: &[NamedEvent],
        start: NaiveDate,
        end: NaiveDate,
        resolution: Resolution,
    ) -> Result<&[TimelineDataPoint], ProjectionError> {
        let key = input_key(items, events, start, end, resolution);
        if self.key == Some(key) {
            self.hits += 1;
            debug!(hits = self.hits, "projection cache hit");
            return Ok(&self.timeline);
        }
        let timeline = project(items, events, start, end, resolution)?;
        self.key = Some(key);
        self.timeline = timeline;
        Ok(&self.timeline)
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn clear(&mut self) {
        self.key = None;
        self.timeline.clear();
    }
}

fn input_key(
    items: &[StashItemConfig],
    events: &[NamedEvent],
    start: NaiveDate,
    end: NaiveDate,
    resolution: Resolution,
) -> u64 {
    let mut h = DefaultHasher::new();
    items.len().hash(&mut h);
    for item in items {
        item.item_id.hash(&mut h);
        item.name.hash(&mut h);
        item.target_amount.map(f64::to_bits).hash(&mut h);
        item.starting_balance.to_bits().hash(&mut h);
        item.monthly_contribution.to_bits().hash(&mut h);
        item.apy.to_bits().hash(&mut h);
        item.color.hash(&mut h);
    }
    events.len().hash(&mut h);
    for event in events {
        event.id.hash(&mut h);
        event.item_id.hash(&mut h);
        event.kind.hash(&mut h);
        event.date.hash(&mut h);
        event.amount.to_bits().hash(&mut h);
        event.name.hash(&mut h);
    }
    start.hash(&mut h);
    end.hash(&mut h);
    resolution.hash(&mut h);
    h.finish()
}
