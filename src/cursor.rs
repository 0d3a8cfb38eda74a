// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Point-in-time goal state read off a projection.
//!
//! Lookups are exact: the date must be one of the projection's grid dates.
//! Nothing is interpolated between steps.

use chrono::NaiveDate;

use crate::error::CursorError;
use crate::models::{
    NamedEvent, ProjectedCardState, ProjectedStatus, StashItemConfig, TimelineDataPoint,
};
use crate::projection::{MAX_DAILY_HORIZON_MONTHS, Resolution, project};
use crate::utils::months_between;

/// Contribution difference treated as "the same as planned".
pub const ON_TRACK_TOLERANCE: f64 = 0.005;

pub fn card_states_at(
    items: &[StashItemConfig],
    timeline: &[TimelineDataPoint],
    date: NaiveDate,
) -> Result<Vec<ProjectedCardState>, CursorError> {
    let start = timeline.first().ok_or(CursorError::EmptyTimeline)?.date;
    if date < start {
        return Err(CursorError::BeforeStart { date, start });
    }
    let idx = timeline
        .binary_search_by_key(&date, |p| p.date)
        .map_err(|_| CursorError::DateNotOnGrid(date))?;
    let point = &timeline[idx];
    items
        .iter()
        .map(|item| card_state(item, point, start))
        .collect()
}

/// Coarsest grid from `start` that lands on `date`. Dates only reachable on
/// the daily grid must be within the daily horizon.
pub fn cursor_resolution(start: NaiveDate, date: NaiveDate) -> Result<Resolution, CursorError> {
    let resolution = Resolution::coarsest_containing(start, date);
    if resolution == Resolution::Daily && months_between(start, date) > MAX_DAILY_HORIZON_MONTHS {
        return Err(CursorError::DateNotOnGrid(date));
    }
    Ok(resolution)
}

/// Projects straight to `date` on the coarsest grid that contains it.
pub fn project_at(
    items: &[StashItemConfig],
    events: &[NamedEvent],
    start: NaiveDate,
    date: NaiveDate,
) -> Result<Vec<ProjectedCardState>, CursorError> {
    if date < start {
        return Err(CursorError::BeforeStart { date, start });
    }
    let resolution = cursor_resolution(start, date)?;
    let timeline = project(items, events, start, date, resolution)?;
    card_states_at(items, &timeline, date)
}

fn card_state(
    item: &StashItemConfig,
    point: &TimelineDataPoint,
    start: NaiveDate,
) -> Result<ProjectedCardState, CursorError> {
    let missing = || CursorError::MissingItem(item.item_id.clone());
    let balance = *point.balances.get(&item.item_id).ok_or_else(missing)?;
    let interest = *point.interest_earned.get(&item.item_id).ok_or_else(missing)?;
    let contribution = *point.contributions.get(&item.item_id).ok_or_else(missing)?;

    Ok(ProjectedCardState {
        item_id: item.item_id.clone(),
        projected_balance: balance,
        projected_status: derive_status(item, balance, contribution),
        projected_progress_percent: progress_percent(item.target_amount, balance),
        months_from_now: months_between(start, point.date),
        interest_earned: interest,
        projected_monthly_target: contribution,
    })
}

pub fn progress_percent(target: Option<f64>, balance: f64) -> f64 {
    match target {
        Some(t) if t > 0.0 => (balance / t * 100.0).min(100.0),
        _ => 100.0,
    }
}

/// Funded once the target is reached; otherwise compares the contribution in
/// force with the item's planned one. Open-ended goals are always on track.
pub fn derive_status(item: &StashItemConfig, balance: f64, contribution: f64) -> ProjectedStatus {
    let target = match item.target_amount {
        Some(t) if t > 0.0 => t,
        _ => return ProjectedStatus::OnTrack,
    };
    if balance >= target {
        return ProjectedStatus::Funded;
    }
    let diff = contribution - item.monthly_contribution;
    if diff.abs() <= ON_TRACK_TOLERANCE {
        ProjectedStatus::OnTrack
    } else if diff > 0.0 {
        ProjectedStatus::Ahead
    } else {
        ProjectedStatus::Behind
    }
}
