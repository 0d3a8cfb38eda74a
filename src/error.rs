// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::Mode;

#[derive(Debug, Error, PartialEq)]
pub enum ProjectionError {
    #[error("Projection end {end} is before start {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },

    #[error("Projection horizon of {months} months exceeds the {max}-month limit")]
    HorizonTooLong { months: i64, max: i64 },

    #[error("Daily resolution is limited to {max} months, requested {months}")]
    DailyHorizonTooLong { months: i64, max: i64 },

    #[error("Item '{item_id}' has a non-finite {field}")]
    NonFinite { item_id: String, field: &'static str },

    #[error("Item '{item_id}' has an APY of {apy}, which must be greater than -1")]
    InvalidApy { item_id: String, apy: f64 },

    #[error("Unknown resolution '{0}' (use daily|monthly|yearly)")]
    UnknownResolution(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum CursorError {
    #[error("No projection step falls on {0}")]
    DateNotOnGrid(NaiveDate),

    #[error("Cursor date {date} is before the projection start {start}")]
    BeforeStart { date: NaiveDate, start: NaiveDate },

    #[error("Projection is empty")]
    EmptyTimeline,

    #[error("Item '{0}' is missing from the projection")]
    MissingItem(String),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("'{operation}' is not allowed in {mode} mode")]
    WrongMode { operation: &'static str, mode: Mode },

    #[error("Unknown timeline event '{0}'")]
    UnknownEvent(String),

    #[error("{0} distribute allocation(s) have not been committed")]
    UncommittedAllocations(usize),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Scenario '{0}' not found")]
    NotFound(String),

    #[error("Item '{0}' not found")]
    UnknownItem(String),

    #[error("Invalid amount '{value}' for item '{item_id}'")]
    InvalidAmount { item_id: String, value: String },

    #[error("Corrupt scenario record: {0}")]
    Corrupt(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),

    #[error("Scenario payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Cursor(#[from] CursorError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("A scenario save is already in progress")]
    SaveInProgress,

    #[error("Scenario name must not be empty")]
    EmptyName,

    #[error("Allocations need {requested:.2} but only {available:.2} is available")]
    ExceedsAvailableFunds { requested: f64, available: f64 },

    #[error("Monthly changes need {requested:.2} but only {left:.2} is left to budget")]
    ExceedsLeftToBudget { requested: f64, left: f64 },
}

pub type Result<T> = std::result::Result<T, PlanError>;
