// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod cli;
pub mod commands;
pub mod cursor;
pub mod db;
pub mod error;
pub mod items;
pub mod models;
pub mod planner;
pub mod projection;
pub mod scenarios;
pub mod session;
pub mod utils;
