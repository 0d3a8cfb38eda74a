// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Feature controller tying one session to an item source and a scenario
//! store.
//!
//! Saving is split in two so a caller can hold the pending save across an
//! await point or a UI round trip: [`Planner::begin_save`] runs the name
//! collision check and claims the single save slot, and
//! [`Planner::finish_save`] writes the snapshot. If the session was reset in
//! between, the write still happens but the session is not marked as saved.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::cursor::{card_states_at, cursor_resolution};
use crate::error::{CursorError, PlanError, Result, SessionError, StoreError};
use crate::items::{ItemSource, build_item_configs};
use crate::models::{Mode, ProjectedCardState, StashItem, StashItemConfig, TimelineDataPoint};
use crate::projection::{ProjectionCache, Resolution};
use crate::scenarios::{Hypothesis, ScenarioStore};
use crate::session::{AllocationMap, AllocationSession, ScenarioSnapshot};
use crate::utils::{decimal_to_f64, f64_to_money};

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// Ready to write; pass to [`Planner::finish_save`].
    Ready(PendingSave),
    /// Another scenario already uses this name.
    NeedsConfirmation { existing_id: String, existing_name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveResult {
    Saved(String),
    NeedsConfirmation { existing_id: String, existing_name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingSave {
    name: String,
    snapshot: ScenarioSnapshot,
    epoch: u64,
}

impl PendingSave {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded,
    /// The session has unsaved changes that loading would drop.
    NeedsConfirmation,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitSummary {
    pub balances: Vec<(String, f64)>,
    pub monthly: Vec<(String, f64)>,
}

pub struct Planner<S, T> {
    source: S,
    store: T,
    session: AllocationSession,
    cache: ProjectionCache,
    save_pending: bool,
}

impl<S: ItemSource, T: ScenarioStore> Planner<S, T> {
    pub fn new(source: S, store: T) -> Self {
        Self {
            source,
            store,
            session: AllocationSession::new(),
            cache: ProjectionCache::new(),
            save_pending: false,
        }
    }

    pub fn session(&self) -> &AllocationSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut AllocationSession {
        &mut self.session
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    pub fn is_saving(&self) -> bool {
        self.save_pending
    }

    /// Projection inputs with the session's overrides applied.
    pub fn item_configs(&self) -> Result<Vec<StashItemConfig>> {
        let items = self.source.items()?;
        Ok(build_item_configs(&items, Some(&self.session))?)
    }

    /// Projects every item; picks a resolution from the horizon when none is given.
    pub fn project(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        resolution: Option<Resolution>,
    ) -> Result<Vec<TimelineDataPoint>> {
        let configs = self.item_configs()?;
        let resolution = resolution.unwrap_or_else(|| Resolution::for_horizon(start, end));
        let timeline = self.cache.project(
            &configs,
            self.session.timeline_events(),
            start,
            end,
            resolution,
        )?;
        Ok(timeline.to_vec())
    }

    /// Card states at `date`, or at the session's pinned cursor when `date` is `None`.
    pub fn card_states(
        &mut self,
        start: NaiveDate,
        date: Option<NaiveDate>,
    ) -> Result<Vec<ProjectedCardState>> {
        let date = date.or(self.session.cursor_date()).unwrap_or(start);
        if date < start {
            return Err(CursorError::BeforeStart { date, start }.into());
        }
        let configs = self.item_configs()?;
        let resolution = cursor_resolution(start, date)?;
        let timeline = self.project(start, date, Some(resolution))?;
        Ok(card_states_at(&configs, &timeline, date)?)
    }

    /// Funds left in the distribute pool after the pending balance
    /// allocations, or `None` when no pool was supplied.
    pub fn remaining_to_distribute(&self) -> Result<Option<f64>> {
        let Some(available) = self.session.funds().available_amount else {
            return Ok(None);
        };
        let (stashed, _) = self.pending_deltas(&self.source.items()?)?;
        Ok(Some(available - stashed))
    }

    /// Monthly budget left after the pending contribution changes, or `None`
    /// when no left-to-budget figure was supplied.
    pub fn remaining_to_budget(&self) -> Result<Option<f64>> {
        let Some(left) = self.session.funds().left_to_budget else {
            return Ok(None);
        };
        let (_, monthly) = self.pending_deltas(&self.source.items()?)?;
        Ok(Some(left - monthly))
    }

    /// Sums of (allocation - live value) for balances and monthly
    /// contributions. Every allocated item must exist.
    fn pending_deltas(&self, items: &[StashItem]) -> Result<(f64, f64)> {
        let mut stashed = 0.0;
        for (item_id, target) in self.session.stashed_allocations().iter() {
            let item = find_item(items, item_id)?;
            stashed += target - to_f64(item_id, item.balance)?;
        }
        let mut monthly = 0.0;
        for (item_id, budget) in self.session.monthly_allocations().iter() {
            let item = find_item(items, item_id)?;
            monthly += budget - to_f64(item_id, item.monthly_contribution)?;
        }
        Ok((stashed, monthly))
    }

    /// Writes the distribute allocations through the item source and clears
    /// them from the session. Everything is validated before the first
    /// write; absolute values make a retry after a failed write safe.
    pub fn commit_distribution(&mut self) -> Result<CommitSummary> {
        if self.session.mode() != Mode::Distribute {
            return Err(SessionError::WrongMode {
                operation: "commit_distribution",
                mode: self.session.mode(),
            }
            .into());
        }
        let items = self.source.items()?;
        let (stashed_delta, monthly_delta) = self.pending_deltas(&items)?;
        let funds = self.session.funds();
        if let Some(available) = funds.available_amount {
            if stashed_delta > available + 1e-9 {
                return Err(PlanError::ExceedsAvailableFunds {
                    requested: stashed_delta,
                    available,
                });
            }
        }
        if let Some(left) = funds.left_to_budget {
            if monthly_delta > left + 1e-9 {
                return Err(PlanError::ExceedsLeftToBudget {
                    requested: monthly_delta,
                    left,
                });
            }
        }

        let summary = CommitSummary {
            balances: collect_pairs(self.session.stashed_allocations()),
            monthly: collect_pairs(self.session.monthly_allocations()),
        };
        let balances = to_money(&summary.balances)?;
        let monthly = to_money(&summary.monthly)?;

        self.source
            .commit(&balances, &monthly)
            .inspect_err(|e| warn!(error = %e, "distribution commit failed"))?;
        self.session.clear_committed();
        self.cache.clear();
        info!(
            balances = summary.balances.len(),
            monthly = summary.monthly.len(),
            "distribution committed"
        );
        Ok(summary)
    }

    /// Checks the name against existing scenarios and claims the save slot.
    /// A same-named scenario other than the one this session was loaded from
    /// needs `confirm_overwrite`.
    pub fn begin_save(&mut self, name: &str, confirm_overwrite: bool) -> Result<SaveOutcome> {
        if self.session.mode() != Mode::Hypothesize {
            return Err(SessionError::WrongMode {
                operation: "save_scenario",
                mode: self.session.mode(),
            }
            .into());
        }
        if self.save_pending {
            return Err(PlanError::SaveInProgress);
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(PlanError::EmptyName);
        }
        if let Some(existing) = self.store.find_by_name(name)? {
            let is_own = self.session.loaded_scenario_id() == Some(existing.id.as_str());
            if !is_own && !confirm_overwrite {
                return Ok(SaveOutcome::NeedsConfirmation {
                    existing_id: existing.id,
                    existing_name: existing.name,
                });
            }
        }
        self.save_pending = true;
        Ok(SaveOutcome::Ready(PendingSave {
            name: name.to_string(),
            snapshot: self.session.snapshot(),
            epoch: self.session.epoch(),
        }))
    }

    /// Writes a save claimed by [`Planner::begin_save`] and releases the slot.
    /// On failure the session is left as it was so the user can retry.
    pub fn finish_save(&mut self, pending: PendingSave) -> Result<String> {
        let result = self.store.save(&pending.name, &pending.snapshot);
        self.save_pending = false;
        match result {
            Ok(id) => {
                if self.session.epoch() == pending.epoch {
                    self.session.mark_scenario_as_saved(&id, &pending.name);
                }
                info!(id = %id, name = %pending.name, "scenario saved");
                Ok(id)
            }
            Err(e) => {
                warn!(name = %pending.name, error = %e, "scenario save failed");
                Err(e.into())
            }
        }
    }

    /// Releases a claimed save slot without writing.
    pub fn abandon_save(&mut self, _pending: PendingSave) {
        self.save_pending = false;
    }

    /// `begin_save` and `finish_save` in one call.
    pub fn save_scenario(&mut self, name: &str, confirm_overwrite: bool) -> Result<SaveResult> {
        match self.begin_save(name, confirm_overwrite)? {
            SaveOutcome::Ready(pending) => Ok(SaveResult::Saved(self.finish_save(pending)?)),
            SaveOutcome::NeedsConfirmation {
                existing_id,
                existing_name,
            } => Ok(SaveResult::NeedsConfirmation {
                existing_id,
                existing_name,
            }),
        }
    }

    pub fn list_scenarios(&self) -> Result<Vec<Hypothesis>> {
        self.store
            .list()
            .inspect_err(|e| warn!(error = %e, "listing scenarios failed"))
            .map_err(Into::into)
    }

    /// Replaces the session's contents with a stored scenario. Unsaved
    /// changes are only dropped with `confirm_discard`.
    pub fn load_scenario(&mut self, id: &str, confirm_discard: bool) -> Result<LoadOutcome> {
        if self.session.mode() == Mode::Hypothesize && self.session.has_changes() && !confirm_discard
        {
            return Ok(LoadOutcome::NeedsConfirmation);
        }
        let hypothesis = self
            .store
            .load(id)
            .inspect_err(|e| warn!(id = %id, error = %e, "scenario load failed"))?;
        self.session
            .load_scenario_state(&hypothesis.id, &hypothesis.name, hypothesis.snapshot)?;
        info!(id = %hypothesis.id, name = %hypothesis.name, "scenario loaded");
        Ok(LoadOutcome::Loaded)
    }

    pub fn delete_scenario(&mut self, id: &str) -> Result<()> {
        self.store
            .delete(id)
            .inspect_err(|e| warn!(id = %id, error = %e, "scenario delete failed"))?;
        if self.session.loaded_scenario_id() == Some(id) {
            self.session.forget_loaded_scenario();
        }
        info!(id = %id, "scenario deleted");
        Ok(())
    }
}

fn find_item<'a>(items: &'a [StashItem], item_id: &str) -> Result<&'a StashItem> {
    items
        .iter()
        .find(|i| i.id == item_id)
        .ok_or_else(|| StoreError::UnknownItem(item_id.to_string()).into())
}

fn collect_pairs(map: &AllocationMap) -> Vec<(String, f64)> {
    map.iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn to_money(pairs: &[(String, f64)]) -> Result<Vec<(String, Decimal)>> {
    pairs
        .iter()
        .map(|(item_id, v)| -> Result<(String, Decimal)> {
            let amount = f64_to_money(*v).ok_or_else(|| StoreError::InvalidAmount {
                item_id: item_id.clone(),
                value: v.to_string(),
            })?;
            Ok((item_id.clone(), amount))
        })
        .collect()
}

fn to_f64(item_id: &str, d: Decimal) -> Result<f64> {
    decimal_to_f64(d).ok_or_else(|| {
        PlanError::from(StoreError::InvalidAmount {
            item_id: item_id.to_string(),
            value: d.to_string(),
        })
    })
}
