// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! In-memory allocation workspace.
//!
//! An [`AllocationSession`] is `normal` until the user enters `distribute` or
//! `hypothesize`. Mutators check the mode first and return
//! [`SessionError::WrongMode`] without touching state when called from the
//! wrong one.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::models::{EventPatch, FundsInputs, Mode, NamedEvent, new_event_id};

/// Sparse per-item values. A missing key means "unchanged"; a present zero
/// is an explicit zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllocationMap(BTreeMap<String, f64>);

impl AllocationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, item_id: &str) -> Option<f64> {
        self.0.get(item_id).copied()
    }

    /// The override if set, otherwise `live`.
    pub fn resolve(&self, item_id: &str, live: f64) -> f64 {
        self.get(item_id).unwrap_or(live)
    }

    pub fn set(&mut self, item_id: impl Into<String>, value: f64) {
        self.0.insert(item_id.into(), value);
    }

    pub fn unset(&mut self, item_id: &str) -> Option<f64> {
        self.0.remove(item_id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl FromIterator<(String, f64)> for AllocationMap {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Everything a saved scenario captures from a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSnapshot {
    pub stashed_allocations: AllocationMap,
    pub monthly_allocations: AllocationMap,
    pub timeline_events: Vec<NamedEvent>,
    pub item_apys: AllocationMap,
    pub funds: FundsInputs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedScenario {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct AllocationSession {
    mode: Mode,
    stashed_allocations: AllocationMap,
    monthly_allocations: AllocationMap,
    timeline_events: Vec<NamedEvent>,
    item_apys: AllocationMap,
    funds: FundsInputs,
    cursor_date: Option<NaiveDate>,
    loaded_scenario: Option<LoadedScenario>,
    baseline: ScenarioSnapshot,
    epoch: u64,
}

impl AllocationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn stashed_allocations(&self) -> &AllocationMap {
        &self.stashed_allocations
    }

    pub fn monthly_allocations(&self) -> &AllocationMap {
        &self.monthly_allocations
    }

    pub fn timeline_events(&self) -> &[NamedEvent] {
        &self.timeline_events
    }

    /// Events for one item in date order, ties by insertion order.
    pub fn events_for(&self, item_id: &str) -> Vec<&NamedEvent> {
        let mut events: Vec<&NamedEvent> = self
            .timeline_events
            .iter()
            .filter(|e| e.item_id == item_id)
            .collect();
        events.sort_by_key(|e| e.date);
        events
    }

    pub fn item_apys(&self) -> &AllocationMap {
        &self.item_apys
    }

    pub fn funds(&self) -> FundsInputs {
        self.funds
    }

    pub fn cursor_date(&self) -> Option<NaiveDate> {
        self.cursor_date
    }

    pub fn loaded_scenario(&self) -> Option<&LoadedScenario> {
        self.loaded_scenario.as_ref()
    }

    pub fn loaded_scenario_id(&self) -> Option<&str> {
        self.loaded_scenario.as_ref().map(|s| s.id.as_str())
    }

    /// Bumped every time the session is reset; lets callers drop results of
    /// work started against an earlier session.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn snapshot(&self) -> ScenarioSnapshot {
        ScenarioSnapshot {
            stashed_allocations: self.stashed_allocations.clone(),
            monthly_allocations: self.monthly_allocations.clone(),
            timeline_events: self.timeline_events.clone(),
            item_apys: self.item_apys.clone(),
            funds: self.funds,
        }
    }

    pub fn has_changes(&self) -> bool {
        self.mode != Mode::Normal && self.snapshot() != self.baseline
    }

    pub fn enter_distribute(&mut self) -> Result<(), SessionError> {
        self.require("enter_distribute", &[Mode::Normal])?;
        self.reset(Mode::Distribute);
        Ok(())
    }

    pub fn enter_hypothesize(&mut self) -> Result<(), SessionError> {
        self.require("enter_hypothesize", &[Mode::Normal])?;
        self.reset(Mode::Hypothesize);
        Ok(())
    }

    pub fn set_stashed_allocation(
        &mut self,
        item_id: &str,
        absolute_balance: f64,
    ) -> Result<(), SessionError> {
        self.require_active("set_stashed_allocation")?;
        self.stashed_allocations.set(item_id, absolute_balance);
        Ok(())
    }

    pub fn clear_stashed_allocation(&mut self, item_id: &str) -> Result<(), SessionError> {
        self.require_active("clear_stashed_allocation")?;
        self.stashed_allocations.unset(item_id);
        Ok(())
    }

    pub fn set_monthly_allocation(
        &mut self,
        item_id: &str,
        absolute_budget: f64,
    ) -> Result<(), SessionError> {
        self.require_active("set_monthly_allocation")?;
        self.monthly_allocations.set(item_id, absolute_budget);
        Ok(())
    }

    pub fn clear_monthly_allocation(&mut self, item_id: &str) -> Result<(), SessionError> {
        self.require_active("clear_monthly_allocation")?;
        self.monthly_allocations.unset(item_id);
        Ok(())
    }

    pub fn set_funds_inputs(&mut self, funds: FundsInputs) -> Result<(), SessionError> {
        self.require_active("set_funds_inputs")?;
        self.funds = funds;
        Ok(())
    }

    /// Adds an event, generating an id if it has none, and returns the id.
    pub fn add_timeline_event(&mut self, mut event: NamedEvent) -> Result<String, SessionError> {
        self.require("add_timeline_event", &[Mode::Hypothesize])?;
        if event.id.trim().is_empty() {
            event.id = new_event_id();
        }
        let id = event.id.clone();
        self.timeline_events.push(event);
        Ok(id)
    }

    pub fn update_timeline_event(&mut self, id: &str, patch: EventPatch) -> Result<(), SessionError> {
        self.require("update_timeline_event", &[Mode::Hypothesize])?;
        let event = self
            .timeline_events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| SessionError::UnknownEvent(id.to_string()))?;
        if let Some(item_id) = patch.item_id {
            event.item_id = item_id;
        }
        if let Some(kind) = patch.kind {
            event.kind = kind;
        }
        if let Some(date) = patch.date {
            event.date = date;
        }
        if let Some(amount) = patch.amount {
            event.amount = amount;
        }
        if let Some(name) = patch.name {
            event.name = name;
        }
        Ok(())
    }

    pub fn delete_timeline_event(&mut self, id: &str) -> Result<NamedEvent, SessionError> {
        self.require("delete_timeline_event", &[Mode::Hypothesize])?;
        let idx = self
            .timeline_events
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| SessionError::UnknownEvent(id.to_string()))?;
        Ok(self.timeline_events.remove(idx))
    }

    pub fn set_item_apy(&mut self, item_id: &str, apy: f64) -> Result<(), SessionError> {
        self.require("set_item_apy", &[Mode::Hypothesize])?;
        self.item_apys.set(item_id, apy);
        Ok(())
    }

    pub fn clear_item_apy(&mut self, item_id: &str) -> Result<(), SessionError> {
        self.require("clear_item_apy", &[Mode::Hypothesize])?;
        self.item_apys.unset(item_id);
        Ok(())
    }

    pub fn set_cursor_date(&mut self, date: Option<NaiveDate>) -> Result<(), SessionError> {
        self.require("set_cursor_date", &[Mode::Hypothesize])?;
        self.cursor_date = date;
        Ok(())
    }

    /// Returns to `normal`. Leaving `distribute` without discarding requires
    /// every allocation to have been committed already.
    pub fn exit_mode(&mut self, discard: bool) -> Result<(), SessionError> {
        self.require_active("exit_mode")?;
        if self.mode == Mode::Distribute && !discard {
            let pending = self.stashed_allocations.len() + self.monthly_allocations.len();
            if pending > 0 {
                return Err(SessionError::UncommittedAllocations(pending));
            }
        }
        self.reset(Mode::Normal);
        Ok(())
    }

    pub fn load_scenario_state(
        &mut self,
        id: &str,
        name: &str,
        snapshot: ScenarioSnapshot,
    ) -> Result<(), SessionError> {
        self.require("load_scenario_state", &[Mode::Hypothesize])?;
        self.stashed_allocations = snapshot.stashed_allocations;
        self.monthly_allocations = snapshot.monthly_allocations;
        self.timeline_events = snapshot.timeline_events;
        self.item_apys = snapshot.item_apys;
        self.funds = snapshot.funds;
        self.cursor_date = None;
        self.loaded_scenario = Some(LoadedScenario {
            id: id.to_string(),
            name: name.to_string(),
        });
        self.baseline = self.snapshot();
        Ok(())
    }

    pub fn mark_scenario_as_saved(&mut self, id: &str, name: &str) {
        self.loaded_scenario = Some(LoadedScenario {
            id: id.to_string(),
            name: name.to_string(),
        });
        self.baseline = self.snapshot();
    }

    pub fn forget_loaded_scenario(&mut self) {
        self.loaded_scenario = None;
    }

    /// Drops committed distribute allocations while staying in the mode.
    pub(crate) fn clear_committed(&mut self) {
        self.stashed_allocations.clear();
        self.monthly_allocations.clear();
        self.baseline = self.snapshot();
    }

    fn reset(&mut self, mode: Mode) {
        *self = Self {
            mode,
            epoch: self.epoch + 1,
            ..Self::default()
        };
    }

    fn require(&self, operation: &'static str, allowed: &[Mode]) -> Result<(), SessionError> {
        if allowed.contains(&self.mode) {
            Ok(())
        } else {
            Err(SessionError::WrongMode {
                operation,
                mode: self.mode,
            })
        }
    }

    fn require_active(&self, operation: &'static str) -> Result<(), SessionError> {
        self.require(operation, &[Mode::Distribute, Mode::Hypothesize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventKind;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn deposit(item: &str, amount: f64) -> NamedEvent {
        NamedEvent::new(item, EventKind::Deposit, d(2027, 1, 1), amount, "Bonus")
    }

    #[test]
    fn new_session_is_normal_and_clean() {
        let s = AllocationSession::new();
        assert_eq!(s.mode(), Mode::Normal);
        assert!(!s.has_changes());
        assert!(s.loaded_scenario_id().is_none());
    }

    #[test]
    fn enter_only_from_normal() {
        let mut s = AllocationSession::new();
        s.enter_hypothesize().unwrap();
        assert_eq!(
            s.enter_distribute(),
            Err(SessionError::WrongMode {
                operation: "enter_distribute",
                mode: Mode::Hypothesize
            })
        );
        assert_eq!(s.mode(), Mode::Hypothesize);
    }

    #[test]
    fn allocation_mutators_fail_in_normal_mode() {
        let mut s = AllocationSession::new();
        assert!(matches!(
            s.set_stashed_allocation("car", 10.0),
            Err(SessionError::WrongMode { .. })
        ));
        assert!(matches!(
            s.set_monthly_allocation("car", 10.0),
            Err(SessionError::WrongMode { .. })
        ));
        assert!(s.stashed_allocations().is_empty());
    }

    #[test]
    fn hypothesize_only_mutators_fail_in_distribute() {
        let mut s = AllocationSession::new();
        s.enter_distribute().unwrap();
        assert!(s.add_timeline_event(deposit("car", 1.0)).is_err());
        assert!(s.set_item_apy("car", 0.05).is_err());
        assert!(s.set_cursor_date(Some(d(2027, 1, 1))).is_err());
        assert!(s.timeline_events().is_empty());
        s.set_stashed_allocation("car", 900.0).unwrap();
        assert_eq!(s.stashed_allocations().get("car"), Some(900.0));
    }

    #[test]
    fn allocations_are_absolute_and_idempotent() {
        let mut s = AllocationSession::new();
        s.enter_hypothesize().unwrap();
        s.set_stashed_allocation("car", 500.0).unwrap();
        s.set_stashed_allocation("car", 500.0).unwrap();
        s.set_monthly_allocation("car", 0.0).unwrap();
        assert_eq!(s.stashed_allocations().get("car"), Some(500.0));
        assert_eq!(s.monthly_allocations().get("car"), Some(0.0));
        assert_eq!(s.monthly_allocations().get("boat"), None);
        assert_eq!(s.monthly_allocations().resolve("boat", 40.0), 40.0);
        assert_eq!(s.monthly_allocations().resolve("car", 40.0), 0.0);
        assert!(s.has_changes());
        s.clear_stashed_allocation("car").unwrap();
        s.clear_monthly_allocation("car").unwrap();
        assert!(!s.has_changes());
    }

    #[test]
    fn events_can_be_updated_and_deleted() {
        let mut s = AllocationSession::new();
        s.enter_hypothesize().unwrap();
        let id = s.add_timeline_event(deposit("car", 100.0)).unwrap();
        s.update_timeline_event(
            &id,
            EventPatch {
                amount: Some(250.0),
                name: Some("Tax refund".into()),
                ..EventPatch::default()
            },
        )
        .unwrap();
        let event = &s.timeline_events()[0];
        assert_eq!(event.amount, 250.0);
        assert_eq!(event.name, "Tax refund");
        assert_eq!(event.kind, EventKind::Deposit);

        assert_eq!(
            s.update_timeline_event("missing", EventPatch::default()),
            Err(SessionError::UnknownEvent("missing".into()))
        );
        s.delete_timeline_event(&id).unwrap();
        assert!(s.timeline_events().is_empty());
    }

    #[test]
    fn blank_event_ids_are_generated() {
        let mut s = AllocationSession::new();
        s.enter_hypothesize().unwrap();
        let mut event = deposit("car", 1.0);
        event.id = String::new();
        let id = s.add_timeline_event(event).unwrap();
        assert!(!id.is_empty());
        assert_eq!(s.timeline_events()[0].id, id);
    }

    #[test]
    fn events_for_item_are_date_ordered() {
        let mut s = AllocationSession::new();
        s.enter_hypothesize().unwrap();
        let mut late = deposit("car", 1.0);
        late.date = d(2028, 1, 1);
        s.add_timeline_event(late).unwrap();
        s.add_timeline_event(deposit("car", 2.0)).unwrap();
        s.add_timeline_event(deposit("car", 3.0)).unwrap();
        s.add_timeline_event(deposit("boat", 4.0)).unwrap();
        let amounts: Vec<f64> = s.events_for("car").iter().map(|e| e.amount).collect();
        assert_eq!(amounts, vec![2.0, 3.0, 1.0]);
    }

    #[test]
    fn discard_clears_everything() {
        let mut s = AllocationSession::new();
        s.enter_hypothesize().unwrap();
        s.set_stashed_allocation("car", 1.0).unwrap();
        s.add_timeline_event(deposit("car", 1.0)).unwrap();
        s.set_item_apy("car", 0.04).unwrap();
        s.set_cursor_date(Some(d(2027, 1, 1))).unwrap();
        let epoch = s.epoch();
        s.exit_mode(true).unwrap();
        assert_eq!(s.mode(), Mode::Normal);
        assert!(s.stashed_allocations().is_empty());
        assert!(s.timeline_events().is_empty());
        assert!(s.item_apys().is_empty());
        assert!(s.cursor_date().is_none());
        assert!(s.epoch() > epoch);
    }

    #[test]
    fn leaving_hypothesize_without_discard_still_clears() {
        let mut s = AllocationSession::new();
        s.enter_hypothesize().unwrap();
        s.set_item_apy("car", 0.04).unwrap();
        s.exit_mode(false).unwrap();
        assert!(s.item_apys().is_empty());
    }

    #[test]
    fn distribute_exit_requires_commit_unless_discarding() {
        let mut s = AllocationSession::new();
        s.enter_distribute().unwrap();
        s.set_stashed_allocation("car", 1.0).unwrap();
        assert_eq!(
            s.exit_mode(false),
            Err(SessionError::UncommittedAllocations(1))
        );
        assert_eq!(s.mode(), Mode::Distribute);
        s.exit_mode(true).unwrap();
        assert_eq!(s.mode(), Mode::Normal);
        assert!(s.exit_mode(true).is_err());
    }

    #[test]
    fn loading_a_scenario_replaces_state_and_resets_changes() {
        let mut s = AllocationSession::new();
        s.enter_hypothesize().unwrap();
        s.set_item_apy("old", 0.01).unwrap();

        let mut snapshot = ScenarioSnapshot::default();
        snapshot.stashed_allocations.set("car", 2000.0);
        snapshot.timeline_events.push(deposit("car", 300.0));
        s.load_scenario_state("sc-1", "Plan A", snapshot.clone()).unwrap();

        assert_eq!(s.snapshot(), snapshot);
        assert_eq!(s.loaded_scenario_id(), Some("sc-1"));
        assert!(!s.has_changes());
        s.set_item_apy("car", 0.05).unwrap();
        assert!(s.has_changes());
        s.mark_scenario_as_saved("sc-1", "Plan A");
        assert!(!s.has_changes());
    }

    #[test]
    fn cursor_date_is_not_a_change() {
        let mut s = AllocationSession::new();
        s.enter_hypothesize().unwrap();
        s.set_cursor_date(Some(d(2030, 1, 1))).unwrap();
        assert!(!s.has_changes());
        s.set_cursor_date(None).unwrap();
        assert!(s.cursor_date().is_none());
    }
}
