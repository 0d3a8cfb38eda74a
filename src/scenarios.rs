// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Named scenario ("hypothesis") persistence.
//!
//! Sessions keep their events as one flat list. On disk the events are
//! grouped by item id; [`group_events`] and [`ungroup_events`] convert
//! between the two, and ungrouping gives a fresh id to any event stored
//! without one.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{EventKind, FundsInputs, NamedEvent, new_event_id};
use crate::session::{AllocationMap, ScenarioSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub id: String,
    pub name: String,
    pub updated_at: DateTime<Utc>,
    pub snapshot: ScenarioSnapshot,
}

pub trait ScenarioStore {
    /// Saves under `name`, replacing a scenario whose name matches ignoring
    /// case (its id is kept). Returns the scenario id.
    fn save(&mut self, name: &str, snapshot: &ScenarioSnapshot) -> Result<String, StoreError>;

    /// All scenarios, most recently updated first.
    fn list(&self) -> Result<Vec<Hypothesis>, StoreError>;

    fn load(&self, id: &str) -> Result<Hypothesis, StoreError>;

    fn delete(&mut self, id: &str) -> Result<(), StoreError>;

    fn find_by_name(&self, name: &str) -> Result<Option<Hypothesis>, StoreError> {
        let wanted = name.trim().to_lowercase();
        Ok(self
            .list()?
            .into_iter()
            .find(|h| h.name.trim().to_lowercase() == wanted))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub date: NaiveDate,
    pub amount: f64,
    #[serde(default)]
    pub name: String,
}

/// Persisted shape of a [`ScenarioSnapshot`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredSnapshot {
    #[serde(default)]
    pub stashed_allocations: AllocationMap,
    #[serde(default)]
    pub monthly_allocations: AllocationMap,
    #[serde(default)]
    pub timeline_events: BTreeMap<String, Vec<StoredEvent>>,
    #[serde(default)]
    pub item_apys: AllocationMap,
    #[serde(default)]
    pub funds: FundsInputs,
}

pub fn group_events(events: &[NamedEvent]) -> BTreeMap<String, Vec<StoredEvent>> {
    let mut grouped: BTreeMap<String, Vec<StoredEvent>> = BTreeMap::new();
    for event in events {
        grouped
            .entry(event.item_id.clone())
            .or_default()
            .push(StoredEvent {
                id: Some(event.id.clone()),
                kind: event.kind,
                date: event.date,
                amount: event.amount,
                name: event.name.clone(),
            });
    }
    grouped
}

pub fn ungroup_events(grouped: BTreeMap<String, Vec<StoredEvent>>) -> Vec<NamedEvent> {
    let mut events = Vec::new();
    for (item_id, stored) in grouped {
        for e in stored {
            let id = match e.id {
                Some(id) if !id.trim().is_empty() => id,
                _ => {
                    let id = new_event_id();
                    debug!(item_id = %item_id, id = %id, "assigned id to stored event");
                    id
                }
            };
            events.push(NamedEvent {
                id,
                item_id: item_id.clone(),
                kind: e.kind,
                date: e.date,
                amount: e.amount,
                name: e.name,
            });
        }
    }
    events.sort_by_key(|e| e.date);
    events
}

impl From<&ScenarioSnapshot> for StoredSnapshot {
    fn from(s: &ScenarioSnapshot) -> Self {
        Self {
            stashed_allocations: s.stashed_allocations.clone(),
            monthly_allocations: s.monthly_allocations.clone(),
            timeline_events: group_events(&s.timeline_events),
            item_apys: s.item_apys.clone(),
            funds: s.funds,
        }
    }
}

impl From<StoredSnapshot> for ScenarioSnapshot {
    fn from(s: StoredSnapshot) -> Self {
        Self {
            stashed_allocations: s.stashed_allocations,
            monthly_allocations: s.monthly_allocations,
            timeline_events: ungroup_events(s.timeline_events),
            item_apys: s.item_apys,
            funds: s.funds,
        }
    }
}

pub fn encode_snapshot(snapshot: &ScenarioSnapshot) -> Result<String, StoreError> {
    Ok(serde_json::to_string(&StoredSnapshot::from(snapshot))?)
}

pub fn decode_snapshot(payload: &str) -> Result<ScenarioSnapshot, StoreError> {
    let stored: StoredSnapshot = serde_json::from_str(payload)?;
    Ok(stored.into())
}

fn new_scenario_id() -> String {
    Uuid::new_v4().to_string()
}

/// Scenarios kept in the `hypotheses` table, one JSON payload per row.
pub struct SqliteScenarioStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteScenarioStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_hypothesis(
        id: String,
        name: String,
        updated_at: String,
        payload: String,
    ) -> Result<Hypothesis, StoreError> {
        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{}': {}", updated_at, e)))?
            .with_timezone(&Utc);
        Ok(Hypothesis {
            id,
            name,
            updated_at,
            snapshot: decode_snapshot(&payload)?,
        })
    }
}

impl ScenarioStore for SqliteScenarioStore<'_> {
    fn save(&mut self, name: &str, snapshot: &ScenarioSnapshot) -> Result<String, StoreError> {
        let name = name.trim();
        let payload = encode_snapshot(snapshot)?;
        let now = Utc::now().to_rfc3339();
        let existing: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM hypotheses WHERE name=?1 COLLATE NOCASE",
                params![name],
                |r| r.get(0),
            )
            .optional()?;
        let id = match existing {
            Some(id) => {
                self.conn.execute(
                    "UPDATE hypotheses SET name=?1, updated_at=?2, payload=?3 WHERE id=?4",
                    params![name, now, payload, id],
                )?;
                id
            }
            None => {
                let id = new_scenario_id();
                self.conn.execute(
                    "INSERT INTO hypotheses(id, name, updated_at, payload) VALUES (?1,?2,?3,?4)",
                    params![id, name, now, payload],
                )?;
                id
            }
        };
        Ok(id)
    }

    fn list(&self) -> Result<Vec<Hypothesis>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, updated_at, payload FROM hypotheses ORDER BY updated_at DESC, name",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, name, updated_at, payload) = row?;
            out.push(Self::row_to_hypothesis(id, name, updated_at, payload)?);
        }
        Ok(out)
    }

    fn load(&self, id: &str) -> Result<Hypothesis, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, updated_at, payload FROM hypotheses WHERE id=?1",
                params![id],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        let (id_, name, updated_at, payload) =
            row.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Self::row_to_hypothesis(id_, name, updated_at, payload)
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        let n = self
            .conn
            .execute("DELETE FROM hypotheses WHERE id=?1", params![id])?;
        if n == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Hypothesis>, StoreError> {
        let id: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM hypotheses WHERE name=?1 COLLATE NOCASE",
                params![name.trim()],
                |r| r.get(0),
            )
            .optional()?;
        id.map(|id| self.load(&id)).transpose()
    }
}

/// Scenario store held in memory. Payloads still go through the stored
/// (grouped) form so round trips behave like the SQLite store.
#[derive(Debug, Default)]
pub struct MemoryScenarioStore {
    records: Vec<(String, String, DateTime<Utc>, String)>,
}

impl MemoryScenarioStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScenarioStore for MemoryScenarioStore {
    fn save(&mut self, name: &str, snapshot: &ScenarioSnapshot) -> Result<String, StoreError> {
        let name = name.trim().to_string();
        let payload = encode_snapshot(snapshot)?;
        let wanted = name.to_lowercase();
        let now = Utc::now();
        if let Some(rec) = self.records.iter_mut().find(|r| r.1.to_lowercase() == wanted) {
            rec.1 = name;
            rec.2 = now;
            rec.3 = payload;
            return Ok(rec.0.clone());
        }
        let id = new_scenario_id();
        self.records.push((id.clone(), name, now, payload));
        Ok(id)
    }

    fn list(&self) -> Result<Vec<Hypothesis>, StoreError> {
        let mut out = self
            .records
            .iter()
            .map(|(id, name, at, payload)| {
                Ok(Hypothesis {
                    id: id.clone(),
                    name: name.clone(),
                    updated_at: *at,
                    snapshot: decode_snapshot(payload)?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(out)
    }

    fn load(&self, id: &str) -> Result<Hypothesis, StoreError> {
        self.list()?
            .into_iter()
            .find(|h| h.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        let before = self.records.len();
        self.records.retain(|r| r.0 != id);
        if self.records.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn events_group_by_item_and_ungroup_in_date_order() {
        let events = vec![
            NamedEvent::new("car", EventKind::Deposit, d(2027, 5, 1), 100.0, "a"),
            NamedEvent::new("ef", EventKind::RateChange, d(2027, 1, 1), 50.0, "b"),
            NamedEvent::new("car", EventKind::Deposit, d(2027, 2, 1), 200.0, "c"),
        ];
        let grouped = group_events(&events);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["car"].len(), 2);
        assert_eq!(grouped["car"][0].amount, 100.0);

        let back = ungroup_events(grouped);
        let names: Vec<&str> = back.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
        for e in &events {
            assert!(back.contains(e));
        }
    }

    #[test]
    fn missing_ids_are_repaired_on_load() {
        let payload = r#"{
            "stashed_allocations": {"car": 1500.0},
            "timeline_events": {
                "car": [
                    {"type": "deposit", "date": "2027-03-01", "amount": 250.0, "name": "Bonus"},
                    {"id": "", "type": "rate_change", "date": "2027-04-01", "amount": 80.0}
                ]
            }
        }"#;
        let snapshot = decode_snapshot(payload).unwrap();
        assert_eq!(snapshot.stashed_allocations.get("car"), Some(1500.0));
        assert!(snapshot.monthly_allocations.is_empty());
        assert_eq!(snapshot.timeline_events.len(), 2);
        assert!(snapshot.timeline_events.iter().all(|e| !e.id.is_empty()));
        assert_ne!(snapshot.timeline_events[0].id, snapshot.timeline_events[1].id);
        assert_eq!(snapshot.timeline_events[1].kind, EventKind::RateChange);
        assert_eq!(snapshot.timeline_events[1].name, "");
    }

    #[test]
    fn memory_store_overwrites_case_insensitively() {
        let mut store = MemoryScenarioStore::new();
        let first = store.save("Plan A", &ScenarioSnapshot::default()).unwrap();
        let mut snapshot = ScenarioSnapshot::default();
        snapshot.item_apys.set("ef", 0.05);
        let second = store.save("plan a", &snapshot).unwrap();
        assert_eq!(first, second);
        let all = store.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "plan a");
        assert_eq!(all[0].snapshot.item_apys.get("ef"), Some(0.05));
        assert!(store.find_by_name("PLAN A").unwrap().is_some());
        store.delete(&first).unwrap();
        assert!(matches!(store.load(&first), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete(&first), Err(StoreError::NotFound(_))));
    }
}
