// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;

use crate::error::StoreError;
use crate::models::{StashItem, StashItemConfig};
use crate::session::AllocationSession;
use crate::utils::decimal_to_f64;

/// Live savings goals and the commit operations that move real money.
pub trait ItemSource {
    fn items(&self) -> Result<Vec<StashItem>, StoreError>;

    fn allocate(&mut self, item_id: &str, new_balance: Decimal) -> Result<(), StoreError>;

    fn set_monthly_contribution(&mut self, item_id: &str, amount: Decimal)
    -> Result<(), StoreError>;

    /// Writes a whole distribution. Sources that can roll back should make
    /// this all-or-nothing.
    fn commit(
        &mut self,
        balances: &[(String, Decimal)],
        monthly: &[(String, Decimal)],
    ) -> Result<(), StoreError> {
        for (item_id, amount) in balances {
            self.allocate(item_id, *amount)?;
        }
        for (item_id, amount) in monthly {
            self.set_monthly_contribution(item_id, *amount)?;
        }
        Ok(())
    }
}

/// Builds projection inputs from live items, layering any session overrides
/// (stashed balance, monthly contribution, APY) on top.
pub fn build_item_configs(
    items: &[StashItem],
    session: Option<&AllocationSession>,
) -> Result<Vec<StashItemConfig>, StoreError> {
    items
        .iter()
        .map(|item| {
            let balance = to_f64(&item.id, item.balance)?;
            let monthly = to_f64(&item.id, item.monthly_contribution)?;
            let apy = to_f64(&item.id, item.apy)?;
            let target_amount = item
                .target_amount
                .map(|t| to_f64(&item.id, t))
                .transpose()?;
            let (balance, monthly, apy) = match session {
                Some(s) => (
                    s.stashed_allocations().resolve(&item.id, balance),
                    s.monthly_allocations().resolve(&item.id, monthly),
                    s.item_apys().resolve(&item.id, apy),
                ),
                None => (balance, monthly, apy),
            };
            Ok(StashItemConfig {
                item_id: item.id.clone(),
                name: item.name.clone(),
                target_amount,
                starting_balance: balance,
                monthly_contribution: monthly,
                apy,
                color: item.color.clone(),
            })
        })
        .collect()
}

fn to_f64(item_id: &str, d: Decimal) -> Result<f64, StoreError> {
    decimal_to_f64(d).ok_or_else(|| StoreError::InvalidAmount {
        item_id: item_id.to_string(),
        value: d.to_string(),
    })
}

/// Items kept in the local `stash_items` table.
pub struct SqliteItemSource<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteItemSource<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn upsert(&self, item: &StashItem) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO stash_items(id, name, balance, target_amount, monthly_contribution, apy, target_date, color)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8)
             ON CONFLICT(id) DO UPDATE SET
                name=excluded.name,
                balance=excluded.balance,
                target_amount=excluded.target_amount,
                monthly_contribution=excluded.monthly_contribution,
                apy=excluded.apy,
                target_date=excluded.target_date,
                color=excluded.color",
            params![
                item.id,
                item.name,
                item.balance.to_string(),
                item.target_amount.map(|t| t.to_string()),
                item.monthly_contribution.to_string(),
                item.apy.to_string(),
                item.target_date.map(|d| d.to_string()),
                item.color,
            ],
        )?;
        Ok(())
    }

    pub fn remove(&self, item_id: &str) -> Result<(), StoreError> {
        let n = self
            .conn
            .execute("DELETE FROM stash_items WHERE id=?1", params![item_id])?;
        if n == 0 {
            return Err(StoreError::UnknownItem(item_id.to_string()));
        }
        Ok(())
    }

    fn update_column(&self, column: &str, item_id: &str, value: Decimal) -> Result<(), StoreError> {
        let sql = format!("UPDATE stash_items SET {}=?1 WHERE id=?2", column);
        let n = self
            .conn
            .execute(&sql, params![value.to_string(), item_id])?;
        if n == 0 {
            return Err(StoreError::UnknownItem(item_id.to_string()));
        }
        Ok(())
    }
}

impl ItemSource for SqliteItemSource<'_> {
    fn items(&self) -> Result<Vec<StashItem>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, balance, target_amount, monthly_contribution, apy, target_date, color
             FROM stash_items ORDER BY name, id",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, Option<String>>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, String>(5)?,
                r.get::<_, Option<String>>(6)?,
                r.get::<_, Option<String>>(7)?,
            ))
        })?;
        let mut items = Vec::new();
        for row in rows {
            let (id, name, balance, target, monthly, apy, target_date, color) = row?;
            let target_date = match target_date {
                Some(s) => Some(NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|_| {
                    StoreError::InvalidAmount {
                        item_id: id.clone(),
                        value: s.clone(),
                    }
                })?),
                None => None,
            };
            items.push(StashItem {
                balance: parse_stored(&id, &balance)?,
                target_amount: target.map(|t| parse_stored(&id, &t)).transpose()?,
                monthly_contribution: parse_stored(&id, &monthly)?,
                apy: parse_stored(&id, &apy)?,
                target_date,
                color,
                name,
                id,
            });
        }
        Ok(items)
    }

    fn allocate(&mut self, item_id: &str, new_balance: Decimal) -> Result<(), StoreError> {
        self.update_column("balance", item_id, new_balance)
    }

    fn set_monthly_contribution(
        &mut self,
        item_id: &str,
        amount: Decimal,
    ) -> Result<(), StoreError> {
        self.update_column("monthly_contribution", item_id, amount)
    }

    fn commit(
        &mut self,
        balances: &[(String, Decimal)],
        monthly: &[(String, Decimal)],
    ) -> Result<(), StoreError> {
        let conn = self.conn;
        let tx = conn.unchecked_transaction()?;
        for (item_id, amount) in balances {
            self.update_column("balance", item_id, *amount)?;
        }
        for (item_id, amount) in monthly {
            self.update_column("monthly_contribution", item_id, *amount)?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn parse_stored(item_id: &str, s: &str) -> Result<Decimal, StoreError> {
    s.parse::<Decimal>().map_err(|_| StoreError::InvalidAmount {
        item_id: item_id.to_string(),
        value: s.to_string(),
    })
}

/// Item source held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryItemSource {
    items: Vec<StashItem>,
}

impl MemoryItemSource {
    pub fn new(items: Vec<StashItem>) -> Self {
        Self { items }
    }

    fn find_mut(&mut self, item_id: &str) -> Result<&mut StashItem, StoreError> {
        self.items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| StoreError::UnknownItem(item_id.to_string()))
    }
}

impl ItemSource for MemoryItemSource {
    fn items(&self) -> Result<Vec<StashItem>, StoreError> {
        Ok(self.items.clone())
    }

    fn allocate(&mut self, item_id: &str, new_balance: Decimal) -> Result<(), StoreError> {
        self.find_mut(item_id)?.balance = new_balance;
        Ok(())
    }

    fn set_monthly_contribution(
        &mut self,
        item_id: &str,
        amount: Decimal,
    ) -> Result<(), StoreError> {
        self.find_mut(item_id)?.monthly_contribution = amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> StashItem {
        StashItem {
            id: id.to_string(),
            name: id.to_uppercase(),
            balance: Decimal::new(100050, 2),
            target_amount: Some(Decimal::new(5000, 0)),
            monthly_contribution: Decimal::new(100, 0),
            apy: Decimal::new(2, 2),
            target_date: None,
            color: Some("#2f855a".into()),
        }
    }

    #[test]
    fn builds_configs_from_live_items() {
        let configs = build_item_configs(&[item("ef")], None).unwrap();
        let c = &configs[0];
        assert_eq!(c.item_id, "ef");
        assert_eq!(c.name, "EF");
        assert_eq!(c.starting_balance, 1000.5);
        assert_eq!(c.monthly_contribution, 100.0);
        assert_eq!(c.apy, 0.02);
        assert_eq!(c.target_amount, Some(5000.0));
        assert_eq!(c.color.as_deref(), Some("#2f855a"));
    }

    #[test]
    fn session_overrides_replace_only_set_fields() {
        let mut session = AllocationSession::new();
        session.enter_hypothesize().unwrap();
        session.set_stashed_allocation("ef", 0.0).unwrap();
        session.set_item_apy("ef", 0.05).unwrap();
        let configs = build_item_configs(&[item("ef"), item("car")], Some(&session)).unwrap();
        assert_eq!(configs[0].starting_balance, 0.0);
        assert_eq!(configs[0].apy, 0.05);
        assert_eq!(configs[0].monthly_contribution, 100.0);
        assert_eq!(configs[1].starting_balance, 1000.5);
        assert_eq!(configs[1].apy, 0.02);
    }

    #[test]
    fn memory_source_allocates_absolute_balances() {
        let mut source = MemoryItemSource::new(vec![item("ef")]);
        source.allocate("ef", Decimal::new(250, 0)).unwrap();
        source.allocate("ef", Decimal::new(250, 0)).unwrap();
        assert_eq!(source.items().unwrap()[0].balance, Decimal::new(250, 0));
        assert!(matches!(
            source.allocate("nope", Decimal::ONE),
            Err(StoreError::UnknownItem(_))
        ));
    }

    #[test]
    fn sqlite_commit_rolls_back_on_unknown_item() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        let mut source = SqliteItemSource::new(&conn);
        source.upsert(&item("ef")).unwrap();

        let balances = vec![
            ("ef".to_string(), Decimal::new(1300, 0)),
            ("zz_typo".to_string(), Decimal::new(50, 0)),
        ];
        assert!(matches!(
            source.commit(&balances, &[]),
            Err(StoreError::UnknownItem(id)) if id == "zz_typo"
        ));
        assert_eq!(source.items().unwrap()[0].balance, Decimal::new(100050, 2));

        source
            .commit(&balances[..1], &[("ef".to_string(), Decimal::new(40, 0))])
            .unwrap();
        let ef = &source.items().unwrap()[0];
        assert_eq!(ef.balance, Decimal::new(1300, 0));
        assert_eq!(ef.monthly_contribution, Decimal::new(40, 0));
    }
}
