//! Rule repository: rules with their ordered conditions and actions.

use std::collections::HashMap;

use rusqlite::{params, Connection, Row};

use super::{Database, DatabaseError};
use crate::models::{Rule, RuleAction, RuleCondition};

/// Raw condition row. The kind is decoded after the query so an unknown code
/// surfaces as [`DatabaseError::InvalidCode`] instead of a SQLite error.
struct ConditionRow {
    rule_id: i64,
    id: i64,
    kind: String,
    value: String,
    metadata_key: i64,
    metadata_value: i64,
    case_insensitive: bool,
    inverted: bool,
}

impl ConditionRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            rule_id: row.get("rule_id")?,
            id: row.get("id")?,
            kind: row.get("kind")?,
            value: row.get("value")?,
            metadata_key: row.get("metadata_key")?,
            metadata_value: row.get("metadata_value")?,
            case_insensitive: row.get("case_insensitive")?,
            inverted: row.get("inverted")?,
        })
    }

    fn decode(self) -> Result<RuleCondition, DatabaseError> {
        Ok(RuleCondition {
            id: self.id,
            kind: self.kind.parse()?,
            value: self.value,
            metadata_key: self.metadata_key,
            metadata_value: self.metadata_value,
            case_insensitive: self.case_insensitive,
            inverted: self.inverted,
        })
    }
}

struct ActionRow {
    rule_id: i64,
    id: i64,
    kind: String,
    value: String,
    metadata_key: i64,
    metadata_value: i64,
}

impl ActionRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            rule_id: row.get("rule_id")?,
            id: row.get("id")?,
            kind: row.get("kind")?,
            value: row.get("value")?,
            metadata_key: row.get("metadata_key")?,
            metadata_value: row.get("metadata_value")?,
        })
    }

    fn decode(self) -> Result<RuleAction, DatabaseError> {
        Ok(RuleAction {
            id: self.id,
            kind: self.kind.parse()?,
            value: self.value,
            metadata_key: self.metadata_key,
            metadata_value: self.metadata_value,
        })
    }
}

/// Inserts a rule with its conditions and actions in one transaction.
/// The ids on `rule` and its children are ignored; the new rule id is returned.
pub fn insert(db: &Database, rule: &Rule) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO rules (user_id, name, enabled, mode) VALUES (?1, ?2, ?3, ?4)",
            params![rule.user_id, rule.name, rule.enabled, rule.mode.as_str()],
        )
        .map_err(|e| DatabaseError::from_write(e, &format!("user {}", rule.user_id)))?;
        let rule_id = tx.last_insert_rowid();

        for (position, condition) in rule.conditions.iter().enumerate() {
            tx.execute(
                "INSERT INTO rule_conditions
                 (rule_id, position, kind, value, metadata_key, metadata_value, case_insensitive, inverted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    rule_id,
                    position as i64,
                    condition.kind.as_str(),
                    condition.value,
                    condition.metadata_key,
                    condition.metadata_value,
                    condition.case_insensitive,
                    condition.inverted,
                ],
            )?;
        }

        for (position, action) in rule.actions.iter().enumerate() {
            tx.execute(
                "INSERT INTO rule_actions
                 (rule_id, position, kind, value, metadata_key, metadata_value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    rule_id,
                    position as i64,
                    action.kind.as_str(),
                    action.value,
                    action.metadata_key,
                    action.metadata_value,
                ],
            )?;
        }

        tx.commit()?;
        Ok(rule_id)
    })
}

pub fn set_enabled(db: &Database, rule_id: i64, enabled: bool) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE rules SET enabled = ?2 WHERE id = ?1",
            params![rule_id, enabled],
        )?;
        if changed == 0 {
            return Err(DatabaseError::NotFound(format!("rule {}", rule_id)));
        }
        Ok(())
    })
}

/// Loads the enabled rules of a user in creation order.
pub fn find_active(db: &Database, user_id: i64) -> Result<Vec<Rule>, DatabaseError> {
    db.with_conn(|conn| load_active(conn, user_id))
}

fn load_active(conn: &Connection, user_id: i64) -> Result<Vec<Rule>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, enabled, mode FROM rules
         WHERE user_id = ?1 AND enabled = 1 ORDER BY id",
    )?;
    let heads = stmt
        .query_map(params![user_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut conditions: HashMap<i64, Vec<RuleCondition>> = HashMap::new();
    let mut stmt = conn.prepare(
        "SELECT c.* FROM rule_conditions c JOIN rules r ON r.id = c.rule_id
         WHERE r.user_id = ?1 AND r.enabled = 1 ORDER BY c.rule_id, c.position",
    )?;
    let rows = stmt
        .query_map(params![user_id], ConditionRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    for row in rows {
        let rule_id = row.rule_id;
        conditions.entry(rule_id).or_default().push(row.decode()?);
    }

    let mut actions: HashMap<i64, Vec<RuleAction>> = HashMap::new();
    let mut stmt = conn.prepare(
        "SELECT a.* FROM rule_actions a JOIN rules r ON r.id = a.rule_id
         WHERE r.user_id = ?1 AND r.enabled = 1 ORDER BY a.rule_id, a.position",
    )?;
    let rows = stmt
        .query_map(params![user_id], ActionRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    for row in rows {
        let rule_id = row.rule_id;
        actions.entry(rule_id).or_default().push(row.decode()?);
    }

    heads
        .into_iter()
        .map(|(id, user_id, name, enabled, mode)| {
            Ok(Rule {
                id,
                user_id,
                name,
                enabled,
                mode: mode.parse()?,
                conditions: conditions.remove(&id).unwrap_or_default(),
                actions: actions.remove(&id).unwrap_or_default(),
            })
        })
        .collect()
}
