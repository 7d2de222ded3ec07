//! SQLite-backed history store.
//!
//! One row per user in `user_history`, episodes in `history_episodes`
//! ordered by `seq`. A save replaces the user's episodes inside a single
//! transaction so readers never observe a partial record.

use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{open_database, open_memory_database, DatabaseError};
use crate::models::enums::{Gender, RiskLevel};
use crate::models::{Episode, UserMedicalHistory};
use crate::triage::store::HistoryStore;
use crate::triage::types::HistoryError;

// ═══════════════════════════════════════════════════════════
// Row helpers
// ═══════════════════════════════════════════════════════════

fn encode_set(set: &BTreeSet<String>) -> Result<String, DatabaseError> {
    serde_json::to_string(set).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

fn decode_set(column: &str, raw: &str) -> Result<BTreeSet<String>, DatabaseError> {
    serde_json::from_str(raw)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("{column}: {e}")))
}

pub fn get_user_history(
    conn: &Connection,
    user_id: &str,
) -> Result<Option<UserMedicalHistory>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT age, gender, chronic_conditions, allergies, current_medications, family_history, last_consultation
             FROM user_history WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<DateTime<Utc>>>(6)?,
                ))
            },
        )
        .optional()?;

    let Some((age, gender, chronic, allergies, medications, family, last_consultation)) = row else {
        return Ok(None);
    };

    Ok(Some(UserMedicalHistory {
        user_id: user_id.to_string(),
        age: u32::try_from(age)
            .map_err(|_| DatabaseError::ConstraintViolation(format!("age out of range: {age}")))?,
        gender: Gender::from_str(&gender)?,
        chronic_conditions: decode_set("chronic_conditions", &chronic)?,
        allergies: decode_set("allergies", &allergies)?,
        current_medications: decode_set("current_medications", &medications)?,
        family_history: decode_set("family_history", &family)?,
        previous_episodes: get_episodes(conn, user_id)?,
        last_consultation,
    }))
}

fn get_episodes(conn: &Connection, user_id: &str) -> Result<Vec<Episode>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT recorded_at, symptoms, score, level
         FROM history_episodes WHERE user_id = ?1 ORDER BY seq",
    )?;

    let rows = stmt.query_map(params![user_id], |row| {
        Ok((
            row.get::<_, DateTime<Utc>>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut episodes = Vec::new();
    for row in rows {
        let (date, symptoms, score, level) = row?;
        episodes.push(Episode {
            date,
            symptoms: decode_set("symptoms", &symptoms)?,
            score: u8::try_from(score).map_err(|_| {
                DatabaseError::ConstraintViolation(format!("score out of range: {score}"))
            })?,
            level: RiskLevel::from_str(&level)?,
        });
    }
    Ok(episodes)
}

/// Upsert the user row and replace all episodes atomically.
pub fn save_user_history(
    conn: &mut Connection,
    history: &UserMedicalHistory,
) -> Result<(), DatabaseError> {
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO user_history (user_id, age, gender, chronic_conditions, allergies, current_medications, family_history, last_consultation, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(user_id) DO UPDATE SET
            age = excluded.age,
            gender = excluded.gender,
            chronic_conditions = excluded.chronic_conditions,
            allergies = excluded.allergies,
            current_medications = excluded.current_medications,
            family_history = excluded.family_history,
            last_consultation = excluded.last_consultation,
            updated_at = excluded.updated_at",
        params![
            history.user_id,
            i64::from(history.age),
            history.gender.as_str(),
            encode_set(&history.chronic_conditions)?,
            encode_set(&history.allergies)?,
            encode_set(&history.current_medications)?,
            encode_set(&history.family_history)?,
            history.last_consultation,
            Utc::now(),
        ],
    )?;

    tx.execute(
        "DELETE FROM history_episodes WHERE user_id = ?1",
        params![history.user_id],
    )?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO history_episodes (user_id, seq, recorded_at, symptoms, score, level)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for (seq, episode) in history.previous_episodes.iter().enumerate() {
            stmt.execute(params![
                history.user_id,
                seq as i64,
                episode.date,
                encode_set(&episode.symptoms)?,
                i64::from(episode.score),
                episode.level.as_str(),
            ])?;
        }
    }

    tx.commit()?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Store
// ═══════════════════════════════════════════════════════════

/// Durable `HistoryStore`. The connection is serialized behind a mutex;
/// callers run on blocking threads.
pub struct SqliteHistoryStore {
    conn: Mutex<Connection>,
}

impl SqliteHistoryStore {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(open_database(path)?))
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(open_memory_database()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn get(&self, user_id: &str) -> Result<Option<UserMedicalHistory>, HistoryError> {
        let conn = self.conn.lock().map_err(|_| HistoryError::LockFailed)?;
        Ok(get_user_history(&conn, user_id)?)
    }

    fn put(&self, history: &UserMedicalHistory) -> Result<(), HistoryError> {
        let mut conn = self.conn.lock().map_err(|_| HistoryError::LockFailed)?;
        save_user_history(&mut conn, history)?;
        Ok(())
    }
}
