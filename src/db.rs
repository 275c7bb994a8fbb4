//! Database module
//!
//! Persistence for cases, their workflow steps, the step audit log and
//! consultations.

mod schema;

pub use schema::*;

use crate::consultation::{extract_triggers, fallback_title, ConsultationUpdate, NewConsultation};
use crate::workflow::{
    apply_skip, apply_status, derive_view, initial_records, CaseSource, StepName, StepRecord,
    StepStatus, StepUpdateError,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Case not found: {0}")]
    CaseNotFound(String),
    #[error("Consultation not found: {0}")]
    ConsultationNotFound(String),
    #[error(transparent)]
    StepUpdate(#[from] StepUpdateError),
    #[error("Invalid stored JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Case Operations ====================

    /// Create a case with its five steps seeded for `source`
    pub fn create_case(&self, trademark_name: Option<&str>, source: CaseSource) -> DbResult<Case> {
        let mut conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let id = uuid::Uuid::new_v4().to_string();
        let case_number = case_number(now);
        let trademark_name = trademark_name.map(str::trim).filter(|n| !n.is_empty());
        let steps = initial_records(source, now);

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO cases (id, case_number, trademark_name, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                id,
                case_number,
                trademark_name,
                CaseStatus::Active.as_str(),
                now.to_rfc3339()
            ],
        )?;
        for record in &steps {
            upsert_step(&tx, &id, record)?;
        }
        insert_event(
            &tx,
            &id,
            CaseEventType::CaseCreated,
            None,
            &json!({ "source": source, "trademark_name": trademark_name }),
            now,
        )?;
        tx.commit()?;

        Ok(Case {
            id,
            case_number,
            trademark_name: trademark_name.map(String::from),
            status: CaseStatus::Active,
            created_at: now,
            updated_at: now,
            steps,
        })
    }

    /// Get a case by id or case number
    pub fn get_case(&self, key: &str) -> DbResult<Case> {
        let conn = self.conn.lock().unwrap();
        load_case(&conn, key)
    }

    /// All cases, newest first
    pub fn list_cases(&self) -> DbResult<Vec<Case>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, case_number, trademark_name, status, created_at, updated_at
             FROM cases ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], parse_case_row)?;
        let mut cases = rows.collect::<Result<Vec<_>, _>>()?;
        for case in &mut cases {
            case.steps = load_steps(&conn, &case.id)?;
        }
        Ok(cases)
    }

    /// Set a step's status, recording timestamps and an audit event
    pub fn update_step(
        &self,
        case_key: &str,
        step: StepName,
        status: StepStatus,
        metadata: Option<Value>,
    ) -> DbResult<StepRecord> {
        let mut conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let tx = conn.transaction()?;

        let mut case = load_case(&tx, case_key)?;
        let record = step_mut(&mut case.steps, step);
        let previous = record.status;
        apply_status(record, status, now)?;
        if let Some(metadata) = metadata {
            merge_metadata(&mut record.metadata, metadata);
        }
        let updated = record.clone();

        upsert_step(&tx, &case.id, &updated)?;
        let event_type = if status == StepStatus::InProgress && previous != StepStatus::InProgress
        {
            CaseEventType::StepStarted
        } else {
            CaseEventType::StepStatusChanged
        };
        insert_event(
            &tx,
            &case.id,
            event_type,
            Some(step),
            &json!({ "from": previous, "to": status }),
            now,
        )?;
        touch_case(&tx, &case, now)?;
        tx.commit()?;

        tracing::debug!(case_id = %case.id, step = %step, status = %status, "Step updated");
        Ok(updated)
    }

    /// Mark a step skipped
    pub fn skip_step(
        &self,
        case_key: &str,
        step: StepName,
        reason: Option<String>,
    ) -> DbResult<StepRecord> {
        let mut conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let tx = conn.transaction()?;

        let mut case = load_case(&tx, case_key)?;
        let record = step_mut(&mut case.steps, step);
        let previous = record.status;
        apply_skip(record, reason.clone(), now);
        let updated = record.clone();

        upsert_step(&tx, &case.id, &updated)?;
        insert_event(
            &tx,
            &case.id,
            CaseEventType::StepSkipped,
            Some(step),
            &json!({ "reason": reason, "previous_status": previous }),
            now,
        )?;
        touch_case(&tx, &case, now)?;
        tx.commit()?;

        Ok(updated)
    }

    /// Merge `metadata` into a step without touching its status
    pub fn merge_step_metadata(
        &self,
        case_key: &str,
        step: StepName,
        metadata: Value,
    ) -> DbResult<StepRecord> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let case = load_case(&tx, case_key)?;
        let mut steps = case.steps;
        let record = step_mut(&mut steps, step);
        merge_metadata(&mut record.metadata, metadata);
        let updated = record.clone();

        upsert_step(&tx, &case.id, &updated)?;
        tx.execute(
            "UPDATE cases SET updated_at = ?2 WHERE id = ?1",
            params![case.id, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(updated)
    }

    /// Audit log of a case, oldest first
    pub fn list_case_events(&self, case_key: &str) -> DbResult<Vec<CaseEvent>> {
        let conn = self.conn.lock().unwrap();
        let case_id = resolve_case_id(&conn, case_key)?;
        let mut stmt = conn.prepare(
            "SELECT id, case_id, event_type, step, payload, created_at
             FROM case_events WHERE case_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![case_id], |row| {
            let step: Option<String> = row.get(3)?;
            let payload: String = row.get(4)?;
            Ok(CaseEvent {
                id: row.get(0)?,
                case_id: row.get(1)?,
                event_type: CaseEventType::parse(&row.get::<_, String>(2)?),
                step: step.and_then(|s| s.parse().ok()),
                payload: serde_json::from_str(&payload).unwrap_or(Value::Null),
                created_at: parse_datetime(&row.get::<_, String>(5)?),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ==================== Consultation Operations ====================

    pub fn create_consultation(&self, new: &NewConsultation) -> DbResult<Consultation> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        let case_id = match new.case_id.as_deref() {
            Some(key) => Some(resolve_case_id(&conn, key)?),
            None => None,
        };
        let transcript = new.transcript.clone().unwrap_or_default();
        let triggers = extract_triggers(&transcript);
        let title = new
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| fallback_title(&triggers));

        let consultation = Consultation {
            id: uuid::Uuid::new_v4().to_string(),
            case_id,
            title,
            transcript,
            duration_secs: 0,
            summary: new.summary.clone(),
            mode: new.mode,
            status: ConsultationStatus::Draft,
            trademark_name: triggers.trademark_name,
            countries: triggers.countries,
            nice_classes: triggers.nice_classes,
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            "INSERT INTO consultations (id, case_id, title, transcript, duration_secs, summary, mode,
                                        status, trademark_name, countries, nice_classes,
                                        created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
            params![
                consultation.id,
                consultation.case_id,
                consultation.title,
                consultation.transcript,
                to_i64(consultation.duration_secs),
                consultation.summary,
                consultation.mode.as_str(),
                consultation.status.as_str(),
                consultation.trademark_name,
                serde_json::to_string(&consultation.countries)?,
                serde_json::to_string(&consultation.nice_classes)?,
                now.to_rfc3339(),
            ],
        )?;

        Ok(consultation)
    }

    pub fn get_consultation(&self, id: &str) -> DbResult<Consultation> {
        let conn = self.conn.lock().unwrap();
        load_consultation(&conn, id)
    }

    /// Consultations, newest first, optionally limited to one case
    pub fn list_consultations(&self, case_key: Option<&str>) -> DbResult<Vec<Consultation>> {
        let conn = self.conn.lock().unwrap();
        let case_id = match case_key {
            Some(key) => Some(resolve_case_id(&conn, key)?),
            None => None,
        };
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONSULTATION_COLUMNS} FROM consultations
             WHERE ?1 IS NULL OR case_id = ?1
             ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map(params![case_id], parse_consultation_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn update_consultation(
        &self,
        id: &str,
        update: &ConsultationUpdate,
    ) -> DbResult<Consultation> {
        let conn = self.conn.lock().unwrap();
        let mut c = load_consultation(&conn, id)?;

        if let Some(key) = update.case_id.as_deref() {
            c.case_id = Some(resolve_case_id(&conn, key)?);
        }
        if let Some(title) = &update.title {
            c.title.clone_from(title);
        }
        if let Some(summary) = &update.summary {
            c.summary = Some(summary.clone());
        }
        if let Some(transcript) = &update.transcript {
            c.transcript.clone_from(transcript);
        }
        if let Some(duration) = update.duration_secs {
            c.duration_secs = duration;
        }
        if let Some(status) = update.status {
            c.status = status;
        }
        if let Some(name) = &update.trademark_name {
            c.trademark_name = Some(name.clone());
        }
        if let Some(countries) = &update.countries {
            c.countries.clone_from(countries);
        }
        if let Some(classes) = &update.nice_classes {
            c.nice_classes.clone_from(classes);
        }
        c.updated_at = Utc::now();

        conn.execute(
            "UPDATE consultations
             SET case_id = ?2, title = ?3, transcript = ?4, duration_secs = ?5, summary = ?6,
                 status = ?7, trademark_name = ?8, countries = ?9, nice_classes = ?10,
                 updated_at = ?11
             WHERE id = ?1",
            params![
                c.id,
                c.case_id,
                c.title,
                c.transcript,
                to_i64(c.duration_secs),
                c.summary,
                c.status.as_str(),
                c.trademark_name,
                serde_json::to_string(&c.countries)?,
                serde_json::to_string(&c.nice_classes)?,
                c.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(c)
    }

    /// Append text to the stored transcript
    pub fn append_consultation_transcript(&self, id: &str, text: &str) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE consultations SET transcript = transcript || ?2, updated_at = ?3 WHERE id = ?1",
            params![id, text, Utc::now().to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(DbError::ConsultationNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Complete the linked case's consultation step and adopt the extracted
    /// trademark name when the case has none yet
    pub fn record_consultation_completed(&self, consultation: &Consultation) -> DbResult<()> {
        let Some(case_id) = consultation.case_id.as_deref() else {
            return Ok(());
        };

        if let Some(name) = consultation.trademark_name.as_deref() {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "UPDATE cases SET trademark_name = ?2 WHERE id = ?1 AND trademark_name IS NULL",
                params![case_id, name],
            )?;
        }

        let metadata = json!({ "consultation_id": consultation.id });
        match self.update_step(
            case_id,
            StepName::Consultation,
            StepStatus::Completed,
            Some(metadata),
        ) {
            Ok(_) | Err(DbError::StepUpdate(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn delete_consultation(&self, id: &str) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute("DELETE FROM consultations WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(DbError::ConsultationNotFound(id.to_string()));
        }
        Ok(())
    }
}

const CONSULTATION_COLUMNS: &str = "id, case_id, title, transcript, duration_secs, summary, mode, \
     status, trademark_name, countries, nice_classes, created_at, updated_at";

/// `TM-YYYYMMDD-HHMMSS-XXXX`
fn case_number(now: DateTime<Utc>) -> String {
    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(4)
        .collect();
    format!(
        "TM-{}-{}",
        now.format("%Y%m%d-%H%M%S"),
        suffix.to_uppercase()
    )
}

fn resolve_case_id(conn: &Connection, key: &str) -> DbResult<String> {
    conn.query_row(
        "SELECT id FROM cases WHERE id = ?1 OR case_number = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| DbError::CaseNotFound(key.to_string()))
}

fn load_case(conn: &Connection, key: &str) -> DbResult<Case> {
    let mut case = conn
        .query_row(
            "SELECT id, case_number, trademark_name, status, created_at, updated_at
             FROM cases WHERE id = ?1 OR case_number = ?1",
            params![key],
            parse_case_row,
        )
        .optional()?
        .ok_or_else(|| DbError::CaseNotFound(key.to_string()))?;
    case.steps = load_steps(conn, &case.id)?;
    Ok(case)
}

fn parse_case_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Case> {
    Ok(Case {
        id: row.get(0)?,
        case_number: row.get(1)?,
        trademark_name: row.get(2)?,
        status: row
            .get::<_, String>(3)?
            .parse()
            .unwrap_or_default(),
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        updated_at: parse_datetime(&row.get::<_, String>(5)?),
        steps: Vec::new(),
    })
}

/// Stored steps in workflow order; unknown step names are ignored
fn load_steps(conn: &Connection, case_id: &str) -> DbResult<Vec<StepRecord>> {
    let mut stmt = conn.prepare(
        "SELECT step, status, started_at, completed_at, skipped_at, skip_reason, metadata
         FROM case_steps WHERE case_id = ?1",
    )?;
    let rows = stmt.query_map(params![case_id], |row| {
        let step: String = row.get(0)?;
        let Ok(name) = step.parse::<StepName>() else {
            return Ok(None);
        };
        let status: String = row.get(1)?;
        let metadata: String = row.get(6)?;
        Ok(Some(StepRecord {
            name,
            status: status.parse().unwrap_or_default(),
            started_at: row.get::<_, Option<String>>(2)?.as_deref().map(parse_datetime),
            completed_at: row.get::<_, Option<String>>(3)?.as_deref().map(parse_datetime),
            skipped_at: row.get::<_, Option<String>>(4)?.as_deref().map(parse_datetime),
            skip_reason: row.get(5)?,
            metadata: serde_json::from_str(&metadata).unwrap_or_else(|_| json!({})),
        }))
    })?;

    let mut steps: Vec<StepRecord> = rows
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .flatten()
        .collect();
    steps.sort_by_key(|s| s.name);
    Ok(steps)
}

/// The stored record for `step`, created as pending when missing
fn step_mut(steps: &mut Vec<StepRecord>, step: StepName) -> &mut StepRecord {
    let index = match steps.iter().position(|s| s.name == step) {
        Some(index) => index,
        None => {
            steps.push(StepRecord::pending(step));
            steps.len() - 1
        }
    };
    &mut steps[index]
}

fn upsert_step(conn: &Connection, case_id: &str, record: &StepRecord) -> DbResult<()> {
    conn.execute(
        "INSERT INTO case_steps (case_id, step, status, started_at, completed_at, skipped_at,
                                 skip_reason, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(case_id, step) DO UPDATE SET
             status = excluded.status,
             started_at = excluded.started_at,
             completed_at = excluded.completed_at,
             skipped_at = excluded.skipped_at,
             skip_reason = excluded.skip_reason,
             metadata = excluded.metadata",
        params![
            case_id,
            record.name.as_str(),
            record.status.as_str(),
            record.started_at.map(|t| t.to_rfc3339()),
            record.completed_at.map(|t| t.to_rfc3339()),
            record.skipped_at.map(|t| t.to_rfc3339()),
            record.skip_reason,
            serde_json::to_string(&record.metadata)?,
        ],
    )?;
    Ok(())
}

fn insert_event(
    conn: &Connection,
    case_id: &str,
    event_type: CaseEventType,
    step: Option<StepName>,
    payload: &Value,
    now: DateTime<Utc>,
) -> DbResult<()> {
    conn.execute(
        "INSERT INTO case_events (case_id, event_type, step, payload, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            case_id,
            event_type.as_str(),
            step.map(StepName::as_str),
            payload.to_string(),
            now.to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Refresh `updated_at` and derive the case status from its steps
fn touch_case(conn: &Connection, case: &Case, now: DateTime<Utc>) -> DbResult<()> {
    let status = match case.status {
        CaseStatus::Archived => CaseStatus::Archived,
        _ if derive_view(&case.steps).is_complete() => CaseStatus::Completed,
        _ => CaseStatus::Active,
    };
    conn.execute(
        "UPDATE cases SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![case.id, status.as_str(), now.to_rfc3339()],
    )?;
    Ok(())
}

fn merge_metadata(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(patch)) => existing.extend(patch),
        (target, patch) => *target = patch,
    }
}

fn load_consultation(conn: &Connection, id: &str) -> DbResult<Consultation> {
    conn.query_row(
        &format!("SELECT {CONSULTATION_COLUMNS} FROM consultations WHERE id = ?1"),
        params![id],
        parse_consultation_row,
    )
    .optional()?
    .ok_or_else(|| DbError::ConsultationNotFound(id.to_string()))
}

fn parse_consultation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Consultation> {
    let countries: String = row.get(9)?;
    let classes: String = row.get(10)?;
    Ok(Consultation {
        id: row.get(0)?,
        case_id: row.get(1)?,
        title: row.get(2)?,
        transcript: row.get(3)?,
        duration_secs: u64::try_from(row.get::<_, i64>(4)?).unwrap_or(0),
        summary: row.get(5)?,
        mode: row.get::<_, String>(6)?.parse().unwrap_or_default(),
        status: row.get::<_, String>(7)?.parse().unwrap_or_default(),
        trademark_name: row.get(8)?,
        countries: serde_json::from_str(&countries).unwrap_or_default(),
        nice_classes: serde_json::from_str(&classes).unwrap_or_default(),
        created_at: parse_datetime(&row.get::<_, String>(11)?),
        updated_at: parse_datetime(&row.get::<_, String>(12)?),
    })
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consultation::ConsultationMode;

    #[test]
    fn test_create_and_get_case() {
        let db = Database::open_in_memory().unwrap();
        let case = db.create_case(Some(" Nova "), CaseSource::Consultation).unwrap();

        assert_eq!(case.trademark_name.as_deref(), Some("Nova"));
        assert!(case.case_number.starts_with("TM-"));
        assert_eq!(case.case_number.len(), "TM-20240101-120000-ABCD".len());
        assert_eq!(case.steps.len(), 5);

        let by_id = db.get_case(&case.id).unwrap();
        let by_number = db.get_case(&case.case_number).unwrap();
        assert_eq!(by_id.id, by_number.id);
        assert_eq!(by_id.steps, case.steps);

        assert!(matches!(db.get_case("missing"), Err(DbError::CaseNotFound(_))));
    }

    #[test]
    fn test_reopen_keeps_cases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("desk.db");

        let number = {
            let db = Database::open(&path).unwrap();
            db.create_case(Some("Nova"), CaseSource::Consultation)
                .unwrap()
                .case_number
        };

        let db = Database::open(&path).unwrap();
        let case = db.get_case(&number).unwrap();
        assert_eq!(case.trademark_name.as_deref(), Some("Nova"));
        assert_eq!(db.list_cases().unwrap().len(), 1);
    }

    #[test]
    fn test_steps_come_back_in_workflow_order() {
        let db = Database::open_in_memory().unwrap();
        let case = db.create_case(None, CaseSource::Search).unwrap();
        let names: Vec<StepName> = db.get_case(&case.id).unwrap().steps.iter().map(|s| s.name).collect();
        assert_eq!(names, StepName::ALL.to_vec());

        let view = derive_view(&db.get_case(&case.id).unwrap().steps);
        assert_eq!(view.current(), Some(StepName::Search));
    }

    #[test]
    fn test_update_step_records_event_and_timestamps() {
        let db = Database::open_in_memory().unwrap();
        let case = db.create_case(None, CaseSource::Consultation).unwrap();

        let record = db
            .update_step(
                &case.case_number,
                StepName::Consultation,
                StepStatus::Completed,
                Some(json!({ "consultation_id": "c-1" })),
            )
            .unwrap();
        assert!(record.completed_at.is_some());
        assert_eq!(record.metadata["consultation_id"], "c-1");

        let started = db
            .update_step(&case.id, StepName::Search, StepStatus::InProgress, None)
            .unwrap();
        assert!(started.started_at.is_some());

        let events = db.list_case_events(&case.id).unwrap();
        let types: Vec<CaseEventType> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![
                CaseEventType::CaseCreated,
                CaseEventType::StepStatusChanged,
                CaseEventType::StepStarted
            ]
        );
        assert_eq!(events[1].step, Some(StepName::Consultation));
        assert_eq!(events[1].payload["to"], "completed");
    }

    #[test]
    fn test_terminal_step_cannot_reopen() {
        let db = Database::open_in_memory().unwrap();
        let case = db.create_case(None, CaseSource::Consultation).unwrap();
        db.update_step(&case.id, StepName::Consultation, StepStatus::Completed, None)
            .unwrap();

        let err = db
            .update_step(&case.id, StepName::Consultation, StepStatus::InProgress, None)
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::StepUpdate(StepUpdateError::AlreadyTerminal { .. })
        ));
        // Nothing was written for the rejected change
        assert_eq!(db.list_case_events(&case.id).unwrap().len(), 2);
    }

    #[test]
    fn test_skip_and_completion_update_case_status() {
        let db = Database::open_in_memory().unwrap();
        let case = db.create_case(None, CaseSource::Search).unwrap();

        let skipped = db
            .skip_step(&case.id, StepName::Watchlist, Some("not needed".into()))
            .unwrap();
        assert_eq!(skipped.skip_reason.as_deref(), Some("not needed"));
        let events = db.list_case_events(&case.id).unwrap();
        let skip = events.last().unwrap();
        assert_eq!(skip.event_type, CaseEventType::StepSkipped);
        assert_eq!(skip.payload["previous_status"], "pending");
        assert_eq!(skip.payload["reason"], "not needed");

        for step in [StepName::Search, StepName::RiskAnalysis, StepName::Filing] {
            db.update_step(&case.id, step, StepStatus::Completed, None).unwrap();
        }
        let case = db.get_case(&case.id).unwrap();
        assert_eq!(case.status, CaseStatus::Completed);
        assert!(derive_view(&case.steps).is_complete());
    }

    #[test]
    fn test_merge_step_metadata_keeps_status() {
        let db = Database::open_in_memory().unwrap();
        let case = db.create_case(None, CaseSource::Search).unwrap();
        db.update_step(
            &case.id,
            StepName::Search,
            StepStatus::Completed,
            Some(json!({ "note": "kept" })),
        )
        .unwrap();

        let record = db
            .merge_step_metadata(&case.id, StepName::Search, json!({ "total_results": 3 }))
            .unwrap();
        assert_eq!(record.status, StepStatus::Completed);
        assert_eq!(record.metadata["note"], "kept");
        assert_eq!(record.metadata["total_results"], 3);

        let case = db.get_case(&case.id).unwrap();
        let stored = case.steps.iter().find(|s| s.name == StepName::Search).unwrap();
        assert_eq!(stored.metadata["total_results"], 3);
        assert!(matches!(
            db.merge_step_metadata("missing", StepName::Search, json!({})),
            Err(DbError::CaseNotFound(_))
        ));
    }

    #[test]
    fn test_consultation_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let case = db.create_case(Some("Nova"), CaseSource::Consultation).unwrap();

        let c = db
            .create_consultation(&NewConsultation {
                case_id: Some(case.case_number.clone()),
                mode: ConsultationMode::Voice,
                ..NewConsultation::default()
            })
            .unwrap();
        assert_eq!(c.case_id.as_deref(), Some(case.id.as_str()));
        assert_eq!(c.status, ConsultationStatus::Draft);
        assert!(c.title.starts_with("Trademark consultation "));

        db.append_consultation_transcript(&c.id, "User: Hi\n").unwrap();
        db.append_consultation_transcript(&c.id, "Assistant: Hello [KLASSEN: 9]\n")
            .unwrap();
        assert_eq!(
            db.get_consultation(&c.id).unwrap().transcript,
            "User: Hi\nAssistant: Hello [KLASSEN: 9]\n"
        );

        let updated = db
            .update_consultation(
                &c.id,
                &ConsultationUpdate {
                    status: Some(ConsultationStatus::Completed),
                    nice_classes: Some(vec![9]),
                    duration_secs: Some(95),
                    ..ConsultationUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.status, ConsultationStatus::Completed);
        assert_eq!(updated.nice_classes, vec![9]);

        let fetched = db.get_consultation(&c.id).unwrap();
        assert_eq!(fetched.duration_secs, 95);
        assert_eq!(db.list_consultations(Some(&case.id)).unwrap().len(), 1);
        assert_eq!(db.list_consultations(None).unwrap().len(), 1);

        db.delete_consultation(&c.id).unwrap();
        assert!(matches!(
            db.get_consultation(&c.id),
            Err(DbError::ConsultationNotFound(_))
        ));
        assert!(db.append_consultation_transcript(&c.id, "x").is_err());
    }

    #[test]
    fn test_completed_consultation_advances_case() {
        let db = Database::open_in_memory().unwrap();
        let case = db.create_case(None, CaseSource::Consultation).unwrap();
        let c = db
            .create_consultation(&NewConsultation {
                case_id: Some(case.id.clone()),
                transcript: Some("Assistant: [MARKE: Nova]\n".into()),
                ..NewConsultation::default()
            })
            .unwrap();

        db.record_consultation_completed(&c).unwrap();
        // A second completion is harmless
        db.record_consultation_completed(&c).unwrap();

        let case = db.get_case(&case.id).unwrap();
        assert_eq!(case.trademark_name.as_deref(), Some("Nova"));
        let view = derive_view(&case.steps);
        assert_eq!(view.status_of(StepName::Consultation), StepStatus::Completed);
        assert_eq!(view.current(), Some(StepName::Search));
        assert_eq!(case.steps[0].metadata["consultation_id"], c.id.as_str());
    }

    #[test]
    fn test_consultation_for_unknown_case() {
        let db = Database::open_in_memory().unwrap();
        let result = db.create_consultation(&NewConsultation {
            case_id: Some("TM-nope".into()),
            ..NewConsultation::default()
        });
        assert!(matches!(result, Err(DbError::CaseNotFound(_))));
    }

    #[test]
    fn test_initial_transcript_is_mined_for_triggers() {
        let db = Database::open_in_memory().unwrap();
        let c = db
            .create_consultation(&NewConsultation {
                title: Some("Imported".into()),
                mode: ConsultationMode::Text,
                transcript: Some("Assistant: noted [MARKE: Nova] [LAENDER: de]".into()),
                ..NewConsultation::default()
            })
            .unwrap();
        assert_eq!(c.trademark_name.as_deref(), Some("Nova"));
        assert_eq!(c.countries, vec!["DE"]);
        assert_eq!(db.get_consultation(&c.id).unwrap().mode, ConsultationMode::Text);
    }
}
