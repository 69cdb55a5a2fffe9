use crate::schema::{BulkImportReport, Classification, Field, Gender, NewLeader, NewVoter, VoterRecord};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("national ID {national_id} already registered")]
    Conflict { national_id: String },
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Persistence port for voter registration.
pub trait VoterStore {
    fn find_voter_id(&self, national_id: &str) -> Result<Option<i64>, StoreError>;

    fn leader_is_active(&self, leader_id: i64) -> Result<bool, StoreError>;

    /// Persist a voter; a duplicate national ID is reported as `Conflict`.
    fn insert_voter(&self, voter: &NewVoter) -> Result<i64, StoreError>;

    fn national_id_exists(&self, national_id: &str) -> Result<bool, StoreError> {
        Ok(self.find_voter_id(national_id)?.is_some())
    }
}

pub fn open(db_path: &str) -> Result<Connection> {
    let conn = Connection::open(db_path).with_context(|| format!("opening database {db_path}"))?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    init(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init(&conn)?;
    Ok(conn)
}

fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS leaders (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL,
          national_id TEXT NOT NULL UNIQUE,
          municipality TEXT,
          active INTEGER NOT NULL DEFAULT 1,
          registered_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS voters (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL,
          national_id TEXT NOT NULL UNIQUE,
          age INTEGER NOT NULL,
          phone TEXT,
          residence_address TEXT NOT NULL,
          gender TEXT,
          department TEXT,
          municipality TEXT,
          voting_place TEXT,
          polling_table TEXT,
          polling_address TEXT,
          validation_state TEXT NOT NULL,
          discrepancies_json TEXT,
          leader_id INTEGER REFERENCES leaders(id),
          registered_by TEXT,
          registered_at TEXT NOT NULL,
          notes TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_voters_leader_id ON voters(leader_id);

        CREATE TABLE IF NOT EXISTS bulk_import_incidents (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          leader_id INTEGER REFERENCES leaders(id),
          user TEXT,
          source_name TEXT,
          created INTEGER NOT NULL,
          total_rows INTEGER NOT NULL,
          errors_json TEXT NOT NULL,
          recorded_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_incidents_recorded_at ON bulk_import_incidents(recorded_at);
        "#,
    )?;
    Ok(())
}

fn now_rfc3339() -> Result<String, StoreError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|err| StoreError::Backend(err.to_string()))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

pub fn insert_leader(conn: &Connection, leader: &NewLeader) -> Result<i64> {
    let registered_at = now_rfc3339()?;
    conn.execute(
        r#"
        INSERT INTO leaders (name, national_id, municipality, active, registered_at)
        VALUES (?1, ?2, ?3, 1, ?4)
        "#,
        params![leader.name, leader.national_id, leader.municipality, registered_at],
    )
    .with_context(|| format!("registering leader {}", leader.national_id))?;
    Ok(conn.last_insert_rowid())
}

pub fn deactivate_leader(conn: &Connection, leader_id: i64) -> Result<bool> {
    let changed = conn.execute("UPDATE leaders SET active = 0 WHERE id = ?1", params![leader_id])?;
    Ok(changed > 0)
}

impl VoterStore for Connection {
    fn find_voter_id(&self, national_id: &str) -> Result<Option<i64>, StoreError> {
        let id = self
            .query_row(
                "SELECT id FROM voters WHERE national_id = ?1",
                params![national_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn leader_is_active(&self, leader_id: i64) -> Result<bool, StoreError> {
        let active: Option<bool> = self
            .query_row(
                "SELECT active FROM leaders WHERE id = ?1",
                params![leader_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(active.unwrap_or(false))
    }

    fn insert_voter(&self, voter: &NewVoter) -> Result<i64, StoreError> {
        let registered_at = now_rfc3339()?;
        let discrepancies_json = if voter.classification == Classification::NeedsReview
            && !voter.discrepancies.is_empty()
        {
            Some(
                serde_json::to_string(&voter.discrepancies)
                    .map_err(|err| StoreError::Backend(err.to_string()))?,
            )
        } else {
            None
        };

        let inserted = self.execute(
            r#"
            INSERT INTO voters (
              name, national_id, age, phone, residence_address, gender,
              department, municipality, voting_place, polling_table, polling_address,
              validation_state, discrepancies_json, leader_id, registered_by,
              registered_at, notes
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
            params![
                voter.name,
                voter.national_id,
                voter.age,
                voter.phone,
                voter.residence_address,
                voter.gender.map(Gender::as_str),
                voter.department,
                voter.municipality,
                voter.voting_place,
                voter.table,
                voter.polling_address,
                voter.classification.as_str(),
                discrepancies_json,
                voter.leader_id,
                voter.registered_by,
                registered_at,
                voter.notes
            ],
        );

        match inserted {
            Ok(_) => Ok(self.last_insert_rowid()),
            Err(err) if is_unique_violation(&err) => {
                debug!(national_id = %voter.national_id, "unique constraint rejected voter insert");
                Err(StoreError::Conflict {
                    national_id: voter.national_id.clone(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }
}

pub fn load_voter(conn: &Connection, national_id: &str) -> Result<Option<VoterRecord>> {
    let record = conn
        .query_row(
            r#"
            SELECT id, registered_at, name, national_id, age, phone, residence_address, gender,
                   department, municipality, voting_place, polling_table, polling_address,
                   validation_state, discrepancies_json, leader_id, registered_by, notes
            FROM voters
            WHERE national_id = ?1
            "#,
            params![national_id],
            voter_from_row,
        )
        .optional()?;
    Ok(record)
}

fn voter_from_row(row: &Row<'_>) -> rusqlite::Result<VoterRecord> {
    let gender: Option<String> = row.get(7)?;
    let state: String = row.get(13)?;
    let discrepancies_json: Option<String> = row.get(14)?;
    let discrepancies: Vec<Field> = discrepancies_json
        .as_deref()
        .and_then(|json| serde_json::from_str(json).ok())
        .unwrap_or_default();

    Ok(VoterRecord {
        id: row.get(0)?,
        registered_at: row.get(1)?,
        voter: NewVoter {
            name: row.get(2)?,
            national_id: row.get(3)?,
            age: row.get(4)?,
            phone: row.get(5)?,
            residence_address: row.get(6)?,
            gender: gender.as_deref().and_then(Gender::parse),
            department: row.get(8)?,
            municipality: row.get(9)?,
            voting_place: row.get(10)?,
            table: row.get(11)?,
            polling_address: row.get(12)?,
            classification: Classification::parse(&state).unwrap_or_default(),
            discrepancies,
            leader_id: row.get(15)?,
            registered_by: row.get(16)?,
            notes: row.get(17)?,
        },
    })
}

/// Keep the rejected rows of a batch so operators can follow them up.
pub fn record_import_incident(
    conn: &Connection,
    leader_id: Option<i64>,
    user: Option<&str>,
    source_name: Option<&str>,
    report: &BulkImportReport,
) -> Result<i64> {
    let errors: Vec<String> = report.errors.iter().map(ToString::to_string).collect();
    let errors_json = serde_json::to_string(&errors)?;
    let recorded_at = now_rfc3339()?;

    conn.execute(
        r#"
        INSERT INTO bulk_import_incidents (
          leader_id, user, source_name, created, total_rows, errors_json, recorded_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            leader_id,
            user,
            source_name,
            report.created as i64,
            report.total_rows as i64,
            errors_json,
            recorded_at
        ],
    )?;
    Ok(conn.last_insert_rowid())
}
