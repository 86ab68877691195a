use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

/// Fixed-width so that text ordering in SQL matches chronological ordering.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

const USER_COLUMNS: &str = "id, email, password_hash, created_at, updated_at";
const REFRESH_TOKEN_COLUMNS: &str = "id, user_id, token_hash, created_at, expires_at";
const STUDY_PLAN_COLUMNS: &str = "id, user_id, courses, total_courses, saved_at";

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
        updated_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn row_to_refresh_token(row: &Row<'_>) -> rusqlite::Result<RefreshToken> {
    Ok(RefreshToken {
        id: row.get(0)?,
        user_id: row.get(1)?,
        token_hash: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
        expires_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn row_to_study_plan(row: &Row<'_>) -> rusqlite::Result<StudyPlan> {
    let courses: String = row.get(2)?;
    let courses = serde_json::from_str(&courses)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(StudyPlan {
        id: row.get(0)?,
        user_id: row.get(1)?,
        courses,
        total_courses: row.get(3)?,
        saved_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO users (id, email, password_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id,
                user.email,
                user.password_hash,
                format_datetime(&user.created_at),
                format_datetime(&user.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
            row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    fn update_user_password(&self, id: &str, password_hash: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
            params![password_hash, format_datetime(&Utc::now()), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    // Refresh token operations

    fn create_refresh_token(&self, token: &RefreshToken) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                token.id,
                token.user_id,
                token.token_hash,
                format_datetime(&token.created_at),
                format_datetime(&token.expires_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshToken>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {REFRESH_TOKEN_COLUMNS} FROM refresh_tokens WHERE token_hash = ?1"),
            params![token_hash],
            row_to_refresh_token,
        )
        .optional()
        .map_err(Error::from)
    }

    fn delete_refresh_token(&self, token_hash: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM refresh_tokens WHERE token_hash = ?1",
            params![token_hash],
        )?;
        Ok(rows > 0)
    }

    fn delete_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<usize> {
        let rows = self.conn().execute(
            "DELETE FROM refresh_tokens WHERE expires_at < ?1",
            params![format_datetime(&now)],
        )?;
        Ok(rows)
    }

    fn rotate_refresh_token(&self, old_hash: &str, new: &RefreshToken) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let deleted = tx.execute(
            "DELETE FROM refresh_tokens WHERE token_hash = ?1",
            params![old_hash],
        )?;
        if deleted == 0 {
            // Dropping the transaction rolls it back.
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                new.id,
                new.user_id,
                new.token_hash,
                format_datetime(&new.created_at),
                format_datetime(&new.expires_at),
            ],
        )?;

        tx.commit()?;
        Ok(true)
    }

    // Reset code operations

    fn replace_reset_code(&self, code: &ResetCode) -> Result<()> {
        self.conn().execute(
            "INSERT INTO reset_codes (email, code, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(email) DO UPDATE SET code = excluded.code, expires_at = excluded.expires_at",
            params![code.email, code.code, format_datetime(&code.expires_at)],
        )?;
        Ok(())
    }

    fn get_reset_code(&self, email: &str) -> Result<Option<ResetCode>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT email, code, expires_at FROM reset_codes WHERE email = ?1",
            params![email],
            |row| {
                Ok(ResetCode {
                    email: row.get(0)?,
                    code: row.get(1)?,
                    expires_at: parse_datetime(&row.get::<_, String>(2)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn delete_reset_code(&self, email: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM reset_codes WHERE email = ?1", params![email])?;
        Ok(rows > 0)
    }

    // Study plan operations

    fn create_study_plan(&self, plan: &StudyPlan) -> Result<()> {
        let courses = serde_json::to_string(&plan.courses)?;
        self.conn().execute(
            "INSERT INTO study_plans (id, user_id, courses, total_courses, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                plan.id,
                plan.user_id,
                courses,
                plan.total_courses,
                format_datetime(&plan.saved_at),
            ],
        )?;
        Ok(())
    }

    fn get_study_plan(&self, id: &str) -> Result<Option<StudyPlan>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {STUDY_PLAN_COLUMNS} FROM study_plans WHERE id = ?1"),
            params![id],
            row_to_study_plan,
        )
        .optional()
        .map_err(Error::from)
    }

    fn latest_study_plan(&self, user_id: &str) -> Result<Option<StudyPlan>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {STUDY_PLAN_COLUMNS} FROM study_plans WHERE user_id = ?1
                 ORDER BY saved_at DESC LIMIT 1"
            ),
            params![user_id],
            row_to_study_plan,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_study_plans(&self, user_id: &str, limit: i64) -> Result<Vec<StudyPlan>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {STUDY_PLAN_COLUMNS} FROM study_plans WHERE user_id = ?1
             ORDER BY saved_at DESC LIMIT ?2"
        ))?;

        let rows = stmt.query_map(params![user_id, limit], row_to_study_plan)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn close(&self) -> Result<()> {
        self.conn()
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        Ok(())
    }
}
