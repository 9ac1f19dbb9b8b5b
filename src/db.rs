use anyhow::{bail, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Entity tables addressable by the sync engine.
pub const ENTITY_TABLES: &[&str] = &["persons", "education_items", "work_items"];

#[derive(Debug, Clone)]
pub struct ResumeVersion {
    pub resume_key: String,
    pub lang_code: String,
    pub is_base: bool,
    pub is_published: bool,
    pub created_at: String,
}

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Initialize database connection and create tables
    pub fn new(database_path: &str) -> Result<Self> {
        let conn = Connection::open(database_path)
            .context(format!("Failed to open database at {}", database_path))?;
        Self::create_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::create_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn create_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS resume_sets (
                resume_key TEXT PRIMARY KEY,
                base_lang_code TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create resume_sets table")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS resume_versions (
                resume_key TEXT NOT NULL,
                lang_code TEXT NOT NULL,
                is_base INTEGER NOT NULL DEFAULT 0,
                is_published INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                PRIMARY KEY (resume_key, lang_code)
            )",
            [],
        )
        .context("Failed to create resume_versions table")?;

        // Entity rows are stored once per language version, so invariant
        // fields can physically diverge and conflict detection has something
        // to observe.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS persons (
                resume_key TEXT NOT NULL,
                lang_code TEXT NOT NULL,
                entity_id INTEGER NOT NULL,
                fname TEXT,
                lname TEXT,
                email TEXT,
                birth_date TEXT,
                PRIMARY KEY (resume_key, lang_code, entity_id)
            )",
            [],
        )
        .context("Failed to create persons table")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS education_items (
                resume_key TEXT NOT NULL,
                lang_code TEXT NOT NULL,
                entity_id INTEGER NOT NULL,
                institution TEXT,
                degree TEXT,
                start_date TEXT,
                end_date TEXT,
                gpa REAL,
                PRIMARY KEY (resume_key, lang_code, entity_id)
            )",
            [],
        )
        .context("Failed to create education_items table")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS work_items (
                resume_key TEXT NOT NULL,
                lang_code TEXT NOT NULL,
                entity_id INTEGER NOT NULL,
                company TEXT,
                role TEXT,
                start_date TEXT,
                end_date TEXT,
                PRIMARY KEY (resume_key, lang_code, entity_id)
            )",
            [],
        )
        .context("Failed to create work_items table")?;

        Ok(())
    }

    // ==================== Resume Sets & Versions ====================

    /// Create or update a resume set
    pub fn upsert_resume_set(&self, resume_key: &str, base_lang_code: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO resume_sets (resume_key, base_lang_code) VALUES (?1, ?2)
             ON CONFLICT(resume_key) DO UPDATE SET base_lang_code = ?2",
            params![resume_key, base_lang_code],
        )
        .context("Failed to upsert resume set")?;
        Ok(())
    }

    /// Create or update a language version of a resume
    pub fn upsert_version(
        &self,
        resume_key: &str,
        lang_code: &str,
        is_base: bool,
        is_published: bool,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO resume_versions (resume_key, lang_code, is_base, is_published, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(resume_key, lang_code) DO UPDATE SET is_base = ?3, is_published = ?4",
            params![resume_key, lang_code, is_base as i64, is_published as i64, now],
        )
        .context("Failed to upsert resume version")?;
        Ok(())
    }

    /// Check whether a resume set exists
    pub fn resume_exists(&self, resume_key: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT COUNT(*) FROM resume_sets WHERE resume_key = ?1")?;
        let count: i64 = stmt.query_row(params![resume_key], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// Base language of a resume set, if it exists
    pub fn base_lang(&self, resume_key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT base_lang_code FROM resume_sets WHERE resume_key = ?1")?;
        let lang = stmt
            .query_row(params![resume_key], |row| row.get(0))
            .optional()?;
        Ok(lang)
    }

    /// Language codes for which a version row exists, ordered by code
    pub fn version_langs(&self, resume_key: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT lang_code FROM resume_versions WHERE resume_key = ?1 ORDER BY lang_code",
        )?;
        let langs = stmt
            .query_map(params![resume_key], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(langs)
    }

    /// All version rows of a resume, ordered by language code
    pub fn list_versions(&self, resume_key: &str) -> Result<Vec<ResumeVersion>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT resume_key, lang_code, is_base, is_published, created_at
             FROM resume_versions
             WHERE resume_key = ?1
             ORDER BY lang_code",
        )?;

        let versions = stmt
            .query_map(params![resume_key], |row| {
                Ok(ResumeVersion {
                    resume_key: row.get(0)?,
                    lang_code: row.get(1)?,
                    is_base: row.get::<_, i64>(2)? != 0,
                    is_published: row.get::<_, i64>(3)? != 0,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(versions)
    }

    /// All resume keys, ordered
    pub fn list_resume_keys(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT resume_key FROM resume_sets ORDER BY resume_key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    // ==================== Entity Rows (import surface) ====================

    /// Insert a person row for one language version
    #[allow(clippy::too_many_arguments)]
    pub fn insert_person(
        &self,
        resume_key: &str,
        lang_code: &str,
        entity_id: i64,
        fname: &str,
        lname: &str,
        email: &str,
        birth_date: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO persons (resume_key, lang_code, entity_id, fname, lname, email, birth_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![resume_key, lang_code, entity_id, fname, lname, email, birth_date],
        )
        .context("Failed to insert person")?;
        Ok(())
    }

    /// Insert an education item row for one language version
    #[allow(clippy::too_many_arguments)]
    pub fn insert_education_item(
        &self,
        resume_key: &str,
        lang_code: &str,
        entity_id: i64,
        institution: &str,
        degree: &str,
        start_date: &str,
        end_date: &str,
        gpa: Option<f64>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO education_items
                (resume_key, lang_code, entity_id, institution, degree, start_date, end_date, gpa)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![resume_key, lang_code, entity_id, institution, degree, start_date, end_date, gpa],
        )
        .context("Failed to insert education item")?;
        Ok(())
    }

    /// Insert a work item row for one language version
    #[allow(clippy::too_many_arguments)]
    pub fn insert_work_item(
        &self,
        resume_key: &str,
        lang_code: &str,
        entity_id: i64,
        company: &str,
        role: &str,
        start_date: &str,
        end_date: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO work_items
                (resume_key, lang_code, entity_id, company, role, start_date, end_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![resume_key, lang_code, entity_id, company, role, start_date, end_date],
        )
        .context("Failed to insert work item")?;
        Ok(())
    }

    // ==================== Field Access (sync engine surface) ====================

    /// Column names of a table, from pragma_table_info
    pub fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        Self::check_table(table)?;
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT name FROM pragma_table_info('{}')",
            table
        ))?;
        let columns = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(columns)
    }

    /// Entity ids present in a table for a resume, across all language versions
    pub fn entity_ids(&self, table: &str, resume_key: &str) -> Result<Vec<i64>> {
        Self::check_table(table)?;
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT entity_id FROM {} WHERE resume_key = ?1 ORDER BY entity_id",
            table
        ))?;
        let ids = stmt
            .query_map(params![resume_key], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// Check whether an entity has at least one language row
    pub fn entity_exists(&self, table: &str, resume_key: &str, entity_id: i64) -> Result<bool> {
        Self::check_table(table)?;
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT COUNT(*) FROM {} WHERE resume_key = ?1 AND entity_id = ?2",
            table
        ))?;
        let count: i64 = stmt.query_row(params![resume_key, entity_id], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// Read one field of one entity across all language versions.
    ///
    /// Returns (lang_code, value) pairs ordered by language code.
    pub fn read_field_by_lang(
        &self,
        table: &str,
        field: &str,
        resume_key: &str,
        entity_id: i64,
    ) -> Result<Vec<(String, Value)>> {
        self.check_column(table, field)?;
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT lang_code, {} FROM {} WHERE resume_key = ?1 AND entity_id = ?2 ORDER BY lang_code",
            field, table
        ))?;
        let rows = stmt
            .query_map(params![resume_key, entity_id], |row| {
                let lang: String = row.get(0)?;
                let value = sql_to_json(row.get_ref(1)?);
                Ok((lang, value))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Write one field of one entity for a single language row. This is part
    /// of the import surface; synchronized writes go through
    /// [`Database::update_field_all_langs`].
    pub fn update_field_one_lang(
        &self,
        table: &str,
        field: &str,
        resume_key: &str,
        lang_code: &str,
        entity_id: i64,
        value: &Value,
    ) -> Result<()> {
        self.check_column(table, field)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "UPDATE {} SET {} = ?1 WHERE resume_key = ?2 AND lang_code = ?3 AND entity_id = ?4",
                table, field
            ),
            params![json_to_sql(value), resume_key, lang_code, entity_id],
        )
        .context("Failed to update field for one language")?;
        Ok(())
    }

    /// Write one field of one entity across all of its language rows, in a
    /// single transaction with rollback on failure.
    ///
    /// Returns the language codes of the updated rows (empty when the entity
    /// has no rows; nothing is written in that case).
    pub fn update_field_all_langs(
        &self,
        table: &str,
        field: &str,
        resume_key: &str,
        entity_id: i64,
        value: &Value,
    ) -> Result<Vec<String>> {
        self.check_column(table, field)?;
        let conn = self.conn.lock().unwrap();

        conn.execute("BEGIN TRANSACTION", [])?;
        let result = (|| -> Result<Vec<String>> {
            conn.execute(
                &format!(
                    "UPDATE {} SET {} = ?1 WHERE resume_key = ?2 AND entity_id = ?3",
                    table, field
                ),
                params![json_to_sql(value), resume_key, entity_id],
            )
            .context("Failed to update invariant field")?;

            let mut stmt = conn.prepare(&format!(
                "SELECT lang_code FROM {} WHERE resume_key = ?1 AND entity_id = ?2 ORDER BY lang_code",
                table
            ))?;
            let langs = stmt
                .query_map(params![resume_key, entity_id], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(langs)
        })();

        match result {
            Ok(langs) => {
                conn.execute("COMMIT", [])?;
                Ok(langs)
            }
            Err(e) => {
                conn.execute("ROLLBACK", [])?;
                Err(e).context("Field update failed and was rolled back")
            }
        }
    }

    /// Reject table names outside the known schema. Table and column names
    /// are interpolated into SQL, so they must never come from untrusted
    /// input unchecked.
    fn check_table(table: &str) -> Result<()> {
        if !ENTITY_TABLES.contains(&table) {
            bail!("Unknown entity table: {}", table);
        }
        Ok(())
    }

    fn check_column(&self, table: &str, column: &str) -> Result<()> {
        let columns = self.table_columns(table)?;
        if !columns.iter().any(|c| c == column) {
            bail!("Unknown column '{}' in table '{}'", column, table);
        }
        Ok(())
    }
}

/// Convert a JSON value to something rusqlite can bind.
fn json_to_sql(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        Value::Null => Sql::Null,
        Value::Bool(b) => Sql::Integer(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Sql::Integer(i)
            } else {
                Sql::Real(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => Sql::Text(s.clone()),
        // Structured values are stored as their JSON text
        other => Sql::Text(other.to_string()),
    }
}

/// Convert a SQLite column value to JSON.
fn sql_to_json(value: rusqlite::types::ValueRef<'_>) -> Value {
    use rusqlite::types::ValueRef;
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) => Value::Null,
    }
}
