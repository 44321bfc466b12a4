use crate::error::{MetadocError, Result};
use crate::schema::{Doctype, Field, FieldType};
use rusqlite::{params, Connection, OptionalExtension};

/// Create the catalog tables if they are missing and fold legacy
/// doctype permissions into `doctype_permissions`.
pub fn initialize_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS doctypes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS fields (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            doctype_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            label TEXT NOT NULL,
            required BOOLEAN NOT NULL DEFAULT 0,
            FOREIGN KEY (doctype_id) REFERENCES doctypes(id)
        );

        CREATE TABLE IF NOT EXISTS permissions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            doctype_id INTEGER,
            permission TEXT NOT NULL,
            FOREIGN KEY (doctype_id) REFERENCES doctypes(id)
        );

        CREATE TABLE IF NOT EXISTS field_permissions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            field_id INTEGER NOT NULL,
            permission TEXT NOT NULL,
            FOREIGN KEY (field_id) REFERENCES fields(id)
        );

        CREATE TABLE IF NOT EXISTS doctype_permissions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            doctype_id INTEGER NOT NULL,
            permission TEXT NOT NULL,
            FOREIGN KEY (doctype_id) REFERENCES doctypes(id)
        );

        CREATE INDEX IF NOT EXISTS idx_fields_doctype ON fields(doctype_id);
        CREATE INDEX IF NOT EXISTS idx_field_permissions_field ON field_permissions(field_id);
        CREATE INDEX IF NOT EXISTS idx_doctype_permissions_doctype ON doctype_permissions(doctype_id);

        BEGIN;
        INSERT INTO doctype_permissions (doctype_id, permission)
            SELECT doctype_id, permission FROM permissions
            WHERE doctype_id IS NOT NULL ORDER BY id;
        DELETE FROM permissions;
        COMMIT;
        ",
    )?;
    Ok(())
}

/// Read/write access to the doctype catalog over a borrowed connection.
///
/// Borrowing lets the same code run against a plain connection or inside the
/// synchronizer's transaction (`Transaction` derefs to `Connection`).
pub struct Catalog<'c> {
    conn: &'c Connection,
}

impl<'c> Catalog<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Catalog { conn }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// All doctypes in catalog order, fully hydrated.
    pub fn list_doctypes(&self) -> Result<Vec<Doctype>> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM doctypes ORDER BY id")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;

        let mut doctypes = Vec::new();
        for row in rows {
            let (id, name) = row?;
            doctypes.push(self.hydrate(id, name)?);
        }
        Ok(doctypes)
    }

    pub fn get_doctype_by_name(&self, name: &str) -> Result<Doctype> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM doctypes WHERE name = ?1",
                params![name],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .ok_or_else(|| MetadocError::not_found("doctype", name))?;
        self.hydrate(id, name.to_string())
    }

    pub fn get_doctype_by_id(&self, id: i64) -> Result<Doctype> {
        let name = self
            .conn
            .query_row(
                "SELECT name FROM doctypes WHERE id = ?1",
                params![id],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .ok_or_else(|| MetadocError::not_found("doctype", id))?;
        self.hydrate(id, name)
    }

    /// Whether another doctype already uses `name`. Compared without case,
    /// because SQLite table names are case-insensitive.
    pub fn name_taken(&self, name: &str, except_id: Option<i64>) -> Result<bool> {
        let taken = self
            .conn
            .query_row(
                "SELECT 1 FROM doctypes WHERE name = ?1 COLLATE NOCASE AND id IS NOT ?2 LIMIT 1",
                params![name, except_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(taken.is_some())
    }

    pub fn get_fields(&self, doctype_id: i64) -> Result<Vec<Field>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, type, label, required FROM fields WHERE doctype_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![doctype_id], |row| {
            Ok(Field {
                id: Some(row.get(0)?),
                doctype_id: Some(doctype_id),
                name: row.get(1)?,
                field_type: FieldType::parse(&row.get::<_, String>(2)?),
                label: row.get(3)?,
                required: row.get(4)?,
                permissions: Vec::new(),
            })
        })?;

        let mut fields = Vec::new();
        for row in rows {
            let mut field = row?;
            if let Some(field_id) = field.id {
                field.permissions = self.get_field_permissions(field_id)?;
            }
            fields.push(field);
        }
        Ok(fields)
    }

    pub fn get_field_permissions(&self, field_id: i64) -> Result<Vec<String>> {
        self.strings(
            "SELECT permission FROM field_permissions WHERE field_id = ?1 ORDER BY id",
            field_id,
        )
    }

    pub fn get_permissions(&self, doctype_id: i64) -> Result<Vec<String>> {
        self.strings(
            "SELECT permission FROM doctype_permissions WHERE doctype_id = ?1 ORDER BY id",
            doctype_id,
        )
    }

    fn strings(&self, sql: &str, key: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn hydrate(&self, id: i64, name: String) -> Result<Doctype> {
        Ok(Doctype {
            id: Some(id),
            name,
            fields: self.get_fields(id)?,
            permissions: self.get_permissions(id)?,
        })
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Insert the catalog row for a new doctype and return its id.
    pub fn insert_doctype(&self, name: &str) -> Result<i64> {
        match self
            .conn
            .execute("INSERT INTO doctypes (name) VALUES (?1)", params![name])
        {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(MetadocError::DuplicateName(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn rename_doctype(&self, id: i64, new_name: &str) -> Result<()> {
        match self.conn.execute(
            "UPDATE doctypes SET name = ?1 WHERE id = ?2",
            params![new_name, id],
        ) {
            Ok(0) => Err(MetadocError::not_found("doctype", id)),
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(MetadocError::DuplicateName(new_name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace every field row (and its permissions) of a doctype.
    pub fn replace_fields(&self, doctype_id: i64, fields: &[Field]) -> Result<()> {
        self.conn.execute(
            "DELETE FROM field_permissions WHERE field_id IN (SELECT id FROM fields WHERE doctype_id = ?1)",
            params![doctype_id],
        )?;
        self.conn
            .execute("DELETE FROM fields WHERE doctype_id = ?1", params![doctype_id])?;

        for field in fields {
            self.conn.execute(
                "INSERT INTO fields (doctype_id, name, type, label, required) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    doctype_id,
                    field.name,
                    field.field_type.as_str(),
                    field.label,
                    field.required
                ],
            )?;
            let field_id = self.conn.last_insert_rowid();

            for permission in &field.permissions {
                self.conn.execute(
                    "INSERT INTO field_permissions (field_id, permission) VALUES (?1, ?2)",
                    params![field_id, permission],
                )?;
            }
        }
        Ok(())
    }

    pub fn replace_permissions(&self, doctype_id: i64, permissions: &[String]) -> Result<()> {
        self.conn.execute(
            "DELETE FROM doctype_permissions WHERE doctype_id = ?1",
            params![doctype_id],
        )?;
        for permission in permissions {
            self.conn.execute(
                "INSERT INTO doctype_permissions (doctype_id, permission) VALUES (?1, ?2)",
                params![doctype_id, permission],
            )?;
        }
        Ok(())
    }
}
