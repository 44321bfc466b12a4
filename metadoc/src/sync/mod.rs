//! Keeps live tables in step with catalog definitions.
//!
//! Create and update each run in one explicit transaction covering both the
//! catalog rows and the DDL. Any failure drops the transaction, which rolls
//! everything back, so a failed call leaves neither catalog rows nor tables
//! behind.

use crate::catalog::Catalog;
use crate::error::{rejected, MetadocError, Result};
use crate::migration::{diff_doctypes, SchemaChange};
use crate::schema::Doctype;
use crate::sql;
use crate::validation::validate_doctype;
use log::{debug, info, warn};
use rusqlite::Connection;

pub struct SchemaSync<'c> {
    conn: &'c Connection,
}

impl<'c> SchemaSync<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        SchemaSync { conn }
    }

    /// Register a new doctype and create its table. Returns the stored
    /// definition with catalog ids filled in.
    pub fn create(&self, doctype: &Doctype) -> Result<Doctype> {
        let operation = format!("create doctype '{}'", doctype.name);
        validate_doctype(doctype)?;

        let tx = self.conn.unchecked_transaction()?;
        let created = match create_in(&tx, doctype) {
            Ok(created) => created,
            Err(e) => {
                warn!("Rolling back {operation}: {e}");
                return Err(e.in_transaction(operation));
            }
        };
        tx.commit()
            .map_err(|e| MetadocError::from(e).in_transaction(operation.as_str()))?;

        info!(
            "Created doctype '{}' with {} field(s)",
            created.name,
            created.fields.len()
        );
        Ok(created)
    }

    /// Apply a changed definition to an existing doctype, found by `id`.
    /// Returns the changes that were applied to the live table.
    pub fn update(&self, doctype: &Doctype) -> Result<Vec<SchemaChange>> {
        let id = require_id(doctype)?;
        let operation = format!("update doctype {id}");
        validate_doctype(doctype)?;

        let tx = self.conn.unchecked_transaction()?;
        let changes = match update_in(&tx, id, doctype) {
            Ok(changes) => changes,
            Err(e) => {
                warn!("Rolling back {operation}: {e}");
                return Err(e.in_transaction(operation));
            }
        };
        tx.commit()
            .map_err(|e| MetadocError::from(e).in_transaction(operation.as_str()))?;

        if changes.is_empty() {
            info!("Updated doctype '{}' (catalog only)", doctype.name);
        }
        for change in &changes {
            info!("Updated doctype '{}': {}", doctype.name, change.describe());
        }
        Ok(changes)
    }

    /// The changes `update` would apply, without touching anything.
    pub fn plan(&self, doctype: &Doctype) -> Result<Vec<SchemaChange>> {
        let id = require_id(doctype)?;
        validate_doctype(doctype)?;

        let catalog = Catalog::new(self.conn);
        let original = catalog.get_doctype_by_id(id)?;
        check_rename(&catalog, &original, doctype)?;
        Ok(diff_doctypes(&original, doctype))
    }
}

fn require_id(doctype: &Doctype) -> Result<i64> {
    doctype.id.ok_or_else(|| {
        MetadocError::Validation(format!(
            "Doctype '{}' has no id; only stored doctypes can be updated",
            doctype.name
        ))
    })
}

fn check_rename(catalog: &Catalog<'_>, original: &Doctype, desired: &Doctype) -> Result<()> {
    if original.name != desired.name && catalog.name_taken(&desired.name, original.id)? {
        return Err(MetadocError::DuplicateName(desired.name.clone()));
    }
    Ok(())
}

fn run(conn: &Connection, statement: &str, step: &str) -> Result<()> {
    debug!("{statement}");
    conn.execute_batch(statement).map_err(rejected(step))
}

fn create_in(conn: &Connection, doctype: &Doctype) -> Result<Doctype> {
    let catalog = Catalog::new(conn);
    if catalog.name_taken(&doctype.name, None)? {
        return Err(MetadocError::DuplicateName(doctype.name.clone()));
    }

    let id = catalog.insert_doctype(&doctype.name)?;
    catalog.replace_fields(id, &doctype.fields)?;
    catalog.replace_permissions(id, &doctype.permissions)?;

    let ddl = sql::create_table(&doctype.name, &doctype.fields)?;
    run(conn, &ddl, &format!("create table '{}'", doctype.name))?;

    catalog.get_doctype_by_id(id)
}

fn update_in(conn: &Connection, id: i64, doctype: &Doctype) -> Result<Vec<SchemaChange>> {
    let catalog = Catalog::new(conn);
    let original = catalog.get_doctype_by_id(id)?;
    check_rename(&catalog, &original, doctype)?;

    let changes = diff_doctypes(&original, doctype);
    let mut needs_rebuild = false;

    for change in &changes {
        let step = change.describe();
        match change {
            SchemaChange::RenameTable { from, to } => {
                catalog.rename_doctype(id, to)?;
                for statement in sql::rename_table(from, to)? {
                    run(conn, &statement, &step)?;
                }
            }
            SchemaChange::AddColumn { table, column, storage } => {
                run(conn, &sql::add_column(table, column, *storage)?, &step)?;
            }
            SchemaChange::DropColumn { table, column } => {
                run(conn, &sql::drop_column(table, column)?, &step)?;
            }
            // One rebuild covers every type change, once all columns exist.
            SchemaChange::AlterColumnType { .. } => needs_rebuild = true,
        }
    }

    if needs_rebuild {
        let step = format!("rebuild table '{}'", doctype.name);
        for statement in sql::rebuild_table(&doctype.name, &doctype.fields)? {
            run(conn, &statement, &step)?;
        }
    }

    catalog.replace_fields(id, &doctype.fields)?;
    catalog.replace_permissions(id, &doctype.permissions)?;
    Ok(changes)
}
