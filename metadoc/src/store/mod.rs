use crate::bootstrap::{self, SeedOptions, SeedReport};
use crate::catalog::{self, Catalog};
use crate::config::StoreConfig;
use crate::document::{Data, Document, Value};
use crate::error::{MetadocError, Result};
use crate::migration::SchemaChange;
use crate::schema::Doctype;
use crate::sql;
use crate::sync::SchemaSync;
use crate::validation;
use log::{debug, info};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

/// The main entry point for metadoc.
/// Owns the SQLite connection and hands out the catalog, synchronizer and
/// per-doctype collection handles that borrow it.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) a store in the given database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        info!("Opened metadoc store at {}", path.display());
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// A private store that disappears when dropped.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    /// Open the configured database and seed the built-in doctypes if
    /// seeding is enabled.
    pub fn open_with_config(config: &StoreConfig) -> Result<Self> {
        let store = Self::open(&config.database)?;
        if config.seed {
            store.seed(&config.seed_options())?;
        }
        Ok(store)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        catalog::initialize_tables(&conn)?;
        Ok(Store { conn, path })
    }

    /// Ensure the built-in Role and User doctypes and their default records.
    pub fn seed(&self, options: &SeedOptions) -> Result<SeedReport> {
        let report = bootstrap::seed(self, options)?;
        if !report.is_empty() {
            info!("Seeded store: {}", report.summary());
        }
        Ok(report)
    }

    /// Database file path, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn catalog(&self) -> Catalog<'_> {
        Catalog::new(&self.conn)
    }

    fn sync(&self) -> SchemaSync<'_> {
        SchemaSync::new(&self.conn)
    }

    // ── Doctypes ─────────────────────────────────────────────────────

    pub fn list_doctypes(&self) -> Result<Vec<Doctype>> {
        self.catalog().list_doctypes()
    }

    pub fn get_doctype_by_name(&self, name: &str) -> Result<Doctype> {
        self.catalog().get_doctype_by_name(name)
    }

    pub fn get_doctype_by_id(&self, id: i64) -> Result<Doctype> {
        self.catalog().get_doctype_by_id(id)
    }

    /// Register a doctype and create its table in one transaction.
    pub fn create_doctype(&self, doctype: &Doctype) -> Result<Doctype> {
        self.sync().create(doctype)
    }

    /// Reconcile a stored doctype (found by `doctype.id`) with `doctype`.
    pub fn update_doctype(&self, doctype: &Doctype) -> Result<Vec<SchemaChange>> {
        self.sync().update(doctype)
    }

    /// What `update_doctype` would change, without applying it.
    pub fn plan_doctype_update(&self, doctype: &Doctype) -> Result<Vec<SchemaChange>> {
        self.sync().plan(doctype)
    }

    // ── Documents ────────────────────────────────────────────────────

    /// Get a handle to the documents of one doctype.
    pub fn collection(&self, name: &str) -> Result<Collection<'_>> {
        self.get_doctype_by_name(name)?;
        Ok(Collection {
            store: self,
            name: name.to_string(),
        })
    }

    pub fn list_documents(&self, doctype: &str) -> Result<Vec<Document>> {
        self.collection(doctype)?.list()
    }

    pub fn get_document(&self, doctype: &str, id: i64) -> Result<Document> {
        self.collection(doctype)?.get(id)
    }

    /// Insert a document. Returns it with the assigned id and only the
    /// declared fields that were written.
    pub fn create_document(&self, doc: &Document) -> Result<Document> {
        self.collection(&doc.doctype)?.insert(&doc.data)
    }

    pub fn update_document(&self, doc: &Document) -> Result<()> {
        let id = doc.id.ok_or_else(|| {
            MetadocError::Validation(format!(
                "Cannot update a '{}' document without an id",
                doc.doctype
            ))
        })?;
        self.collection(&doc.doctype)?.update(id, &doc.data)
    }

    pub fn delete_document(&self, doctype: &str, id: i64) -> Result<()> {
        self.collection(doctype)?.delete(id)
    }

    // ── Reporting ────────────────────────────────────────────────────

    /// Check stored documents against their doctypes. Limited to one
    /// doctype when `doctype` is given.
    pub fn validate(&self, doctype: Option<&str>) -> Result<serde_json::Value> {
        let doctypes = match doctype {
            Some(name) => vec![self.get_doctype_by_name(name)?],
            None => self.list_doctypes()?,
        };

        let mut results = serde_json::Map::new();
        for doctype in &doctypes {
            let docs = self.collection(&doctype.name)?.list()?;
            let mut issues = Vec::new();

            for doc in &docs {
                let report = validation::validate_document(doctype, &doc.data);
                if !report.is_ok() || report.has_warnings() {
                    issues.push(serde_json::json!({
                        "id": doc.id,
                        "errors": report.errors,
                        "warnings": report.warnings,
                    }));
                }
            }

            results.insert(
                doctype.name.clone(),
                serde_json::json!({
                    "total": docs.len(),
                    "issues": issues,
                }),
            );
        }

        Ok(serde_json::Value::Object(results))
    }

    /// Database location and per-doctype document counts and fields.
    pub fn status(&self) -> Result<serde_json::Value> {
        let mut doctypes = serde_json::Map::new();
        for doctype in self.list_doctypes()? {
            let count = self.collection(&doctype.name)?.count()?;
            doctypes.insert(
                doctype.name.clone(),
                serde_json::json!({
                    "id": doctype.id,
                    "count": count,
                    "fields": doctype.field_names(),
                    "permissions": doctype.permissions,
                }),
            );
        }

        let database = match &self.path {
            Some(path) => path.display().to_string(),
            None => ":memory:".to_string(),
        };
        Ok(serde_json::json!({
            "database": database,
            "doctypes": doctypes,
        }))
    }
}

/// A handle to the documents of one doctype.
///
/// The doctype is looked up again on every call, so a handle stays valid
/// across schema updates (but not across a rename).
#[derive(Debug)]
pub struct Collection<'a> {
    store: &'a Store,
    name: String,
}

impl<'a> Collection<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn doctype(&self) -> Result<Doctype> {
        self.store.get_doctype_by_name(&self.name)
    }

    fn conn(&self) -> &Connection {
        &self.store.conn
    }

    /// All documents, in id order.
    pub fn list(&self) -> Result<Vec<Document>> {
        let doctype = self.doctype()?;
        let columns = doctype.field_names();
        let query = sql::select_all(&doctype.name, &columns)?;
        debug!("{query}");

        let mut stmt = self.conn().prepare(&query)?;
        let rows = stmt.query_map([], |row| read_row(row, &doctype.name, &columns))?;

        let mut docs = Vec::new();
        for row in rows {
            docs.push(row?);
        }
        Ok(docs)
    }

    /// Get a document by id
    pub fn get(&self, id: i64) -> Result<Document> {
        let doctype = self.doctype()?;
        let columns = doctype.field_names();
        let query = sql::select_by_id(&doctype.name, &columns)?;
        debug!("{query}");

        self.conn()
            .query_row(&query, params![id], |row| {
                read_row(row, &doctype.name, &columns)
            })
            .optional()?
            .ok_or_else(|| MetadocError::not_found(doctype.name.as_str(), id))
    }

    /// Insert a document built from the declared fields present in `data`.
    pub fn insert(&self, data: &Data) -> Result<Document> {
        let doctype = self.doctype()?;
        let (columns, values) = declared_values(&doctype, data);
        let query = sql::insert(&doctype.name, &columns)?;
        debug!("{query}");

        self.conn().execute(&query, params_from_iter(values.iter()))?;
        let id = self.conn().last_insert_rowid();

        Ok(Document {
            id: Some(id),
            doctype: doctype.name.clone(),
            data: columns
                .iter()
                .zip(values)
                .map(|(column, value)| (column.to_string(), value.clone()))
                .collect(),
        })
    }

    /// Overwrite the declared fields present in `data`. Succeeds even when
    /// no row has this id.
    pub fn update(&self, id: i64, data: &Data) -> Result<()> {
        let id_value = Value::Integer(id);
        let doctype = self.doctype()?;
        let (columns, mut values) = declared_values(&doctype, data);
        if columns.is_empty() {
            debug!("Nothing to update for {}/{id}", doctype.name);
            return Ok(());
        }

        let query = sql::update(&doctype.name, &columns)?;
        debug!("{query}");
        values.push(&id_value);

        let changed = self.conn().execute(&query, params_from_iter(values.iter()))?;
        if changed == 0 {
            debug!("Update matched no row for {}/{id}", doctype.name);
        }
        Ok(())
    }

    /// Delete a document. Succeeds even when no row has this id.
    pub fn delete(&self, id: i64) -> Result<()> {
        let doctype = self.doctype()?;
        let query = sql::delete(&doctype.name)?;
        debug!("{query}");

        let changed = self.conn().execute(&query, params![id])?;
        if changed == 0 {
            debug!("Delete matched no row for {}/{id}", doctype.name);
        }
        Ok(())
    }

    pub fn count(&self) -> Result<i64> {
        let doctype = self.doctype()?;
        let query = sql::count(&doctype.name)?;
        Ok(self.conn().query_row(&query, [], |row| row.get(0))?)
    }
}

/// The declared fields present in `data`, in declaration order, with their
/// values. Undeclared keys are left out.
fn declared_values<'d>(doctype: &'d Doctype, data: &'d Data) -> (Vec<&'d str>, Vec<&'d Value>) {
    doctype
        .fields
        .iter()
        .filter_map(|field| {
            data.get(&field.name)
                .map(|value| (field.name.as_str(), value))
        })
        .unzip()
}

fn read_row(row: &Row<'_>, doctype: &str, columns: &[&str]) -> rusqlite::Result<Document> {
    let mut data = Data::new();
    for (i, column) in columns.iter().enumerate() {
        let value: SqlValue = row.get(i + 1)?;
        data.insert(column.to_string(), Value::from(value));
    }
    Ok(Document {
        id: Some(row.get(0)?),
        doctype: doctype.to_string(),
        data,
    })
}
