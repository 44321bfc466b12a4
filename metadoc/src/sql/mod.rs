//! SQL text for the dynamic per-doctype tables.
//!
//! Table and column names are the only runtime values ever interpolated into
//! statement text. Every one of them passes through [`quote_ident`], which
//! rejects anything outside `[A-Za-z_][A-Za-z0-9_]*`. Values are always bound.

use crate::error::{MetadocError, Result};
use crate::schema::{Field, StorageType};
use regex::Regex;
use std::sync::OnceLock;

const MAX_IDENT_LEN: usize = 64;

/// Names of the catalog tables. No doctype may shadow one of these.
pub const CATALOG_TABLES: &[&str] = &[
    "doctypes",
    "fields",
    "permissions",
    "field_permissions",
    "doctype_permissions",
];

/// Prefix for the shadow table used while rebuilding a table.
pub(crate) const REBUILD_PREFIX: &str = "_metadoc_rebuild_";

fn ident_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"))
}

/// Check that `name` can be embedded in SQL text as a table or column name.
pub fn validate_ident(name: &str) -> Result<()> {
    let invalid = |reason: &str| MetadocError::InvalidIdentifier {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.len() > MAX_IDENT_LEN {
        return Err(invalid("longer than 64 characters"));
    }
    if !ident_pattern().is_match(name) {
        return Err(invalid(
            "only ASCII letters, digits and '_' are allowed, and it must not start with a digit",
        ));
    }
    let lower = name.to_ascii_lowercase();
    if lower.starts_with("sqlite_") || lower.starts_with("_metadoc_") {
        return Err(invalid("prefix is reserved"));
    }
    Ok(())
}

/// Validate and double-quote an identifier.
pub fn quote_ident(name: &str) -> Result<String> {
    validate_ident(name)?;
    Ok(format!("\"{name}\""))
}

fn column_defs(fields: &[Field]) -> Result<String> {
    let mut sql = String::from("id INTEGER PRIMARY KEY AUTOINCREMENT");
    for field in fields {
        sql.push_str(&format!(
            ", {} {}",
            quote_ident(&field.name)?,
            field.storage_type().as_sql()
        ));
    }
    Ok(sql)
}

fn quoted_list(columns: &[&str]) -> Result<Vec<String>> {
    columns.iter().map(|c| quote_ident(c)).collect()
}

// ── DDL ──────────────────────────────────────────────────────────

pub fn create_table(table: &str, fields: &[Field]) -> Result<String> {
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(table)?,
        column_defs(fields)?
    ))
}

/// Statements renaming `from` to `to`. SQLite treats a rename that only
/// changes letter case as a clash, so that goes through an interim name.
pub fn rename_table(from: &str, to: &str) -> Result<Vec<String>> {
    let (quoted_from, quoted_to) = (quote_ident(from)?, quote_ident(to)?);
    if from.eq_ignore_ascii_case(to) {
        let interim = format!("\"{REBUILD_PREFIX}{to}\"");
        return Ok(vec![
            format!("ALTER TABLE {quoted_from} RENAME TO {interim}"),
            format!("ALTER TABLE {interim} RENAME TO {quoted_to}"),
        ]);
    }
    Ok(vec![format!("ALTER TABLE {quoted_from} RENAME TO {quoted_to}")])
}

pub fn add_column(table: &str, column: &str, storage: StorageType) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_ident(table)?,
        quote_ident(column)?,
        storage.as_sql()
    ))
}

pub fn drop_column(table: &str, column: &str) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} DROP COLUMN {}",
        quote_ident(table)?,
        quote_ident(column)?
    ))
}

/// Statements that rebuild `table` with the column types of `fields`.
///
/// SQLite has no in-place column type change, so the rows are copied into a
/// shadow table which then replaces the original. Every field in `fields`
/// must already exist as a column of `table`. The shadow takes over the
/// original's `sqlite_sequence` entry so ids of deleted rows stay retired.
pub fn rebuild_table(table: &str, fields: &[Field]) -> Result<Vec<String>> {
    validate_ident(table)?;
    let shadow = format!("\"{REBUILD_PREFIX}{table}\"");
    let quoted = quote_ident(table)?;
    // Validated identifiers cannot contain a quote, so they are safe as literals
    let shadow_name = format!("'{REBUILD_PREFIX}{table}'");
    let table_name = format!("'{table}'");

    let mut columns = vec!["id".to_string()];
    for field in fields {
        columns.push(quote_ident(&field.name)?);
    }
    let columns = columns.join(", ");

    Ok(vec![
        format!("CREATE TABLE {shadow} ({})", column_defs(fields)?),
        format!("INSERT INTO {shadow} ({columns}) SELECT {columns} FROM {quoted}"),
        format!("DELETE FROM sqlite_sequence WHERE name = {shadow_name}"),
        format!(
            "INSERT INTO sqlite_sequence (name, seq) \
             SELECT {shadow_name}, seq FROM sqlite_sequence WHERE name = {table_name}"
        ),
        format!("DROP TABLE {quoted}"),
        format!("ALTER TABLE {shadow} RENAME TO {quoted}"),
    ])
}

// ── DML ──────────────────────────────────────────────────────────

pub fn select_all(table: &str, columns: &[&str]) -> Result<String> {
    let mut projection = vec!["id".to_string()];
    projection.extend(quoted_list(columns)?);
    Ok(format!(
        "SELECT {} FROM {} ORDER BY id",
        projection.join(", "),
        quote_ident(table)?
    ))
}

pub fn select_by_id(table: &str, columns: &[&str]) -> Result<String> {
    let mut projection = vec!["id".to_string()];
    projection.extend(quoted_list(columns)?);
    Ok(format!(
        "SELECT {} FROM {} WHERE id = ?",
        projection.join(", "),
        quote_ident(table)?
    ))
}

pub fn insert(table: &str, columns: &[&str]) -> Result<String> {
    let table = quote_ident(table)?;
    if columns.is_empty() {
        return Ok(format!("INSERT INTO {table} DEFAULT VALUES"));
    }
    let placeholders = vec!["?"; columns.len()].join(", ");
    Ok(format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders})",
        quoted_list(columns)?.join(", ")
    ))
}

/// `UPDATE .. SET col = ?, .. WHERE id = ?`; the id is the last parameter.
pub fn update(table: &str, columns: &[&str]) -> Result<String> {
    let assignments: Vec<String> = quoted_list(columns)?
        .into_iter()
        .map(|c| format!("{c} = ?"))
        .collect();
    Ok(format!(
        "UPDATE {} SET {} WHERE id = ?",
        quote_ident(table)?,
        assignments.join(", ")
    ))
}

pub fn delete(table: &str) -> Result<String> {
    Ok(format!("DELETE FROM {} WHERE id = ?", quote_ident(table)?))
}

pub fn count(table: &str) -> Result<String> {
    Ok(format!("SELECT COUNT(*) FROM {}", quote_ident(table)?))
}
