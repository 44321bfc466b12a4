use crate::document::{Data, Value};
use crate::error::{MetadocError, Result};
use crate::schema::{Doctype, Field, FieldType};
use crate::sql::{self, CATALOG_TABLES};
use serde::Serialize;
use std::collections::HashSet;

// ── Doctype definitions ──────────────────────────────────────────

/// Check a doctype definition before any SQL is generated from it.
///
/// Names are compared without case, matching how SQLite resolves table and
/// column names.
pub fn validate_doctype(doctype: &Doctype) -> Result<()> {
    sql::validate_ident(&doctype.name)?;

    let lower = doctype.name.to_ascii_lowercase();
    if CATALOG_TABLES.contains(&lower.as_str()) {
        return Err(MetadocError::InvalidIdentifier {
            name: doctype.name.clone(),
            reason: "collides with a catalog table".into(),
        });
    }

    let mut seen = HashSet::new();
    for field in &doctype.fields {
        validate_field(field)?;
        if !seen.insert(field.name.to_ascii_lowercase()) {
            return Err(MetadocError::Validation(format!(
                "Doctype '{}' declares field '{}' more than once",
                doctype.name, field.name
            )));
        }
    }
    Ok(())
}

fn validate_field(field: &Field) -> Result<()> {
    sql::validate_ident(&field.name)?;
    if field.name.eq_ignore_ascii_case("id") {
        return Err(MetadocError::InvalidIdentifier {
            name: field.name.clone(),
            reason: "'id' is the primary key column".into(),
        });
    }
    Ok(())
}

// ── Documents ────────────────────────────────────────────────────

/// Result of validating a document
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Report how a document's data lines up with its doctype.
///
/// Purely advisory: the accessor never rejects a write because of it.
/// Missing required values are errors; kind mismatches and undeclared keys
/// are warnings.
pub fn validate_document(doctype: &Doctype, data: &Data) -> ValidationResult {
    let mut result = ValidationResult::default();

    for field in &doctype.fields {
        match data.get(&field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    result
                        .errors
                        .push(format!("Required field '{}' is missing", field.name));
                }
            }
            Some(value) => {
                if !fits(&field.field_type, value) {
                    result.warnings.push(format!(
                        "Field '{}' expects {}, got {}",
                        field.name,
                        field.field_type,
                        kind(value)
                    ));
                }
            }
        }
    }

    for key in data.keys() {
        if key != "id" && doctype.field(key).is_none() {
            result
                .warnings
                .push(format!("Unexpected field '{key}' is not declared and will be ignored"));
        }
    }

    result
}

fn fits(field_type: &FieldType, value: &Value) -> bool {
    match field_type {
        FieldType::Integer => matches!(value, Value::Integer(_)),
        FieldType::Float => matches!(value, Value::Integer(_) | Value::Real(_)),
        FieldType::Boolean => value.as_bool().is_some(),
        FieldType::String
        | FieldType::Text
        | FieldType::Date
        | FieldType::Datetime
        | FieldType::Select => matches!(value, Value::Text(_)),
        FieldType::Custom(_) => true,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Integer(_) => "integer",
        Value::Real(_) => "float",
        Value::Text(_) => "text",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn task() -> Doctype {
        Doctype::new("Task")
            .with_field(Field::new("title", FieldType::String).required())
            .with_field(Field::new("done", FieldType::Boolean))
            .with_field(Field::new("estimate", FieldType::Float))
    }

    #[test]
    fn test_valid_doctype() {
        assert!(validate_doctype(&task()).is_ok());
        assert!(validate_doctype(&Doctype::new("Empty")).is_ok());
    }

    #[test]
    fn test_rejects_catalog_table_names() {
        for name in ["doctypes", "Fields", "DOCTYPE_PERMISSIONS"] {
            assert!(matches!(
                validate_doctype(&Doctype::new(name)),
                Err(MetadocError::InvalidIdentifier { .. })
            ));
        }
    }

    #[test]
    fn test_rejects_bad_doctype_name() {
        let err = validate_doctype(&Doctype::new("Task; DROP TABLE doctypes")).unwrap_err();
        assert!(matches!(err, MetadocError::InvalidIdentifier { .. }));
        assert!(validate_doctype(&Doctype::new("")).is_err());
    }

    #[test]
    fn test_rejects_id_field() {
        let doctype = Doctype::new("Task").with_field(Field::new("ID", FieldType::Integer));
        assert!(matches!(
            validate_doctype(&doctype),
            Err(MetadocError::InvalidIdentifier { name, .. }) if name == "ID"
        ));
    }

    #[test]
    fn test_rejects_duplicate_fields_ignoring_case() {
        let doctype = task().with_field(Field::new("Title", FieldType::Text));
        assert!(matches!(
            validate_doctype(&doctype),
            Err(MetadocError::Validation(msg)) if msg.contains("'Title'")
        ));
    }

    #[test]
    fn test_valid_document() {
        let doc = Document::new("Task")
            .set("title", "write tests")
            .set("done", false)
            .set("estimate", 2);
        let result = validate_document(&task(), &doc.data);
        assert!(result.is_ok());
        assert!(!result.has_warnings());
    }

    #[test]
    fn test_missing_required_field() {
        let doc = Document::new("Task").set("title", Value::Null);
        let result = validate_document(&task(), &doc.data);
        assert!(!result.is_ok());
        assert_eq!(result.errors, vec!["Required field 'title' is missing"]);
    }

    #[test]
    fn test_stored_booleans_are_accepted() {
        let doc = Document::new("Task").set("title", "x").set("done", 1);
        assert!(!validate_document(&task(), &doc.data).has_warnings());
    }

    #[test]
    fn test_kind_mismatch_and_undeclared_keys_warn() {
        let doc = Document::new("Task")
            .set("title", 42)
            .set("estimate", "soon")
            .set("priority", "high");
        let result = validate_document(&task(), &doc.data);
        assert!(result.is_ok());
        assert_eq!(
            result.warnings,
            vec![
                "Field 'title' expects string, got integer",
                "Field 'estimate' expects float, got text",
                "Unexpected field 'priority' is not declared and will be ignored",
            ]
        );
    }
}
