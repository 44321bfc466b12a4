use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadocError {
    #[error("Not found: {entity}/{key}")]
    NotFound { entity: String, key: String },

    #[error("Doctype '{0}' already exists")]
    DuplicateName(String),

    #[error("Invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Transaction failed ({operation}): {source}")]
    TransactionFailure {
        operation: String,
        #[source]
        source: Box<MetadocError>,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Password hashing error: {0}")]
    Password(#[from] bcrypt::BcryptError),
}

impl MetadocError {
    pub fn not_found(entity: impl Into<String>, key: impl ToString) -> Self {
        MetadocError::NotFound {
            entity: entity.into(),
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MetadocError::NotFound { .. })
    }

    /// Errors that describe the caller's input rather than a storage failure.
    /// These pass through a rolled-back transaction unwrapped.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            MetadocError::NotFound { .. }
                | MetadocError::DuplicateName(_)
                | MetadocError::InvalidIdentifier { .. }
                | MetadocError::Validation(_)
        )
    }

    /// Wrap a storage failure that happened inside an atomic operation.
    pub(crate) fn in_transaction(self, operation: impl Into<String>) -> Self {
        if self.is_domain() {
            return self;
        }
        MetadocError::TransactionFailure {
            operation: operation.into(),
            source: Box::new(self),
        }
    }
}

/// Map an engine rejection (bad DDL, constraint failure) to
/// `ConstraintViolation`, keeping the step that triggered it.
pub(crate) fn rejected(step: impl std::fmt::Display) -> impl FnOnce(rusqlite::Error) -> MetadocError {
    move |err| match err {
        rusqlite::Error::SqliteFailure(e, msg) => MetadocError::ConstraintViolation(format!(
            "{step}: {}",
            msg.unwrap_or_else(|| e.to_string())
        )),
        other => MetadocError::Sqlite(other),
    }
}

pub type Result<T> = std::result::Result<T, MetadocError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_pass_through_transaction() {
        let err = MetadocError::DuplicateName("Task".into()).in_transaction("create doctype");
        assert!(matches!(err, MetadocError::DuplicateName(_)));

        let err = MetadocError::not_found("doctype", 7).in_transaction("update doctype");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_storage_errors_are_wrapped() {
        let err = MetadocError::ConstraintViolation("boom".into()).in_transaction("update doctype 3");
        match err {
            MetadocError::TransactionFailure { operation, source } => {
                assert_eq!(operation, "update doctype 3");
                assert!(matches!(*source, MetadocError::ConstraintViolation(_)));
            }
            other => panic!("Expected TransactionFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_rejected_maps_sqlite_failures() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err = conn
            .execute_batch("ALTER TABLE missing ADD COLUMN x TEXT")
            .map_err(rejected("add column 'x'"))
            .unwrap_err();
        match err {
            MetadocError::ConstraintViolation(msg) => {
                assert!(msg.starts_with("add column 'x': "));
                assert!(msg.contains("missing"));
            }
            other => panic!("Expected ConstraintViolation, got {other:?}"),
        }
    }

    #[test]
    fn test_not_found_display() {
        let err = MetadocError::not_found("Task", 1);
        assert_eq!(err.to_string(), "Not found: Task/1");
    }
}
