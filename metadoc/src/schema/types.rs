use serde::{Deserialize, Serialize};
use std::fmt;

/// A user-defined record schema, backed by one live table named after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctype {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Doctype {
    pub fn new(name: impl Into<String>) -> Self {
        Doctype {
            id: None,
            name: name.into(),
            fields: Vec::new(),
            permissions: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

/// One typed, named attribute of a doctype, backed by one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub doctype_id: Option<i64>,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Field {
    /// A field whose label defaults to its name.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Field {
            id: None,
            doctype_id: None,
            label: name.clone(),
            name,
            field_type,
            required: false,
            permissions: Vec::new(),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    pub fn storage_type(&self) -> StorageType {
        self.field_type.storage_type()
    }
}

/// Field type enumeration. Unrecognised names are kept verbatim in `Custom`
/// and stored as TEXT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    Datetime,
    Select,
    #[serde(untagged)]
    Custom(std::string::String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::String => "string",
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Datetime => "datetime",
            FieldType::Select => "select",
            FieldType::Custom(name) => name,
        }
    }

    /// Parse a catalog `type` column. Never fails.
    pub fn parse(s: &str) -> Self {
        match s {
            "string" => FieldType::String,
            "text" => FieldType::Text,
            "integer" => FieldType::Integer,
            "float" => FieldType::Float,
            "boolean" => FieldType::Boolean,
            "date" => FieldType::Date,
            "datetime" => FieldType::Datetime,
            "select" => FieldType::Select,
            other => FieldType::Custom(other.to_string()),
        }
    }

    pub fn storage_type(&self) -> StorageType {
        storage_type(self.as_str())
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column type used in the live table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    Text,
    Integer,
    Real,
}

impl StorageType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            StorageType::Text => "TEXT",
            StorageType::Integer => "INTEGER",
            StorageType::Real => "REAL",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Map an abstract field type name to its storage column type.
/// Anything unrecognised is TEXT so unknown types never fail table creation.
pub fn storage_type(field_type: &str) -> StorageType {
    match field_type {
        "string" | "text" | "date" | "datetime" | "select" => StorageType::Text,
        "integer" | "boolean" => StorageType::Integer,
        "float" => StorageType::Real,
        _ => StorageType::Text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_type_mapping() {
        assert_eq!(storage_type("string"), StorageType::Text);
        assert_eq!(storage_type("text"), StorageType::Text);
        assert_eq!(storage_type("integer"), StorageType::Integer);
        assert_eq!(storage_type("float"), StorageType::Real);
        assert_eq!(storage_type("boolean"), StorageType::Integer);
        assert_eq!(storage_type("date"), StorageType::Text);
        assert_eq!(storage_type("datetime"), StorageType::Text);
        assert_eq!(storage_type("select"), StorageType::Text);
    }

    #[test]
    fn test_unknown_type_falls_back_to_text() {
        assert_eq!(storage_type("geo_point"), StorageType::Text);
        assert_eq!(storage_type(""), StorageType::Text);
        assert_eq!(FieldType::parse("Integer").storage_type(), StorageType::Text);
    }

    #[test]
    fn test_field_type_parse_roundtrip() {
        for name in ["string", "text", "integer", "float", "boolean", "date", "datetime", "select"] {
            assert_eq!(FieldType::parse(name).as_str(), name);
        }
        assert_eq!(FieldType::parse("color"), FieldType::Custom("color".into()));
    }

    #[test]
    fn test_field_type_deserializes_custom() {
        let ty: FieldType = serde_yaml::from_str("boolean").unwrap();
        assert_eq!(ty, FieldType::Boolean);
        let ty: FieldType = serde_yaml::from_str("rating").unwrap();
        assert_eq!(ty, FieldType::Custom("rating".into()));
        assert_eq!(serde_json::to_string(&FieldType::Float).unwrap(), "\"float\"");
    }

    #[test]
    fn test_field_builder_defaults_label_to_name() {
        let field = Field::new("title", FieldType::String).required();
        assert_eq!(field.label, "title");
        assert!(field.required);
        assert_eq!(field.storage_type(), StorageType::Text);
    }
}
