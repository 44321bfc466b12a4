use crate::error::Result;
use super::types::Doctype;
use std::path::Path;

/// Parse a doctype definition file (YAML or JSON) into a Doctype
pub fn parse_doctype(path: &Path) -> Result<Doctype> {
    let content = std::fs::read_to_string(path)?;
    parse_doctype_str(&content)
}

/// Parse a doctype definition string. JSON input is accepted as YAML.
pub fn parse_doctype_str(content: &str) -> Result<Doctype> {
    let doctype: Doctype = serde_yaml::from_str(content)?;
    Ok(doctype)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    #[test]
    fn test_parse_yaml_definition() {
        let doctype = parse_doctype_str(
            r#"
name: Task
permissions: [admin]
fields:
  - { name: title, type: string, label: Title, required: true }
  - { name: done, type: boolean }
  - { name: weight, type: vector, permissions: [admin, analyst] }
"#,
        )
        .unwrap();

        assert_eq!(doctype.name, "Task");
        assert_eq!(doctype.id, None);
        assert_eq!(doctype.permissions, vec!["admin"]);
        assert_eq!(doctype.field_names(), vec!["title", "done", "weight"]);
        assert!(doctype.fields[0].required);
        assert_eq!(doctype.fields[1].field_type, FieldType::Boolean);
        assert_eq!(doctype.fields[1].label, "");
        assert_eq!(doctype.fields[2].field_type, FieldType::Custom("vector".into()));
        assert_eq!(doctype.fields[2].permissions, vec!["admin", "analyst"]);
    }

    #[test]
    fn test_parse_json_definition() {
        let doctype = parse_doctype_str(
            r#"{"id": 4, "name": "Invoice", "fields": [{"name": "total", "type": "float"}]}"#,
        )
        .unwrap();
        assert_eq!(doctype.id, Some(4));
        assert_eq!(doctype.fields[0].field_type, FieldType::Float);
    }

    #[test]
    fn test_parse_rejects_missing_name() {
        assert!(parse_doctype_str("fields: []").is_err());
    }

    #[test]
    fn test_parse_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("note.yaml");
        std::fs::write(&path, "name: Note\nfields:\n  - { name: body, type: text }\n").unwrap();
        let doctype = parse_doctype(&path).unwrap();
        assert_eq!(doctype.name, "Note");
    }
}
