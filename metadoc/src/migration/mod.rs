use crate::schema::{Doctype, Field, StorageType};

/// A single structural change to a doctype's live table.
///
/// Column changes always name the table by its post-rename name.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaChange {
    RenameTable {
        from: String,
        to: String,
    },
    AddColumn {
        table: String,
        column: String,
        storage: StorageType,
    },
    AlterColumnType {
        table: String,
        column: String,
        from: StorageType,
        to: StorageType,
    },
    DropColumn {
        table: String,
        column: String,
    },
}

impl SchemaChange {
    /// Whether applying this change can lose stored data.
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            SchemaChange::DropColumn { .. } | SchemaChange::AlterColumnType { .. }
        )
    }

    /// Human-readable description of this change.
    pub fn describe(&self) -> String {
        match self {
            SchemaChange::RenameTable { from, to } => {
                format!("Table '{}' renamed to '{}'", from, to)
            }
            SchemaChange::AddColumn { table, column, storage } => {
                format!("Column '{}.{}' added ({})", table, column, storage)
            }
            SchemaChange::AlterColumnType { table, column, from, to } => {
                format!(
                    "Column '{}.{}' type changed {} -> {} (table rebuild)",
                    table, column, from, to
                )
            }
            SchemaChange::DropColumn { table, column } => {
                format!("Column '{}.{}' dropped (data discarded)", table, column)
            }
        }
    }
}

/// Compare the stored and desired definitions of one doctype.
///
/// Fields are matched purely by name, ignoring ASCII case the way SQLite
/// resolves column names: a renamed field shows up as a drop of the old
/// column plus an add of the new one, while a change of case alone is a
/// catalog edit. Label, required flag and permission edits never produce a
/// change.
///
/// Order: rename first, then add/alter in the desired field order, then drops
/// in the stored field order.
pub fn diff_doctypes(old: &Doctype, new: &Doctype) -> Vec<SchemaChange> {
    let mut changes = Vec::new();
    let table = new.name.clone();

    if old.name != new.name {
        changes.push(SchemaChange::RenameTable {
            from: old.name.clone(),
            to: new.name.clone(),
        });
    }

    for field in &new.fields {
        match matching_field(old, &field.name) {
            None => changes.push(SchemaChange::AddColumn {
                table: table.clone(),
                column: field.name.clone(),
                storage: field.storage_type(),
            }),
            Some(existing) if existing.storage_type() != field.storage_type() => {
                changes.push(SchemaChange::AlterColumnType {
                    table: table.clone(),
                    column: field.name.clone(),
                    from: existing.storage_type(),
                    to: field.storage_type(),
                })
            }
            Some(_) => {}
        }
    }

    for field in &old.fields {
        if matching_field(new, &field.name).is_none() {
            changes.push(SchemaChange::DropColumn {
                table: table.clone(),
                column: field.name.clone(),
            });
        }
    }

    changes
}

fn matching_field<'d>(doctype: &'d Doctype, name: &str) -> Option<&'d Field> {
    doctype
        .fields
        .iter()
        .find(|f| f.name.eq_ignore_ascii_case(name))
}

/// The destructive subset of a plan, for confirmation prompts.
pub fn destructive_changes(changes: &[SchemaChange]) -> Vec<&SchemaChange> {
    changes.iter().filter(|c| c.is_destructive()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_doctype_str;
    use pretty_assertions::assert_eq;

    fn task() -> Doctype {
        parse_doctype_str(
            r#"
name: Task
fields:
  - { name: title, type: string, label: Title, required: true }
  - { name: done, type: boolean }
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_diff_no_changes() {
        assert!(diff_doctypes(&task(), &task()).is_empty());
    }

    #[test]
    fn test_catalog_only_edits_produce_no_changes() {
        let mut new = task();
        new.fields[0].label = "Headline".into();
        new.fields[0].required = false;
        new.fields[1].permissions = vec!["admin".into()];
        new.permissions = vec!["user".into()];
        assert!(diff_doctypes(&task(), &new).is_empty());
    }

    #[test]
    fn test_diff_new_field() {
        let new = parse_doctype_str(
            r#"
name: Task
fields:
  - { name: title, type: string }
  - { name: done, type: boolean }
  - { name: estimate, type: float }
"#,
        )
        .unwrap();
        assert_eq!(
            diff_doctypes(&task(), &new),
            vec![SchemaChange::AddColumn {
                table: "Task".into(),
                column: "estimate".into(),
                storage: StorageType::Real,
            }]
        );
    }

    #[test]
    fn test_diff_removed_field() {
        let new = parse_doctype_str("name: Task\nfields:\n  - { name: title, type: string }\n").unwrap();
        let diffs = diff_doctypes(&task(), &new);
        assert_eq!(
            diffs,
            vec![SchemaChange::DropColumn {
                table: "Task".into(),
                column: "done".into(),
            }]
        );
        assert!(diffs[0].is_destructive());
    }

    #[test]
    fn test_diff_type_change_compares_storage_types() {
        // string -> text keeps TEXT storage
        let same_storage = parse_doctype_str(
            "name: Task\nfields:\n  - { name: title, type: text }\n  - { name: done, type: boolean }\n",
        )
        .unwrap();
        assert!(diff_doctypes(&task(), &same_storage).is_empty());

        // boolean -> datetime moves INTEGER -> TEXT
        let changed = parse_doctype_str(
            "name: Task\nfields:\n  - { name: title, type: string }\n  - { name: done, type: datetime }\n",
        )
        .unwrap();
        assert_eq!(
            diff_doctypes(&task(), &changed),
            vec![SchemaChange::AlterColumnType {
                table: "Task".into(),
                column: "done".into(),
                from: StorageType::Integer,
                to: StorageType::Text,
            }]
        );
    }

    #[test]
    fn test_field_rename_is_drop_plus_add() {
        let new = parse_doctype_str(
            "name: Task\nfields:\n  - { name: heading, type: string }\n  - { name: done, type: boolean }\n",
        )
        .unwrap();
        assert_eq!(
            diff_doctypes(&task(), &new),
            vec![
                SchemaChange::AddColumn {
                    table: "Task".into(),
                    column: "heading".into(),
                    storage: StorageType::Text,
                },
                SchemaChange::DropColumn {
                    table: "Task".into(),
                    column: "title".into(),
                },
            ]
        );
    }

    #[test]
    fn test_field_case_change_is_catalog_only() {
        let mut new = task();
        new.fields[0].name = "Title".into();
        assert!(diff_doctypes(&task(), &new).is_empty());

        // A type change is still caught under the new spelling
        new.fields[1].name = "DONE".into();
        new.fields[1].field_type = crate::schema::FieldType::Text;
        assert_eq!(
            diff_doctypes(&task(), &new),
            vec![SchemaChange::AlterColumnType {
                table: "Task".into(),
                column: "DONE".into(),
                from: StorageType::Integer,
                to: StorageType::Text,
            }]
        );
    }

    #[test]
    fn test_rename_comes_first_and_columns_use_new_name() {
        let mut new = task();
        new.name = "Todo".into();
        new.fields.push(crate::schema::Field::new(
            "due",
            crate::schema::FieldType::Date,
        ));

        let diffs = diff_doctypes(&task(), &new);
        assert_eq!(
            diffs[0],
            SchemaChange::RenameTable {
                from: "Task".into(),
                to: "Todo".into(),
            }
        );
        assert!(matches!(&diffs[1], SchemaChange::AddColumn { table, .. } if table == "Todo"));
        assert!(destructive_changes(&diffs).is_empty());
    }

    #[test]
    fn test_destructive_changes_lists_drops_and_rebuilds() {
        let new = parse_doctype_str(
            "name: Task\nfields:\n  - { name: title, type: integer }\n  - { name: due, type: date }\n",
        )
        .unwrap();
        let plan = diff_doctypes(&task(), &new);
        assert_eq!(plan.len(), 3);

        let descriptions: Vec<String> = destructive_changes(&plan)
            .into_iter()
            .map(SchemaChange::describe)
            .collect();
        assert_eq!(
            descriptions,
            vec![
                "Column 'Task.title' type changed TEXT -> INTEGER (table rebuild)",
                "Column 'Task.done' dropped (data discarded)",
            ]
        );
    }

    #[test]
    fn test_describe() {
        let change = SchemaChange::AlterColumnType {
            table: "Task".into(),
            column: "done".into(),
            from: StorageType::Integer,
            to: StorageType::Text,
        };
        assert_eq!(
            change.describe(),
            "Column 'Task.done' type changed INTEGER -> TEXT (table rebuild)"
        );
    }
}
