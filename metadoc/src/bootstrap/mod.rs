// Built-in Role and User doctypes, and the records every fresh store starts with

use crate::document::{Document, Value};
use crate::error::{MetadocError, Result};
use crate::schema::{Doctype, Field, FieldType};
use crate::store::Store;
use serde::Serialize;

pub const ROLE_DOCTYPE: &str = "Role";
pub const USER_DOCTYPE: &str = "User";

const DEFAULT_ROLES: &[(&str, &str)] = &[
    ("Admin", "Administrator role"),
    ("User", "Regular user role"),
    ("Guest", "Guest user role"),
];

#[derive(Debug, Clone)]
pub struct SeedOptions {
    /// bcrypt cost (4..=31)
    pub password_cost: u32,
    pub admin_password: String,
    pub guest_password: String,
}

impl Default for SeedOptions {
    fn default() -> Self {
        SeedOptions {
            password_cost: bcrypt::DEFAULT_COST,
            admin_password: "admin123".to_string(),
            guest_password: "guest123".to_string(),
        }
    }
}

/// What a seeding pass created. Empty when the store was already seeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeedReport {
    pub doctypes: Vec<String>,
    pub roles: Vec<String>,
    pub users: Vec<String>,
}

impl SeedReport {
    pub fn is_empty(&self) -> bool {
        self.doctypes.is_empty() && self.roles.is_empty() && self.users.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} doctype(s), {} role(s), {} user(s)",
            self.doctypes.len(),
            self.roles.len(),
            self.users.len()
        )
    }
}

pub fn role_doctype() -> Doctype {
    Doctype::new(ROLE_DOCTYPE)
        .with_field(Field::new("name", FieldType::String).label("Role Name").required())
        .with_field(Field::new("description", FieldType::String).label("Description"))
        .with_permission("admin")
}

pub fn user_doctype() -> Doctype {
    Doctype::new(USER_DOCTYPE)
        .with_field(Field::new("username", FieldType::String).label("Username").required())
        .with_field(Field::new("password", FieldType::String).label("Password").required())
        .with_field(Field::new("is_admin", FieldType::Boolean).label("Is Admin").required())
        .with_field(Field::new("role", FieldType::String).label("Role").required())
        .with_permission("admin")
}

/// Ensure the built-in doctypes exist, then insert default roles and users
/// into whichever of them is empty. Safe to run on every start.
///
/// A stored doctype whose name differs from a built-in only in case stands
/// in for it, since doctype names are unique regardless of case.
pub fn seed(store: &Store, options: &SeedOptions) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    let roles = ensure_doctype(store, role_doctype(), &mut report)?;
    if store.list_documents(&roles)?.is_empty() {
        for (name, description) in DEFAULT_ROLES {
            store.create_document(
                &Document::new(roles.as_str())
                    .set("name", *name)
                    .set("description", *description),
            )?;
            report.roles.push(name.to_string());
        }
    }

    let users = ensure_doctype(store, user_doctype(), &mut report)?;
    if store.list_documents(&users)?.is_empty() {
        let defaults = [
            ("admin", options.admin_password.as_str(), true, "Admin"),
            ("guest", options.guest_password.as_str(), false, "Guest"),
        ];
        for (username, password, is_admin, role) in defaults {
            let hash = bcrypt::hash(password, options.password_cost)?;
            store.create_document(
                &Document::new(users.as_str())
                    .set("username", username)
                    .set("password", hash)
                    .set("is_admin", is_admin)
                    .set("role", role),
            )?;
            report.users.push(username.to_string());
        }
    }

    Ok(report)
}

/// The user document with the given username.
pub fn find_user(store: &Store, username: &str) -> Result<Document> {
    let users = stored_name(store, USER_DOCTYPE)?
        .ok_or_else(|| MetadocError::not_found("doctype", USER_DOCTYPE))?;
    store
        .list_documents(&users)?
        .into_iter()
        .find(|doc| doc.get("username").and_then(Value::as_str) == Some(username))
        .ok_or_else(|| MetadocError::not_found("user", username))
}

/// The user document with the given id.
pub fn find_user_by_id(store: &Store, id: i64) -> Result<Document> {
    let users = stored_name(store, USER_DOCTYPE)?
        .ok_or_else(|| MetadocError::not_found("doctype", USER_DOCTYPE))?;
    store.get_document(&users, id)
}

/// Name of the stored doctype matching `name` in any case.
fn stored_name(store: &Store, name: &str) -> Result<Option<String>> {
    Ok(store
        .list_doctypes()?
        .into_iter()
        .map(|d| d.name)
        .find(|stored| stored.eq_ignore_ascii_case(name)))
}

fn ensure_doctype(store: &Store, doctype: Doctype, report: &mut SeedReport) -> Result<String> {
    if let Some(existing) = stored_name(store, &doctype.name)? {
        return Ok(existing);
    }
    store.create_doctype(&doctype)?;
    report.doctypes.push(doctype.name.clone());
    Ok(doctype.name)
}
