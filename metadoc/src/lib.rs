pub mod schema;
pub mod sql;
pub mod catalog;
pub mod migration;
pub mod sync;
pub mod document;
pub mod store;
pub mod validation;
pub mod bootstrap;
pub mod config;
pub mod error;

pub use bootstrap::{SeedOptions, SeedReport};
pub use config::StoreConfig;
pub use document::{Data, Document, Value};
pub use error::{MetadocError, Result};
pub use migration::SchemaChange;
pub use schema::{Doctype, Field, FieldType, StorageType};
pub use store::{Collection, Store};
