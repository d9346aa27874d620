pub mod value;
pub mod types;
pub mod schema;
pub mod validation;
pub mod document;
pub mod store;
pub mod model;
pub mod error;

pub use error::{DocModelError, Result};
pub use value::{DocumentRef, Fields, ModelRef, Value};
pub use types::{FieldData, FieldOptions, FieldType, OptionsPatch, TypeKind};
pub use schema::{parse_schema, parse_schema_str, Schema, SchemaRegistry};
pub use validation::{explain, ValidationReport};
pub use document::DocumentSnapshot;
pub use store::{DocumentStore, MemoryStore, StoreConfig, Subscription, Transaction};
pub use model::{Model, ModelKind, ModelSubscription};
