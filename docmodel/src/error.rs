use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocModelError {
    #[error("default value {value} is not compatible with {type_name}")]
    IncompatibleDefault {
        type_name: &'static str,
        value: String,
    },

    #[error("Trying to override non-overridable option '{option}' in {type_name}")]
    NonOverridableOption {
        option: &'static str,
        type_name: &'static str,
    },

    #[error("Attempting to override field '{0}' during extend")]
    DuplicateField(String),

    #[error("Attempting to override {current} field '{field}' with {replacement}")]
    TypeMismatchOverride {
        field: String,
        current: &'static str,
        replacement: &'static str,
    },

    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("{type_name} does not accept {data} data")]
    DataMismatch {
        type_name: &'static str,
        data: &'static str,
    },

    #[error("{operation} is not supported by {type_name}")]
    NotComposite {
        operation: &'static str,
        type_name: &'static str,
    },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Document not found: {path}")]
    NotFound { path: String },

    #[error("Document already exists: {path}")]
    AlreadyExists { path: String },

    #[error("Document {path} is not valid for {model}")]
    InvalidDocument { model: &'static str, path: String },

    #[error("Document {path} does not exist!")]
    Vanished { path: String },

    #[error("Transaction aborted after {attempts} conflicting attempts")]
    TransactionConflict { attempts: u32 },

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DocModelError>;
