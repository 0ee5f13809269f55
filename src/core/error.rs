use thiserror::Error;

#[derive(Error, Debug)]
pub enum MappingError {
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("No suitable mapper found for field '{field}' of type {type_name} in {class}")]
    NoSuitableMapper {
        class: String,
        field: String,
        type_name: String,
    },

    #[error("Field '{field}' in {class} has no accessor")]
    MissingAccessor { class: String, field: String },

    #[error("Field '{field}' in {class} has no mutator")]
    MissingMutator { class: String, field: String },

    #[error("Unsupported construction strategy for {class}: {reason}")]
    UnsupportedConstructionStrategy { class: String, reason: String },

    #[error("Invalid identifier configuration in {class}: {reason}")]
    InvalidIdentifier { class: String, reason: String },

    #[error("Class {class} declares more than one {role} field ('{first}' and '{second}')")]
    DuplicateField {
        class: String,
        role: String,
        first: String,
        second: String,
    },

    #[error("Property name '{name}' is mapped more than once in {class}")]
    DuplicatePropertyName { class: String, name: String },

    #[error("Invalid listener {class}: {reason}")]
    InvalidListener { class: String, reason: String },

    #[error("Class {class} declares more than one {callback} callback ('{first}' and '{second}')")]
    DuplicateCallback {
        class: String,
        callback: String,
        first: String,
        second: String,
    },

    #[error("Invalid listener method {class}::{method}: {reason}")]
    InvalidListenerMethod {
        class: String,
        method: String,
        reason: String,
    },

    #[error("Cyclic embedded declaration: {path}")]
    CyclicEmbedding { path: String },

    #[error("Cyclic superclass declaration: {path}")]
    CyclicInheritance { path: String },

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Entity {class} has no identifier value")]
    MissingIdentifier { class: String },

    #[error("Field '{field}' in {class}: {source}")]
    Field {
        class: String,
        field: String,
        #[source]
        source: Box<MappingError>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl MappingError {
    /// Attaches class and field context to a per-field failure.
    pub fn in_field(self, class: &str, field: &str) -> Self {
        match self {
            already @ Self::Field { .. } => already,
            other => Self::Field {
                class: class.to_string(),
                field: field.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, skipping field context wrappers.
    pub fn root_cause(&self) -> &MappingError {
        match self {
            Self::Field { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// `true` for errors caused by a class declaration rather than by data.
    ///
    /// These never go away on retry.
    pub fn is_configuration_error(&self) -> bool {
        match self.root_cause() {
            Self::UnsupportedType(_)
            | Self::NoSuitableMapper { .. }
            | Self::MissingAccessor { .. }
            | Self::MissingMutator { .. }
            | Self::UnsupportedConstructionStrategy { .. }
            | Self::InvalidIdentifier { .. }
            | Self::DuplicateField { .. }
            | Self::DuplicatePropertyName { .. }
            | Self::InvalidListener { .. }
            | Self::DuplicateCallback { .. }
            | Self::InvalidListenerMethod { .. }
            | Self::CyclicEmbedding { .. }
            | Self::CyclicInheritance { .. }
            | Self::Configuration(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, MappingError>;

impl<T> From<std::sync::PoisonError<T>> for MappingError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
