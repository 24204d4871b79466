//! Error types for Stackwright

use std::fmt;
use thiserror::Error;

/// Result type for Stackwright operations
pub type Result<T> = std::result::Result<T, StackError>;

/// Kind of entity an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Service,
    Network,
    Volume,
    Secret,
    Config,
    Stage,
    /// Single-use build instruction or macro
    Instruction,
    /// Host port binding
    Port,
    /// The stack's main service slot
    MainService,
    /// File referenced by path
    File,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Service => write!(f, "service"),
            EntityKind::Network => write!(f, "network"),
            EntityKind::Volume => write!(f, "volume"),
            EntityKind::Secret => write!(f, "secret"),
            EntityKind::Config => write!(f, "config"),
            EntityKind::Stage => write!(f, "stage"),
            EntityKind::Instruction => write!(f, "instruction"),
            EntityKind::Port => write!(f, "host port"),
            EntityKind::MainService => write!(f, "main service"),
            EntityKind::File => write!(f, "file"),
        }
    }
}

/// Stackwright error types
#[derive(Error, Debug)]
pub enum StackError {
    #[error("Invalid {field}: {message}")]
    Shape { field: String, message: String },

    #[error("Missing required field '{field}' in {context}")]
    MissingField { context: String, field: String },

    #[error("Duplicate {kind}: {name}")]
    DuplicateName { kind: EntityKind, name: String },

    #[error("{owner} references unknown {kind} '{name}'")]
    ReferentialIntegrity {
        owner: String,
        kind: EntityKind,
        name: String,
    },

    #[error("{field} out of range: {message}")]
    Range { field: String, message: String },

    #[error("Invalid state: {0}")]
    State(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StackError {
    pub(crate) fn shape(field: impl Into<String>, message: impl Into<String>) -> Self {
        StackError::Shape {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn missing(context: impl Into<String>, field: impl Into<String>) -> Self {
        StackError::MissingField {
            context: context.into(),
            field: field.into(),
        }
    }

    pub(crate) fn duplicate(kind: EntityKind, name: impl Into<String>) -> Self {
        StackError::DuplicateName {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn unknown(owner: impl Into<String>, kind: EntityKind, name: impl Into<String>) -> Self {
        StackError::ReferentialIntegrity {
            owner: owner.into(),
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn range(field: impl Into<String>, message: impl Into<String>) -> Self {
        StackError::Range {
            field: field.into(),
            message: message.into(),
        }
    }
}
