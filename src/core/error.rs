use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrudError {
    #[error("{entity} with ID {pk} does not exist")]
    NotFound { entity: String, pk: String },

    #[error("No remote method registered under '{0}'")]
    UnknownMethod(String),

    #[error("Storage for '{0}' has no session attached")]
    SessionDetached(String),

    #[error("Dependency error: {0}")]
    DependencyMissing(String),

    #[error("Field '{0}' not found in entity '{1}'")]
    FieldNotFound(String, String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Lock error: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, CrudError>;

impl CrudError {
    /// Build the canonical not-found failure for one entity/key pair.
    pub fn not_found(entity: impl Into<String>, pk: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            pk: pk.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl<T> From<std::sync::PoisonError<T>> for CrudError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}
