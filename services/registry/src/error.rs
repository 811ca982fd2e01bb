//! Error types for the registry

use filter::FilterError;

use crate::id::ServiceId;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Error types for registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A service must be published under at least one name
    #[error("no service names given")]
    EmptyNames,

    /// Names must not be empty or whitespace
    #[error("blank service name")]
    BlankName,

    /// The lookup filter could not be parsed
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// The service has left the registered state
    #[error("service {0} is not registered")]
    Unregistered(ServiceId),
}

impl RegistryError {
    /// Whether the caller passed an argument the registry rejects outright.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            RegistryError::EmptyNames | RegistryError::BlankName | RegistryError::Filter(_)
        )
    }
}
