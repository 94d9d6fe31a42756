//! Backend error types.

/// Errors reported by a [`Device`](super::Device) collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// The device was lost.
    #[error("GPU device lost")]
    DeviceLost,
    /// Internal backend error.
    #[error("internal backend error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(BackendError::OutOfMemory.to_string(), "out of GPU memory");
        assert_eq!(
            BackendError::ResourceCreationFailed("too large".into()).to_string(),
            "resource creation failed: too large"
        );
    }
}
