//! Render graph error types.

use crate::backend::BackendError;

/// Errors returned by [`RenderGraph::compile`](crate::graph::RenderGraph::compile).
///
/// The device collaborator is the only failure source. Graph-level anomalies
/// (invalid handles, unordered passes) degrade without an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The device could not create the backing object of a transient texture.
    #[error("failed to allocate texture '{name}': {source}")]
    TextureAllocation {
        /// Name of the texture.
        name: String,
        /// Error reported by the device.
        #[source]
        source: BackendError,
    },
    /// The device could not create the backing object of a transient buffer.
    #[error("failed to allocate buffer '{name}': {source}")]
    BufferAllocation {
        /// Name of the buffer.
        name: String,
        /// Error reported by the device.
        #[source]
        source: BackendError,
    },
}
