//! Resource states and pass kinds.
//!
//! A [`ResourceState`] names the pipeline state a texture subresource or a
//! buffer byte range must be in before an access is valid. The graph only
//! compares states for equality; mapping them to native layouts, access masks
//! and stages is left to the [`CommandContext`](crate::backend::CommandContext).

use std::fmt;

/// Pipeline state of a resource or part of one.
///
/// The derived ordering is only used for sorting barriers deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ResourceState {
    /// Contents undefined. Initial state of every transient resource.
    #[default]
    Undefined,
    /// Generic state usable by any queue. Required for some queue hand-offs.
    Common,
    /// Read as vertex buffer data.
    VertexBuffer,
    /// Read as index buffer data.
    IndexBuffer,
    /// Read as constant (uniform) buffer data.
    ConstantBuffer,
    /// Read as indirect draw/dispatch arguments.
    IndirectArgument,
    /// Written as a color render target.
    RenderTarget,
    /// Read and written through unordered (storage) access.
    UnorderedAccess,
    /// Written as a depth/stencil attachment.
    DepthWrite,
    /// Read-only depth/stencil (depth test or sampling).
    DepthRead,
    /// Sampled or read in a shader.
    ShaderResource,
    /// Source of a copy operation.
    CopySource,
    /// Destination of a copy operation.
    CopyDest,
    /// Ready for presentation.
    Present,
}

impl ResourceState {
    /// Check if the state can only be held by a resource used by graphics work.
    pub fn is_graphics_exclusive(self) -> bool {
        matches!(
            self,
            Self::RenderTarget
                | Self::DepthWrite
                | Self::DepthRead
                | Self::VertexBuffer
                | Self::IndexBuffer
                | Self::Present
        )
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The kind of queue work a pass performs.
///
/// This is a closed set; legality of a state for a kind is decided by
/// [`PassKind::allows`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PassKind {
    /// Rasterization work. Accepts every state.
    #[default]
    Graphics,
    /// Compute dispatches. Rejects graphics-exclusive states.
    Compute,
    /// Copy/transfer work. Accepts copy states only.
    Copy,
}

impl PassKind {
    /// Check whether a pass of this kind may request `state`.
    pub fn allows(self, state: ResourceState) -> bool {
        match self {
            Self::Graphics => true,
            Self::Compute => !state.is_graphics_exclusive(),
            Self::Copy => matches!(
                state,
                ResourceState::CopySource
                    | ResourceState::CopyDest
                    | ResourceState::Common
                    | ResourceState::Undefined
            ),
        }
    }

    /// Short lowercase name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Graphics => "graphics",
            Self::Compute => "compute",
            Self::Copy => "copy",
        }
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
