//! Collaborator interfaces the render graph talks to.
//!
//! The graph never encodes GPU commands or owns native objects. It consumes
//! two collaborators:
//!
//! - [`Device`]: creates backing allocations for transient resources during
//!   [`RenderGraph::compile`](crate::RenderGraph::compile).
//! - [`CommandContext`]: receives debug events and barrier batches during
//!   [`RenderGraph::execute`](crate::RenderGraph::execute), and is handed to
//!   each pass's execute callback.
//!
//! Native objects are represented by opaque [`NativeHandle`] values; the
//! backend decides what they mean.
//!
//! [`dummy`] provides an allocation-counting device and a command-recording
//! context, used by tests and benchmarks.

pub mod dummy;
mod error;

use std::fmt;

pub use dummy::{DummyDevice, RecordedCommand, RecordingContext};
pub use error::BackendError;

use crate::executor::TimelineFence;
use crate::graph::{BufferBarrier, TextureBarrier};
use crate::types::{BufferDescriptor, TextureDescriptor};

/// Opaque identifier of a native GPU object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeHandle(pub u64);

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Native({:#x})", self.0)
    }
}

/// A backing allocation returned by a [`Device`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Allocation {
    /// Native object backing the resource.
    pub native: NativeHandle,
    /// Heap the allocation may alias memory in, if the allocator placed it
    /// in a shared heap. Diagnostic only.
    pub aliased_heap: Option<u32>,
}

impl Allocation {
    /// A dedicated allocation that aliases nothing.
    pub fn dedicated(native: NativeHandle) -> Self {
        Self {
            native,
            aliased_heap: None,
        }
    }
}

/// An externally owned texture handed to the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeTexture {
    /// Native object.
    pub handle: NativeHandle,
    /// Descriptor of the native object.
    pub descriptor: TextureDescriptor,
}

/// An externally owned buffer handed to the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeBuffer {
    /// Native object.
    pub handle: NativeHandle,
    /// Descriptor of the native object.
    pub descriptor: BufferDescriptor,
}

/// Creates backing allocations for transient graph resources.
///
/// Called at most once per transient resource per graph cycle.
pub trait Device {
    /// Create a texture matching `descriptor`.
    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
    ) -> Result<Allocation, BackendError>;

    /// Create a buffer matching `descriptor`.
    fn create_buffer(&mut self, descriptor: &BufferDescriptor) -> Result<Allocation, BackendError>;
}

/// Receives the commands the executor issues around each pass.
///
/// For every pass, calls arrive as `begin_event`, `barriers` (only when the
/// pass has barriers), then the pass's own callback, then `end_event`.
pub trait CommandContext {
    /// Open a named debug scope.
    fn begin_event(&mut self, name: &str);

    /// Close the innermost debug scope.
    fn end_event(&mut self);

    /// Record a batch of state transitions.
    fn barriers(&mut self, buffer_barriers: &[BufferBarrier], texture_barriers: &[TextureBarrier]);

    /// Signal `fence` with `value` once all previously recorded work on this
    /// queue completes. Contexts that only ever run on one queue may ignore it.
    fn signal(&mut self, fence: &TimelineFence, value: u64) {
        let _ = (fence, value);
    }

    /// Make subsequently recorded work on this queue wait until `fence`
    /// reaches `value`. Contexts that only ever run on one queue may ignore it.
    fn wait(&mut self, fence: &TimelineFence, value: u64) {
        let _ = (fence, value);
    }
}
