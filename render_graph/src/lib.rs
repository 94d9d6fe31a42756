//! # RedLilium Render Graph
//!
//! Render dependency-graph compiler and executor for the RedLilium engine.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`RenderGraph`] - Declarative description of one frame's passes and the
//!   resources they read and write
//! - [`compiler`] - Culling, ordering and barrier synthesis with per-pass
//!   merging and cross-pass redundancy elimination
//! - [`executor`] - Single-queue and dual-queue execution with export
//!   barriers and timeline fence synchronization
//! - [`backend`] - The [`Device`] and [`CommandContext`] collaborator traits,
//!   plus a dummy implementation for tests
//!
//! ## Example
//!
//! ```
//! use redlilium_render_graph::backend::{DummyDevice, RecordingContext};
//! use redlilium_render_graph::{
//!     BufferDescriptor, BufferUsage, PassKind, RenderGraph, ResourceState,
//! };
//!
//! let mut graph = RenderGraph::new();
//! let particles = graph.create_buffer(BufferDescriptor::new(4096, BufferUsage::STORAGE));
//! graph.set_export_state(particles, ResourceState::ShaderResource);
//!
//! graph.add_pass(
//!     "simulate",
//!     PassKind::Compute,
//!     |pass| {
//!         pass.read_write(particles);
//!     },
//!     |_ctx| {},
//! );
//!
//! let stats = graph.compile(&mut DummyDevice::new()).unwrap();
//! assert_eq!(stats.executed_passes(), 1);
//!
//! graph.execute(&mut RecordingContext::new());
//! ```

pub mod backend;
pub mod compiler;
pub mod error;
pub mod executor;
pub mod graph;
pub mod profiling;
pub mod types;

// Re-export main types for convenience
pub use backend::{BackendError, CommandContext, Device, DummyDevice, NativeHandle};
pub use compiler::CompileStats;
pub use error::GraphError;
pub use executor::{ComputeQueue, TimelineFence};
pub use graph::{
    AccessKind, BufferBarrier, BufferHandle, ByteRange, GraphConfig, PassBuilder, PassHandle,
    PassKind, RedundancyPolicy, RenderGraph, ResourceState, SubresourceRange, TextureAspect,
    TextureBarrier, TextureHandle,
};
pub use types::{BufferDescriptor, BufferUsage, TextureDescriptor, TextureFormat, TextureUsage};

/// Render graph library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the render graph subsystem.
///
/// Only logs the version; the graph needs no global state.
pub fn init() {
    log::info!("RedLilium Render Graph v{} initialized", VERSION);
}
