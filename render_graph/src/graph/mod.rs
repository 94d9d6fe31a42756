//! Render graph for declaring passes and their resource accesses.
//!
//! The render graph is a declarative description of one frame's GPU work.
//! Callers register resources and passes, each pass declaring what it reads
//! and writes. [`RenderGraph::compile`] turns the declaration into an
//! execution order with merged barriers, culling passes whose output never
//! reaches a resource visible outside the graph, and
//! [`RenderGraph::execute`] walks that order.
//!
//! # Example
//!
//! ```
//! use redlilium_render_graph::backend::{DummyDevice, RecordingContext};
//! use redlilium_render_graph::graph::{PassKind, RenderGraph, ResourceState};
//! use redlilium_render_graph::types::{TextureDescriptor, TextureFormat, TextureUsage};
//!
//! let mut graph = RenderGraph::new();
//! let color = graph.create_texture(TextureDescriptor::new_2d(
//!     1280,
//!     720,
//!     TextureFormat::Rgba8Unorm,
//!     TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
//! ));
//! graph.set_export_state(color, ResourceState::ShaderResource);
//!
//! graph.add_pass(
//!     "main",
//!     PassKind::Graphics,
//!     |pass| {
//!         pass.write(color, ResourceState::RenderTarget);
//!     },
//!     |_ctx| {},
//! );
//!
//! let mut device = DummyDevice::new();
//! graph.compile(&mut device).unwrap();
//!
//! let mut context = RecordingContext::new();
//! graph.execute(&mut context);
//! ```
//!
//! # Lifecycle
//!
//! Resources and passes live for one compile and execute cycle.
//! [`RenderGraph::clear`] drops them and resets the statistics. Adding a
//! pass or resource after compiling discards the compiled results.

mod barrier;
mod dot;
mod handle;
mod pass;
mod resource;
mod resource_usage;
mod state;
mod tracking;

use crate::backend::{CommandContext, Device, NativeBuffer, NativeTexture};
use crate::compiler::{self, CompileStats};
use crate::error::GraphError;
use crate::executor::{self, ComputeQueue};
use crate::types::{BufferDescriptor, TextureDescriptor};

pub use barrier::{
    BufferBarrier, MergeCounts, TextureBarrier, merge_buffer_barriers, merge_texture_barriers,
};
pub use handle::{
    BufferHandle, ByteRange, PassHandle, SubresourceRange, TextureAspect, TextureHandle,
};
pub use pass::{ExecuteFn, Pass, PassBuilder};
pub use resource::{BufferResource, ResourceRegistry, TextureResource};
pub use resource_usage::{AccessKind, ResourceRef, ResourceUsage, UsageTarget};
pub use state::{PassKind, ResourceState};
pub use tracking::{
    BufferStateTracker, BufferTransition, RangeMap, TextureStateTracker, TextureTransition,
    Transition,
};

/// What cross-pass redundancy elimination does when a barrier's recorded
/// "before" state disagrees with the state the previous passes left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RedundancyPolicy {
    /// Panic. Default in debug builds.
    Assert,
    /// Log a warning and drop the barrier. Default in release builds.
    Drop,
}

impl Default for RedundancyPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Assert
        } else {
            Self::Drop
        }
    }
}

/// Compilation and execution settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphConfig {
    /// Remove passes whose output never reaches an imported or exported
    /// resource.
    pub cull_passes: bool,
    /// Merge each pass's barriers into wider ones.
    pub merge_barriers: bool,
    /// Drop barriers that are redundant across passes.
    pub eliminate_redundant_barriers: bool,
    /// Behaviour on a state mismatch during redundancy elimination.
    pub redundancy_policy: RedundancyPolicy,
    /// Wrap every pass in `begin_event`/`end_event`.
    pub debug_events: bool,
}

impl GraphConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable pass culling.
    pub fn with_culling(mut self, enabled: bool) -> Self {
        self.cull_passes = enabled;
        self
    }

    /// Enable or disable per-pass barrier merging.
    pub fn with_barrier_merging(mut self, enabled: bool) -> Self {
        self.merge_barriers = enabled;
        self
    }

    /// Enable or disable cross-pass redundancy elimination.
    pub fn with_redundancy_elimination(mut self, enabled: bool) -> Self {
        self.eliminate_redundant_barriers = enabled;
        self
    }

    /// Set the redundancy mismatch policy.
    pub fn with_redundancy_policy(mut self, policy: RedundancyPolicy) -> Self {
        self.redundancy_policy = policy;
        self
    }

    /// Enable or disable debug events around passes.
    pub fn with_debug_events(mut self, enabled: bool) -> Self {
        self.debug_events = enabled;
        self
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            cull_passes: true,
            merge_barriers: true,
            eliminate_redundant_barriers: true,
            redundancy_policy: RedundancyPolicy::default(),
            debug_events: true,
        }
    }
}

/// A render graph: the resources and passes of one frame.
///
/// The lifetime `'a` bounds what pass execute callbacks may borrow.
#[derive(Debug, Default)]
pub struct RenderGraph<'a> {
    config: GraphConfig,
    registry: ResourceRegistry,
    passes: Vec<Pass<'a>>,
    execution_order: Vec<PassHandle>,
    compiled: bool,
    stats: CompileStats,
}

impl<'a> RenderGraph<'a> {
    /// Create an empty graph with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty graph with `config`.
    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Register a transient texture, initially undefined.
    pub fn create_texture(&mut self, descriptor: TextureDescriptor) -> TextureHandle {
        self.invalidate();
        self.registry.create_texture(descriptor)
    }

    /// Register a transient buffer, initially undefined.
    pub fn create_buffer(&mut self, descriptor: BufferDescriptor) -> BufferHandle {
        self.invalidate();
        self.registry.create_buffer(descriptor)
    }

    /// Register an externally owned texture currently in `state`.
    pub fn import_texture(&mut self, native: NativeTexture, state: ResourceState) -> TextureHandle {
        self.invalidate();
        self.registry.import_texture(native, state)
    }

    /// Register an externally owned buffer currently in `state`.
    pub fn import_buffer(&mut self, native: NativeBuffer, state: ResourceState) -> BufferHandle {
        self.invalidate();
        self.registry.import_buffer(native, state)
    }

    /// Require the resource to be in `state` once the graph has executed.
    ///
    /// Marks the resource as needed for culling. Any sub-range carried by
    /// the handle is ignored; the export applies to the whole resource.
    /// Unregistered handles are ignored.
    pub fn set_export_state<H: ResourceRef>(&mut self, handle: H, state: ResourceState) -> H {
        if self.registry.set_export_state(handle.usage_target(), state) {
            self.invalidate();
        }
        handle
    }

    /// Register a pass.
    ///
    /// `setup` declares the pass's resource accesses through a
    /// [`PassBuilder`]; `execute` records its GPU work when the graph runs.
    pub fn add_pass(
        &mut self,
        name: impl Into<String>,
        kind: PassKind,
        setup: impl FnOnce(&mut PassBuilder<'_>),
        execute: impl FnMut(&mut dyn CommandContext) + 'a,
    ) -> PassHandle {
        self.invalidate();
        let mut builder = PassBuilder::new(&mut self.registry, kind);
        setup(&mut builder);
        let usages = builder.finish();

        let handle = PassHandle::new(self.passes.len() as u32);
        self.passes
            .push(Pass::new(name.into(), kind, usages, Some(Box::new(execute))));
        handle
    }

    /// Get a pass by handle.
    pub fn pass(&self, handle: PassHandle) -> Option<&Pass<'a>> {
        self.passes.get(handle.index())
    }

    /// All passes, in registration order.
    pub fn passes(&self) -> &[Pass<'a>] {
        &self.passes
    }

    /// Compiled execution order, empty until compiled.
    pub fn execution_order(&self) -> &[PassHandle] {
        &self.execution_order
    }

    /// Get a texture record by handle.
    pub fn texture(&self, handle: TextureHandle) -> Option<&TextureResource> {
        self.registry.texture(handle)
    }

    /// Get a buffer record by handle.
    pub fn buffer(&self, handle: BufferHandle) -> Option<&BufferResource> {
        self.registry.buffer(handle)
    }

    /// Get the resource registry.
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Statistics of the last compile.
    pub fn stats(&self) -> &CompileStats {
        &self.stats
    }

    /// Check whether the graph is compiled and unchanged since.
    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    /// Compile the graph.
    ///
    /// Allocates backing objects for transient resources through `device`,
    /// culls unneeded passes, orders the rest and synthesizes their merged
    /// barriers. Compiling again without changes yields the same result.
    ///
    /// # Errors
    ///
    /// Fails only when `device` cannot allocate a resource.
    ///
    /// # Panics
    ///
    /// Panics if a pass requests a state its kind does not allow, or on a
    /// redundancy mismatch under [`RedundancyPolicy::Assert`].
    pub fn compile(&mut self, device: &mut dyn Device) -> Result<&CompileStats, GraphError> {
        self.compiled = false;
        self.stats = compiler::compile_into(
            &self.config,
            &mut self.registry,
            &mut self.passes,
            device,
            &mut self.execution_order,
        )?;
        self.compiled = true;
        Ok(&self.stats)
    }

    /// Execute the graph on a single command context.
    ///
    /// Runs every non-culled pass in compiled order (declaration order if the
    /// graph is not compiled), then transitions exported resources to their
    /// export states in one batch. Executing again without recompiling
    /// records the same commands, assuming resources were returned to their
    /// initial states in between.
    pub fn execute(&mut self, context: &mut dyn CommandContext) {
        let order = self.compiled.then_some(self.execution_order.as_slice());
        executor::execute(&self.config, &self.registry, &mut self.passes, order, context);
    }

    /// Execute the graph across a graphics and a compute queue.
    ///
    /// Compute passes run on `compute`, everything else on `graphics`, with
    /// fence waits wherever a resource crosses queues. Without a compute
    /// queue this is [`RenderGraph::execute`].
    pub fn execute_async(
        &mut self,
        graphics: &mut dyn CommandContext,
        compute: Option<ComputeQueue<'_>>,
    ) {
        let order = self.compiled.then_some(self.execution_order.as_slice());
        match compute {
            Some(compute) => executor::execute_dual_queue(
                &self.config,
                &self.registry,
                &mut self.passes,
                order,
                graphics,
                compute,
            ),
            None => executor::execute(
                &self.config,
                &self.registry,
                &mut self.passes,
                order,
                graphics,
            ),
        }
    }

    /// Remove every pass and resource and reset the statistics.
    pub fn clear(&mut self) {
        self.passes.clear();
        self.registry.clear();
        self.execution_order.clear();
        self.compiled = false;
        self.stats = CompileStats::default();
    }

    fn invalidate(&mut self) {
        if !self.compiled {
            return;
        }
        self.compiled = false;
        self.execution_order.clear();
        for pass in &mut self.passes {
            pass.reset_compiled();
        }
        for texture in self.registry.textures_mut() {
            texture.tracker.reset(texture.initial_state);
        }
        for buffer in self.registry.buffers_mut() {
            buffer.tracker.reset(buffer.initial_state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyDevice, RecordingContext};
    use crate::types::{BufferUsage, TextureFormat, TextureUsage};

    fn color_desc() -> TextureDescriptor {
        TextureDescriptor::new_2d(
            64,
            64,
            TextureFormat::Rgba8Unorm,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        )
    }

    #[test]
    fn test_new_graph_is_empty() {
        let graph = RenderGraph::new();
        assert!(graph.passes().is_empty());
        assert!(graph.execution_order().is_empty());
        assert!(!graph.is_compiled());
    }

    #[test]
    fn test_add_pass_returns_sequential_handles() {
        let mut graph = RenderGraph::new();
        let a = graph.add_pass("a", PassKind::Graphics, |_| {}, |_| {});
        let b = graph.add_pass("b", PassKind::Compute, |_| {}, |_| {});

        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(graph.pass(b).unwrap().kind(), PassKind::Compute);
        assert_eq!(graph.pass(b).unwrap().name(), "b");
    }

    #[test]
    fn test_set_export_state_invalid_handle() {
        let mut graph = RenderGraph::new();
        let handle = graph.set_export_state(TextureHandle::INVALID, ResourceState::Present);
        assert_eq!(handle, TextureHandle::INVALID);
    }

    #[test]
    fn test_adding_after_compile_invalidates() {
        let mut graph = RenderGraph::new();
        let color = graph.create_texture(color_desc());
        graph.set_export_state(color, ResourceState::ShaderResource);
        graph.add_pass(
            "draw",
            PassKind::Graphics,
            |pass| {
                pass.write(color, ResourceState::RenderTarget);
            },
            |_| {},
        );

        graph.compile(&mut DummyDevice::new()).unwrap();
        assert!(graph.is_compiled());

        graph.create_buffer(BufferDescriptor::new(16, BufferUsage::STORAGE));
        assert!(!graph.is_compiled());
        assert!(graph.execution_order().is_empty());
        assert_eq!(graph.passes()[0].barrier_count(), 0);
    }

    #[test]
    fn test_clear_resets_stats() {
        let mut graph = RenderGraph::new();
        let color = graph.create_texture(color_desc());
        graph.set_export_state(color, ResourceState::ShaderResource);
        graph.add_pass(
            "draw",
            PassKind::Graphics,
            |pass| {
                pass.write(color, ResourceState::RenderTarget);
            },
            |_| {},
        );
        graph.compile(&mut DummyDevice::new()).unwrap();
        assert_eq!(graph.stats().total_passes, 1);

        graph.clear();
        assert_eq!(graph.stats(), &CompileStats::default());
        assert!(graph.passes().is_empty());
        assert!(graph.registry().textures().is_empty());
    }

    #[test]
    fn test_execute_uncompiled_runs_in_declaration_order() {
        let mut graph = RenderGraph::with_config(GraphConfig::new().with_debug_events(true));
        graph.add_pass("first", PassKind::Graphics, |_| {}, |_| {});
        graph.add_pass("second", PassKind::Copy, |_| {}, |_| {});

        let mut context = RecordingContext::new();
        graph.execute(&mut context);

        assert_eq!(context.event_names(), vec!["first", "second"]);
        assert!(context.barrier_batches().is_empty());
    }

    #[test]
    fn test_default_config() {
        let config = GraphConfig::default();
        assert!(config.cull_passes);
        assert!(config.merge_barriers);
        assert!(config.eliminate_redundant_barriers);
        assert!(config.debug_events);
        let expected = if cfg!(debug_assertions) {
            RedundancyPolicy::Assert
        } else {
            RedundancyPolicy::Drop
        };
        assert_eq!(config.redundancy_policy, expected);
    }
}
