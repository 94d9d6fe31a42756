//! Passes and the per-pass builder.

use std::fmt;

use crate::backend::CommandContext;
use crate::types::{BufferDescriptor, TextureDescriptor};

use super::barrier::{BufferBarrier, TextureBarrier};
use super::handle::{BufferHandle, TextureAspect, TextureHandle};
use super::resource::ResourceRegistry;
use super::resource_usage::{AccessKind, ResourceRef, ResourceUsage, UsageTarget};
use super::state::{PassKind, ResourceState};

/// Callback recording a pass's GPU work.
///
/// Invoked at most once per [`RenderGraph::execute`](super::RenderGraph::execute)
/// call, with the context matching the pass's queue.
pub type ExecuteFn<'a> = Box<dyn FnMut(&mut dyn CommandContext) + 'a>;

/// A pass in the render graph.
///
/// Holds the usages declared at registration, and after compilation the
/// derived read/write sets, the culled flag and the pass's merged barriers.
pub struct Pass<'a> {
    name: String,
    kind: PassKind,
    usages: Vec<ResourceUsage>,
    pub(crate) texture_reads: Vec<u32>,
    pub(crate) texture_writes: Vec<u32>,
    pub(crate) buffer_reads: Vec<u32>,
    pub(crate) buffer_writes: Vec<u32>,
    pub(crate) culled: bool,
    pub(crate) texture_barriers: Vec<TextureBarrier>,
    pub(crate) buffer_barriers: Vec<BufferBarrier>,
    execute: Option<ExecuteFn<'a>>,
}

impl<'a> Pass<'a> {
    pub(crate) fn new(
        name: String,
        kind: PassKind,
        usages: Vec<ResourceUsage>,
        execute: Option<ExecuteFn<'a>>,
    ) -> Self {
        Self {
            name,
            kind,
            usages,
            texture_reads: Vec::new(),
            texture_writes: Vec::new(),
            buffer_reads: Vec::new(),
            buffer_writes: Vec::new(),
            culled: false,
            texture_barriers: Vec::new(),
            buffer_barriers: Vec::new(),
            execute,
        }
    }

    /// Get the pass name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the pass kind.
    pub fn kind(&self) -> PassKind {
        self.kind
    }

    /// Usages in declaration order.
    pub fn usages(&self) -> &[ResourceUsage] {
        &self.usages
    }

    /// Indices of textures the pass reads, deduplicated.
    pub fn texture_reads(&self) -> &[u32] {
        &self.texture_reads
    }

    /// Indices of textures the pass writes, deduplicated.
    pub fn texture_writes(&self) -> &[u32] {
        &self.texture_writes
    }

    /// Indices of buffers the pass reads, deduplicated.
    pub fn buffer_reads(&self) -> &[u32] {
        &self.buffer_reads
    }

    /// Indices of buffers the pass writes, deduplicated.
    pub fn buffer_writes(&self) -> &[u32] {
        &self.buffer_writes
    }

    /// Check whether compilation removed the pass.
    pub fn is_culled(&self) -> bool {
        self.culled
    }

    /// Texture barriers issued before the pass.
    pub fn texture_barriers(&self) -> &[TextureBarrier] {
        &self.texture_barriers
    }

    /// Buffer barriers issued before the pass.
    pub fn buffer_barriers(&self) -> &[BufferBarrier] {
        &self.buffer_barriers
    }

    /// Total number of barriers issued before the pass.
    pub fn barrier_count(&self) -> usize {
        self.texture_barriers.len() + self.buffer_barriers.len()
    }

    pub(crate) fn reset_compiled(&mut self) {
        self.texture_reads.clear();
        self.texture_writes.clear();
        self.buffer_reads.clear();
        self.buffer_writes.clear();
        self.culled = false;
        self.texture_barriers.clear();
        self.buffer_barriers.clear();
    }

    pub(crate) fn run(&mut self, context: &mut dyn CommandContext) {
        if let Some(execute) = self.execute.as_mut() {
            execute(context);
        }
    }
}

impl fmt::Debug for Pass<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pass")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("usages", &self.usages)
            .field("culled", &self.culled)
            .field("texture_barriers", &self.texture_barriers)
            .field("buffer_barriers", &self.buffer_barriers)
            .finish_non_exhaustive()
    }
}

/// Declares the resource accesses of one pass.
///
/// Handed to the setup closure of
/// [`RenderGraph::add_pass`](super::RenderGraph::add_pass). Every access call
/// appends one usage; calls with an unregistered handle do nothing and return
/// the handle unchanged.
pub struct PassBuilder<'g> {
    registry: &'g mut ResourceRegistry,
    kind: PassKind,
    usages: Vec<ResourceUsage>,
}

impl<'g> PassBuilder<'g> {
    pub(crate) fn new(registry: &'g mut ResourceRegistry, kind: PassKind) -> Self {
        Self {
            registry,
            kind,
            usages: Vec::new(),
        }
    }

    /// Kind of the pass being built.
    pub fn kind(&self) -> PassKind {
        self.kind
    }

    /// Read `handle` in `state`.
    pub fn read<H: ResourceRef>(&mut self, handle: H, state: ResourceState) -> H {
        self.access(handle, state, AccessKind::Read)
    }

    /// Write `handle` in `state`.
    pub fn write<H: ResourceRef>(&mut self, handle: H, state: ResourceState) -> H {
        self.access(handle, state, AccessKind::Write)
    }

    /// Read and write `handle` through unordered access.
    pub fn read_write<H: ResourceRef>(&mut self, handle: H) -> H {
        self.access(handle, ResourceState::UnorderedAccess, AccessKind::ReadWrite)
    }

    /// Access `handle` in `state`.
    pub fn access<H: ResourceRef>(
        &mut self,
        handle: H,
        state: ResourceState,
        access: AccessKind,
    ) -> H {
        self.push(handle.usage_target(), state, access);
        handle
    }

    /// Write the depth (and stencil, if present) aspect of `handle`.
    pub fn write_depth(&mut self, handle: TextureHandle) -> TextureHandle {
        let target = self.depth_target(handle);
        self.push(target, ResourceState::DepthWrite, AccessKind::Write);
        handle
    }

    /// Read the depth (and stencil, if present) aspect of `handle`.
    pub fn read_depth(&mut self, handle: TextureHandle) -> TextureHandle {
        let target = self.depth_target(handle);
        self.push(target, ResourceState::DepthRead, AccessKind::Read);
        handle
    }

    /// Register a transient texture from inside pass setup.
    pub fn create_texture(&mut self, descriptor: TextureDescriptor) -> TextureHandle {
        self.registry.create_texture(descriptor)
    }

    /// Register a transient buffer from inside pass setup.
    pub fn create_buffer(&mut self, descriptor: BufferDescriptor) -> BufferHandle {
        self.registry.create_buffer(descriptor)
    }

    pub(crate) fn finish(self) -> Vec<ResourceUsage> {
        self.usages
    }

    fn depth_target(&self, handle: TextureHandle) -> UsageTarget {
        let aspect = match self.registry.texture(handle) {
            Some(texture) if texture.descriptor().format.has_stencil() => {
                TextureAspect::DepthStencil
            }
            _ => TextureAspect::Depth,
        };
        UsageTarget::Texture {
            index: handle.index,
            range: handle.range,
            aspect: Some(aspect),
        }
    }

    fn push(&mut self, target: UsageTarget, state: ResourceState, access: AccessKind) {
        if !self.registry.contains(target) {
            log::debug!("usage of unregistered resource {target:?} ignored");
            return;
        }
        self.usages.push(ResourceUsage {
            target,
            state,
            access,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BufferUsage, TextureFormat, TextureUsage};

    #[test]
    fn test_builder_records_usages_in_order() {
        let mut registry = ResourceRegistry::new();
        let color = registry.create_texture(TextureDescriptor::new_2d(
            8,
            8,
            TextureFormat::Rgba8Unorm,
            TextureUsage::RENDER_ATTACHMENT,
        ));
        let data = registry.create_buffer(BufferDescriptor::new(64, BufferUsage::STORAGE));

        let mut builder = PassBuilder::new(&mut registry, PassKind::Graphics);
        builder.write(color, ResourceState::RenderTarget);
        builder.read_write(data);
        let usages = builder.finish();

        assert_eq!(usages.len(), 2);
        assert_eq!(usages[0].state, ResourceState::RenderTarget);
        assert_eq!(usages[0].access, AccessKind::Write);
        assert_eq!(usages[1].state, ResourceState::UnorderedAccess);
        assert_eq!(usages[1].access, AccessKind::ReadWrite);
    }

    #[test]
    fn test_builder_ignores_invalid_handles() {
        let mut registry = ResourceRegistry::new();
        let mut builder = PassBuilder::new(&mut registry, PassKind::Compute);

        let handle = builder.read(TextureHandle::INVALID, ResourceState::ShaderResource);
        assert_eq!(handle, TextureHandle::INVALID);
        builder.write(BufferHandle::INVALID, ResourceState::UnorderedAccess);

        assert!(builder.finish().is_empty());
    }

    #[test]
    fn test_write_depth_picks_aspect() {
        let mut registry = ResourceRegistry::new();
        let depth = registry.create_texture(TextureDescriptor::new_2d(
            8,
            8,
            TextureFormat::Depth32Float,
            TextureUsage::RENDER_ATTACHMENT,
        ));

        let mut builder = PassBuilder::new(&mut registry, PassKind::Graphics);
        builder.write_depth(depth);
        let usages = builder.finish();

        assert_eq!(usages[0].state, ResourceState::DepthWrite);
        assert_eq!(
            usages[0].target,
            UsageTarget::Texture {
                index: depth.index(),
                range: None,
                aspect: Some(TextureAspect::Depth),
            }
        );
    }

    #[test]
    fn test_create_inside_setup() {
        let mut registry = ResourceRegistry::new();
        let mut builder = PassBuilder::new(&mut registry, PassKind::Copy);
        let buffer = builder.create_buffer(BufferDescriptor::new(32, BufferUsage::COPY_DST));
        builder.write(buffer, ResourceState::CopyDest);
        assert_eq!(builder.finish().len(), 1);
        assert_eq!(registry.buffers().len(), 1);
    }
}
