//! Resource registry.
//!
//! The registry owns the descriptor, backing allocation and tracked state of
//! every texture and buffer known to a graph, transient or imported. Handles
//! index into it.

use crate::backend::{Allocation, NativeBuffer, NativeHandle, NativeTexture};
use crate::types::{BufferDescriptor, TextureDescriptor};

use super::handle::{BufferHandle, PassHandle, TextureAspect, TextureHandle};
use super::resource_usage::UsageTarget;
use super::state::ResourceState;
use super::tracking::{BufferStateTracker, TextureStateTracker};

/// A texture registered in the graph.
#[derive(Debug, Clone)]
pub struct TextureResource {
    pub(crate) name: String,
    pub(crate) descriptor: TextureDescriptor,
    pub(crate) backing: Option<Allocation>,
    pub(crate) imported: bool,
    pub(crate) initial_state: ResourceState,
    pub(crate) export_state: Option<ResourceState>,
    pub(crate) tracker: TextureStateTracker,
    pub(crate) writers: Vec<PassHandle>,
}

impl TextureResource {
    fn new(
        name: String,
        descriptor: TextureDescriptor,
        backing: Option<Allocation>,
        initial_state: ResourceState,
    ) -> Self {
        let tracker = TextureStateTracker::new(
            descriptor.mip_levels(),
            descriptor.array_layers(),
            initial_state,
        );
        Self {
            name,
            imported: backing.is_some(),
            descriptor,
            backing,
            initial_state,
            export_state: None,
            tracker,
            writers: Vec::new(),
        }
    }

    /// Debug name of the texture.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Descriptor of the texture.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    /// Native object backing the texture, once allocated or imported.
    pub fn native(&self) -> Option<NativeHandle> {
        self.backing.map(|b| b.native)
    }

    /// Shared heap the backing allocation may alias memory in.
    pub fn aliased_heap(&self) -> Option<u32> {
        self.backing.and_then(|b| b.aliased_heap)
    }

    /// Check whether the texture is owned outside the graph.
    pub fn is_imported(&self) -> bool {
        self.imported
    }

    /// State the texture is in when the graph starts.
    pub fn initial_state(&self) -> ResourceState {
        self.initial_state
    }

    /// State the texture must be left in when the graph finishes.
    pub fn export_state(&self) -> Option<ResourceState> {
        self.export_state
    }

    /// Tracked state of the texture.
    pub fn tracker(&self) -> &TextureStateTracker {
        &self.tracker
    }

    /// Passes writing the texture, as of the last compile.
    pub fn writers(&self) -> &[PassHandle] {
        &self.writers
    }

    /// Aspect barriers use unless a usage overrides it.
    pub fn default_aspect(&self) -> TextureAspect {
        let format = self.descriptor.format;
        if format.has_stencil() {
            TextureAspect::DepthStencil
        } else if format.is_depth_stencil() {
            TextureAspect::Depth
        } else {
            TextureAspect::Color
        }
    }

    /// Check whether the texture must be kept alive by culling.
    pub fn is_externally_visible(&self) -> bool {
        self.imported || self.export_state.is_some()
    }
}

/// A buffer registered in the graph.
#[derive(Debug, Clone)]
pub struct BufferResource {
    pub(crate) name: String,
    pub(crate) descriptor: BufferDescriptor,
    pub(crate) backing: Option<Allocation>,
    pub(crate) imported: bool,
    pub(crate) initial_state: ResourceState,
    pub(crate) export_state: Option<ResourceState>,
    pub(crate) tracker: BufferStateTracker,
    pub(crate) writers: Vec<PassHandle>,
}

impl BufferResource {
    fn new(
        name: String,
        descriptor: BufferDescriptor,
        backing: Option<Allocation>,
        initial_state: ResourceState,
    ) -> Self {
        let tracker = BufferStateTracker::new(descriptor.size, initial_state);
        Self {
            name,
            imported: backing.is_some(),
            descriptor,
            backing,
            initial_state,
            export_state: None,
            tracker,
            writers: Vec::new(),
        }
    }

    /// Debug name of the buffer.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Descriptor of the buffer.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    /// Native object backing the buffer, once allocated or imported.
    pub fn native(&self) -> Option<NativeHandle> {
        self.backing.map(|b| b.native)
    }

    /// Shared heap the backing allocation may alias memory in.
    pub fn aliased_heap(&self) -> Option<u32> {
        self.backing.and_then(|b| b.aliased_heap)
    }

    /// Check whether the buffer is owned outside the graph.
    pub fn is_imported(&self) -> bool {
        self.imported
    }

    /// State the buffer is in when the graph starts.
    pub fn initial_state(&self) -> ResourceState {
        self.initial_state
    }

    /// State the buffer must be left in when the graph finishes.
    pub fn export_state(&self) -> Option<ResourceState> {
        self.export_state
    }

    /// Tracked state of the buffer.
    pub fn tracker(&self) -> &BufferStateTracker {
        &self.tracker
    }

    /// Passes writing the buffer, as of the last compile.
    pub fn writers(&self) -> &[PassHandle] {
        &self.writers
    }

    /// Check whether the buffer must be kept alive by culling.
    pub fn is_externally_visible(&self) -> bool {
        self.imported || self.export_state.is_some()
    }
}

/// Owner of every resource record of a graph.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    textures: Vec<TextureResource>,
    buffers: Vec<BufferResource>,
}

impl ResourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transient texture, initially undefined.
    pub fn create_texture(&mut self, descriptor: TextureDescriptor) -> TextureHandle {
        let index = self.textures.len() as u32;
        let name = descriptor
            .label
            .clone()
            .unwrap_or_else(|| format!("texture_{index}"));
        self.textures.push(TextureResource::new(
            name,
            descriptor,
            None,
            ResourceState::Undefined,
        ));
        TextureHandle::new(index)
    }

    /// Register a transient buffer, initially undefined.
    pub fn create_buffer(&mut self, descriptor: BufferDescriptor) -> BufferHandle {
        let index = self.buffers.len() as u32;
        let name = descriptor
            .label
            .clone()
            .unwrap_or_else(|| format!("buffer_{index}"));
        self.buffers.push(BufferResource::new(
            name,
            descriptor,
            None,
            ResourceState::Undefined,
        ));
        BufferHandle::new(index)
    }

    /// Register an externally owned texture currently in `state`.
    pub fn import_texture(&mut self, native: NativeTexture, state: ResourceState) -> TextureHandle {
        let index = self.textures.len() as u32;
        let name = native
            .descriptor
            .label
            .clone()
            .unwrap_or_else(|| format!("imported_texture_{index}"));
        self.textures.push(TextureResource::new(
            name,
            native.descriptor,
            Some(Allocation::dedicated(native.handle)),
            state,
        ));
        TextureHandle::new(index)
    }

    /// Register an externally owned buffer currently in `state`.
    pub fn import_buffer(&mut self, native: NativeBuffer, state: ResourceState) -> BufferHandle {
        let index = self.buffers.len() as u32;
        let name = native
            .descriptor
            .label
            .clone()
            .unwrap_or_else(|| format!("imported_buffer_{index}"));
        self.buffers.push(BufferResource::new(
            name,
            native.descriptor,
            Some(Allocation::dedicated(native.handle)),
            state,
        ));
        BufferHandle::new(index)
    }

    /// Require the whole resource to end in `state`.
    ///
    /// Returns `false` (and changes nothing) for an unregistered target.
    pub fn set_export_state(&mut self, target: UsageTarget, state: ResourceState) -> bool {
        let export_state = match target {
            UsageTarget::Texture { index, .. } => self
                .textures
                .get_mut(index as usize)
                .map(|t| &mut t.export_state),
            UsageTarget::Buffer { index, .. } => self
                .buffers
                .get_mut(index as usize)
                .map(|b| &mut b.export_state),
        };
        match export_state {
            Some(slot) => {
                *slot = Some(state);
                true
            }
            None => {
                log::debug!("set_export_state on unregistered resource {target:?} ignored");
                false
            }
        }
    }

    /// Check whether a usage target refers to a registered resource.
    pub fn contains(&self, target: UsageTarget) -> bool {
        match target {
            UsageTarget::Texture { index, .. } => (index as usize) < self.textures.len(),
            UsageTarget::Buffer { index, .. } => (index as usize) < self.buffers.len(),
        }
    }

    /// Get a texture by handle.
    pub fn texture(&self, handle: TextureHandle) -> Option<&TextureResource> {
        self.textures.get(handle.index as usize)
    }

    /// Get a buffer by handle.
    pub fn buffer(&self, handle: BufferHandle) -> Option<&BufferResource> {
        self.buffers.get(handle.index as usize)
    }

    /// All textures, in registration order.
    pub fn textures(&self) -> &[TextureResource] {
        &self.textures
    }

    /// All buffers, in registration order.
    pub fn buffers(&self) -> &[BufferResource] {
        &self.buffers
    }

    pub(crate) fn textures_mut(&mut self) -> &mut [TextureResource] {
        &mut self.textures
    }

    pub(crate) fn buffers_mut(&mut self) -> &mut [BufferResource] {
        &mut self.buffers
    }

    /// Remove every resource.
    pub fn clear(&mut self) {
        self.textures.clear();
        self.buffers.clear();
    }
}
