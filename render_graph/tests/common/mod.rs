//! Common utilities for render graph integration tests.

#![allow(dead_code)]

use std::collections::HashMap;

use redlilium_render_graph::backend::{RecordedCommand, RecordingContext};
use redlilium_render_graph::graph::{BufferStateTracker, TextureStateTracker};
use redlilium_render_graph::{
    BufferBarrier, BufferDescriptor, BufferUsage, NativeHandle, RenderGraph, ResourceState,
    TextureBarrier, TextureDescriptor, TextureFormat, TextureUsage,
};

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A sampled color target with `mips` mip levels.
pub fn color_target(label: &str, mips: u32) -> TextureDescriptor {
    TextureDescriptor::new_2d(
        256,
        256,
        TextureFormat::Rgba16Float,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
    )
    .with_label(label)
    .with_mip_levels(mips)
}

/// A storage buffer of `size` bytes.
pub fn storage_buffer(label: &str, size: u64) -> BufferDescriptor {
    BufferDescriptor::new(size, BufferUsage::STORAGE | BufferUsage::COPY_DST).with_label(label)
}

/// Barrier batches issued after the last pass closed its debug scope.
pub fn export_batches(context: &RecordingContext) -> Vec<(&[BufferBarrier], &[TextureBarrier])> {
    let commands = context.commands();
    let start = commands
        .iter()
        .rposition(|c| matches!(c, RecordedCommand::EndEvent))
        .map_or(0, |i| i + 1);
    commands[start..]
        .iter()
        .filter_map(|command| match command {
            RecordedCommand::Barriers { buffers, textures } => {
                Some((buffers.as_slice(), textures.as_slice()))
            }
            _ => None,
        })
        .collect()
}

/// Replays recorded barriers against the state of every native object,
/// starting from the initial states the graph was given.
pub struct StateReplay {
    textures: HashMap<NativeHandle, TextureStateTracker>,
    buffers: HashMap<NativeHandle, BufferStateTracker>,
}

impl StateReplay {
    /// Seed from the resources of a compiled graph.
    pub fn new(graph: &RenderGraph<'_>) -> Self {
        let mut textures = HashMap::new();
        for texture in graph.registry().textures() {
            if let Some(native) = texture.native() {
                let descriptor = texture.descriptor();
                textures.entry(native).or_insert_with(|| {
                    TextureStateTracker::new(
                        descriptor.mip_levels(),
                        descriptor.array_layers(),
                        texture.initial_state(),
                    )
                });
            }
        }
        let mut buffers = HashMap::new();
        for buffer in graph.registry().buffers() {
            if let Some(native) = buffer.native() {
                buffers.entry(native).or_insert_with(|| {
                    BufferStateTracker::new(buffer.size(), buffer.initial_state())
                });
            }
        }
        Self { textures, buffers }
    }

    /// Apply one batch, checking each barrier starts from the replayed state
    /// and actually changes it.
    pub fn apply(
        &mut self,
        buffers: &[BufferBarrier],
        textures: &[TextureBarrier],
    ) -> Result<(), String> {
        for barrier in textures {
            if barrier.before == barrier.after {
                return Err(format!("no-op barrier {barrier}"));
            }
            let tracker = self
                .textures
                .get_mut(&barrier.native)
                .ok_or_else(|| format!("unknown native in {barrier}"))?;
            let states = tracker.states(barrier.range);
            if states.iter().any(|&s| s != barrier.before) {
                return Err(format!("{barrier} applied to states {states:?}"));
            }
            tracker.transition(barrier.range, barrier.after);
        }
        for barrier in buffers {
            if barrier.before == barrier.after {
                return Err(format!("no-op barrier {barrier}"));
            }
            let tracker = self
                .buffers
                .get_mut(&barrier.native)
                .ok_or_else(|| format!("unknown native in {barrier}"))?;
            let states = tracker.states(barrier.range);
            if states.iter().any(|&s| s != barrier.before) {
                return Err(format!("{barrier} applied to states {states:?}"));
            }
            tracker.transition(barrier.range, barrier.after);
        }
        Ok(())
    }

    /// Apply every batch recorded on `context`, in order.
    pub fn apply_recorded(&mut self, context: &RecordingContext) -> Result<(), String> {
        for (buffers, textures) in context.barrier_batches() {
            self.apply(buffers, textures)?;
        }
        Ok(())
    }

    /// Replayed whole-resource state of a texture, `None` if split.
    pub fn texture_state(&self, native: NativeHandle) -> Option<ResourceState> {
        self.textures.get(&native)?.whole_state()
    }

    /// Replayed whole-resource state of a buffer, `None` if split.
    pub fn buffer_state(&self, native: NativeHandle) -> Option<ResourceState> {
        self.buffers.get(&native)?.whole_state()
    }
}
