//! Render graph execution.
//!
//! [`execute`] walks the compiled order on one [`CommandContext`]: for every
//! non-culled pass it opens a debug scope, issues the pass's barriers, runs
//! the pass callback and closes the scope. After the last pass every
//! resource carrying an export state is transitioned to it in one batch.
//!
//! [`dual_queue`] splits the same walk across a graphics and a compute
//! context, with [`TimelineFence`] waits where resources cross queues.

pub mod dual_queue;
pub mod sync;

pub use dual_queue::ComputeQueue;
pub use sync::TimelineFence;

pub(crate) use dual_queue::execute_dual_queue;

use crate::backend::CommandContext;
use crate::graph::{
    BufferBarrier, BufferHandle, GraphConfig, Pass, PassHandle, ResourceRegistry, TextureBarrier,
    TextureHandle, merge_buffer_barriers, merge_texture_barriers,
};
use crate::{profile_scope, profile_scope_dynamic};

/// Indices of the passes to walk: `order` if given, declaration order
/// otherwise.
pub(crate) fn walk_order(pass_count: usize, order: Option<&[PassHandle]>) -> Vec<usize> {
    match order {
        Some(order) => order.iter().map(|h| h.index()).collect(),
        None => (0..pass_count).collect(),
    }
}

/// Issue one pass on `context`.
pub(crate) fn run_pass(
    config: &GraphConfig,
    pass: &mut Pass<'_>,
    context: &mut dyn CommandContext,
) {
    profile_scope_dynamic!(pass.name());
    log::trace!("executing pass '{}' ({})", pass.name(), pass.kind());
    if config.debug_events {
        context.begin_event(pass.name());
    }
    if pass.barrier_count() > 0 {
        context.barriers(&pass.buffer_barriers, &pass.texture_barriers);
    }
    pass.run(context);
    if config.debug_events {
        context.end_event();
    }
}

/// Barriers taking every exported resource from the state the compiled
/// passes leave it in to its export state.
///
/// The compiled trackers are left untouched, so every execution of the same
/// compiled graph issues the same export batch.
pub(crate) fn export_barriers(
    config: &GraphConfig,
    registry: &ResourceRegistry,
) -> (Vec<BufferBarrier>, Vec<TextureBarrier>) {
    let mut texture_barriers = Vec::new();
    for (index, texture) in registry.textures().iter().enumerate() {
        let (Some(export), Some(native)) = (texture.export_state(), texture.native()) else {
            continue;
        };
        let aspect = texture.default_aspect();
        let mut tracker = texture.tracker().clone();
        for transition in tracker.transition(None, export) {
            texture_barriers.push(TextureBarrier {
                texture: TextureHandle::new(index as u32),
                native,
                before: transition.before,
                after: export,
                aspect,
                range: transition.range,
            });
        }
    }

    let mut buffer_barriers = Vec::new();
    for (index, buffer) in registry.buffers().iter().enumerate() {
        let (Some(export), Some(native)) = (buffer.export_state(), buffer.native()) else {
            continue;
        };
        let mut tracker = buffer.tracker().clone();
        for transition in tracker.transition(None, export) {
            buffer_barriers.push(BufferBarrier {
                buffer: BufferHandle::new(index as u32),
                native,
                before: transition.before,
                after: export,
                range: transition.range,
            });
        }
    }

    if config.merge_barriers {
        let textures = registry.textures();
        merge_texture_barriers(&mut texture_barriers, |i| {
            let tracker = textures[i as usize].tracker();
            (tracker.mip_levels(), tracker.array_layers())
        });
        let buffers = registry.buffers();
        merge_buffer_barriers(&mut buffer_barriers, |i| buffers[i as usize].size());
    }

    (buffer_barriers, texture_barriers)
}

/// Issue the export barriers on `context`, if there are any.
pub(crate) fn issue_exports(
    config: &GraphConfig,
    registry: &ResourceRegistry,
    context: &mut dyn CommandContext,
) {
    let (buffer_barriers, texture_barriers) = export_barriers(config, registry);
    if buffer_barriers.is_empty() && texture_barriers.is_empty() {
        return;
    }
    log::trace!(
        "export barriers: {} texture, {} buffer",
        texture_barriers.len(),
        buffer_barriers.len()
    );
    context.barriers(&buffer_barriers, &texture_barriers);
}

/// Execute passes in `order` (declaration order if `None`) on one context.
pub(crate) fn execute(
    config: &GraphConfig,
    registry: &ResourceRegistry,
    passes: &mut [Pass<'_>],
    order: Option<&[PassHandle]>,
    context: &mut dyn CommandContext,
) {
    profile_scope!("render_graph::execute");
    for index in walk_order(passes.len(), order) {
        let Some(pass) = passes.get_mut(index) else {
            continue;
        };
        if pass.is_culled() {
            continue;
        }
        run_pass(config, pass, context);
    }
    issue_exports(config, registry, context);
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use crate::backend::{DummyDevice, RecordedCommand, RecordingContext};
    use crate::graph::{GraphConfig, PassKind, RenderGraph, ResourceState};
    use crate::types::{
        BufferDescriptor, BufferUsage, TextureDescriptor, TextureFormat, TextureUsage,
    };

    fn color_desc(mips: u32) -> TextureDescriptor {
        TextureDescriptor::new_2d(
            32,
            32,
            TextureFormat::Rgba8Unorm,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        )
        .with_mip_levels(mips)
    }

    #[test]
    fn test_execute_wraps_passes_in_events() {
        let mut graph = RenderGraph::new();
        let color = graph.create_texture(color_desc(1));
        graph.set_export_state(color, ResourceState::ShaderResource);
        graph.add_pass(
            "main",
            PassKind::Graphics,
            |p| {
                p.write(color, ResourceState::RenderTarget);
            },
            |ctx| ctx.begin_event("draw"),
        );
        graph.compile(&mut DummyDevice::new()).unwrap();

        let mut context = RecordingContext::new();
        graph.execute(&mut context);

        let commands = context.commands();
        assert_eq!(commands[0], RecordedCommand::BeginEvent("main".into()));
        assert!(matches!(commands[1], RecordedCommand::Barriers { .. }));
        assert_eq!(commands[2], RecordedCommand::BeginEvent("draw".into()));
        assert_eq!(commands[3], RecordedCommand::EndEvent);
        assert!(matches!(commands[4], RecordedCommand::Barriers { .. }));
        assert_eq!(commands.len(), 5);
    }

    #[test]
    fn test_execute_without_debug_events() {
        let mut graph = RenderGraph::with_config(GraphConfig::new().with_debug_events(false));
        let color = graph.create_texture(color_desc(1));
        graph.set_export_state(color, ResourceState::RenderTarget);
        graph.add_pass(
            "main",
            PassKind::Graphics,
            |p| {
                p.write(color, ResourceState::RenderTarget);
            },
            |_| {},
        );
        graph.compile(&mut DummyDevice::new()).unwrap();

        let mut context = RecordingContext::new();
        graph.execute(&mut context);

        // Pass barrier only: the export state is already reached.
        assert!(context.event_names().is_empty());
        assert_eq!(context.barrier_batches().len(), 1);
    }

    #[test]
    fn test_culled_pass_callback_is_skipped() {
        let ran = RefCell::new(Vec::new());
        {
            let mut graph = RenderGraph::new();
            let kept = graph.create_texture(color_desc(1));
            let dropped = graph.create_texture(color_desc(1));
            graph.set_export_state(kept, ResourceState::ShaderResource);
            graph.add_pass(
                "kept",
                PassKind::Graphics,
                |p| {
                    p.write(kept, ResourceState::RenderTarget);
                },
                |_| ran.borrow_mut().push("kept"),
            );
            graph.add_pass(
                "dropped",
                PassKind::Graphics,
                |p| {
                    p.write(dropped, ResourceState::RenderTarget);
                },
                |_| ran.borrow_mut().push("dropped"),
            );
            graph.compile(&mut DummyDevice::new()).unwrap();
            graph.execute(&mut RecordingContext::new());
        }
        assert_eq!(ran.into_inner(), vec!["kept"]);
    }

    #[test]
    fn test_uncompiled_graph_runs_in_declaration_order() {
        let ran = RefCell::new(Vec::new());
        {
            let mut graph = RenderGraph::new();
            let scratch = graph.create_buffer(BufferDescriptor::new(16, BufferUsage::STORAGE));
            let ran = &ran;
            for name in ["first", "second"] {
                graph.add_pass(
                    name,
                    PassKind::Compute,
                    |p| {
                        p.read_write(scratch);
                    },
                    move |_| ran.borrow_mut().push(name),
                );
            }

            let mut context = RecordingContext::new();
            graph.execute(&mut context);
            assert!(context.barrier_batches().is_empty());
        }
        assert_eq!(ran.into_inner(), vec!["first", "second"]);
    }

    #[test]
    fn test_exports_are_batched_and_merged() {
        let mut graph = RenderGraph::new();
        let texture = graph.create_texture(color_desc(2));
        let buffer = graph.create_buffer(BufferDescriptor::new(64, BufferUsage::STORAGE));
        graph.set_export_state(texture, ResourceState::ShaderResource);
        graph.set_export_state(buffer, ResourceState::ShaderResource);
        graph.add_pass(
            "split",
            PassKind::Compute,
            |p| {
                p.write(texture.mip(0), ResourceState::UnorderedAccess);
                p.write(texture.mip(1), ResourceState::CopyDest);
                p.write(buffer.slice(0, 32), ResourceState::UnorderedAccess);
            },
            |_| {},
        );
        graph.compile(&mut DummyDevice::new()).unwrap();

        let mut context = RecordingContext::new();
        graph.execute(&mut context);

        let batches = context.barrier_batches();
        let (buffers, textures) = batches[batches.len() - 1];
        assert_eq!(textures.len(), 2);
        assert!(textures.iter().all(|b| b.after == ResourceState::ShaderResource));
        assert_eq!(buffers.len(), 2);
        assert!(buffers.iter().all(|b| b.after == ResourceState::ShaderResource));

        // The compiled trackers still describe the state after the last pass.
        assert!(graph.texture(texture).unwrap().tracker().is_split());
        assert!(graph.buffer(buffer).unwrap().tracker().is_split());
    }

    #[test]
    fn test_every_execute_issues_exports() {
        let mut graph = RenderGraph::new();
        let color = graph.create_texture(color_desc(1));
        graph.set_export_state(color, ResourceState::ShaderResource);
        graph.add_pass(
            "draw",
            PassKind::Graphics,
            |p| {
                p.write(color, ResourceState::RenderTarget);
            },
            |_| {},
        );
        graph.compile(&mut DummyDevice::new()).unwrap();

        let mut first = RecordingContext::new();
        graph.execute(&mut first);
        let mut second = RecordingContext::new();
        graph.execute(&mut second);

        assert_eq!(second.barrier_batches().len(), 2);
        assert_eq!(first.commands(), second.commands());
        let (_, textures) = second.barrier_batches()[1];
        assert_eq!(textures[0].before, ResourceState::RenderTarget);
        assert_eq!(textures[0].after, ResourceState::ShaderResource);
    }
}
