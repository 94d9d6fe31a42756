//! Property tests over randomly generated frames.
//!
//! Each case builds a graph of a few passes touching three textures and two
//! buffers with random states and subresources, compiles it and replays the
//! recorded barriers against per-object state trackers.

mod common;

use proptest::prelude::*;

use common::{StateReplay, color_target, export_batches, storage_buffer};
use redlilium_render_graph::backend::RecordingContext;
use redlilium_render_graph::{
    AccessKind, BufferHandle, DummyDevice, GraphConfig, PassKind, RedundancyPolicy, RenderGraph,
    ResourceState, TextureHandle,
};

const TEXTURE_MIPS: [u32; 3] = [1, 2, 3];
const BUFFER_SIZE: u64 = 256;
const SLICE_SIZE: u64 = 64;

const GRAPHICS_ACCESSES: &[(ResourceState, AccessKind)] = &[
    (ResourceState::RenderTarget, AccessKind::Write),
    (ResourceState::ShaderResource, AccessKind::Read),
    (ResourceState::UnorderedAccess, AccessKind::ReadWrite),
    (ResourceState::CopyDest, AccessKind::Write),
];

const COMPUTE_ACCESSES: &[(ResourceState, AccessKind)] = &[
    (ResourceState::ShaderResource, AccessKind::Read),
    (ResourceState::UnorderedAccess, AccessKind::ReadWrite),
    (ResourceState::UnorderedAccess, AccessKind::Write),
];

const COPY_ACCESSES: &[(ResourceState, AccessKind)] = &[
    (ResourceState::CopySource, AccessKind::Read),
    (ResourceState::CopyDest, AccessKind::Write),
];

const EXPORT_STATES: [ResourceState; 4] = [
    ResourceState::ShaderResource,
    ResourceState::UnorderedAccess,
    ResourceState::CopySource,
    ResourceState::Common,
];

#[derive(Debug, Clone)]
struct UsageSpec {
    /// 0..3 are textures, 3..5 buffers.
    resource: usize,
    access: usize,
    /// Mip level or slice index, reduced modulo what the resource has.
    part: Option<u32>,
}

#[derive(Debug, Clone)]
struct PassSpec {
    kind: PassKind,
    usages: Vec<UsageSpec>,
}

#[derive(Debug, Clone)]
struct FrameSpec {
    passes: Vec<PassSpec>,
    exports: Vec<Option<usize>>,
}

fn usage_strategy() -> impl Strategy<Value = UsageSpec> {
    (0usize..5, 0usize..4, proptest::option::of(0u32..4)).prop_map(|(resource, access, part)| {
        UsageSpec {
            resource,
            access,
            part,
        }
    })
}

fn pass_strategy() -> impl Strategy<Value = PassSpec> {
    (
        prop_oneof![
            Just(PassKind::Graphics),
            Just(PassKind::Compute),
            Just(PassKind::Copy)
        ],
        proptest::collection::vec(usage_strategy(), 1..4),
    )
        .prop_map(|(kind, usages)| PassSpec { kind, usages })
}

fn frame_strategy() -> impl Strategy<Value = FrameSpec> {
    (
        proptest::collection::vec(pass_strategy(), 1..8),
        proptest::collection::vec(proptest::option::of(0usize..EXPORT_STATES.len()), 5),
    )
        .prop_map(|(passes, exports)| FrameSpec { passes, exports })
}

fn accesses(kind: PassKind) -> &'static [(ResourceState, AccessKind)] {
    match kind {
        PassKind::Graphics => GRAPHICS_ACCESSES,
        PassKind::Compute => COMPUTE_ACCESSES,
        PassKind::Copy => COPY_ACCESSES,
    }
}

struct Frame {
    graph: RenderGraph<'static>,
    textures: Vec<TextureHandle>,
    buffers: Vec<BufferHandle>,
}

fn build(spec: &FrameSpec) -> Frame {
    let config = GraphConfig::new().with_redundancy_policy(RedundancyPolicy::Assert);
    let mut graph = RenderGraph::with_config(config);
    let textures: Vec<_> = TEXTURE_MIPS
        .iter()
        .enumerate()
        .map(|(i, &mips)| graph.create_texture(color_target(&format!("texture{i}"), mips)))
        .collect();
    let buffers: Vec<_> = (0..2)
        .map(|i| graph.create_buffer(storage_buffer(&format!("buffer{i}"), BUFFER_SIZE)))
        .collect();

    for (resource, export) in spec.exports.iter().enumerate() {
        let Some(export) = export else { continue };
        let state = EXPORT_STATES[*export];
        if resource < textures.len() {
            graph.set_export_state(textures[resource], state);
        } else {
            graph.set_export_state(buffers[resource - textures.len()], state);
        }
    }

    for (index, pass) in spec.passes.iter().enumerate() {
        let table = accesses(pass.kind);
        graph.add_pass(
            format!("pass{index}"),
            pass.kind,
            |builder| {
                for usage in &pass.usages {
                    let (state, access) = table[usage.access % table.len()];
                    if usage.resource < textures.len() {
                        let mut handle = textures[usage.resource];
                        if let Some(part) = usage.part {
                            handle = handle.mip(part % TEXTURE_MIPS[usage.resource]);
                        }
                        builder.access(handle, state, access);
                    } else {
                        let mut handle = buffers[usage.resource - textures.len()];
                        if let Some(part) = usage.part {
                            handle = handle.slice(u64::from(part) * SLICE_SIZE, SLICE_SIZE);
                        }
                        builder.access(handle, state, access);
                    }
                }
            },
            |_| {},
        );
    }

    Frame {
        graph,
        textures,
        buffers,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn test_recorded_barriers_replay_consistently(spec in frame_strategy()) {
        let mut frame = build(&spec);
        frame.graph.compile(&mut DummyDevice::new()).unwrap();

        let mut context = RecordingContext::new();
        let mut replay = StateReplay::new(&frame.graph);
        frame.graph.execute(&mut context);
        prop_assert_eq!(replay.apply_recorded(&context), Ok(()));

        for &texture in &frame.textures {
            let record = frame.graph.texture(texture).unwrap();
            if let (Some(export), Some(native)) = (record.export_state(), record.native()) {
                prop_assert_eq!(replay.texture_state(native), Some(export));
            }
        }
        for &buffer in &frame.buffers {
            let record = frame.graph.buffer(buffer).unwrap();
            if let (Some(export), Some(native)) = (record.export_state(), record.native()) {
                prop_assert_eq!(replay.buffer_state(native), Some(export));
            }
        }
        prop_assert!(export_batches(&context).len() <= 1);
    }

    #[test]
    fn test_recompile_yields_identical_plan(spec in frame_strategy()) {
        let mut frame = build(&spec);
        let mut device = DummyDevice::new();
        let first = frame.graph.compile(&mut device).unwrap().clone();
        let order = frame.graph.execution_order().to_vec();
        let barriers: Vec<_> = frame
            .graph
            .passes()
            .iter()
            .map(|p| (p.texture_barriers().to_vec(), p.buffer_barriers().to_vec()))
            .collect();

        let second = frame.graph.compile(&mut device).unwrap().clone();
        prop_assert_eq!(first, second);
        prop_assert_eq!(frame.graph.execution_order(), order.as_slice());
        for (pass, (textures, buffers)) in frame.graph.passes().iter().zip(&barriers) {
            prop_assert_eq!(pass.texture_barriers(), textures.as_slice());
            prop_assert_eq!(pass.buffer_barriers(), buffers.as_slice());
        }
    }

    #[test]
    fn test_culled_passes_are_invisible(spec in frame_strategy()) {
        let mut frame = build(&spec);
        let stats = frame.graph.compile(&mut DummyDevice::new()).unwrap().clone();

        let exported_textures: Vec<u32> = frame
            .textures
            .iter()
            .filter(|&&t| frame.graph.texture(t).unwrap().export_state().is_some())
            .map(|t| t.index())
            .collect();
        let exported_buffers: Vec<u32> = frame
            .buffers
            .iter()
            .filter(|&&b| frame.graph.buffer(b).unwrap().export_state().is_some())
            .map(|b| b.index())
            .collect();

        let mut culled = 0;
        for pass in frame.graph.passes().iter().filter(|p| p.is_culled()) {
            culled += 1;
            prop_assert_eq!(pass.barrier_count(), 0);
            prop_assert!(pass.texture_writes().iter().all(|t| !exported_textures.contains(t)));
            prop_assert!(pass.buffer_writes().iter().all(|b| !exported_buffers.contains(b)));
        }
        prop_assert_eq!(culled, stats.culled_passes);
        prop_assert_eq!(
            frame.graph.execution_order().len(),
            spec.passes.len() - stats.culled_passes
        );
    }
}
