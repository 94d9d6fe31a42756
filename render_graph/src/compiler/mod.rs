//! Render graph compilation.
//!
//! This module turns the passes and usages of a
//! [`RenderGraph`](crate::graph::RenderGraph) into an execution plan. The
//! steps run strictly in this order:
//!
//! 1. **Backing allocation** - every transient resource without a backing
//!    object gets one from the [`Device`]; tracked states are reset.
//! 2. **Read/write sets** - usages are deduplicated into per-pass read and
//!    write lists, and each resource learns its writer passes.
//! 3. **Culling** - backward reachability from passes writing imported or
//!    exported resources. Everything unreached is culled.
//! 4. **Topological order** - Kahn's algorithm over the needed passes.
//! 5. **Barrier synthesis** - in registration order, each pass's desired
//!    states are diffed against the tracked states.
//! 6. **Barrier merging** - per pass, see [`merge_texture_barriers`].
//! 7. **Redundancy elimination** - barriers are replayed in execution order
//!    against the state of each native object.
//! 8. **Statistics**.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::backend::{Device, NativeHandle};
use crate::error::GraphError;
use crate::graph::{
    BufferBarrier, BufferHandle, BufferStateTracker, ByteRange, GraphConfig, Pass, PassHandle,
    RangeMap, RedundancyPolicy, ResourceRegistry, ResourceState, SubresourceRange, TextureAspect,
    TextureBarrier, TextureHandle, TextureStateTracker, UsageTarget, merge_buffer_barriers,
    merge_texture_barriers,
};
use crate::profile_scope;

/// Statistics of one compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileStats {
    /// Number of registered passes.
    pub total_passes: usize,
    /// Number of passes removed by culling.
    pub culled_passes: usize,
    /// Texture barriers synthesized before merging.
    pub raw_texture_barriers: usize,
    /// Buffer barriers synthesized before merging.
    pub raw_buffer_barriers: usize,
    /// Texture barriers left after merging and redundancy elimination.
    pub texture_barriers: usize,
    /// Buffer barriers left after merging and redundancy elimination.
    pub buffer_barriers: usize,
    /// Barriers eliminated by per-pass merging.
    pub merged_away: usize,
    /// Barriers eliminated by cross-pass redundancy elimination.
    pub redundant_eliminated: usize,
    /// Whether the topological sort failed and declaration order was used.
    pub used_fallback_order: bool,
}

impl CompileStats {
    /// Number of passes that will execute.
    pub fn executed_passes(&self) -> usize {
        self.total_passes - self.culled_passes
    }

    /// Barriers synthesized before merging, textures and buffers combined.
    pub fn raw_barriers(&self) -> usize {
        self.raw_texture_barriers + self.raw_buffer_barriers
    }

    /// Barriers that will be issued by passes, textures and buffers combined.
    pub fn total_barriers(&self) -> usize {
        self.texture_barriers + self.buffer_barriers
    }
}

/// Compile passes and resources into `order`, returning the statistics.
///
/// On error nothing but the backing allocations made so far is kept.
pub(crate) fn compile_into(
    config: &GraphConfig,
    registry: &mut ResourceRegistry,
    passes: &mut [Pass<'_>],
    device: &mut dyn Device,
    order: &mut Vec<PassHandle>,
) -> Result<CompileStats, GraphError> {
    profile_scope!("render_graph::compile");
    order.clear();

    allocate_backing(registry, device)?;
    derive_access_sets(registry, passes);

    let needed = if config.cull_passes {
        cull(registry, passes)
    } else {
        vec![true; passes.len()]
    };
    for (pass, &needed) in passes.iter_mut().zip(&needed) {
        pass.culled = !needed;
    }

    let needed_indices: Vec<usize> = (0..passes.len()).filter(|&i| needed[i]).collect();
    let edges = dependency_edges(passes, &needed_indices);
    let (sorted, used_fallback_order) = resolve_order(passes.len(), &needed_indices, &edges);
    if used_fallback_order {
        log::warn!(
            "render graph order covers fewer than {} needed passes, using declaration order",
            needed_indices.len()
        );
    }
    order.extend(sorted.iter().map(|&i| PassHandle::new(i as u32)));

    let mut stats = CompileStats {
        total_passes: passes.len(),
        culled_passes: passes.len() - needed_indices.len(),
        used_fallback_order,
        ..CompileStats::default()
    };

    for &index in &needed_indices {
        synthesize_barriers(registry, &mut passes[index]);
        stats.raw_texture_barriers += passes[index].texture_barriers.len();
        stats.raw_buffer_barriers += passes[index].buffer_barriers.len();
    }

    if config.merge_barriers {
        profile_scope!("render_graph::merge_barriers");
        let textures = registry.textures();
        let buffers = registry.buffers();
        for &index in &needed_indices {
            let pass = &mut passes[index];
            let mut counts = merge_texture_barriers(&mut pass.texture_barriers, |i| {
                let tracker = textures[i as usize].tracker();
                (tracker.mip_levels(), tracker.array_layers())
            });
            counts +=
                merge_buffer_barriers(&mut pass.buffer_barriers, |i| buffers[i as usize].size());
            stats.merged_away += counts.merged_away();
        }
    }

    if config.eliminate_redundant_barriers {
        stats.redundant_eliminated =
            eliminate_redundant(registry, passes, &sorted, config.redundancy_policy);
    }

    for &index in &needed_indices {
        stats.texture_barriers += passes[index].texture_barriers.len();
        stats.buffer_barriers += passes[index].buffer_barriers.len();
    }

    log::debug!(
        "Compiled render graph: {} passes ({} culled), barriers {} raw / {} final \
         ({} merged, {} redundant)",
        stats.total_passes,
        stats.culled_passes,
        stats.raw_barriers(),
        stats.total_barriers(),
        stats.merged_away,
        stats.redundant_eliminated
    );
    Ok(stats)
}

fn allocate_backing(
    registry: &mut ResourceRegistry,
    device: &mut dyn Device,
) -> Result<(), GraphError> {
    profile_scope!("render_graph::allocate_backing");
    for texture in registry.textures_mut() {
        if !texture.imported && texture.backing.is_none() {
            let allocation = device.create_texture(&texture.descriptor).map_err(|source| {
                GraphError::TextureAllocation {
                    name: texture.name.clone(),
                    source,
                }
            })?;
            texture.backing = Some(allocation);
        }
        texture.tracker.reset(texture.initial_state);
        texture.writers.clear();
    }
    for buffer in registry.buffers_mut() {
        if !buffer.imported && buffer.backing.is_none() {
            let allocation = device.create_buffer(&buffer.descriptor).map_err(|source| {
                GraphError::BufferAllocation {
                    name: buffer.name.clone(),
                    source,
                }
            })?;
            buffer.backing = Some(allocation);
        }
        buffer.tracker.reset(buffer.initial_state);
        buffer.writers.clear();
    }
    Ok(())
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, value: T) {
    if !list.contains(&value) {
        list.push(value);
    }
}

fn derive_access_sets(registry: &mut ResourceRegistry, passes: &mut [Pass<'_>]) {
    for (index, pass) in passes.iter_mut().enumerate() {
        pass.reset_compiled();
        let handle = PassHandle::new(index as u32);
        let usages = pass.usages().to_vec();
        for usage in usages {
            match usage.target {
                UsageTarget::Texture { index, .. } => {
                    if usage.access.reads() {
                        push_unique(&mut pass.texture_reads, index);
                    }
                    if usage.access.writes() {
                        push_unique(&mut pass.texture_writes, index);
                        if let Some(texture) = registry.textures_mut().get_mut(index as usize) {
                            push_unique(&mut texture.writers, handle);
                        }
                    }
                }
                UsageTarget::Buffer { index, .. } => {
                    if usage.access.reads() {
                        push_unique(&mut pass.buffer_reads, index);
                    }
                    if usage.access.writes() {
                        push_unique(&mut pass.buffer_writes, index);
                        if let Some(buffer) = registry.buffers_mut().get_mut(index as usize) {
                            push_unique(&mut buffer.writers, handle);
                        }
                    }
                }
            }
        }
    }
}

/// Backward reachability from passes writing externally visible resources.
fn cull(registry: &ResourceRegistry, passes: &[Pass<'_>]) -> Vec<bool> {
    profile_scope!("render_graph::cull");
    let textures = registry.textures();
    let buffers = registry.buffers();

    let mut needed = vec![false; passes.len()];
    let mut worklist = Vec::new();
    for (index, pass) in passes.iter().enumerate() {
        let writes_visible = pass
            .texture_writes()
            .iter()
            .any(|&t| textures[t as usize].is_externally_visible())
            || pass
                .buffer_writes()
                .iter()
                .any(|&b| buffers[b as usize].is_externally_visible());
        if writes_visible {
            needed[index] = true;
            worklist.push(index);
        }
    }

    while let Some(index) = worklist.pop() {
        let pass = &passes[index];
        let texture_writers = pass
            .texture_reads()
            .iter()
            .flat_map(|&t| textures[t as usize].writers());
        let buffer_writers = pass
            .buffer_reads()
            .iter()
            .flat_map(|&b| buffers[b as usize].writers());
        for writer in texture_writers.chain(buffer_writers) {
            if !needed[writer.index()] {
                needed[writer.index()] = true;
                worklist.push(writer.index());
            }
        }
    }
    needed
}

#[derive(Default, Clone)]
struct Hazard {
    last_writer: Option<usize>,
    readers: Vec<usize>,
}

impl Hazard {
    fn access(&mut self, pass: usize, reads: bool, writes: bool, edges: &mut Vec<(usize, usize)>) {
        if let Some(writer) = self.last_writer.filter(|&w| w != pass) {
            // Read-after-write and write-after-write.
            edges.push((writer, pass));
        }
        if writes {
            edges.extend(self.readers.iter().filter(|&&r| r != pass).map(|&r| (r, pass)));
            self.readers.clear();
            self.last_writer = Some(pass);
        } else if reads {
            self.readers.push(pass);
        }
    }
}

/// Edges from each pass to the later needed passes depending on it.
fn dependency_edges(passes: &[Pass<'_>], needed: &[usize]) -> Vec<(usize, usize)> {
    let mut textures: HashMap<u32, Hazard> = HashMap::new();
    let mut buffers: HashMap<u32, Hazard> = HashMap::new();
    let mut edges = Vec::new();

    for &index in needed {
        let pass = &passes[index];
        let touched_textures = pass.texture_reads().iter().chain(pass.texture_writes());
        for &texture in touched_textures {
            let reads = pass.texture_reads().contains(&texture);
            let writes = pass.texture_writes().contains(&texture);
            textures
                .entry(texture)
                .or_default()
                .access(index, reads, writes, &mut edges);
        }
        let touched_buffers = pass.buffer_reads().iter().chain(pass.buffer_writes());
        for &buffer in touched_buffers {
            let reads = pass.buffer_reads().contains(&buffer);
            let writes = pass.buffer_writes().contains(&buffer);
            buffers
                .entry(buffer)
                .or_default()
                .access(index, reads, writes, &mut edges);
        }
    }

    edges.sort_unstable();
    edges.dedup();
    edges
}

/// Kahn's algorithm over `nodes`, always emitting the smallest ready index.
///
/// `edges` are `(before, after)` pairs of pass indices below `pass_count`.
/// Edges touching indices outside `nodes` are ignored. On a cycle the
/// returned order is shorter than `nodes`.
pub fn topological_order(
    pass_count: usize,
    nodes: &[usize],
    edges: &[(usize, usize)],
) -> Vec<usize> {
    let mut member = vec![false; pass_count];
    for &node in nodes {
        member[node] = true;
    }

    let mut in_degree = vec![0usize; pass_count];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); pass_count];
    for &(from, to) in edges {
        if from < pass_count && to < pass_count && member[from] && member[to] && from != to {
            successors[from].push(to);
            in_degree[to] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = nodes
        .iter()
        .copied()
        .filter(|&n| in_degree[n] == 0)
        .map(Reverse)
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &next in &successors[node] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }
    order
}

/// Topological order of `needed`, or `needed` itself if the sort fails.
pub(crate) fn resolve_order(
    pass_count: usize,
    needed: &[usize],
    edges: &[(usize, usize)],
) -> (Vec<usize>, bool) {
    let order = topological_order(pass_count, needed, edges);
    if order.len() == needed.len() {
        (order, false)
    } else {
        (needed.to_vec(), true)
    }
}

/// Desired state of a texture within one pass.
enum TextureDesire {
    Whole(ResourceState, TextureAspect),
    Cells(Vec<Option<(ResourceState, TextureAspect)>>),
}

/// Desired state of a buffer within one pass.
enum BufferDesire {
    Whole(ResourceState),
    Ranges(RangeMap<Option<ResourceState>>),
}

fn fold_texture_desire(
    desire: Option<TextureDesire>,
    tracker: &TextureStateTracker,
    range: Option<SubresourceRange>,
    state: ResourceState,
    aspect: TextureAspect,
) -> Option<TextureDesire> {
    let (mips, layers) = (tracker.mip_levels(), tracker.array_layers());
    let range = match range {
        None => return Some(TextureDesire::Whole(state, aspect)),
        Some(r) => match r.clamp(mips, layers) {
            Some(r) if r.covers(mips, layers) => return Some(TextureDesire::Whole(state, aspect)),
            Some(r) => r,
            None => return desire,
        },
    };

    let count = mips as usize * layers as usize;
    let mut cells = match desire {
        None => vec![None; count],
        Some(TextureDesire::Whole(s, a)) => vec![Some((s, a)); count],
        Some(TextureDesire::Cells(cells)) => cells,
    };
    for layer in range.base_layer..range.layer_end() {
        for mip in range.base_mip..range.mip_end() {
            cells[mip as usize + layer as usize * mips as usize] = Some((state, aspect));
        }
    }
    Some(TextureDesire::Cells(cells))
}

fn fold_buffer_desire(
    desire: Option<BufferDesire>,
    tracker: &BufferStateTracker,
    range: Option<ByteRange>,
    state: ResourceState,
) -> Option<BufferDesire> {
    let len = tracker.len();
    let range = match range {
        None => return Some(BufferDesire::Whole(state)),
        Some(r) => match r.clamp(len) {
            Some(r) if r.covers(len) => return Some(BufferDesire::Whole(state)),
            Some(r) => r,
            None => return desire,
        },
    };

    let mut map = match desire {
        None => RangeMap::new(len, None),
        Some(BufferDesire::Whole(s)) => RangeMap::new(len, Some(s)),
        Some(BufferDesire::Ranges(map)) => map,
    };
    map.apply(range, Some(state));
    Some(BufferDesire::Ranges(map))
}

/// Diff the pass's desired states against the tracked ones.
///
/// Later usages of the same region within the pass override earlier ones,
/// so every cell or byte transitions at most once per pass.
///
/// # Panics
///
/// Panics if the pass requests a state its kind does not allow.
fn synthesize_barriers(registry: &mut ResourceRegistry, pass: &mut Pass<'_>) {
    let kind = pass.kind();
    for usage in pass.usages() {
        assert!(
            kind.allows(usage.state),
            "pass '{}' ({kind} pass) requests state {} which a {kind} pass cannot use",
            pass.name(),
            usage.state
        );
    }

    let mut texture_desires: Vec<(u32, Option<TextureDesire>)> = Vec::new();
    let mut buffer_desires: Vec<(u32, Option<BufferDesire>)> = Vec::new();
    for usage in pass.usages() {
        match usage.target {
            UsageTarget::Texture {
                index,
                range,
                aspect,
            } => {
                let Some(texture) = registry.textures().get(index as usize) else {
                    continue;
                };
                let aspect = aspect.unwrap_or_else(|| texture.default_aspect());
                let slot = match texture_desires.iter().position(|(i, _)| *i == index) {
                    Some(slot) => slot,
                    None => {
                        texture_desires.push((index, None));
                        texture_desires.len() - 1
                    }
                };
                let desire = texture_desires[slot].1.take();
                texture_desires[slot].1 =
                    fold_texture_desire(desire, texture.tracker(), range, usage.state, aspect);
            }
            UsageTarget::Buffer { index, range } => {
                let Some(buffer) = registry.buffers().get(index as usize) else {
                    continue;
                };
                let slot = match buffer_desires.iter().position(|(i, _)| *i == index) {
                    Some(slot) => slot,
                    None => {
                        buffer_desires.push((index, None));
                        buffer_desires.len() - 1
                    }
                };
                let desire = buffer_desires[slot].1.take();
                buffer_desires[slot].1 =
                    fold_buffer_desire(desire, buffer.tracker(), range, usage.state);
            }
        }
    }

    let mut texture_barriers = Vec::new();
    for (index, desire) in texture_desires {
        let Some(desire) = desire else { continue };
        let Some(texture) = registry.textures_mut().get_mut(index as usize) else {
            continue;
        };
        let Some(native) = texture.native() else {
            continue;
        };
        let make_barrier = |range: Option<SubresourceRange>,
                            before: ResourceState,
                            after: ResourceState,
                            aspect: TextureAspect| TextureBarrier {
            texture: TextureHandle::new(index),
            native,
            before,
            after,
            aspect,
            range,
        };
        match desire {
            TextureDesire::Whole(state, aspect) => {
                for transition in texture.tracker.transition(None, state) {
                    texture_barriers.push(make_barrier(
                        transition.range,
                        transition.before,
                        state,
                        aspect,
                    ));
                }
            }
            TextureDesire::Cells(cells) => {
                let mips = texture.tracker.mip_levels();
                for (cell, wanted) in cells.into_iter().enumerate() {
                    let Some((state, aspect)) = wanted else { continue };
                    let cell = cell as u32;
                    let range = SubresourceRange::single(cell % mips, cell / mips);
                    for transition in texture.tracker.transition(Some(range), state) {
                        texture_barriers.push(make_barrier(
                            transition.range,
                            transition.before,
                            state,
                            aspect,
                        ));
                    }
                }
            }
        }
    }

    let mut buffer_barriers = Vec::new();
    for (index, desire) in buffer_desires {
        let Some(desire) = desire else { continue };
        let Some(buffer) = registry.buffers_mut().get_mut(index as usize) else {
            continue;
        };
        let Some(native) = buffer.native() else {
            continue;
        };
        let wanted: Vec<(Option<ByteRange>, ResourceState)> = match desire {
            BufferDesire::Whole(state) => vec![(None, state)],
            BufferDesire::Ranges(map) => map
                .iter()
                .filter_map(|(range, state)| state.map(|s| (Some(range), s)))
                .collect(),
        };
        for (range, state) in wanted {
            for transition in buffer.tracker.transition(range, state) {
                buffer_barriers.push(BufferBarrier {
                    buffer: BufferHandle::new(index),
                    native,
                    before: transition.before,
                    after: state,
                    range: transition.range,
                });
            }
        }
    }

    for barrier in &texture_barriers {
        log::trace!("pass '{}': {barrier}", pass.name());
    }
    for barrier in &buffer_barriers {
        log::trace!("pass '{}': {barrier}", pass.name());
    }
    pass.texture_barriers = texture_barriers;
    pass.buffer_barriers = buffer_barriers;
}

/// Outcome of replaying one barrier against a native object's state.
enum Replay {
    Keep,
    Redundant,
    Mismatch,
}

fn replay(states: &[ResourceState], before: ResourceState, after: ResourceState) -> Replay {
    if states.iter().all(|&s| s == before) {
        Replay::Keep
    } else if states.iter().all(|&s| s == after) {
        Replay::Redundant
    } else {
        Replay::Mismatch
    }
}

/// Replay the barriers in execution order per native object and drop the
/// ones that would not change anything. Returns how many were dropped.
fn eliminate_redundant(
    registry: &ResourceRegistry,
    passes: &mut [Pass<'_>],
    order: &[usize],
    policy: RedundancyPolicy,
) -> usize {
    profile_scope!("render_graph::eliminate_redundant");
    let mut textures: HashMap<NativeHandle, TextureStateTracker> = HashMap::new();
    let mut buffers: HashMap<NativeHandle, BufferStateTracker> = HashMap::new();
    let mut eliminated = 0;

    for &index in order {
        let pass = &mut passes[index];
        let pass_name = pass.name().to_owned();

        pass.texture_barriers.retain(|barrier| {
            let tracker = textures.entry(barrier.native).or_insert_with(|| {
                let texture = &registry.textures()[barrier.texture.index() as usize];
                let descriptor = texture.descriptor();
                TextureStateTracker::new(
                    descriptor.mip_levels(),
                    descriptor.array_layers(),
                    texture.initial_state(),
                )
            });
            let outcome = replay(&tracker.states(barrier.range), barrier.before, barrier.after);
            let keep = resolve_replay(outcome, policy, &pass_name, &barrier.to_string());
            tracker.transition(barrier.range, barrier.after);
            if !keep {
                eliminated += 1;
            }
            keep
        });

        pass.buffer_barriers.retain(|barrier| {
            let tracker = buffers.entry(barrier.native).or_insert_with(|| {
                let buffer = &registry.buffers()[barrier.buffer.index() as usize];
                BufferStateTracker::new(buffer.size(), buffer.initial_state())
            });
            let outcome = replay(&tracker.states(barrier.range), barrier.before, barrier.after);
            let keep = resolve_replay(outcome, policy, &pass_name, &barrier.to_string());
            tracker.transition(barrier.range, barrier.after);
            if !keep {
                eliminated += 1;
            }
            keep
        });
    }
    eliminated
}

fn resolve_replay(outcome: Replay, policy: RedundancyPolicy, pass: &str, barrier: &str) -> bool {
    match outcome {
        Replay::Keep => true,
        Replay::Redundant => {
            log::trace!("pass '{pass}': dropping redundant barrier {barrier}");
            false
        }
        Replay::Mismatch => match policy {
            RedundancyPolicy::Assert => panic!(
                "pass '{pass}': barrier {barrier} does not start from the state \
                 earlier passes left the resource in"
            ),
            RedundancyPolicy::Drop => {
                log::warn!(
                    "pass '{pass}': dropping barrier {barrier} with mismatched before state"
                );
                false
            }
        },
    }
}
