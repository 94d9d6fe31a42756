//! Dual-queue execution.
//!
//! Compute passes are recorded on a compute context, graphics and copy
//! passes on the graphics context. Whenever a pass touches a resource whose
//! last write (or, for a write, whose last reads) happened on the other
//! queue, the other queue signals its [`TimelineFence`] and this queue waits
//! on it before the pass. A usage whose pass carries a barrier on the
//! resource changes its state and counts as a write, even if it only reads.
//!
//! Signals are emitted lazily: a queue signals only when a later pass on the
//! other queue depends on its work, and a queue never waits twice for values
//! it already covered.

use std::collections::HashMap;

use crate::backend::CommandContext;
use crate::graph::{
    GraphConfig, Pass, PassHandle, PassKind, ResourceRegistry, ResourceUsage, UsageTarget,
};
use crate::profile_scope;

use super::sync::TimelineFence;
use super::{issue_exports, run_pass, walk_order};

/// The compute queue handed to
/// [`RenderGraph::execute_async`](crate::graph::RenderGraph::execute_async).
pub struct ComputeQueue<'c> {
    /// Context compute passes are recorded on.
    pub context: &'c mut dyn CommandContext,
    /// Fence the compute queue signals.
    pub compute_fence: &'c TimelineFence,
    /// Fence the graphics queue signals.
    pub graphics_fence: &'c TimelineFence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Queue {
    Graphics,
    Compute,
}

impl Queue {
    fn for_pass(kind: PassKind) -> Self {
        match kind {
            PassKind::Compute => Self::Compute,
            PassKind::Graphics | PassKind::Copy => Self::Graphics,
        }
    }

    fn other(self) -> Self {
        match self {
            Self::Graphics => Self::Compute,
            Self::Compute => Self::Graphics,
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            Self::Graphics => "graphics",
            Self::Compute => "compute",
        }
    }
}

#[derive(Debug, Default)]
struct QueueState {
    /// Passes recorded so far.
    recorded: usize,
    /// Position and value of the last signal.
    signaled: Option<(usize, u64)>,
    /// Highest value waited for on the other queue's fence.
    waited: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ResourceKey {
    Texture(u32),
    Buffer(u32),
}

impl From<UsageTarget> for ResourceKey {
    fn from(target: UsageTarget) -> Self {
        match target {
            UsageTarget::Texture { index, .. } => Self::Texture(index),
            UsageTarget::Buffer { index, .. } => Self::Buffer(index),
        }
    }
}

/// Resources `pass` transitions before it runs.
fn transitioned(pass: &Pass<'_>) -> Vec<ResourceKey> {
    let mut keys: Vec<ResourceKey> = pass
        .texture_barriers()
        .iter()
        .map(|b| ResourceKey::Texture(b.texture.index()))
        .chain(
            pass.buffer_barriers()
                .iter()
                .map(|b| ResourceKey::Buffer(b.buffer.index())),
        )
        .collect();
    keys.dedup();
    keys
}

/// Queue positions of the accesses to one resource. Positions count the
/// passes recorded on a queue, the accessing pass included.
#[derive(Debug, Default)]
struct ResourceAccess {
    last_write: Option<(Queue, usize)>,
    last_read: [Option<usize>; 2],
}

impl ResourceAccess {
    /// Position on `other` that an access on the other queue must wait for.
    fn dependency(&self, other: Queue, writes: bool) -> Option<usize> {
        let write = self
            .last_write
            .filter(|&(queue, _)| queue == other)
            .map(|(_, position)| position);
        let read = if writes {
            self.last_read[other.index()]
        } else {
            None
        };
        write.max(read)
    }

    fn record(&mut self, queue: Queue, position: usize, reads: bool, writes: bool) {
        if writes {
            self.last_write = Some((queue, position));
            self.last_read = [None; 2];
        } else if reads {
            self.last_read[queue.index()] = Some(position);
        }
    }
}

struct Streams<'s> {
    contexts: [&'s mut dyn CommandContext; 2],
    fences: [&'s TimelineFence; 2],
    queues: [QueueState; 2],
}

impl Streams<'_> {
    /// Make `waiter` wait for the other queue's work up to `position`.
    fn wait_for(&mut self, waiter: Queue, position: usize) {
        let source = waiter.other();
        let s = source.index();
        let value = match self.queues[s].signaled {
            Some((signaled_at, value)) if signaled_at >= position => value,
            _ => {
                let value = self.fences[s].next_value();
                self.contexts[s].signal(self.fences[s], value);
                self.queues[s].signaled = Some((self.queues[s].recorded, value));
                log::debug!("{} queue signals fence value {value}", source.name());
                value
            }
        };

        let w = waiter.index();
        if self.queues[w].waited >= value {
            return;
        }
        self.contexts[w].wait(self.fences[s], value);
        self.queues[w].waited = value;
        log::debug!(
            "{} queue waits for {} fence value {value}",
            waiter.name(),
            source.name()
        );
    }
}

/// Execute passes across the graphics context and `compute`.
pub(crate) fn execute_dual_queue(
    config: &GraphConfig,
    registry: &ResourceRegistry,
    passes: &mut [Pass<'_>],
    order: Option<&[PassHandle]>,
    graphics: &mut dyn CommandContext,
    compute: ComputeQueue<'_>,
) {
    profile_scope!("render_graph::execute_dual_queue");
    let mut streams = Streams {
        contexts: [graphics, compute.context],
        fences: [compute.graphics_fence, compute.compute_fence],
        queues: [QueueState::default(), QueueState::default()],
    };
    let mut resources: HashMap<ResourceKey, ResourceAccess> = HashMap::new();

    for index in walk_order(passes.len(), order) {
        let Some(pass) = passes.get_mut(index) else {
            continue;
        };
        if pass.is_culled() {
            continue;
        }
        let queue = Queue::for_pass(pass.kind());
        let transitions = transitioned(pass);
        let changes_state = |usage: &ResourceUsage| {
            usage.access.writes() || transitions.contains(&ResourceKey::from(usage.target))
        };

        let dependency = pass
            .usages()
            .iter()
            .filter_map(|usage| {
                resources
                    .get(&ResourceKey::from(usage.target))?
                    .dependency(queue.other(), changes_state(usage))
            })
            .max();
        if let Some(position) = dependency {
            streams.wait_for(queue, position);
        }

        run_pass(config, pass, &mut *streams.contexts[queue.index()]);
        let state = &mut streams.queues[queue.index()];
        state.recorded += 1;
        let position = state.recorded;

        for usage in pass.usages() {
            let access = resources.entry(ResourceKey::from(usage.target)).or_default();
            access.record(queue, position, usage.access.reads(), changes_state(usage));
        }
    }

    // Exports count as graphics writes of every exported resource.
    let exported = registry
        .textures()
        .iter()
        .enumerate()
        .filter(|(_, t)| t.export_state().is_some())
        .map(|(i, _)| ResourceKey::Texture(i as u32))
        .chain(
            registry
                .buffers()
                .iter()
                .enumerate()
                .filter(|(_, b)| b.export_state().is_some())
                .map(|(i, _)| ResourceKey::Buffer(i as u32)),
        );
    let dependency = exported
        .filter_map(|key| resources.get(&key)?.dependency(Queue::Compute, true))
        .max();
    if let Some(position) = dependency {
        streams.wait_for(Queue::Graphics, position);
    }

    issue_exports(config, registry, &mut *streams.contexts[Queue::Graphics.index()]);
}
