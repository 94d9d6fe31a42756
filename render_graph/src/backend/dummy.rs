//! Dummy collaborators for testing and development.
//!
//! [`DummyDevice`] hands out fresh native handles without touching a GPU and
//! can be told to fail. [`RecordingContext`] records every command the
//! executor issues so tests can inspect the exact call sequence.

use crate::executor::TimelineFence;
use crate::graph::{BufferBarrier, TextureBarrier};
use crate::types::{BufferDescriptor, TextureDescriptor};

use super::{Allocation, BackendError, CommandContext, Device, NativeHandle};

/// First handle value the dummy device hands out.
const FIRST_HANDLE: u64 = 0x1000;

/// Dummy device that allocates nothing.
#[derive(Debug)]
pub struct DummyDevice {
    next_handle: u64,
    textures_created: usize,
    buffers_created: usize,
    aliased_heap: Option<u32>,
    failure: Option<BackendError>,
}

impl DummyDevice {
    /// Create a new dummy device.
    pub fn new() -> Self {
        Self {
            next_handle: FIRST_HANDLE,
            textures_created: 0,
            buffers_created: 0,
            aliased_heap: None,
            failure: None,
        }
    }

    /// Get the device name.
    pub fn name(&self) -> &'static str {
        "Dummy Device"
    }

    /// Report every allocation as placed in the shared heap `heap`.
    pub fn with_aliased_heap(mut self, heap: u32) -> Self {
        self.aliased_heap = Some(heap);
        self
    }

    /// Make every subsequent creation fail with `error`.
    pub fn with_failure(mut self, error: BackendError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Number of textures created so far.
    pub fn textures_created(&self) -> usize {
        self.textures_created
    }

    /// Number of buffers created so far.
    pub fn buffers_created(&self) -> usize {
        self.buffers_created
    }

    fn allocate(&mut self) -> Result<Allocation, BackendError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        let native = NativeHandle(self.next_handle);
        self.next_handle += 1;
        Ok(Allocation {
            native,
            aliased_heap: self.aliased_heap,
        })
    }
}

impl Default for DummyDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for DummyDevice {
    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
    ) -> Result<Allocation, BackendError> {
        log::trace!(
            "DummyDevice: creating texture {:?} ({}x{}x{})",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.size.depth
        );
        let allocation = self.allocate()?;
        self.textures_created += 1;
        Ok(allocation)
    }

    fn create_buffer(&mut self, descriptor: &BufferDescriptor) -> Result<Allocation, BackendError> {
        log::trace!(
            "DummyDevice: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        let allocation = self.allocate()?;
        self.buffers_created += 1;
        Ok(allocation)
    }
}

/// A command observed by a [`RecordingContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCommand {
    /// `begin_event(name)`.
    BeginEvent(String),
    /// `end_event()`.
    EndEvent,
    /// `barriers(buffers, textures)`.
    Barriers {
        /// Buffer barriers of the batch.
        buffers: Vec<BufferBarrier>,
        /// Texture barriers of the batch.
        textures: Vec<TextureBarrier>,
    },
    /// `signal(fence, value)`.
    Signal {
        /// Id of the signaled fence.
        fence: u64,
        /// Signaled value.
        value: u64,
    },
    /// `wait(fence, value)`.
    Wait {
        /// Id of the awaited fence.
        fence: u64,
        /// Awaited value.
        value: u64,
        /// Whether the fence had already reached `value` when the wait
        /// was recorded.
        satisfied: bool,
    },
}

/// Command context that records everything it receives.
///
/// Signals complete immediately, since no GPU work is pending.
#[derive(Debug, Default)]
pub struct RecordingContext {
    commands: Vec<RecordedCommand>,
}

impl RecordingContext {
    /// Create an empty recording context.
    pub fn new() -> Self {
        Self::default()
    }

    /// All commands recorded so far.
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// Barrier batches recorded so far, in order.
    pub fn barrier_batches(&self) -> Vec<(&[BufferBarrier], &[TextureBarrier])> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                RecordedCommand::Barriers { buffers, textures } => {
                    Some((buffers.as_slice(), textures.as_slice()))
                }
                _ => None,
            })
            .collect()
    }

    /// Names of the debug events opened so far, in order.
    pub fn event_names(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                RecordedCommand::BeginEvent(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Forget everything recorded.
    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl CommandContext for RecordingContext {
    fn begin_event(&mut self, name: &str) {
        log::trace!("RecordingContext: begin_event {name}");
        self.commands.push(RecordedCommand::BeginEvent(name.to_owned()));
    }

    fn end_event(&mut self) {
        self.commands.push(RecordedCommand::EndEvent);
    }

    fn barriers(&mut self, buffer_barriers: &[BufferBarrier], texture_barriers: &[TextureBarrier]) {
        log::trace!(
            "RecordingContext: {} buffer / {} texture barriers",
            buffer_barriers.len(),
            texture_barriers.len()
        );
        self.commands.push(RecordedCommand::Barriers {
            buffers: buffer_barriers.to_vec(),
            textures: texture_barriers.to_vec(),
        });
    }

    fn signal(&mut self, fence: &TimelineFence, value: u64) {
        fence.signal(value);
        self.commands.push(RecordedCommand::Signal {
            fence: fence.id(),
            value,
        });
    }

    fn wait(&mut self, fence: &TimelineFence, value: u64) {
        self.commands.push(RecordedCommand::Wait {
            fence: fence.id(),
            value,
            satisfied: fence.is_reached(value),
        });
    }
}
