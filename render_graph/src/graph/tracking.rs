//! Resource state tracking.
//!
//! Textures are tracked either as a whole or per (mip, layer) cell, buffers
//! either as a whole or as a sorted list of non-overlapping byte ranges. The
//! split form only exists while the parts of a resource actually differ: a
//! transition covering the whole resource, or one that leaves every part in
//! the same state, collapses the tracker back to whole-resource mode.

use super::handle::{ByteRange, SubresourceRange};
use super::state::ResourceState;

/// A transition a tracker had to perform, reported with the state it left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<R> {
    /// Part of the resource that changed, `None` for the whole resource.
    pub range: Option<R>,
    /// State the part was in before the transition.
    pub before: ResourceState,
}

/// Texture transition, ranged by subresource.
pub type TextureTransition = Transition<SubresourceRange>;

/// Buffer transition, ranged by bytes.
pub type BufferTransition = Transition<ByteRange>;

// ============================================================================
// Textures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum TextureMode {
    Whole(ResourceState),
    /// One state per cell, indexed `mip + layer * mips`.
    Cells(Vec<ResourceState>),
}

/// State tracker for a single texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureStateTracker {
    mips: u32,
    layers: u32,
    mode: TextureMode,
}

impl TextureStateTracker {
    /// Create a tracker for a texture with the given dimensions.
    pub fn new(mips: u32, layers: u32, state: ResourceState) -> Self {
        Self {
            mips: mips.max(1),
            layers: layers.max(1),
            mode: TextureMode::Whole(state),
        }
    }

    /// Number of tracked mip levels.
    pub fn mip_levels(&self) -> u32 {
        self.mips
    }

    /// Number of tracked array layers.
    pub fn array_layers(&self) -> u32 {
        self.layers
    }

    /// Forget all per-cell state and put the whole texture in `state`.
    pub fn reset(&mut self, state: ResourceState) {
        self.mode = TextureMode::Whole(state);
    }

    /// State of the whole texture, `None` while tracked per cell.
    pub fn whole_state(&self) -> Option<ResourceState> {
        match self.mode {
            TextureMode::Whole(state) => Some(state),
            TextureMode::Cells(_) => None,
        }
    }

    /// Check whether the tracker is in per-cell mode.
    pub fn is_split(&self) -> bool {
        matches!(self.mode, TextureMode::Cells(_))
    }

    /// State of a single subresource.
    pub fn state(&self, mip: u32, layer: u32) -> ResourceState {
        match &self.mode {
            TextureMode::Whole(state) => *state,
            TextureMode::Cells(cells) => cells[self.cell(mip, layer)],
        }
    }

    /// States of every cell in `range` (the whole texture for `None`).
    pub fn states(&self, range: Option<SubresourceRange>) -> Vec<ResourceState> {
        match (&self.mode, self.clamp(range)) {
            (_, None) => Vec::new(),
            (TextureMode::Whole(state), Some(_)) => vec![*state],
            (TextureMode::Cells(cells), Some(r)) => self
                .cells_in(r)
                .map(|(_, _, index)| cells[index])
                .collect(),
        }
    }

    /// Move `range` (the whole texture for `None`) into `after`.
    ///
    /// Returns one transition per differing cell, or a single whole-resource
    /// transition when the tracker was whole and the range covers it.
    /// Cells already in `after` produce nothing.
    pub fn transition(
        &mut self,
        range: Option<SubresourceRange>,
        after: ResourceState,
    ) -> Vec<TextureTransition> {
        let Some(clamped) = self.clamp(range) else {
            return Vec::new();
        };
        let covers_all = clamped.covers(self.mips, self.layers);

        if let TextureMode::Whole(current) = self.mode {
            if current == after {
                return Vec::new();
            }
            if covers_all {
                self.mode = TextureMode::Whole(after);
                return vec![Transition {
                    range: None,
                    before: current,
                }];
            }
            self.mode = TextureMode::Cells(vec![current; self.cell_count()]);
        }

        let mut transitions = Vec::new();
        let cells_in: Vec<_> = self.cells_in(clamped).collect();
        if let TextureMode::Cells(cells) = &mut self.mode {
            for (mip, layer, index) in cells_in {
                let before = cells[index];
                if before != after {
                    cells[index] = after;
                    transitions.push(Transition {
                        range: Some(SubresourceRange::single(mip, layer)),
                        before,
                    });
                }
            }
        }

        if covers_all {
            self.mode = TextureMode::Whole(after);
        } else {
            self.collapse();
        }
        transitions
    }

    /// Return to whole-resource mode if every cell holds the same state.
    pub fn collapse(&mut self) {
        if let TextureMode::Cells(cells) = &self.mode {
            if let Some(&first) = cells.first() {
                if cells.iter().all(|&s| s == first) {
                    self.mode = TextureMode::Whole(first);
                }
            }
        }
    }

    fn clamp(&self, range: Option<SubresourceRange>) -> Option<SubresourceRange> {
        match range {
            None => Some(SubresourceRange::new(0, self.mips, 0, self.layers)),
            Some(r) => r.clamp(self.mips, self.layers),
        }
    }

    fn cell_count(&self) -> usize {
        self.mips as usize * self.layers as usize
    }

    fn cell(&self, mip: u32, layer: u32) -> usize {
        mip as usize + layer as usize * self.mips as usize
    }

    fn cells_in(&self, range: SubresourceRange) -> impl Iterator<Item = (u32, u32, usize)> + '_ {
        (range.base_layer..range.layer_end()).flat_map(move |layer| {
            (range.base_mip..range.mip_end()).map(move |mip| (mip, layer, self.cell(mip, layer)))
        })
    }
}

// ============================================================================
// Byte ranges
// ============================================================================

/// A map from the bytes `[0, len)` to values, stored as sorted,
/// non-overlapping, gap-free ranges with adjacent equal values merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeMap<S> {
    len: u64,
    ranges: Vec<(ByteRange, S)>,
}

impl<S: Copy + Eq> RangeMap<S> {
    /// Create a map with every byte set to `value`.
    pub fn new(len: u64, value: S) -> Self {
        let ranges = if len == 0 {
            Vec::new()
        } else {
            vec![(ByteRange::new(0, len), value)]
        };
        Self { len, ranges }
    }

    /// Number of bytes covered.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Check whether the map covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over the stored ranges in offset order.
    pub fn iter(&self) -> impl Iterator<Item = (ByteRange, S)> + '_ {
        self.ranges.iter().copied()
    }

    /// The parts of `range` and their values, clipped to `range`.
    pub fn overlapping(&self, range: ByteRange) -> Vec<(ByteRange, S)> {
        let Some(range) = range.clamp(self.len) else {
            return Vec::new();
        };
        let start = self.ranges.partition_point(|(r, _)| r.end() <= range.offset);
        self.ranges[start..]
            .iter()
            .take_while(|(r, _)| r.offset < range.end())
            .map(|&(r, value)| {
                let offset = r.offset.max(range.offset);
                let end = r.end().min(range.end());
                (ByteRange::new(offset, end - offset), value)
            })
            .collect()
    }

    /// The single value of the map, if all bytes agree.
    pub fn uniform(&self) -> Option<S> {
        match self.ranges.as_slice() {
            [(_, value)] => Some(*value),
            _ => None,
        }
    }

    /// Set every byte of `range` to `value`.
    ///
    /// Returns the previous parts of `range` with their old values. Bytes
    /// outside `range` keep their value.
    pub fn apply(&mut self, range: ByteRange, value: S) -> Vec<(ByteRange, S)> {
        let Some(range) = range.clamp(self.len) else {
            return Vec::new();
        };
        let previous = self.overlapping(range);

        let start = self.ranges.partition_point(|(r, _)| r.end() <= range.offset);
        let end = self.ranges.partition_point(|(r, _)| r.offset < range.end());

        let mut replacement = Vec::with_capacity(3);
        if let Some(&(first, first_value)) = self.ranges.get(start) {
            if first.offset < range.offset {
                replacement.push((
                    ByteRange::new(first.offset, range.offset - first.offset),
                    first_value,
                ));
            }
        }
        replacement.push((range, value));
        if end > start {
            let (last, last_value) = self.ranges[end - 1];
            if last.end() > range.end() {
                replacement.push((
                    ByteRange::new(range.end(), last.end() - range.end()),
                    last_value,
                ));
            }
        }
        self.ranges.splice(start..end, replacement);
        self.merge_adjacent();
        previous
    }

    fn merge_adjacent(&mut self) {
        let mut merged: Vec<(ByteRange, S)> = Vec::with_capacity(self.ranges.len());
        for &(range, value) in &self.ranges {
            match merged.last_mut() {
                Some((last, last_value)) if *last_value == value && last.end() == range.offset => {
                    last.size += range.size;
                }
                _ => merged.push((range, value)),
            }
        }
        self.ranges = merged;
    }
}

// ============================================================================
// Buffers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum BufferMode {
    Whole(ResourceState),
    Ranges(RangeMap<ResourceState>),
}

/// State tracker for a single buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferStateTracker {
    len: u64,
    mode: BufferMode,
}

impl BufferStateTracker {
    /// Create a tracker for a buffer of `len` bytes.
    pub fn new(len: u64, state: ResourceState) -> Self {
        Self {
            len,
            mode: BufferMode::Whole(state),
        }
    }

    /// Size of the tracked buffer in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Check whether the tracked buffer is zero-sized.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Forget all ranges and put the whole buffer in `state`.
    pub fn reset(&mut self, state: ResourceState) {
        self.mode = BufferMode::Whole(state);
    }

    /// State of the whole buffer, `None` while tracked per range.
    pub fn whole_state(&self) -> Option<ResourceState> {
        match self.mode {
            BufferMode::Whole(state) => Some(state),
            BufferMode::Ranges(_) => None,
        }
    }

    /// Check whether the tracker is in range mode.
    pub fn is_split(&self) -> bool {
        matches!(self.mode, BufferMode::Ranges(_))
    }

    /// The tracked ranges with their states.
    pub fn ranges(&self) -> Vec<(ByteRange, ResourceState)> {
        match &self.mode {
            BufferMode::Whole(state) if self.len > 0 => {
                vec![(ByteRange::new(0, self.len), *state)]
            }
            BufferMode::Whole(_) => Vec::new(),
            BufferMode::Ranges(map) => map.iter().collect(),
        }
    }

    /// States of the parts of `range` (the whole buffer for `None`).
    pub fn states(&self, range: Option<ByteRange>) -> Vec<ResourceState> {
        let range = range.unwrap_or(ByteRange::new(0, self.len));
        match &self.mode {
            BufferMode::Whole(state) => {
                if range.clamp(self.len).is_some() {
                    vec![*state]
                } else {
                    Vec::new()
                }
            }
            BufferMode::Ranges(map) => {
                map.overlapping(range).into_iter().map(|(_, s)| s).collect()
            }
        }
    }

    /// Move `range` (the whole buffer for `None`) into `after`.
    ///
    /// Only the overlap of `range` with differing tracked ranges is
    /// transitioned; everything else keeps its state.
    pub fn transition(
        &mut self,
        range: Option<ByteRange>,
        after: ResourceState,
    ) -> Vec<BufferTransition> {
        let clamped = match range {
            None if self.len > 0 => ByteRange::new(0, self.len),
            None => return Vec::new(),
            Some(r) => match r.clamp(self.len) {
                Some(r) => r,
                None => return Vec::new(),
            },
        };
        let covers_all = clamped.covers(self.len);

        if let BufferMode::Whole(current) = self.mode {
            if current == after {
                return Vec::new();
            }
            if covers_all {
                self.mode = BufferMode::Whole(after);
                return vec![Transition {
                    range: None,
                    before: current,
                }];
            }
            self.mode = BufferMode::Ranges(RangeMap::new(self.len, current));
        }

        let mut transitions = Vec::new();
        if let BufferMode::Ranges(map) = &mut self.mode {
            transitions = map
                .apply(clamped, after)
                .into_iter()
                .filter(|&(_, before)| before != after)
                .map(|(range, before)| Transition {
                    range: Some(range),
                    before,
                })
                .collect();
            if let Some(state) = map.uniform() {
                self.mode = BufferMode::Whole(state);
            }
        }
        transitions
    }
}
