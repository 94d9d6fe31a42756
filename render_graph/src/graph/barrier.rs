//! Resource state transition barriers and per-pass barrier merging.

use std::fmt;
use std::ops::AddAssign;

use crate::backend::NativeHandle;

use super::handle::{BufferHandle, ByteRange, SubresourceRange, TextureAspect, TextureHandle};
use super::state::ResourceState;

/// A transition of a texture, or part of one, between two states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureBarrier {
    /// Texture being transitioned (always a whole-resource handle).
    pub texture: TextureHandle,
    /// Native object backing the texture.
    pub native: NativeHandle,
    /// State before the barrier.
    pub before: ResourceState,
    /// State after the barrier.
    pub after: ResourceState,
    /// Aspect the barrier applies to.
    pub aspect: TextureAspect,
    /// Subresources covered, `None` for the whole texture.
    pub range: Option<SubresourceRange>,
}

impl TextureBarrier {
    fn group_key(&self) -> (u32, ResourceState, ResourceState, TextureAspect) {
        (self.texture.index, self.before, self.after, self.aspect)
    }

    fn sort_key(&self) -> (u32, ResourceState, ResourceState, TextureAspect, Option<(u32, u32)>) {
        (
            self.texture.index,
            self.before,
            self.after,
            self.aspect,
            self.range.map(|r| (r.base_layer, r.base_mip)),
        )
    }
}

impl fmt::Display for TextureBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Texture({})", self.texture.index)?;
        if let Some(r) = self.range {
            write!(
                f,
                " mips {}..{} layers {}..{}",
                r.base_mip,
                r.mip_end(),
                r.base_layer,
                r.layer_end()
            )?;
        }
        write!(f, ": {} -> {}", self.before, self.after)
    }
}

/// A transition of a buffer, or a byte range of one, between two states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferBarrier {
    /// Buffer being transitioned (always a whole-resource handle).
    pub buffer: BufferHandle,
    /// Native object backing the buffer.
    pub native: NativeHandle,
    /// State before the barrier.
    pub before: ResourceState,
    /// State after the barrier.
    pub after: ResourceState,
    /// Bytes covered, `None` for the whole buffer.
    pub range: Option<ByteRange>,
}

impl BufferBarrier {
    fn group_key(&self) -> (u32, ResourceState, ResourceState) {
        (self.buffer.index, self.before, self.after)
    }

    fn sort_key(&self) -> (u32, ResourceState, ResourceState, Option<u64>) {
        (
            self.buffer.index,
            self.before,
            self.after,
            self.range.map(|r| r.offset),
        )
    }
}

impl fmt::Display for BufferBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Buffer({})", self.buffer.index)?;
        if let Some(r) = self.range {
            write!(f, " {r}")?;
        }
        write!(f, ": {} -> {}", self.before, self.after)
    }
}

/// Barrier counts before and after a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeCounts {
    /// Number of barriers given to the merge.
    pub input: usize,
    /// Number of barriers left after it.
    pub output: usize,
}

impl MergeCounts {
    /// Number of barriers the merge eliminated.
    pub fn merged_away(&self) -> usize {
        self.input - self.output
    }
}

impl AddAssign for MergeCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.input += rhs.input;
        self.output += rhs.output;
    }
}

/// Merge the barriers of one pass in place.
///
/// Barriers are sorted by (texture, before, after, aspect, layer, mip).
/// Within each (texture, before, after, aspect) group, contiguous mip runs
/// are coalesced first, then contiguous layer runs; a result covering the
/// whole texture becomes a whole-resource barrier, and ranged barriers
/// subsumed by a whole-resource barrier are dropped.
///
/// `extent` maps a texture index to its (mip levels, array layers).
pub fn merge_texture_barriers(
    barriers: &mut Vec<TextureBarrier>,
    extent: impl Fn(u32) -> (u32, u32),
) -> MergeCounts {
    let input = barriers.len();
    barriers.sort_by_key(TextureBarrier::sort_key);

    let mut merged: Vec<TextureBarrier> = Vec::with_capacity(input);
    for group in barriers.chunk_by(|a, b| a.group_key() == b.group_key()) {
        if let Some(whole) = group.iter().find(|b| b.range.is_none()) {
            merged.push(*whole);
            continue;
        }

        let mut mip_runs: Vec<TextureBarrier> = Vec::with_capacity(group.len());
        for barrier in group {
            if let (Some(last), Some(next)) = (mip_runs.last_mut(), barrier.range) {
                if let Some(range) = last.range.as_mut() {
                    if range.base_layer == next.base_layer
                        && range.layer_count == next.layer_count
                        && range.mip_end() == next.base_mip
                    {
                        range.mip_count += next.mip_count;
                        continue;
                    }
                }
            }
            mip_runs.push(*barrier);
        }

        let mut layer_runs: Vec<TextureBarrier> = Vec::with_capacity(mip_runs.len());
        for barrier in mip_runs {
            let Some(next) = barrier.range else {
                continue;
            };
            let target = layer_runs.iter_mut().find_map(|b| {
                b.range.as_mut().filter(|r| {
                    r.base_mip == next.base_mip
                        && r.mip_count == next.mip_count
                        && r.layer_end() == next.base_layer
                })
            });
            match target {
                Some(range) => range.layer_count += next.layer_count,
                None => layer_runs.push(barrier),
            }
        }

        let (mips, layers) = extent(group[0].texture.index);
        for mut barrier in layer_runs {
            if barrier.range.is_some_and(|r| r.covers(mips, layers)) {
                barrier.range = None;
            }
            merged.push(barrier);
        }
    }

    *barriers = merged;
    MergeCounts {
        input,
        output: barriers.len(),
    }
}

/// Merge the buffer barriers of one pass in place.
///
/// Contiguous byte ranges with the same (buffer, before, after) are
/// coalesced; a result covering the whole buffer becomes a whole-resource
/// barrier, and ranged barriers subsumed by a whole-resource one are dropped.
///
/// `len` maps a buffer index to its size in bytes.
pub fn merge_buffer_barriers(
    barriers: &mut Vec<BufferBarrier>,
    len: impl Fn(u32) -> u64,
) -> MergeCounts {
    let input = barriers.len();
    barriers.sort_by_key(BufferBarrier::sort_key);

    let mut merged: Vec<BufferBarrier> = Vec::with_capacity(input);
    for group in barriers.chunk_by(|a, b| a.group_key() == b.group_key()) {
        if let Some(whole) = group.iter().find(|b| b.range.is_none()) {
            merged.push(*whole);
            continue;
        }

        let start = merged.len();
        for barrier in group {
            if let (Some(last), Some(next)) = (merged[start..].last_mut(), barrier.range) {
                if let Some(range) = last.range.as_mut() {
                    if range.end() == next.offset {
                        range.size += next.size;
                        continue;
                    }
                }
            }
            merged.push(*barrier);
        }

        let size = len(group[0].buffer.index);
        for barrier in &mut merged[start..] {
            if barrier.range.is_some_and(|r| r.covers(size)) {
                barrier.range = None;
            }
        }
    }

    *barriers = merged;
    MergeCounts {
        input,
        output: barriers.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ResourceState::*;

    fn texture_barrier(mip: u32, layer: u32, before: ResourceState) -> TextureBarrier {
        TextureBarrier {
            texture: TextureHandle::new(0),
            native: NativeHandle(1),
            before,
            after: ShaderResource,
            aspect: TextureAspect::Color,
            range: Some(SubresourceRange::single(mip, layer)),
        }
    }

    fn buffer_barrier(offset: u64, size: u64) -> BufferBarrier {
        BufferBarrier {
            buffer: BufferHandle::new(0),
            native: NativeHandle(2),
            before: Undefined,
            after: CopyDest,
            range: Some(ByteRange::new(offset, size)),
        }
    }

    #[test]
    fn test_merge_full_grid_becomes_whole() {
        let mut barriers = vec![
            texture_barrier(1, 1, RenderTarget),
            texture_barrier(0, 0, RenderTarget),
            texture_barrier(1, 0, RenderTarget),
            texture_barrier(0, 1, RenderTarget),
        ];
        let counts = merge_texture_barriers(&mut barriers, |_| (2, 2));

        assert_eq!(barriers.len(), 1);
        assert_eq!(barriers[0].range, None);
        assert_eq!(counts.merged_away(), 3);
    }

    #[test]
    fn test_merge_mip_run() {
        let mut barriers = vec![
            texture_barrier(2, 0, RenderTarget),
            texture_barrier(1, 0, RenderTarget),
        ];
        merge_texture_barriers(&mut barriers, |_| (4, 1));

        assert_eq!(barriers.len(), 1);
        assert_eq!(barriers[0].range, Some(SubresourceRange::new(1, 2, 0, 1)));
    }

    #[test]
    fn test_merge_keeps_distinct_before_states_apart() {
        let mut barriers = vec![
            texture_barrier(0, 0, RenderTarget),
            texture_barrier(1, 0, CopyDest),
        ];
        let counts = merge_texture_barriers(&mut barriers, |_| (2, 1));

        assert_eq!(barriers.len(), 2);
        assert_eq!(counts.merged_away(), 0);
        assert!(barriers.iter().all(|b| b.range.is_some()));
    }

    #[test]
    fn test_merge_drops_subsumed() {
        let mut whole = texture_barrier(0, 0, RenderTarget);
        whole.range = None;
        let mut barriers = vec![texture_barrier(0, 0, RenderTarget), whole];
        merge_texture_barriers(&mut barriers, |_| (2, 1));

        assert_eq!(barriers, vec![whole]);
    }

    #[test]
    fn test_merge_buffer_ranges() {
        let mut barriers = vec![
            buffer_barrier(64, 64),
            buffer_barrier(0, 64),
            buffer_barrier(192, 8),
        ];
        let counts = merge_buffer_barriers(&mut barriers, |_| 256);

        assert_eq!(
            barriers.iter().map(|b| b.range).collect::<Vec<_>>(),
            vec![Some(ByteRange::new(0, 128)), Some(ByteRange::new(192, 8))]
        );
        assert_eq!(counts.merged_away(), 1);
    }

    #[test]
    fn test_merge_buffer_full_cover() {
        let mut barriers = vec![buffer_barrier(0, 100), buffer_barrier(100, 28)];
        merge_buffer_barriers(&mut barriers, |_| 128);
        assert_eq!(barriers.len(), 1);
        assert_eq!(barriers[0].range, None);
    }

    #[test]
    fn test_barrier_display() {
        let barrier = texture_barrier(1, 0, RenderTarget);
        assert_eq!(
            barrier.to_string(),
            "Texture(0) mips 1..2 layers 0..1: RenderTarget -> ShaderResource"
        );
        assert_eq!(
            buffer_barrier(0, 16).to_string(),
            "Buffer(0) [0, 16): Undefined -> CopyDest"
        );
    }
}
