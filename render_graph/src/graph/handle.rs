//! Handles to passes and resources in the render graph.
//!
//! Handles are plain values: an index into the graph's registry, optionally
//! carrying a sub-range of the resource. They never own the resource. A
//! handle is only meaningful for the [`RenderGraph`](super::RenderGraph) that
//! created it, and only until that graph is cleared.

use std::fmt;

/// Handle to a pass in the render graph.
///
/// `PassHandle` is `Copy` and cheap to pass around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassHandle(u32);

impl PassHandle {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    /// Index of the pass in registration order.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

const INVALID_INDEX: u32 = u32::MAX;

/// A range of mip levels and array layers of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubresourceRange {
    /// First array layer.
    pub base_layer: u32,
    /// Number of array layers.
    pub layer_count: u32,
    /// First mip level.
    pub base_mip: u32,
    /// Number of mip levels.
    pub mip_count: u32,
}

impl SubresourceRange {
    /// Count meaning "up to the last mip level or layer".
    pub const REMAINING: u32 = u32::MAX;

    /// Create a range from explicit bounds.
    pub fn new(base_mip: u32, mip_count: u32, base_layer: u32, layer_count: u32) -> Self {
        Self {
            base_layer,
            layer_count,
            base_mip,
            mip_count,
        }
    }

    /// A single mip level across all array layers.
    pub fn mip(level: u32) -> Self {
        Self::new(level, 1, 0, Self::REMAINING)
    }

    /// All mip levels of a single array layer.
    pub fn layer(layer: u32) -> Self {
        Self::new(0, Self::REMAINING, layer, 1)
    }

    /// Exactly one (mip, layer) subresource.
    pub fn single(mip: u32, layer: u32) -> Self {
        Self::new(mip, 1, layer, 1)
    }

    /// Clamp the range to a texture with `mips` levels and `layers` layers.
    ///
    /// Returns `None` when nothing of the range lies inside the texture.
    pub fn clamp(self, mips: u32, layers: u32) -> Option<Self> {
        if self.base_mip >= mips || self.base_layer >= layers {
            return None;
        }
        let mip_count = self.mip_count.min(mips - self.base_mip);
        let layer_count = self.layer_count.min(layers - self.base_layer);
        if mip_count == 0 || layer_count == 0 {
            return None;
        }
        Some(Self::new(self.base_mip, mip_count, self.base_layer, layer_count))
    }

    /// Check whether the (already clamped) range covers the whole texture.
    pub fn covers(&self, mips: u32, layers: u32) -> bool {
        self.base_mip == 0
            && self.base_layer == 0
            && self.mip_count >= mips
            && self.layer_count >= layers
    }

    /// One past the last mip level.
    pub fn mip_end(&self) -> u32 {
        self.base_mip.saturating_add(self.mip_count)
    }

    /// One past the last array layer.
    pub fn layer_end(&self) -> u32 {
        self.base_layer.saturating_add(self.layer_count)
    }
}

/// A half-open byte range `[offset, offset + size)` of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ByteRange {
    /// Start offset in bytes.
    pub offset: u64,
    /// Size in bytes.
    pub size: u64,
}

impl ByteRange {
    /// Create a range from an offset and a size.
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// One past the last byte.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }

    /// Clamp the range to a buffer of `len` bytes, `None` if it lies outside.
    pub fn clamp(self, len: u64) -> Option<Self> {
        if self.offset >= len || self.size == 0 {
            return None;
        }
        Some(Self::new(self.offset, self.size.min(len - self.offset)))
    }

    /// Check whether the (already clamped) range covers a buffer of `len` bytes.
    pub fn covers(&self, len: u64) -> bool {
        self.offset == 0 && self.size >= len
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.offset, self.end())
    }
}

/// Which aspect of a texture a usage or barrier refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum TextureAspect {
    /// Color data.
    #[default]
    Color,
    /// Depth data only.
    Depth,
    /// Stencil data only.
    Stencil,
    /// Depth and stencil together.
    DepthStencil,
}

/// Handle to a texture registered in the render graph.
///
/// A handle may carry a sub-range (see [`TextureHandle::mip`]); usages
/// declared with such a handle only touch that range.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle {
    pub(crate) index: u32,
    pub(crate) range: Option<SubresourceRange>,
}

impl TextureHandle {
    /// A handle that refers to no texture. Every operation on it is a no-op.
    pub const INVALID: Self = Self {
        index: INVALID_INDEX,
        range: None,
    };

    pub(crate) fn new(index: u32) -> Self {
        Self { index, range: None }
    }

    /// Registry index of the texture.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Sub-range carried by the handle, `None` for the whole texture.
    pub fn range(&self) -> Option<SubresourceRange> {
        self.range
    }

    /// Check whether the handle was ever produced by a graph.
    pub fn is_valid(&self) -> bool {
        self.index != INVALID_INDEX
    }

    /// Same texture, restricted to a single mip level.
    pub fn mip(self, level: u32) -> Self {
        self.subresource(SubresourceRange::mip(level))
    }

    /// Same texture, restricted to `range`.
    pub fn subresource(self, range: SubresourceRange) -> Self {
        Self {
            index: self.index,
            range: Some(range),
        }
    }

    /// Same texture, whole-resource.
    pub fn whole(self) -> Self {
        Self {
            index: self.index,
            range: None,
        }
    }
}

impl Default for TextureHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.range {
            None => write!(f, "Texture({})", self.index),
            Some(r) => write!(
                f,
                "Texture({}, mips {}+{}, layers {}+{})",
                self.index, r.base_mip, r.mip_count, r.base_layer, r.layer_count
            ),
        }
    }
}

/// Handle to a buffer registered in the render graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle {
    pub(crate) index: u32,
    pub(crate) range: Option<ByteRange>,
}

impl BufferHandle {
    /// A handle that refers to no buffer. Every operation on it is a no-op.
    pub const INVALID: Self = Self {
        index: INVALID_INDEX,
        range: None,
    };

    pub(crate) fn new(index: u32) -> Self {
        Self { index, range: None }
    }

    /// Registry index of the buffer.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Byte range carried by the handle, `None` for the whole buffer.
    pub fn range(&self) -> Option<ByteRange> {
        self.range
    }

    /// Check whether the handle was ever produced by a graph.
    pub fn is_valid(&self) -> bool {
        self.index != INVALID_INDEX
    }

    /// Same buffer, restricted to `[offset, offset + size)`.
    pub fn slice(self, offset: u64, size: u64) -> Self {
        Self {
            index: self.index,
            range: Some(ByteRange::new(offset, size)),
        }
    }

    /// Same buffer, whole-resource.
    pub fn whole(self) -> Self {
        Self {
            index: self.index,
            range: None,
        }
    }
}

impl Default for BufferHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.range {
            None => write!(f, "Buffer({})", self.index),
            Some(r) => write!(f, "Buffer({}, {r})", self.index),
        }
    }
}

static_assertions::assert_impl_all!(TextureHandle: Copy, Send, Sync);
static_assertions::assert_impl_all!(BufferHandle: Copy, Send, Sync);
