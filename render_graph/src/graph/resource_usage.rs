//! Resource usage declarations.
//!
//! Every `read`/`write`/`read_write` call on a
//! [`PassBuilder`](super::PassBuilder) appends one [`ResourceUsage`] to the
//! pass. The compiler derives read/write sets and barriers from these records.

use super::handle::{BufferHandle, ByteRange, SubresourceRange, TextureAspect, TextureHandle};
use super::state::ResourceState;

/// Resource access type for dependency tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    /// Read-only access.
    Read,
    /// Write-only access.
    Write,
    /// Read and write access.
    ReadWrite,
}

impl AccessKind {
    /// Check if this access includes reading.
    pub fn reads(&self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    /// Check if this access includes writing.
    pub fn writes(&self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

/// The resource (and part of it) a usage refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageTarget {
    /// A texture, optionally restricted to a subresource range.
    Texture {
        /// Registry index.
        index: u32,
        /// Subresource range, `None` for the whole texture.
        range: Option<SubresourceRange>,
        /// Aspect override; `None` derives it from the texture format.
        aspect: Option<TextureAspect>,
    },
    /// A buffer, optionally restricted to a byte range.
    Buffer {
        /// Registry index.
        index: u32,
        /// Byte range, `None` for the whole buffer.
        range: Option<ByteRange>,
    },
}

impl UsageTarget {
    /// Registry index of the referenced resource.
    pub fn index(&self) -> u32 {
        match *self {
            Self::Texture { index, .. } | Self::Buffer { index, .. } => index,
        }
    }

    /// Check if the target is a texture.
    pub fn is_texture(&self) -> bool {
        matches!(self, Self::Texture { .. })
    }
}

/// A single declared access of a pass to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceUsage {
    /// What is accessed.
    pub target: UsageTarget,
    /// State the resource must be in for the access.
    pub state: ResourceState,
    /// Whether the access reads, writes or both.
    pub access: AccessKind,
}

/// A handle that can be the target of a pass usage.
///
/// Implemented by [`TextureHandle`] and [`BufferHandle`] so the builder
/// methods accept either.
pub trait ResourceRef: Copy {
    /// Describe the usage target this handle refers to.
    fn usage_target(&self) -> UsageTarget;
}

impl ResourceRef for TextureHandle {
    fn usage_target(&self) -> UsageTarget {
        UsageTarget::Texture {
            index: self.index,
            range: self.range,
            aspect: None,
        }
    }
}

impl ResourceRef for BufferHandle {
    fn usage_target(&self) -> UsageTarget {
        UsageTarget::Buffer {
            index: self.index,
            range: self.range,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_kind() {
        assert!(AccessKind::Read.reads());
        assert!(!AccessKind::Read.writes());
        assert!(AccessKind::Write.writes());
        assert!(!AccessKind::Write.reads());
        assert!(AccessKind::ReadWrite.reads());
        assert!(AccessKind::ReadWrite.writes());
    }

    #[test]
    fn test_usage_target_from_handles() {
        let texture = TextureHandle::new(2).mip(1);
        match texture.usage_target() {
            UsageTarget::Texture { index, range, aspect } => {
                assert_eq!(index, 2);
                assert_eq!(range, Some(SubresourceRange::mip(1)));
                assert_eq!(aspect, None);
            }
            UsageTarget::Buffer { .. } => panic!("expected texture target"),
        }

        let buffer = BufferHandle::new(5).slice(0, 16).usage_target();
        assert_eq!(buffer.index(), 5);
        assert!(!buffer.is_texture());
    }
}
