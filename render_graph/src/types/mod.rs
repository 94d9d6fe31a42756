//! Descriptor types for graph resources.
//!
//! These describe what a texture or buffer looks like. The graph never
//! interprets them beyond subresource counts and byte sizes; they are handed
//! to the [`Device`](crate::backend::Device) collaborator when backing memory
//! is created.

mod buffer;
mod common;
mod texture;

pub use buffer::{BufferDescriptor, BufferUsage};
pub use common::Extent3d;
pub use texture::{TextureDescriptor, TextureFormat, TextureUsage};
