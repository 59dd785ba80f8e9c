//! Shared value types for the glint renderer.

mod types;

pub use types::{Extent2d, Transform};
