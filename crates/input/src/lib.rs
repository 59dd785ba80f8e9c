//! Input plumbing between the window layer and the frame loop.
//!
//! # Invariants
//! - Window callbacks only enqueue; the frame loop drains once per frame.
//! - Key state persists across frames until an explicit key-up or focus loss.

pub mod action;
pub mod event;
pub mod key;

pub use action::{Action, Bindings, PassToggle};
pub use event::{InputEvent, InputQueue};
pub use key::{KEY_CODE_COUNT, Key, KeyTable};
