//! Input snapshot: what the keyboard and mouse did during one frame.
//!
//! # Invariants
//! - Game logic reads an [`InputSnapshot`], never raw window events.
//! - Mouse motion and the released key only live for one frame.
//! - The game answers with [`Action`]s; the window layer carries them out.

pub mod action;
pub mod key;
pub mod state;

pub use action::Action;
pub use key::{Key, Modifiers, UnknownKey};
pub use state::{InputSnapshot, InputState};
