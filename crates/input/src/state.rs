use crate::key::{Key, Modifiers};
use glam::Vec2;
use tracing::trace;

/// Read-only view of one frame of input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSnapshot {
    keys_down: u64,
    /// Last key released during the frame.
    pub key_up: Option<Key>,
    pub modifiers: Modifiers,
    /// Relative mouse motion accumulated over the frame, in pixels.
    pub mouse_delta: Vec2,
    /// Window width over height.
    pub aspect: f32,
}

impl Default for InputSnapshot {
    fn default() -> Self {
        Self {
            keys_down: 0,
            key_up: None,
            modifiers: Modifiers::empty(),
            mouse_delta: Vec2::ZERO,
            aspect: 1.0,
        }
    }
}

impl InputSnapshot {
    pub fn is_key_down(&self, key: Key) -> bool {
        self.keys_down & key.bit() != 0
    }

    /// True when `key` was the last key released this frame.
    pub fn is_key_up(&self, key: Key) -> bool {
        self.key_up == Some(key)
    }

    /// True when any of `modifiers` is held.
    pub fn is_mod_down(&self, modifiers: Modifiers) -> bool {
        self.modifiers.intersects(modifiers)
    }

    pub fn keys_down(&self) -> impl Iterator<Item = Key> + '_ {
        Key::ALL.iter().copied().filter(|key| self.is_key_down(*key))
    }
}

/// Collects window events between frames.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    current: InputSnapshot,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, key: Key) {
        self.current.keys_down |= key.bit();
    }

    pub fn release(&mut self, key: Key) {
        self.current.keys_down &= !key.bit();
        self.current.key_up = Some(key);
    }

    pub fn set_modifier(&mut self, modifier: Modifiers, held: bool) {
        self.current.modifiers.set(modifier, held);
    }

    pub fn mouse_motion(&mut self, dx: f32, dy: f32) {
        self.current.mouse_delta += Vec2::new(dx, dy);
    }

    /// Record a new window size. Zero-sized windows keep the previous aspect.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.current.aspect = width as f32 / height as f32;
        trace!(width, height, aspect = self.current.aspect, "viewport changed");
    }

    /// Drop every held key, e.g. when the window loses focus.
    pub fn clear_keys(&mut self) {
        self.current.keys_down = 0;
        self.current.modifiers = Modifiers::empty();
    }

    /// The state as of now, without ending the frame.
    pub fn peek(&self) -> &InputSnapshot {
        &self.current
    }

    /// Hand out this frame's snapshot and reset the per-frame parts. Held keys,
    /// modifiers and the aspect carry over.
    pub fn end_frame(&mut self) -> InputSnapshot {
        let snapshot = self.current;
        self.current.key_up = None;
        self.current.mouse_delta = Vec2::ZERO;
        snapshot
    }
}
