use bitflags::bitflags;
use std::fmt;
use std::str::FromStr;

macro_rules! keys {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// A physical key, named the way the game refers to it.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum Key {
            $($variant),*
        }

        impl Key {
            /// Every key, in declaration order.
            pub const ALL: &'static [Key] = &[$(Key::$variant),*];

            pub fn name(self) -> &'static str {
                match self {
                    $(Key::$variant => $name),*
                }
            }
        }
    };
}

keys! {
    A => "A", B => "B", C => "C", D => "D", E => "E", F => "F", G => "G",
    H => "H", I => "I", J => "J", K => "K", L => "L", M => "M", N => "N",
    O => "O", P => "P", Q => "Q", R => "R", S => "S", T => "T", U => "U",
    V => "V", W => "W", X => "X", Y => "Y", Z => "Z",
    Num0 => "0", Num1 => "1", Num2 => "2", Num3 => "3", Num4 => "4",
    Num5 => "5", Num6 => "6", Num7 => "7", Num8 => "8", Num9 => "9",
    Escape => "Escape",
    Space => "Space",
    Enter => "Return",
    Tab => "Tab",
    Backspace => "Backspace",
    Up => "Up",
    Down => "Down",
    Left => "Left",
    Right => "Right",
    F1 => "F1", F2 => "F2", F3 => "F3", F4 => "F4", F5 => "F5", F6 => "F6",
    F7 => "F7", F8 => "F8", F9 => "F9", F10 => "F10", F11 => "F11", F12 => "F12",
}

impl Key {
    /// Bit of this key in a pressed-keys mask.
    pub(crate) fn bit(self) -> u64 {
        1 << self as u8
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown key name `{0}`")]
pub struct UnknownKey(pub String);

impl FromStr for Key {
    type Err = UnknownKey;

    /// Case-insensitive lookup by name.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Key::ALL
            .iter()
            .copied()
            .find(|key| key.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| UnknownKey(name.to_string()))
    }
}

bitflags! {
    /// Modifier keys held during the frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u16 {
        const LSHIFT = 1 << 0;
        const RSHIFT = 1 << 1;
        const LCTRL = 1 << 2;
        const RCTRL = 1 << 3;
        const LALT = 1 << 4;
        const RALT = 1 << 5;

        const SHIFT = Self::LSHIFT.bits() | Self::RSHIFT.bits();
        const CTRL = Self::LCTRL.bits() | Self::RCTRL.bits();
        const ALT = Self::LALT.bits() | Self::RALT.bits();
    }
}
