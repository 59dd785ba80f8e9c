/// Number of slots in a [`KeyTable`]. Covers every [`Key`] code.
pub const KEY_CODE_COUNT: usize = 1024;

/// Keys the viewer binds. Discriminants are stable key codes used to index
/// the [`KeyTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum Key {
    Space = 32,
    A = 65,
    D = 68,
    Q = 81,
    S = 83,
    W = 87,
    Escape = 256,
    Right = 262,
    Left = 263,
    Down = 264,
    Up = 265,
    F1 = 290,
    F2 = 291,
    F3 = 292,
    F4 = 293,
    LeftShift = 340,
}

impl Key {
    pub const ALL: [Key; 16] = [
        Key::Space,
        Key::A,
        Key::D,
        Key::Q,
        Key::S,
        Key::W,
        Key::Escape,
        Key::Right,
        Key::Left,
        Key::Down,
        Key::Up,
        Key::F1,
        Key::F2,
        Key::F3,
        Key::F4,
        Key::LeftShift,
    ];

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.code() == code)
    }
}

/// Persistent pressed/released state for every key code.
#[derive(Clone)]
pub struct KeyTable {
    down: Box<[bool; KEY_CODE_COUNT]>,
}

impl KeyTable {
    pub fn new() -> Self {
        Self {
            down: Box::new([false; KEY_CODE_COUNT]),
        }
    }

    pub fn press(&mut self, key: Key) {
        self.set(key.code(), true);
    }

    pub fn release(&mut self, key: Key) {
        self.set(key.code(), false);
    }

    /// Record a raw key code. Codes outside the table are ignored.
    pub fn set(&mut self, code: u16, pressed: bool) {
        match self.down.get_mut(code as usize) {
            Some(slot) => *slot = pressed,
            None => tracing::debug!(code, "key code outside table ignored"),
        }
    }

    pub fn is_down(&self, key: Key) -> bool {
        self.is_code_down(key.code())
    }

    pub fn is_code_down(&self, code: u16) -> bool {
        self.down.get(code as usize).copied().unwrap_or(false)
    }

    /// Release every key, e.g. when the window loses focus.
    pub fn clear(&mut self) {
        self.down.fill(false);
    }

    pub fn pressed_count(&self) -> usize {
        self.down.iter().filter(|down| **down).count()
    }
}

impl Default for KeyTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KeyTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pressed: Vec<usize> = self
            .down
            .iter()
            .enumerate()
            .filter_map(|(code, down)| down.then_some(code))
            .collect();
        f.debug_struct("KeyTable").field("pressed", &pressed).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_fit_in_table_and_round_trip() {
        for key in Key::ALL {
            assert!((key.code() as usize) < KEY_CODE_COUNT);
            assert_eq!(Key::from_code(key.code()), Some(key));
        }
        assert_eq!(Key::from_code(1), None);
    }

    #[test]
    fn press_and_release_toggle_state() {
        let mut keys = KeyTable::new();
        keys.press(Key::W);
        keys.press(Key::A);
        assert!(keys.is_down(Key::W));
        assert_eq!(keys.pressed_count(), 2);
        keys.release(Key::W);
        assert!(!keys.is_down(Key::W));
        assert!(keys.is_down(Key::A));
    }

    #[test]
    fn out_of_range_codes_are_ignored() {
        let mut keys = KeyTable::new();
        keys.set(5000, true);
        assert!(!keys.is_code_down(5000));
        assert_eq!(keys.pressed_count(), 0);
    }

    #[test]
    fn clear_releases_everything() {
        let mut keys = KeyTable::new();
        keys.press(Key::S);
        keys.set(700, true);
        keys.clear();
        assert_eq!(keys.pressed_count(), 0);
    }
}
