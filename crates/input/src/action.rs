use crate::key::{Key, KeyTable};
use std::collections::BTreeMap;

/// Feature of the frame pipeline that can be switched at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PassToggle {
    Shadows,
    StencilOutline,
    PostProcess,
}

/// A high-level action produced from raw keys.
///
/// The frame loop consumes actions, never raw key codes, so rebinding keys
/// does not touch camera or pipeline code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    MoveForward,
    MoveBackward,
    StrafeLeft,
    StrafeRight,
    /// Held to multiply movement speed.
    Sprint,
    Toggle(PassToggle),
    Quit,
}

impl Action {
    /// Held actions apply every frame while their key is down; the rest fire
    /// once on key press.
    pub fn is_continuous(self) -> bool {
        matches!(
            self,
            Action::MoveForward
                | Action::MoveBackward
                | Action::StrafeLeft
                | Action::StrafeRight
                | Action::Sprint
        )
    }
}

/// Key to action mapping.
#[derive(Debug, Clone)]
pub struct Bindings {
    map: BTreeMap<Key, Action>,
}

impl Bindings {
    pub fn empty() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }

    pub fn bind(&mut self, key: Key, action: Action) -> &mut Self {
        self.map.insert(key, action);
        self
    }

    pub fn action_for(&self, key: Key) -> Option<Action> {
        self.map.get(&key).copied()
    }

    /// Continuous actions whose key is currently held, deduplicated and in
    /// a stable order.
    pub fn held_actions(&self, keys: &KeyTable) -> Vec<Action> {
        let mut held: Vec<Action> = self
            .map
            .iter()
            .filter(|(key, action)| action.is_continuous() && keys.is_down(**key))
            .map(|(_, action)| *action)
            .collect();
        held.sort();
        held.dedup();
        held
    }
}

impl Default for Bindings {
    /// WASD and arrow keys move, shift sprints, F1-F3 toggle pipeline
    /// features, Escape and Q quit.
    fn default() -> Self {
        let mut bindings = Self::empty();
        bindings
            .bind(Key::W, Action::MoveForward)
            .bind(Key::Up, Action::MoveForward)
            .bind(Key::S, Action::MoveBackward)
            .bind(Key::Down, Action::MoveBackward)
            .bind(Key::A, Action::StrafeLeft)
            .bind(Key::Left, Action::StrafeLeft)
            .bind(Key::D, Action::StrafeRight)
            .bind(Key::Right, Action::StrafeRight)
            .bind(Key::LeftShift, Action::Sprint)
            .bind(Key::F1, Action::Toggle(PassToggle::Shadows))
            .bind(Key::F2, Action::Toggle(PassToggle::StencilOutline))
            .bind(Key::F3, Action::Toggle(PassToggle::PostProcess))
            .bind(Key::Escape, Action::Quit)
            .bind(Key::Q, Action::Quit);
        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bindings_cover_movement_and_quit() {
        let bindings = Bindings::default();
        assert_eq!(bindings.action_for(Key::W), Some(Action::MoveForward));
        assert_eq!(bindings.action_for(Key::Escape), Some(Action::Quit));
        assert_eq!(
            bindings.action_for(Key::F3),
            Some(Action::Toggle(PassToggle::PostProcess))
        );
        assert_eq!(bindings.action_for(Key::Space), None);
    }

    #[test]
    fn held_actions_are_deduplicated() {
        let bindings = Bindings::default();
        let mut keys = KeyTable::new();
        keys.press(Key::W);
        keys.press(Key::Up);
        keys.press(Key::D);
        keys.press(Key::F1);
        assert_eq!(
            bindings.held_actions(&keys),
            vec![Action::MoveForward, Action::StrafeRight]
        );
    }

    #[test]
    fn toggles_and_quit_are_not_continuous() {
        assert!(!Action::Quit.is_continuous());
        assert!(!Action::Toggle(PassToggle::Shadows).is_continuous());
        assert!(Action::Sprint.is_continuous());
    }
}
