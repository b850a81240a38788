//! Keyboard focus over a result list.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Down,
    Up,
    Enter,
    Escape,
}

/// Tracks which result, if any, has keyboard focus. Up and Down wrap.
#[derive(Debug, Clone)]
pub struct ResultNavigator {
    item_count: usize,
    focused: Option<usize>,
    enabled: bool,
}

impl ResultNavigator {
    pub fn new(item_count: usize) -> Self {
        Self {
            item_count,
            focused: None,
            enabled: true,
        }
    }

    pub fn focused(&self) -> Option<usize> {
        self.focused
    }

    /// Changing the item count drops focus.
    pub fn set_item_count(&mut self, item_count: usize) {
        if item_count != self.item_count {
            self.item_count = item_count;
            self.focused = None;
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn focus(&mut self, index: usize) {
        if index < self.item_count {
            self.focused = Some(index);
        }
    }

    /// Apply a key press. Returns the selected index on `Enter`.
    pub fn handle(&mut self, key: NavKey) -> Option<usize> {
        if !self.enabled || self.item_count == 0 {
            return None;
        }
        let last = self.item_count - 1;
        match key {
            NavKey::Down => {
                self.focused = Some(match self.focused {
                    Some(i) if i < last => i + 1,
                    _ => 0,
                });
                None
            }
            NavKey::Up => {
                self.focused = Some(match self.focused {
                    Some(i) if i > 0 => i - 1,
                    _ => last,
                });
                None
            }
            NavKey::Enter => self.focused,
            NavKey::Escape => {
                self.focused = None;
                None
            }
        }
    }
}
