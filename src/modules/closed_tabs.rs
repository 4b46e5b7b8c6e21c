use std::collections::VecDeque;

use crate::state::{ClosedTab, Tab};

pub const MAX_CLOSED_TABS: usize = 25;

/// Recently closed tabs, newest last.
pub struct ClosedTabs {
    stack: VecDeque<ClosedTab>,
    capacity: usize,
}

impl Default for ClosedTabs {
    fn default() -> Self {
        Self::new(MAX_CLOSED_TABS)
    }
}

impl ClosedTabs {
    pub fn new(capacity: usize) -> Self {
        Self {
            stack: VecDeque::new(),
            capacity,
        }
    }

    /// Archives a tab to closed tabs stack
    pub fn archive(&mut self, tab: &Tab, index: usize) {
        if self.capacity == 0 {
            return;
        }
        self.stack.push_back(ClosedTab::new(tab, index));

        // Oldest entries fall off first (FIFO)
        while self.stack.len() > self.capacity {
            self.stack.pop_front();
        }

        log::debug!("[ClosedTabs] Archived tab '{}' at: {}", tab.title, tab.address);
    }

    /// Retrieves last closed tab (LIFO)
    pub fn pop(&mut self) -> Option<ClosedTab> {
        let tab = self.stack.pop_back();
        if let Some(ref t) = tab {
            log::debug!("[ClosedTabs] Restoring tab '{}' at: {}", t.snapshot.title, t.snapshot.address);
        }
        tab
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.stack.len() > capacity {
            self.stack.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}
