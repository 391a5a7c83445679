//! # Pick, Hover and Selection
//!
//! [`PickState`] is the orchestrator's latest pick: cleared on every pointer
//! move, replaced by every pick result. [`PickBoard`] is where results are
//! displayed; any thread may read it.

use parking_lot::Mutex;
use twinframe_shared::{PickItem, PickList};

/// The latest pick seen by one context.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PickState {
    latest: PickList,
}

impl PickState {
    /// Empty state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            latest: PickList::new(),
        }
    }

    /// The latest pick list.
    #[inline]
    #[must_use]
    pub const fn latest(&self) -> &PickList {
        &self.latest
    }

    /// Forgets the latest pick. Called before a pointer move goes out.
    #[inline]
    pub fn invalidate(&mut self) {
        self.latest.clear();
    }

    /// Replaces the latest pick.
    pub fn store(&mut self, list: PickList) {
        self.latest = list;
    }

    /// The item a pointer-down acts on: the first entry, if any.
    #[inline]
    #[must_use]
    pub fn pointer_down_item(&self) -> Option<PickItem> {
        self.latest.first()
    }

    /// The list a click selects. `None` when nothing is picked.
    #[must_use]
    pub fn click_selection(&self) -> Option<&PickList> {
        if self.latest.is_empty() {
            None
        } else {
            Some(&self.latest)
        }
    }
}

#[derive(Debug, Default)]
struct BoardInner {
    text: String,
    revision: u64,
}

/// Displayed pick text plus a revision counter bumped on every publish.
#[derive(Debug, Default)]
pub struct PickBoard {
    inner: Mutex<BoardInner>,
}

impl PickBoard {
    /// Empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Displays `list`, comma-joined.
    pub fn publish(&self, list: &PickList) {
        let mut inner = self.inner.lock();
        inner.text = list.to_string();
        inner.revision += 1;
    }

    /// The displayed text.
    #[must_use]
    pub fn text(&self) -> String {
        self.inner.lock().text.clone()
    }

    /// Number of publishes so far.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.inner.lock().revision
    }

    /// Text and revision read together.
    #[must_use]
    pub fn snapshot(&self) -> (String, u64) {
        let inner = self.inner.lock();
        (inner.text.clone(), inner.revision)
    }
}
