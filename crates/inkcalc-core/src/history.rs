//! Linear undo/redo history of raster snapshots.

use crate::surface::Snapshot;

/// Cursor value of an empty history.
pub const EMPTY_STEP: isize = -1;

/// Ordered snapshots plus a cursor at the one currently on the surface.
///
/// `current_step` stays in `[-1, len - 1]`. Recording after an undo drops
/// every snapshot past the cursor, so the history never branches.
#[derive(Debug, Clone)]
pub struct HistoryStack {
    snapshots: Vec<Snapshot>,
    current_step: isize,
    /// Oldest snapshots are dropped beyond this many.
    capacity: Option<usize>,
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStack {
    /// Create an empty, unbounded history.
    pub fn new() -> Self {
        Self {
            snapshots: Vec::new(),
            current_step: EMPTY_STEP,
            capacity: None,
        }
    }

    /// Create an empty history keeping at most `capacity` snapshots.
    pub fn with_capacity_limit(capacity: Option<usize>) -> Self {
        Self {
            capacity: capacity.map(|c| c.max(1)),
            ..Self::new()
        }
    }

    /// Append a snapshot after the cursor, discarding any redo branch.
    pub fn record(&mut self, snapshot: Snapshot) {
        let keep = (self.current_step + 1) as usize;
        self.snapshots.truncate(keep);
        self.snapshots.push(snapshot);

        if let Some(capacity) = self.capacity {
            if self.snapshots.len() > capacity {
                let excess = self.snapshots.len() - capacity;
                self.snapshots.drain(..excess);
            }
        }

        self.current_step = self.snapshots.len() as isize - 1;
    }

    /// Step back one snapshot and return it, or `None` at the oldest one.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        if !self.can_undo() {
            return None;
        }
        self.current_step -= 1;
        self.current()
    }

    /// Step forward one snapshot and return it, or `None` at the newest one.
    pub fn redo(&mut self) -> Option<&Snapshot> {
        if !self.can_redo() {
            return None;
        }
        self.current_step += 1;
        self.current()
    }

    /// The snapshot [`undo`](Self::undo) would step to, without moving.
    pub fn peek_undo(&self) -> Option<&Snapshot> {
        if !self.can_undo() {
            return None;
        }
        self.snapshots.get((self.current_step - 1) as usize)
    }

    /// The snapshot [`redo`](Self::redo) would step to, without moving.
    pub fn peek_redo(&self) -> Option<&Snapshot> {
        if !self.can_redo() {
            return None;
        }
        self.snapshots.get((self.current_step + 1) as usize)
    }

    /// Drop every snapshot.
    pub fn reset(&mut self) {
        self.snapshots.clear();
        self.current_step = EMPTY_STEP;
    }

    pub fn can_undo(&self) -> bool {
        self.current_step > 0
    }

    pub fn can_redo(&self) -> bool {
        self.current_step < self.snapshots.len() as isize - 1
    }

    /// The snapshot the cursor points at.
    pub fn current(&self) -> Option<&Snapshot> {
        usize::try_from(self.current_step)
            .ok()
            .and_then(|i| self.snapshots.get(i))
    }

    pub fn current_step(&self) -> isize {
        self.current_step
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
