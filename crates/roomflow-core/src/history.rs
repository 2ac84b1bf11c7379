//! Bounded undo/redo machine over scene snapshots.

use crate::sanitize::sanitize_scene;
use crate::scene::SceneState;
use serde_json::Value;

/// Maximum number of undo states to keep.
pub const MAX_HISTORY: usize = 50;

/// Past/present/future container for scene snapshots.
///
/// The `present` slot is the single source of truth for the scene; every
/// commit replaces it wholesale with a sanitized candidate. Candidates that
/// compare structurally equal to the present are rejected outright, so
/// redundant commits neither grow the past nor clear the future.
#[derive(Debug, Clone)]
pub struct HistoryMachine {
    past: Vec<SceneState>,
    present: SceneState,
    future: Vec<SceneState>,
    hydrated: bool,
}

impl Default for HistoryMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryMachine {
    /// Create an empty, not-yet-hydrated machine over the default scene.
    pub fn new() -> Self {
        Self {
            past: Vec::new(),
            present: SceneState::default(),
            future: Vec::new(),
            hydrated: false,
        }
    }

    /// The current scene.
    pub fn present(&self) -> &SceneState {
        &self.present
    }

    /// Whether a persisted document has been loaded.
    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    /// Replace the whole machine with a decoded document. Used once at
    /// startup; clears both stacks.
    pub fn hydrate(&mut self, raw: &Value) {
        self.present = sanitize_scene(raw);
        self.past.clear();
        self.future.clear();
        self.hydrated = true;
    }

    /// Commit a candidate scene.
    ///
    /// The candidate is sanitized first; if the result equals the present
    /// scene the machine is left untouched and `false` is returned.
    /// Otherwise the old present is pushed onto the past (evicting the
    /// oldest entry beyond [`MAX_HISTORY`]), the future is cleared, and
    /// `true` is returned.
    pub fn apply(&mut self, candidate: SceneState) -> bool {
        let candidate = candidate.sanitized();
        if candidate == self.present {
            return false;
        }

        self.past.push(std::mem::replace(&mut self.present, candidate));
        if self.past.len() > MAX_HISTORY {
            self.past.remove(0);
        }
        self.future.clear();
        self.hydrated = true;
        true
    }

    /// Commit the result of an updater run against the present scene.
    pub fn apply_with(&mut self, update: impl FnOnce(&SceneState) -> SceneState) -> bool {
        let candidate = update(&self.present);
        self.apply(candidate)
    }

    /// Commit an untrusted document.
    pub fn apply_raw(&mut self, raw: &Value) -> bool {
        self.apply(sanitize_scene(raw))
    }

    /// Step back one commit. No-op on an empty past.
    pub fn undo(&mut self) -> bool {
        match self.past.pop() {
            Some(previous) => {
                let current = std::mem::replace(&mut self.present, previous);
                self.future.insert(0, current);
                true
            }
            None => false,
        }
    }

    /// Step forward one undone commit. No-op on an empty future.
    pub fn redo(&mut self) -> bool {
        if self.future.is_empty() {
            return false;
        }
        let next = self.future.remove(0);
        let current = std::mem::replace(&mut self.present, next);
        self.past.push(current);
        true
    }

    /// Check if undo is available.
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    /// Check if redo is available.
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Number of past snapshots currently retained.
    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    /// Number of undone snapshots available for redo.
    pub fn future_len(&self) -> usize {
        self.future.len()
    }
}
