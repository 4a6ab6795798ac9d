use std::collections::VecDeque;

use eframe::egui;

use crate::canvas::TiledImage;
use crate::error::{PaintError, PaintResult};

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Full copy of the drawing layer. Cloning a `TiledImage` only bumps chunk
/// reference counts, so unchanged tiles are shared between snapshots.
#[derive(Clone)]
pub struct HistorySnapshot {
    pub pixels: TiledImage,
}

impl HistorySnapshot {
    pub fn capture(drawing: &TiledImage) -> PaintResult<Self> {
        if drawing.is_empty() {
            return Err(PaintError::EmptySnapshot {
                width: drawing.width(),
                height: drawing.height(),
            });
        }
        Ok(Self { pixels: drawing.clone() })
    }

    fn memory_size(&self) -> usize {
        self.pixels.memory_bytes()
    }
}

// ============================================================================
// HISTORY MANAGER - bounded undo/redo stacks of snapshots
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HistoryLimits {
    pub undo_cap: usize,
    /// Eviction never takes the undo stack below this many entries.
    pub undo_floor: usize,
    pub redo_cap: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self { undo_cap: 10, undo_floor: 5, redo_cap: 5 }
    }
}

impl HistoryLimits {
    fn effective_undo_cap(&self) -> usize {
        self.undo_cap.max(self.undo_floor).max(1)
    }
}

/// Outcome of an undo or redo request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryOutcome {
    Undone,
    /// Only the baseline is left; nothing changed.
    AtInitialState,
    NothingToUndo,
    Redone,
    NothingToRedo,
}

impl HistoryOutcome {
    /// Did the drawing layer change?
    pub fn mutated(self) -> bool {
        matches!(self, HistoryOutcome::Undone | HistoryOutcome::Redone)
    }
}

/// Undo/redo over drawing-layer snapshots. The top of the undo stack is
/// always the current drawing content.
pub struct HistoryManager {
    undo_stack: VecDeque<HistorySnapshot>,
    redo_stack: VecDeque<HistorySnapshot>,
    limits: HistoryLimits,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(HistoryLimits::default())
    }
}

impl HistoryManager {
    pub fn new(limits: HistoryLimits) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            limits,
        }
    }

    /// Snapshot `drawing` onto the undo stack and clear redo.
    /// A failed snapshot is logged and changes nothing.
    pub fn commit(&mut self, drawing: &TiledImage) -> bool {
        let snapshot = match HistorySnapshot::capture(drawing) {
            Ok(s) => s,
            Err(e) => {
                crate::log_warn!("history: commit skipped: {}", e);
                return false;
            }
        };
        self.redo_stack.clear();
        self.push_undo(snapshot);
        true
    }

    pub fn undo(&mut self, drawing: &mut TiledImage) -> HistoryOutcome {
        match self.undo_stack.len() {
            0 => HistoryOutcome::NothingToUndo,
            1 => HistoryOutcome::AtInitialState,
            _ => {
                let Some(current) = self.undo_stack.pop_back() else {
                    return HistoryOutcome::NothingToUndo;
                };
                self.push_redo(current);
                if let Some(prev) = self.undo_stack.back() {
                    *drawing = prev.pixels.clone();
                }
                HistoryOutcome::Undone
            }
        }
    }

    pub fn redo(&mut self, drawing: &mut TiledImage) -> HistoryOutcome {
        let Some(next) = self.redo_stack.pop_back() else {
            return HistoryOutcome::NothingToRedo;
        };
        *drawing = next.pixels.clone();
        self.push_undo(next);
        HistoryOutcome::Redone
    }

    /// Drop both stacks and commit `drawing` as the only entry.
    pub fn reset_with_baseline(&mut self, drawing: &TiledImage) {
        self.clear();
        self.commit(drawing);
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    fn push_undo(&mut self, snapshot: HistorySnapshot) {
        self.undo_stack.push_back(snapshot);
        self.prune();
    }

    fn push_redo(&mut self, snapshot: HistorySnapshot) {
        self.redo_stack.push_back(snapshot);
        while self.redo_stack.len() > self.limits.redo_cap {
            self.redo_stack.pop_front();
        }
    }

    /// FIFO eviction down to the cap.
    fn prune(&mut self) {
        let cap = self.limits.effective_undo_cap();
        while self.undo_stack.len() > cap {
            self.undo_stack.pop_front();
        }
    }

    pub fn can_undo(&self) -> bool {
        self.undo_stack.len() > 1
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn limits(&self) -> HistoryLimits {
        self.limits
    }

    /// Bytes not shared with the live drawing layer.
    pub fn memory_usage(&self) -> usize {
        self.undo_stack
            .iter()
            .chain(self.redo_stack.iter())
            .map(HistorySnapshot::memory_size)
            .sum()
    }
}

// ============================================================================
// HISTORY PANEL
// ============================================================================

/// Compact undo/redo readout for the toolbar.
pub fn show_history_status(ui: &mut egui::Ui, history: &HistoryManager) {
    ui.label(format!(
        "{} {}/{}  {} {}",
        t!("history.undo"),
        history.undo_count().saturating_sub(1),
        history.limits.effective_undo_cap().saturating_sub(1),
        t!("history.redo"),
        history.redo_count(),
    ))
    .on_hover_text(format!("{:.1} MB", history.memory_usage() as f64 / (1024.0 * 1024.0)));
}
