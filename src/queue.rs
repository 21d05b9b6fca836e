//! The recording queue: an ordered command log with size accounting.

use std::vec;

use crate::{Command, RenderTarget};

/// How queued commands are replayed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlaybackMode {
    /// Every command is executed.
    Normal,
    /// Draws are dropped. State changes are still executed so that
    /// the target's transform and clip stay in step with the recording.
    Silent,
}

/// What a recorded `Save` or `SaveLayer` pushed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum SaveKind {
    Save,
    Layer,
}

/// An ordered log of recorded commands.
///
/// Totals are kept in step with the queued commands. Replaying
/// drains the queue in the order commands were appended.
#[derive(Debug, Default)]
pub struct RecordQueue {
    commands: Vec<Command>,
    byte_estimate: usize,
    /// Number of leading commands to replay silently on the next drain,
    /// set when a silent flush could not run.
    silent_prefix: usize,
    /// Saves recorded so far and not yet restored, across drains.
    saves: Vec<SaveKind>,
    open_layers: usize,
}

impl RecordQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, command: Command) {
        self.track_saves(&command);
        self.byte_estimate += command.record_size();
        self.commands.push(command);
    }

    /// Follows the save stack through `command`.
    ///
    /// Commands that bypass the queue and go straight to the target must be
    /// passed here too, so a layer opened while recording and closed while
    /// drawing immediately (or the reverse) is still balanced.
    pub fn track_saves(&mut self, command: &Command) {
        match command {
            Command::Save => self.saves.push(SaveKind::Save),
            Command::SaveLayer { .. } => {
                self.saves.push(SaveKind::Layer);
                self.open_layers += 1;
            }
            Command::Restore => {
                if self.saves.pop() == Some(SaveKind::Layer) {
                    self.open_layers -= 1;
                }
            }
            _ => {}
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.commands.is_empty()
    }

    pub fn count(&self) -> usize {
        self.commands.len()
    }

    /// Estimated bytes held by the queued commands.
    pub fn byte_estimate(&self) -> usize {
        self.byte_estimate
    }

    /// Returns whether a recorded `SaveLayer` is still waiting for its `Restore`.
    pub fn is_drawing_to_layer(&self) -> bool {
        self.open_layers > 0
    }

    /// Marks every queued command to be replayed silently by the next drain.
    ///
    /// Marking twice is the same as marking once. Commands appended
    /// afterwards are unaffected.
    pub fn mark_pending_silent_flush(&mut self) {
        self.silent_prefix = self.commands.len();
    }

    pub fn has_pending_silent_flush(&self) -> bool {
        self.silent_prefix > 0
    }

    /// Removes every queued command, yielding them in order as they
    /// should be replayed under `mode`.
    ///
    /// Totals are reset as soon as this is called.
    pub fn drain(&mut self, mode: PlaybackMode) -> Drain<'_> {
        let silent = match mode {
            PlaybackMode::Normal => self.silent_prefix,
            PlaybackMode::Silent => self.commands.len(),
        };
        self.silent_prefix = 0;
        self.byte_estimate = 0;
        Drain {
            commands: self.commands.drain(..),
            silent,
        }
    }

    /// Executes every queued command against `target`, then empties the queue.
    ///
    /// Returns the number of commands that were queued.
    pub fn replay(&mut self, target: &mut dyn RenderTarget, mode: PlaybackMode) -> usize {
        let count = self.count();
        for command in self.drain(mode) {
            target.apply(&command);
        }
        count
    }

    /// Drops every queued command without executing it.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.silent_prefix = 0;
        self.byte_estimate = 0;
    }

    /// Releases spare capacity, returning the number of bytes freed.
    pub fn shrink_to_fit(&mut self) -> usize {
        let spare = self.commands.capacity() - self.commands.len();
        self.commands.shrink_to_fit();
        spare * std::mem::size_of::<Command>()
    }
}

/// Iterator returned by [`RecordQueue::drain`].
pub struct Drain<'a> {
    commands: vec::Drain<'a, Command>,
    silent: usize,
}

impl Iterator for Drain<'_> {
    type Item = Command;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let command = self.commands.next()?;
            if self.silent == 0 {
                return Some(command);
            }
            self.silent -= 1;
            if let Some(command) = command.silenced() {
                return Some(command);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::{uvec2, vec2, Affine2};

    use super::*;
    use crate::{testing::LogTarget, Color, Paint, Rect};

    fn rect(x: f32) -> Command {
        Command::DrawRect {
            rect: Rect::new(vec2(x, 0.), vec2(1., 1.)),
            paint: Paint::new(),
        }
    }

    #[test]
    fn totals_follow_commands() {
        let mut queue = RecordQueue::new();
        assert!(!queue.has_pending());
        queue.append(rect(0.));
        queue.append(Command::Save);
        assert_eq!(queue.count(), 2);
        assert_eq!(queue.byte_estimate(), 2 * std::mem::size_of::<Command>());

        let mut target = LogTarget::new(uvec2(8, 8));
        assert_eq!(queue.replay(&mut target, PlaybackMode::Normal), 2);
        assert_eq!(queue.count(), 0);
        assert_eq!(queue.byte_estimate(), 0);
        assert_eq!(target.log().commands(), vec![rect(0.), Command::Save]);

        queue.append(rect(1.));
        queue.clear();
        assert!(!queue.has_pending());
        assert_eq!(queue.byte_estimate(), 0);
    }

    #[test]
    fn silent_prefix_only_covers_marked_commands() {
        let mut queue = RecordQueue::new();
        let shift = Command::Concat(Affine2::from_translation(vec2(3., 0.)));
        queue.append(rect(0.));
        queue.append(shift.clone());
        queue.mark_pending_silent_flush();
        queue.mark_pending_silent_flush();
        queue.append(rect(1.));
        assert!(queue.has_pending_silent_flush());

        let replayed: Vec<_> = queue.drain(PlaybackMode::Normal).collect();
        assert_eq!(replayed, vec![shift, rect(1.)]);
        assert!(!queue.has_pending_silent_flush());

        queue.append(Command::Clear(Color::WHITE));
        queue.append(Command::SaveLayer {
            bounds: None,
            paint: None,
        });
        let replayed: Vec<_> = queue.drain(PlaybackMode::Silent).collect();
        assert_eq!(replayed, vec![Command::Save]);
    }

    #[test]
    fn layers_tracked_across_drains() {
        let mut queue = RecordQueue::new();
        queue.append(Command::Save);
        queue.append(Command::SaveLayer {
            bounds: None,
            paint: None,
        });
        assert!(queue.is_drawing_to_layer());
        queue.drain(PlaybackMode::Normal).for_each(drop);
        assert!(queue.is_drawing_to_layer());

        queue.append(Command::Restore);
        assert!(!queue.is_drawing_to_layer());
        queue.append(Command::Restore);
        assert!(!queue.is_drawing_to_layer());
    }

    #[test]
    fn untracked_restore_closes_recorded_layer() {
        let mut queue = RecordQueue::new();
        queue.append(Command::SaveLayer {
            bounds: None,
            paint: None,
        });
        queue.track_saves(&Command::Restore);
        assert!(!queue.is_drawing_to_layer());
        assert_eq!(queue.count(), 1);
    }
}
