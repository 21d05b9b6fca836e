use std::{fmt, sync::Arc};

use glam::UVec2;

use crate::{Command, RenderTarget};

/// An immutable, shareable list of commands that can be drawn as one.
///
/// Produced by a [`PictureRecorder`].
#[derive(Clone)]
pub struct Picture {
    commands: Arc<[Command]>,
    size: UVec2,
}

impl Picture {
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// The size of the surface the picture was recorded against.
    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Applies every command in the picture to `target`, bracketed by a save
    /// and restore so the picture cannot leak state.
    pub fn playback(&self, target: &mut dyn RenderTarget) {
        target.apply(&Command::Save);
        for command in self.commands() {
            target.apply(command);
        }
        target.apply(&Command::Restore);
    }
}

impl PartialEq for Picture {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.commands, &other.commands)
    }
}

impl fmt::Debug for Picture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Picture")
            .field("commands", &self.len())
            .field("size", &self.size)
            .finish()
    }
}

/// A [`RenderTarget`] that captures commands into a [`Picture`]
/// instead of drawing them.
#[derive(Debug)]
pub struct PictureRecorder {
    commands: Vec<Command>,
    size: UVec2,
}

impl PictureRecorder {
    pub fn new(size: UVec2) -> Self {
        Self {
            commands: Vec::new(),
            size,
        }
    }

    pub fn finish(self) -> Picture {
        Picture {
            commands: self.commands.into(),
            size: self.size,
        }
    }
}

impl RenderTarget for PictureRecorder {
    fn apply(&mut self, command: &Command) {
        self.commands.push(command.clone());
    }

    fn size(&self) -> UVec2 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use glam::uvec2;

    use super::*;
    use crate::{Color, Paint, Rect};

    #[test]
    fn playback_is_balanced() {
        let mut recorder = PictureRecorder::new(uvec2(4, 4));
        recorder.apply(&Command::Clear(Color::WHITE));
        recorder.apply(&Command::DrawRect {
            rect: Rect::default(),
            paint: Paint::new(),
        });
        let picture = recorder.finish();
        assert_eq!(picture.len(), 2);
        assert_eq!(picture, picture.clone());

        let mut replay = PictureRecorder::new(picture.size());
        picture.playback(&mut replay);
        let replayed = replay.finish();
        assert_eq!(replayed.commands().first(), Some(&Command::Save));
        assert_eq!(replayed.commands().last(), Some(&Command::Restore));
        assert_eq!(&replayed.commands()[1..3], picture.commands());
    }
}
