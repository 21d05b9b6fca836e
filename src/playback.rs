use std::{fmt, mem, sync::Arc};

use parking_lot::Mutex;

use crate::{Command, RenderTarget};

/// A shared handle to the commands handed off by a thread-safe flush.
///
/// The producer side appends frozen command batches; a consumer, typically
/// on the thread owning the playback target, takes and replays them.
/// Cloning yields another handle to the same snapshot.
#[derive(Clone, Default)]
pub struct PlaybackHandle {
    snapshot: Arc<Mutex<Vec<Command>>>,
}

impl PlaybackHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends commands to the snapshot. Returns how many were appended.
    pub(crate) fn hand_off(&self, commands: impl IntoIterator<Item = Command>) -> usize {
        let mut snapshot = self.snapshot.lock();
        let before = snapshot.len();
        snapshot.extend(commands);
        snapshot.len() - before
    }

    /// The number of commands waiting to be consumed.
    pub fn pending(&self) -> usize {
        self.snapshot.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }

    /// Replays every waiting command onto `target`, then flushes it.
    ///
    /// Does nothing if the snapshot is empty. The snapshot lock is
    /// released before replay starts, so the producer never waits on it.
    /// Returns the number of commands replayed.
    pub fn consume(&self, target: &mut dyn RenderTarget) -> usize {
        let commands = mem::take(&mut *self.snapshot.lock());
        if commands.is_empty() {
            return 0;
        }
        for command in &commands {
            target.apply(command);
        }
        target.flush();
        log::debug!("Consumed {} handed-off commands", commands.len());
        commands.len()
    }
}

impl fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackHandle")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use glam::{uvec2, vec2};

    use super::*;
    use crate::{testing::LogTarget, Color, Paint, Rect};

    #[test]
    fn consume_on_empty_is_noop() {
        let handle = PlaybackHandle::new();
        let mut target = LogTarget::new(uvec2(4, 4));
        assert_eq!(handle.consume(&mut target), 0);
        assert_eq!(target.log().flushes(), 0);
    }

    #[test]
    fn consumer_thread_sees_batches_in_order() {
        let handle = PlaybackHandle::new();
        let first = Command::Clear(Color::WHITE);
        let second = Command::DrawRect {
            rect: Rect::new(vec2(1., 1.), vec2(2., 2.)),
            paint: Paint::new(),
        };
        assert_eq!(handle.hand_off([first.clone()]), 1);
        assert_eq!(handle.hand_off([second.clone()]), 1);
        assert_eq!(handle.pending(), 2);

        let consumer = handle.clone();
        let log = thread::spawn(move || {
            let mut target = LogTarget::new(uvec2(4, 4));
            assert_eq!(consumer.consume(&mut target), 2);
            target.log()
        })
        .join()
        .unwrap();

        assert!(handle.is_empty());
        assert_eq!(log.commands(), vec![first, second]);
        assert_eq!(log.flushes(), 1);
    }
}
