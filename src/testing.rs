//! Recording doubles shared by the unit tests.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use glam::UVec2;
use parking_lot::Mutex;

use crate::{
    target::check_bounds, Command, ContentChange, Image, NotificationClient, RenderTarget,
    TargetError,
};

#[derive(Debug, Default)]
struct LogState {
    commands: Vec<Command>,
    flushes: usize,
    changes: Vec<ContentChange>,
    writes: Vec<(u64, UVec2)>,
}

/// Shared view of everything a [`LogTarget`] received, readable while
/// the target itself is borrowed by a canvas.
#[derive(Clone, Debug, Default)]
pub struct CommandLog(Arc<Mutex<LogState>>);

impl CommandLog {
    pub fn commands(&self) -> Vec<Command> {
        self.0.lock().commands.clone()
    }

    /// Only the commands that produce pixels.
    pub fn draws(&self) -> Vec<Command> {
        self.0
            .lock()
            .commands
            .iter()
            .filter(|command| !command.is_state_change())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.lock().commands.len()
    }

    pub fn flushes(&self) -> usize {
        self.0.lock().flushes
    }

    pub fn content_changes(&self) -> Vec<ContentChange> {
        self.0.lock().changes.clone()
    }

    /// Image ids and origins passed to `write_pixels`.
    pub fn writes(&self) -> Vec<(u64, UVec2)> {
        self.0.lock().writes.clone()
    }
}

/// A target that logs every command it is given.
#[derive(Debug)]
pub struct LogTarget {
    log: CommandLog,
    size: UVec2,
}

impl LogTarget {
    pub fn new(size: UVec2) -> Self {
        Self {
            log: CommandLog::default(),
            size,
        }
    }

    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }
}

impl RenderTarget for LogTarget {
    fn apply(&mut self, command: &Command) {
        self.log.0.lock().commands.push(command.clone());
    }

    fn flush(&mut self) {
        self.log.0.lock().flushes += 1;
    }

    fn size(&self) -> UVec2 {
        self.size
    }

    fn content_will_change(&mut self, change: ContentChange) {
        self.log.0.lock().changes.push(change);
    }

    fn read_pixels(&mut self, origin: UVec2, size: UVec2) -> Result<Vec<u8>, TargetError> {
        check_bounds(self.size, origin, size)?;
        Ok(vec![0; size.x as usize * size.y as usize * 4])
    }

    fn write_pixels(&mut self, image: &Image, origin: UVec2) -> Result<(), TargetError> {
        check_bounds(self.size, origin, image.size())?;
        self.log.0.lock().writes.push((image.id(), origin));
        Ok(())
    }
}

/// A notification client that counts callbacks and can simulate
/// a contended lock.
#[derive(Debug, Default)]
pub struct CountingClient {
    prepare_for_draw: AtomicUsize,
    prepare_for_immediate_draw: AtomicUsize,
    flushed: AtomicUsize,
    skipped: AtomicUsize,
    storage: Mutex<Vec<usize>>,
    locked: AtomicBool,
    contended: AtomicBool,
}

impl CountingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prepare_for_draw_calls(&self) -> usize {
        self.prepare_for_draw.load(Ordering::SeqCst)
    }

    pub fn prepare_for_immediate_draw_calls(&self) -> usize {
        self.prepare_for_immediate_draw.load(Ordering::SeqCst)
    }

    pub fn flushed(&self) -> usize {
        self.flushed.load(Ordering::SeqCst)
    }

    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Every storage size reported so far.
    pub fn storage_reports(&self) -> Vec<usize> {
        self.storage.lock().clone()
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    /// Makes `try_lock` fail as if another thread held the lock.
    pub fn set_contended(&self, contended: bool) {
        self.contended.store(contended, Ordering::SeqCst);
    }
}

impl NotificationClient for CountingClient {
    fn prepare_for_draw(&self) {
        self.prepare_for_draw.fetch_add(1, Ordering::SeqCst);
    }

    fn prepare_for_immediate_draw(&self) {
        self.prepare_for_immediate_draw
            .fetch_add(1, Ordering::SeqCst);
    }

    fn storage_allocated_for_recording_changed(&self, bytes: usize) {
        self.storage.lock().push(bytes);
    }

    fn flushed_draw_commands(&self) {
        self.flushed.fetch_add(1, Ordering::SeqCst);
    }

    fn skipped_pending_draw_commands(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    fn try_lock(&self) -> bool {
        !self.contended.load(Ordering::SeqCst)
            && self
                .locked
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
    }

    fn unlock(&self) {
        self.locked.store(false, Ordering::SeqCst);
    }
}
