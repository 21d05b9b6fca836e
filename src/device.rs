//! The deferred device: owns the recording queue and decides when, and onto
//! which target, queued commands are replayed.

use glam::UVec2;

use crate::{
    queue::{PlaybackMode, RecordQueue},
    Command, ContentChange, Image, NotificationClient, PlaybackHandle, RenderTarget, TargetError,
};

/// Default number of queued commands before a flush is forced.
pub const DEFAULT_MAX_RECORDING_COMMANDS: usize = 8196;

#[derive(Debug, thiserror::Error)]
pub enum FlushError {
    #[error("handed-off commands are waiting but no playback target is bound")]
    NoPlaybackTarget,
}

/// The result of a flush request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The queue was empty.
    Nothing,
    /// Queued commands were replayed onto the primary target.
    Replayed { commands: usize },
    /// Queued draws were dropped; their state changes were kept.
    Discarded { commands: usize },
    /// Queued commands were moved into the playback snapshot.
    HandedOff { commands: usize },
    /// The notification client's lock was contended. The commands stay queued.
    Deferred,
}

/// Binds a primary render target, and optionally a playback target,
/// to a recording queue.
///
/// The device borrows its targets and notification client, so they must outlive it.
pub struct DeferredDevice<'t> {
    target: &'t mut dyn RenderTarget,
    playback_target: Option<&'t mut dyn RenderTarget>,
    client: Option<&'t dyn NotificationClient>,

    queue: RecordQueue,
    snapshot: PlaybackHandle,

    max_recording_commands: usize,
    previous_storage: usize,
    fresh_frame: bool,
    can_discard: bool,
    thread_safe: bool,
}

impl<'t> DeferredDevice<'t> {
    pub fn new(target: &'t mut dyn RenderTarget) -> Self {
        Self {
            target,
            playback_target: None,
            client: None,
            queue: RecordQueue::new(),
            snapshot: PlaybackHandle::new(),
            max_recording_commands: DEFAULT_MAX_RECORDING_COMMANDS,
            previous_storage: 0,
            fresh_frame: true,
            can_discard: false,
            thread_safe: false,
        }
    }

    pub fn set_notification_client(&mut self, client: Option<&'t dyn NotificationClient>) {
        self.client = client;
    }

    pub fn max_recording_commands(&self) -> usize {
        self.max_recording_commands
    }

    pub fn set_max_recording_commands(&mut self, max: usize) {
        self.max_recording_commands = max;
        self.recorded_command();
    }

    /// Rebinds the primary target. Queued commands are kept and
    /// will replay onto the new target.
    pub fn set_target(&mut self, target: &'t mut dyn RenderTarget) {
        log::info!(
            "Rebinding deferred device to a {}x{} target with {} queued commands",
            target.size().x,
            target.size().y,
            self.queue.count()
        );
        self.target = target;
    }

    pub fn target(&mut self) -> &mut (dyn RenderTarget + 't) {
        &mut *self.target
    }

    pub fn target_size(&self) -> UVec2 {
        self.target.size()
    }

    /// Binds the target that [`thread_safe_flush`](Self::thread_safe_flush)
    /// replays onto.
    pub fn set_playback_target(&mut self, target: Option<&'t mut dyn RenderTarget>) {
        self.playback_target = target;
    }

    /// Switches flushes to hand commands off through the playback snapshot
    /// instead of replaying them onto the primary target. Cannot be undone.
    pub fn enable_thread_safe_playback(&mut self) {
        if !self.thread_safe {
            log::info!("Enabling thread-safe playback");
            self.thread_safe = true;
        }
    }

    pub fn is_thread_safe(&self) -> bool {
        self.thread_safe
    }

    /// A handle to the snapshot that thread-safe flushes hand commands off to.
    pub fn playback_handle(&self) -> PlaybackHandle {
        self.snapshot.clone()
    }

    pub fn has_pending_commands(&self) -> bool {
        self.queue.has_pending()
    }

    pub fn pending_command_count(&self) -> usize {
        self.queue.count()
    }

    pub fn storage_allocated_for_recording(&self) -> usize {
        self.queue.byte_estimate()
    }

    pub fn is_drawing_to_layer(&self) -> bool {
        self.queue.is_drawing_to_layer()
    }

    /// Returns whether pending commands were skipped since the last call,
    /// then resets the flag. True on a new device.
    pub fn is_fresh_frame(&mut self) -> bool {
        std::mem::take(&mut self.fresh_frame)
    }

    /// Appends a command to the queue, flushing if the queue grows past its budget.
    pub fn record(&mut self, command: Command) {
        log::trace!("Recording {:?}", command);
        self.queue.append(command);
        self.recorded_command();
    }

    /// Executes a command directly on the primary target.
    pub fn draw_immediate(&mut self, command: &Command) {
        if !command.is_state_change() {
            self.can_discard = false;
        }
        self.queue.track_saves(command);
        self.target.apply(command);
    }

    fn recorded_command(&mut self) {
        if self.queue.count() > self.max_recording_commands {
            log::debug!(
                "Recording queue exceeded {} commands; flushing",
                self.max_recording_commands
            );
            self.flush_pending(PlaybackMode::Normal);
        }
        self.report_storage();
    }

    fn report_storage(&mut self) {
        let storage = self.queue.byte_estimate();
        if storage != self.previous_storage {
            self.previous_storage = storage;
            if let Some(client) = self.client {
                client.storage_allocated_for_recording_changed(storage);
            }
        }
    }

    /// Drops every pending draw because the next one will overdraw
    /// the whole surface.
    ///
    /// Does nothing while a recorded layer is open.
    pub fn skip_pending_commands(&mut self) {
        if self.queue.is_drawing_to_layer() {
            log::trace!("Not skipping pending commands inside a layer");
            return;
        }
        self.can_discard = !self.thread_safe;
        if self.queue.has_pending() {
            self.fresh_frame = true;
            self.flush_pending(PlaybackMode::Silent);
        }
    }

    /// Empties the queue according to `mode` and the thread-safe setting.
    pub fn flush_pending(&mut self, mode: PlaybackMode) -> FlushOutcome {
        let outcome = match (mode, self.thread_safe) {
            (PlaybackMode::Normal, false) => self.replay_to_target(),
            (PlaybackMode::Silent, false) => self.discard_to_target(),
            (PlaybackMode::Normal, true) => self.hand_off(),
            (PlaybackMode::Silent, true) => self.discard_to_snapshot(),
        };
        self.report_storage();
        outcome
    }

    fn replay_to_target(&mut self) -> FlushOutcome {
        if !self.queue.has_pending() {
            return FlushOutcome::Nothing;
        }
        self.about_to_draw();
        let commands = self.queue.replay(&mut *self.target, PlaybackMode::Normal);
        log::debug!("Replayed {} deferred commands", commands);
        if let Some(client) = self.client {
            client.flushed_draw_commands();
        }
        FlushOutcome::Replayed { commands }
    }

    fn discard_to_target(&mut self) -> FlushOutcome {
        if !self.queue.has_pending() {
            return FlushOutcome::Nothing;
        }
        let commands = self.queue.replay(&mut *self.target, PlaybackMode::Silent);
        log::debug!("Discarded {} deferred commands", commands);
        if let Some(client) = self.client {
            client.skipped_pending_draw_commands();
        }
        FlushOutcome::Discarded { commands }
    }

    fn hand_off(&mut self) -> FlushOutcome {
        if let Some(client) = self.client {
            client.prepare_for_immediate_draw();
        }
        if !self.queue.has_pending() {
            return FlushOutcome::Nothing;
        }
        if !self.try_lock() {
            log::debug!("Playback lock contended; keeping {} commands", self.queue.count());
            return FlushOutcome::Deferred;
        }
        let commands = self.queue.count();
        self.snapshot.hand_off(self.queue.drain(PlaybackMode::Normal));
        self.unlock();
        log::debug!("Handed off {} deferred commands", commands);
        if let Some(client) = self.client {
            client.flushed_draw_commands();
        }
        FlushOutcome::HandedOff { commands }
    }

    fn discard_to_snapshot(&mut self) -> FlushOutcome {
        if !self.queue.has_pending() {
            return FlushOutcome::Nothing;
        }
        if !self.try_lock() {
            log::debug!("Playback lock contended; marking pending silent flush");
            self.queue.mark_pending_silent_flush();
            return FlushOutcome::Deferred;
        }
        let commands = self.queue.count();
        self.snapshot.hand_off(self.queue.drain(PlaybackMode::Silent));
        self.unlock();
        log::debug!("Discarded {} deferred commands", commands);
        if let Some(client) = self.client {
            client.skipped_pending_draw_commands();
        }
        FlushOutcome::Discarded { commands }
    }

    fn try_lock(&self) -> bool {
        self.client.map_or(true, |client| client.try_lock())
    }

    fn unlock(&self) {
        if let Some(client) = self.client {
            client.unlock();
        }
    }

    fn about_to_draw(&mut self) {
        if let Some(client) = self.client {
            client.prepare_for_draw();
        }
        if self.can_discard {
            self.target.content_will_change(ContentChange::Discard);
            self.can_discard = false;
        }
    }

    /// Replays pending commands, then flushes the primary target.
    pub fn flush(&mut self) -> FlushOutcome {
        let outcome = self.flush_pending(PlaybackMode::Normal);
        self.target.flush();
        outcome
    }

    /// First phase of a thread-safe flush: hands pending commands off to the
    /// playback snapshot.
    pub fn prepare_for_thread_safe_flush(&mut self) -> FlushOutcome {
        if !self.thread_safe || !self.queue.has_pending() {
            return FlushOutcome::Nothing;
        }
        self.flush_pending(PlaybackMode::Normal)
    }

    /// Second phase of a thread-safe flush: replays the snapshot onto the
    /// playback target, then flushes it.
    ///
    /// Returns the number of commands replayed.
    pub fn thread_safe_flush(&mut self) -> Result<usize, FlushError> {
        if !self.thread_safe || self.snapshot.is_empty() {
            return Ok(0);
        }
        let target = self
            .playback_target
            .as_deref_mut()
            .ok_or(FlushError::NoPlaybackTarget)?;
        Ok(self.snapshot.consume(target))
    }

    /// Flushes, then makes sure the primary target was told about the
    /// upcoming change to its pixels.
    fn prepare_for_immediate_pixel_write(&mut self) {
        if self.queue.has_pending() {
            self.flush_pending(PlaybackMode::Normal);
        } else {
            let must_retain = !self.can_discard;
            self.about_to_draw();
            if must_retain {
                self.target.content_will_change(ContentChange::Retain);
            }
        }
        self.target.flush();
    }

    /// Writes pixels straight to the primary target.
    ///
    /// A write covering the whole target discards pending commands.
    pub fn write_pixels(&mut self, image: &Image, origin: UVec2) -> Result<(), TargetError> {
        crate::target::check_bounds(self.target.size(), origin, image.size())?;
        if origin == UVec2::ZERO && image.size() == self.target.size() {
            self.skip_pending_commands();
        }
        self.prepare_for_immediate_pixel_write();
        self.target.write_pixels(image, origin)
    }

    pub fn read_pixels(&mut self, origin: UVec2, size: UVec2) -> Result<Vec<u8>, TargetError> {
        self.flush_pending(PlaybackMode::Normal);
        self.target.read_pixels(origin, size)
    }

    /// Replays pending commands to release the resources they hold.
    ///
    /// Returns the number of bytes released, at most `bytes`.
    pub fn free_memory_if_possible(&mut self, bytes: usize) -> usize {
        let storage = self.queue.byte_estimate();
        self.flush_pending(PlaybackMode::Normal);
        let freed = storage - self.queue.byte_estimate() + self.queue.shrink_to_fit();
        freed.min(bytes)
    }
}

impl Drop for DeferredDevice<'_> {
    fn drop(&mut self) {
        self.flush_pending(PlaybackMode::Silent);
    }
}

#[cfg(test)]
mod tests {
    use glam::{uvec2, vec2, Affine2};

    use super::*;
    use crate::{
        testing::{CountingClient, LogTarget},
        Color, Paint, Rect,
    };

    fn rect(x: f32) -> Command {
        Command::DrawRect {
            rect: Rect::new(vec2(x, 0.), vec2(1., 1.)),
            paint: Paint::new(),
        }
    }

    #[test]
    fn budget_forces_one_flush() {
        let client = CountingClient::new();
        let mut target = LogTarget::new(uvec2(16, 16));
        let log = target.log();
        let mut device = DeferredDevice::new(&mut target);
        device.set_notification_client(Some(&client));
        device.set_max_recording_commands(3);

        for i in 0..4 {
            device.record(rect(i as f32));
        }
        assert_eq!(client.flushed(), 1);
        assert_eq!(log.len(), 4);
        assert_eq!(device.pending_command_count(), 0);

        device.record(rect(4.));
        assert_eq!(client.flushed(), 1);
        assert_eq!(device.pending_command_count(), 1);
    }

    #[test]
    fn skip_twice_notifies_once() {
        let client = CountingClient::new();
        let mut target = LogTarget::new(uvec2(16, 16));
        let log = target.log();
        let mut device = DeferredDevice::new(&mut target);
        device.set_notification_client(Some(&client));
        assert!(device.is_fresh_frame());
        assert!(!device.is_fresh_frame());

        device.record(rect(0.));
        device.skip_pending_commands();
        device.skip_pending_commands();
        assert_eq!(client.skipped(), 1);
        assert!(!device.has_pending_commands());
        assert!(device.is_fresh_frame());
        assert!(log.draws().is_empty());
    }

    #[test]
    fn discard_keeps_state_and_hints_target() {
        let mut target = LogTarget::new(uvec2(16, 16));
        let log = target.log();
        let mut device = DeferredDevice::new(&mut target);
        let shift = Command::Concat(Affine2::from_translation(vec2(2., 2.)));

        device.record(Command::Save);
        device.record(shift.clone());
        device.record(rect(0.));
        device.skip_pending_commands();
        device.record(Command::Clear(Color::WHITE));
        device.flush();

        assert_eq!(
            log.commands(),
            vec![Command::Save, shift, Command::Clear(Color::WHITE)]
        );
        assert_eq!(log.content_changes(), vec![ContentChange::Discard]);
        assert_eq!(log.flushes(), 1);
    }

    #[test]
    fn skip_refused_inside_layer() {
        let mut target = LogTarget::new(uvec2(16, 16));
        let log = target.log();
        let mut device = DeferredDevice::new(&mut target);
        device.record(Command::SaveLayer {
            bounds: None,
            paint: None,
        });
        device.record(rect(0.));
        device.skip_pending_commands();
        assert_eq!(device.pending_command_count(), 2);

        device.record(Command::Restore);
        device.skip_pending_commands();
        assert!(!device.has_pending_commands());
        assert_eq!(log.commands(), vec![Command::Save, Command::Restore]);
    }

    #[test]
    fn contended_silent_flush_is_deferred() {
        let client = CountingClient::new();
        let mut target = LogTarget::new(uvec2(16, 16));
        let mut playback = LogTarget::new(uvec2(16, 16));
        let playback_log = playback.log();
        let mut device = DeferredDevice::new(&mut target);
        device.set_notification_client(Some(&client));
        device.set_playback_target(Some(&mut playback));
        device.enable_thread_safe_playback();

        client.set_contended(true);
        device.record(rect(0.));
        assert_eq!(device.flush_pending(PlaybackMode::Silent), FlushOutcome::Deferred);
        assert_eq!(device.flush_pending(PlaybackMode::Silent), FlushOutcome::Deferred);
        assert_eq!(device.flush_pending(PlaybackMode::Normal), FlushOutcome::Deferred);
        assert_eq!(device.pending_command_count(), 1);
        assert_eq!(client.skipped(), 0);

        device.record(rect(1.));
        client.set_contended(false);
        assert_eq!(
            device.prepare_for_thread_safe_flush(),
            FlushOutcome::HandedOff { commands: 2 }
        );
        assert!(!client.is_locked());
        assert_eq!(device.thread_safe_flush().unwrap(), 1);
        assert_eq!(playback_log.commands(), vec![rect(1.)]);
        assert_eq!(playback_log.flushes(), 1);
    }

    #[test]
    fn silent_flush_without_client_drains_to_snapshot() {
        let mut target = LogTarget::new(uvec2(16, 16));
        let log = target.log();
        let mut playback = LogTarget::new(uvec2(16, 16));
        let played = playback.log();
        let mut device = DeferredDevice::new(&mut target);
        device.enable_thread_safe_playback();
        let shift = Command::Concat(Affine2::from_translation(vec2(2., 2.)));

        device.record(shift.clone());
        device.record(rect(0.));
        assert_eq!(
            device.flush_pending(PlaybackMode::Silent),
            FlushOutcome::Discarded { commands: 2 }
        );
        assert!(!device.has_pending_commands());

        let handle = device.playback_handle();
        assert_eq!(handle.pending(), 1);
        assert_eq!(handle.consume(&mut playback), 1);
        assert_eq!(played.commands(), vec![shift]);
        assert_eq!(log.len(), 0);
    }

    #[test]
    fn immediate_restore_closes_recorded_layer() {
        let mut target = LogTarget::new(uvec2(16, 16));
        let mut device = DeferredDevice::new(&mut target);
        device.record(Command::SaveLayer {
            bounds: None,
            paint: None,
        });
        device.flush();
        device.draw_immediate(&Command::Restore);
        assert!(!device.is_drawing_to_layer());

        device.record(rect(0.));
        device.skip_pending_commands();
        assert!(!device.has_pending_commands());
    }

    #[test]
    fn thread_safe_flush_needs_playback_target() {
        let mut target = LogTarget::new(uvec2(16, 16));
        let mut device = DeferredDevice::new(&mut target);
        device.enable_thread_safe_playback();
        assert_eq!(device.thread_safe_flush().unwrap(), 0);

        device.record(rect(0.));
        device.prepare_for_thread_safe_flush();
        assert!(matches!(
            device.thread_safe_flush(),
            Err(FlushError::NoPlaybackTarget)
        ));
        assert_eq!(device.playback_handle().pending(), 1);
    }

    #[test]
    fn storage_reports_follow_queue() {
        let client = CountingClient::new();
        let mut target = LogTarget::new(uvec2(16, 16));
        let mut device = DeferredDevice::new(&mut target);
        device.set_notification_client(Some(&client));

        device.record(rect(0.));
        device.record(rect(1.));
        device.flush();
        let size = std::mem::size_of::<Command>();
        assert_eq!(client.storage_reports(), vec![size, 2 * size, 0]);
    }

    #[test]
    fn pixel_writes() {
        let mut target = LogTarget::new(uvec2(2, 2));
        let log = target.log();
        let mut device = DeferredDevice::new(&mut target);
        let small = Image::from_color(1, 1, Color::WHITE);
        let full = Image::from_color(2, 2, Color::WHITE);

        device.write_pixels(&small, uvec2(1, 1)).unwrap();
        assert_eq!(log.content_changes(), vec![ContentChange::Retain]);

        device.record(rect(0.));
        device.write_pixels(&full, UVec2::ZERO).unwrap();
        assert!(log.draws().is_empty());
        assert_eq!(
            log.content_changes(),
            vec![ContentChange::Retain, ContentChange::Discard]
        );
        assert_eq!(
            log.writes(),
            vec![(small.id(), uvec2(1, 1)), (full.id(), UVec2::ZERO)]
        );
        assert!(device.write_pixels(&full, uvec2(1, 0)).is_err());
    }
}
