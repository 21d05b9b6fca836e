/// Callbacks an embedder implements to observe, and optionally gate,
/// the flushes of a deferred canvas.
///
/// All methods take `&self`; implementations that need to mutate
/// state should use interior mutability. The canvas borrows the client
/// for its whole lifetime.
pub trait NotificationClient {
    /// Called before queued commands are replayed onto the primary target.
    fn prepare_for_draw(&self);

    /// Called before a flush that may hand commands off to another thread,
    /// and before drawing directly to the target.
    fn prepare_for_immediate_draw(&self);

    /// Called when the number of bytes held by the recording queue changes.
    fn storage_allocated_for_recording_changed(&self, bytes: usize);

    /// Called after queued commands were replayed or handed off.
    fn flushed_draw_commands(&self);

    /// Called after queued commands were discarded without drawing.
    fn skipped_pending_draw_commands(&self);

    /// Attempts to take the lock guarding the playback snapshot.
    ///
    /// Must not block and is not reentrant. Returns `false` if the lock is
    /// held elsewhere.
    fn try_lock(&self) -> bool;

    /// Releases the lock taken by a successful [`try_lock`](Self::try_lock).
    fn unlock(&self);
}
