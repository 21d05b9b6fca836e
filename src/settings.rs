use std::mem;

use serde::{Deserialize, Serialize};

use crate::{
    device::DEFAULT_MAX_RECORDING_COMMANDS, Command, DeferredCanvas, DeferredDevice,
    NotificationClient, RenderTarget,
};

/// Tunables for a [`DeferredCanvas`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Number of queued commands above which the queue is flushed.
    pub max_recording_commands: usize,
    /// Images with more bytes of pixels than this are drawn immediately
    /// instead of being queued.
    pub bitmap_size_threshold: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_recording_commands: DEFAULT_MAX_RECORDING_COMMANDS,
            bitmap_size_threshold: usize::MAX,
        }
    }
}

/// Builder for a [`DeferredCanvas`].
pub struct CanvasBuilder<'t> {
    settings: Settings,
    target: &'t mut dyn RenderTarget,
    playback_target: Option<&'t mut dyn RenderTarget>,
    client: Option<&'t dyn NotificationClient>,
    thread_safe: bool,
}

impl<'t> CanvasBuilder<'t> {
    pub(crate) fn new(target: &'t mut dyn RenderTarget) -> Self {
        Self {
            settings: Settings::default(),
            target,
            playback_target: None,
            client: None,
            thread_safe: false,
        }
    }

    /// Replaces every setting at once.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the number of queued commands above which the queue is flushed.
    ///
    /// The default value is 8196.
    pub fn max_recording_commands(mut self, max: usize) -> Self {
        self.settings.max_recording_commands = max;
        self
    }

    /// Sets the queue budget in bytes instead of commands.
    pub fn max_recording_storage(mut self, bytes: usize) -> Self {
        self.settings.max_recording_commands = bytes / mem::size_of::<Command>();
        self
    }

    /// Sets the size in bytes above which images are drawn immediately.
    ///
    /// The default is `usize::MAX`, which never forces immediate drawing.
    pub fn bitmap_size_threshold(mut self, bytes: usize) -> Self {
        self.settings.bitmap_size_threshold = bytes;
        self
    }

    pub fn notification_client(mut self, client: &'t dyn NotificationClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Sets the target that thread-safe flushes replay onto.
    pub fn playback_target(mut self, target: &'t mut dyn RenderTarget) -> Self {
        self.playback_target = Some(target);
        self
    }

    /// Enables thread-safe playback from the start.
    pub fn thread_safe_playback(mut self) -> Self {
        self.thread_safe = true;
        self
    }

    /// Builds the canvas.
    pub fn build(self) -> DeferredCanvas<'t> {
        let mut device = DeferredDevice::new(self.target);
        device.set_notification_client(self.client);
        device.set_playback_target(self.playback_target);
        device.set_max_recording_commands(self.settings.max_recording_commands);
        if self.thread_safe {
            device.enable_thread_safe_playback();
        }
        DeferredCanvas::from_device(device, self.settings.bitmap_size_threshold)
    }
}

#[cfg(test)]
mod tests {
    use serde::de::value::{Error, MapDeserializer};

    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let fields = [("max_recording_commands", 12usize)];
        let settings =
            Settings::deserialize(MapDeserializer::<_, Error>::new(fields.into_iter())).unwrap();
        assert_eq!(settings.max_recording_commands, 12);
        assert_eq!(settings.bitmap_size_threshold, usize::MAX);
    }
}
