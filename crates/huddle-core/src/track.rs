use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::HuddleError;
use crate::events::{TrackKind, TrackSource};

/// Allocator for numeric engine-object handles.
///
/// The original SDK threads opaque native pointers through its object
/// model; Huddle keeps the same observable shape with a process-wide
/// counter. Handle 0 is never allocated.
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_object_handle() -> u64 {
    NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)
}

/// Capture processing options for a microphone track.
#[derive(Debug, Clone)]
pub struct AudioCaptureOptions {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for AudioCaptureOptions {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Capture resolution for a camera track.
#[derive(Debug, Clone, Copy)]
pub struct VideoCaptureResolution {
    pub width: u32,
    pub height: u32,
}

impl Default for VideoCaptureResolution {
    fn default() -> Self {
        Self { width: 1280, height: 720 }
    }
}

/// Common surface of the local track types.
///
/// The released flag is the gate for every publish/unpublish/send
/// operation: once a track is released, the engine must never see it
/// again, so [`LocalTrack::ensure_live`] is checked before any engine
/// call.
pub trait LocalTrack {
    fn handle(&self) -> u64;
    fn name(&self) -> &str;
    fn kind(&self) -> TrackKind;
    fn source(&self) -> TrackSource;
    fn is_released(&self) -> bool;

    /// Mark the track released. Idempotent.
    fn release(&self);

    fn ensure_live(&self) -> Result<(), HuddleError> {
        if self.is_released() {
            Err(HuddleError::TrackReleased(self.name().to_string()))
        } else {
            Ok(())
        }
    }
}

/// A local microphone track, prior to and independent of publication.
///
/// The engine capture source is created at publish time by
/// [`crate::controls::MediaControls`]; the track itself is plain state so
/// hosts can construct, release, and inspect it without an engine.
#[derive(Debug)]
pub struct LocalAudioTrack {
    handle: u64,
    name: String,
    options: AudioCaptureOptions,
    released: AtomicBool,
}

impl LocalAudioTrack {
    pub fn new(name: impl Into<String>, options: AudioCaptureOptions) -> Self {
        Self {
            handle: next_object_handle(),
            name: name.into(),
            options,
            released: AtomicBool::new(false),
        }
    }

    pub fn capture_options(&self) -> &AudioCaptureOptions {
        &self.options
    }
}

impl LocalTrack for LocalAudioTrack {
    fn handle(&self) -> u64 {
        self.handle
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TrackKind {
        TrackKind::Audio
    }

    fn source(&self) -> TrackSource {
        TrackSource::Microphone
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn release(&self) {
        self.released.store(true, Ordering::Release);
    }
}

/// A local camera track.
#[derive(Debug)]
pub struct LocalVideoTrack {
    handle: u64,
    name: String,
    resolution: VideoCaptureResolution,
    released: AtomicBool,
}

impl LocalVideoTrack {
    pub fn new(name: impl Into<String>, resolution: VideoCaptureResolution) -> Self {
        Self {
            handle: next_object_handle(),
            name: name.into(),
            resolution,
            released: AtomicBool::new(false),
        }
    }

    pub fn resolution(&self) -> VideoCaptureResolution {
        self.resolution
    }
}

impl LocalTrack for LocalVideoTrack {
    fn handle(&self) -> u64 {
        self.handle
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TrackKind {
        TrackKind::Video
    }

    fn source(&self) -> TrackSource {
        TrackSource::Camera
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn release(&self) {
        self.released.store(true, Ordering::Release);
    }
}

/// A local data track: an application message channel multiplexed over
/// the engine's data path.
///
/// `reliable` selects ordered/retransmitted delivery; lossy delivery
/// suits high-rate telemetry.
#[derive(Debug)]
pub struct LocalDataTrack {
    handle: u64,
    name: String,
    reliable: bool,
    released: AtomicBool,
}

impl LocalDataTrack {
    pub fn new(name: impl Into<String>, reliable: bool) -> Self {
        Self {
            handle: next_object_handle(),
            name: name.into(),
            reliable,
            released: AtomicBool::new(false),
        }
    }

    pub fn reliable(&self) -> bool {
        self.reliable
    }
}

impl LocalTrack for LocalDataTrack {
    fn handle(&self) -> u64 {
        self.handle
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TrackKind {
        TrackKind::Data
    }

    fn source(&self) -> TrackSource {
        TrackSource::Data
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn release(&self) {
        self.released.store(true, Ordering::Release);
    }
}

/// Record of a successful local publish.
///
/// The SID is assigned by the engine (or generated for data tracks, which
/// the engine models as per-room packets rather than published objects).
/// `track_handle` ties the publication back to the originating local
/// track for unpublish lookup.
#[derive(Debug, Clone)]
pub struct LocalTrackPublication {
    pub sid: String,
    pub track_handle: u64,
    pub name: String,
    pub kind: TrackKind,
    pub source: TrackSource,
    pub muted: bool,
}
