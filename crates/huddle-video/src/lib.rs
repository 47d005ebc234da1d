//! Video frame pipeline.
//!
//! Pumps decoded I420 frames from the engine's native video streams into
//! host-provided sinks. One renderer task per track, registered by track
//! SID; re-attaching a SID replaces its renderer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use futures_util::StreamExt;
use livekit::track::RemoteVideoTrack;
use livekit::webrtc::prelude::VideoRotation;
use livekit::webrtc::video_stream::native::NativeVideoStream;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// One decoded I420 frame, borrowed for the duration of the callback.
///
/// Plane slices are stride-padded; `stride_*` give the row pitch in
/// bytes. The chroma planes are quarter-resolution.
pub struct I420Frame<'a> {
    pub width: u32,
    pub height: u32,
    pub rotation_degrees: u32,
    pub y: &'a [u8],
    pub u: &'a [u8],
    pub v: &'a [u8],
    pub stride_y: u32,
    pub stride_u: u32,
    pub stride_v: u32,
}

/// Host-implemented frame consumer.
///
/// Called from the renderer task; implementations hand the planes to
/// whatever the platform renders with (a GL texture upload, an
/// ANativeWindow blit, a CALayer) and must not block for long.
pub trait FrameSink: Send + Sync {
    fn on_frame(&self, frame: &I420Frame<'_>);
}

/// Per-track renderer handle. Dropping cancels the background task.
struct TrackRenderer {
    cancel_tx: watch::Sender<bool>,
    _handle: JoinHandle<()>,
}

/// Registry of active track renderers, keyed by track SID.
static RENDERERS: OnceLock<Mutex<HashMap<String, TrackRenderer>>> = OnceLock::new();

/// Fallback tokio runtime for frame loops when the caller does not
/// provide one.
static RT: OnceLock<Runtime> = OnceLock::new();

fn renderers() -> &'static Mutex<HashMap<String, TrackRenderer>> {
    RENDERERS.get_or_init(|| Mutex::new(HashMap::new()))
}

fn runtime() -> &'static Runtime {
    RT.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("huddle-video")
            .enable_all()
            .build()
            .expect("failed to create huddle-video runtime")
    })
}

pub(crate) fn rotation_degrees(rotation: VideoRotation) -> u32 {
    match rotation {
        VideoRotation::VideoRotation0 => 0,
        VideoRotation::VideoRotation90 => 90,
        VideoRotation::VideoRotation180 => 180,
        VideoRotation::VideoRotation270 => 270,
    }
}

/// Start delivering frames from `track` to `sink`.
///
/// If a renderer already exists for this SID it is stopped first. When
/// `rt_handle` is provided the frame loop runs on that runtime; callers
/// should pass the application runtime handle so the stream and the room
/// share one runtime.
pub fn attach_renderer(
    track_sid: String,
    track: RemoteVideoTrack,
    sink: Arc<dyn FrameSink>,
    rt_handle: Option<Handle>,
) {
    detach_renderer(&track_sid);

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let sid = track_sid.clone();

    let handle = match rt_handle {
        Some(h) => h.spawn(frame_loop(sid, track, sink, cancel_rx)),
        None => runtime().spawn(frame_loop(sid, track, sink, cancel_rx)),
    };

    renderers()
        .lock()
        .expect("renderer lock poisoned")
        .insert(track_sid, TrackRenderer { cancel_tx, _handle: handle });
}

/// Stop and remove the renderer for `track_sid`.
///
/// Returns whether a renderer existed.
pub fn detach_renderer(track_sid: &str) -> bool {
    match renderers()
        .lock()
        .expect("renderer lock poisoned")
        .remove(track_sid)
    {
        Some(renderer) => {
            // The frame loop exits on its next iteration.
            let _ = renderer.cancel_tx.send(true);
            true
        }
        None => false,
    }
}

/// SIDs with an active renderer.
pub fn active_renderers() -> Vec<String> {
    renderers()
        .lock()
        .expect("renderer lock poisoned")
        .keys()
        .cloned()
        .collect()
}

async fn frame_loop(
    track_sid: String,
    track: RemoteVideoTrack,
    sink: Arc<dyn FrameSink>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    tracing::info!(track_sid = %track_sid, "frame loop started");

    let rtc_track = track.rtc_track();
    let mut stream = NativeVideoStream::new(rtc_track);
    let mut frame_count: u64 = 0;

    loop {
        tokio::select! {
            _ = cancel_rx.changed() => {
                tracing::info!(track_sid = %track_sid, "frame loop cancelled");
                break;
            }
            frame_opt = stream.next() => {
                match frame_opt {
                    Some(frame) => {
                        let buffer = &frame.buffer;
                        let width = buffer.width();
                        let height = buffer.height();
                        if width == 0 || height == 0 {
                            continue;
                        }

                        frame_count += 1;
                        if frame_count == 1 {
                            tracing::info!(
                                track_sid = %track_sid,
                                width,
                                height,
                                "first video frame received"
                            );
                        }

                        // May be a no-op if the buffer is already I420.
                        let i420 = buffer.to_i420();
                        let (y, u, v) = i420.data();
                        let (stride_y, stride_u, stride_v) = i420.strides();

                        sink.on_frame(&I420Frame {
                            width,
                            height,
                            rotation_degrees: rotation_degrees(frame.rotation),
                            y,
                            u,
                            v,
                            stride_y,
                            stride_u,
                            stride_v,
                        });
                    }
                    None => {
                        tracing::info!(track_sid = %track_sid, "video stream ended");
                        break;
                    }
                }
            }
        }
    }

    tracing::info!(track_sid = %track_sid, "frame loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_mapping_covers_all_quadrants() {
        assert_eq!(rotation_degrees(VideoRotation::VideoRotation0), 0);
        assert_eq!(rotation_degrees(VideoRotation::VideoRotation90), 90);
        assert_eq!(rotation_degrees(VideoRotation::VideoRotation180), 180);
        assert_eq!(rotation_degrees(VideoRotation::VideoRotation270), 270);
    }

    #[test]
    fn detach_without_attach_is_a_noop() {
        assert!(!detach_renderer("TR_not_attached"));
        assert!(active_renderers().is_empty());
    }
}
