use std::collections::HashMap;
use std::sync::Arc;

use livekit::options::TrackPublishOptions;
use livekit::prelude::DataPacket;
use livekit::publication::LocalTrackPublication as LkLocalTrackPublication;
use livekit::track::{
    LocalAudioTrack as LkLocalAudioTrack, LocalTrack as LkLocalTrack,
    LocalVideoTrack as LkLocalVideoTrack, TrackSource as LkTrackSource,
};
use livekit::webrtc::audio_source::native::NativeAudioSource;
use livekit::webrtc::audio_source::{AudioSourceOptions, RtcAudioSource};
use livekit::webrtc::video_source::native::NativeVideoSource;
use livekit::webrtc::video_source::{RtcVideoSource, VideoResolution};
use tokio::sync::Mutex;

use crate::error::HuddleError;
use crate::events::{TrackKind, TrackSource};
use crate::room::{SharedLocal, SharedRoom};
use crate::track::{
    AudioCaptureOptions, LocalAudioTrack, LocalDataTrack, LocalTrack, LocalTrackPublication,
    LocalVideoTrack, VideoCaptureResolution,
};

const AUDIO_SAMPLE_RATE: u32 = 48_000;
const AUDIO_CHANNELS: u32 = 1;
const AUDIO_QUEUE_SIZE_MS: u32 = 100;

/// Local media operations: the only mutation path for the local
/// participant's publication collections.
///
/// Engine capture sources are created here at publish time; hosts feed
/// captured audio/video frames into the sources exposed by this struct.
/// Every operation that could reach the engine first checks the track's
/// released flag and fails fast instead of forwarding.
pub struct MediaControls {
    room: SharedRoom,
    local: SharedLocal,
    mic_enabled: Arc<Mutex<bool>>,
    camera_enabled: Arc<Mutex<bool>>,
    audio_source: Arc<Mutex<Option<NativeAudioSource>>>,
    video_source: Arc<Mutex<Option<NativeVideoSource>>>,
    engine_publications: Arc<Mutex<HashMap<u64, LkLocalTrackPublication>>>,
}

impl MediaControls {
    pub(crate) fn new(room: SharedRoom, local: SharedLocal) -> Self {
        Self {
            room,
            local,
            mic_enabled: Arc::new(Mutex::new(false)),
            camera_enabled: Arc::new(Mutex::new(false)),
            audio_source: Arc::new(Mutex::new(None)),
            video_source: Arc::new(Mutex::new(None)),
            engine_publications: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create and publish a default microphone track.
    ///
    /// Returns the track (for later unpublish/release) alongside its
    /// publication record. The capture source is retrievable via
    /// [`MediaControls::audio_source`].
    pub async fn publish_microphone(
        &self,
    ) -> Result<(LocalAudioTrack, LocalTrackPublication), HuddleError> {
        let track = LocalAudioTrack::new("microphone", AudioCaptureOptions::default());
        let publication = self.publish_audio_track(&track).await?;
        Ok((track, publication))
    }

    /// Create and publish a default camera track.
    pub async fn publish_camera(
        &self,
    ) -> Result<(LocalVideoTrack, LocalTrackPublication), HuddleError> {
        let track = LocalVideoTrack::new("camera", VideoCaptureResolution::default());
        let publication = self.publish_video_track(&track).await?;
        Ok((track, publication))
    }

    /// Publish a microphone track to the room.
    ///
    /// Creates the engine audio source and forwards the publish. The
    /// publication is recorded on the local participant mirror.
    pub async fn publish_audio_track(
        &self,
        track: &LocalAudioTrack,
    ) -> Result<LocalTrackPublication, HuddleError> {
        track.ensure_live()?;

        let publication = {
            let room = self.room.lock().await;
            let room = room.as_ref().ok_or(HuddleError::NotConnected)?;

            let opts = track.capture_options();
            let source = NativeAudioSource::new(
                AudioSourceOptions {
                    echo_cancellation: opts.echo_cancellation,
                    noise_suppression: opts.noise_suppression,
                    auto_gain_control: opts.auto_gain_control,
                },
                AUDIO_SAMPLE_RATE,
                AUDIO_CHANNELS,
                AUDIO_QUEUE_SIZE_MS,
            );

            let engine_track = LkLocalAudioTrack::create_audio_track(
                track.name(),
                RtcAudioSource::Native(source.clone()),
            );

            let publication = room
                .local_participant()
                .publish_track(
                    LkLocalTrack::Audio(engine_track),
                    TrackPublishOptions {
                        source: LkTrackSource::Microphone,
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| HuddleError::Engine(format!("publish audio: {e}")))?;

            *self.audio_source.lock().await = Some(source);
            publication
        };

        let record = LocalTrackPublication {
            sid: publication.sid().to_string(),
            track_handle: track.handle(),
            name: track.name().to_string(),
            kind: TrackKind::Audio,
            source: TrackSource::Microphone,
            muted: false,
        };

        self.record_publication(track.handle(), publication, record.clone()).await;
        *self.mic_enabled.lock().await = true;

        tracing::info!(sid = %record.sid, "microphone track published");
        Ok(record)
    }

    /// Publish a camera track to the room.
    pub async fn publish_video_track(
        &self,
        track: &LocalVideoTrack,
    ) -> Result<LocalTrackPublication, HuddleError> {
        track.ensure_live()?;

        let publication = {
            let room = self.room.lock().await;
            let room = room.as_ref().ok_or(HuddleError::NotConnected)?;

            let resolution = track.resolution();
            let source = NativeVideoSource::new(
                VideoResolution {
                    width: resolution.width,
                    height: resolution.height,
                },
                false, // not a screencast
            );

            let engine_track = LkLocalVideoTrack::create_video_track(
                track.name(),
                RtcVideoSource::Native(source.clone()),
            );

            let publication = room
                .local_participant()
                .publish_track(
                    LkLocalTrack::Video(engine_track),
                    TrackPublishOptions {
                        source: LkTrackSource::Camera,
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| HuddleError::Engine(format!("publish video: {e}")))?;

            *self.video_source.lock().await = Some(source);
            publication
        };

        let record = LocalTrackPublication {
            sid: publication.sid().to_string(),
            track_handle: track.handle(),
            name: track.name().to_string(),
            kind: TrackKind::Video,
            source: TrackSource::Camera,
            muted: false,
        };

        self.record_publication(track.handle(), publication, record.clone()).await;
        *self.camera_enabled.lock().await = true;

        tracing::info!(sid = %record.sid, "camera track published");
        Ok(record)
    }

    /// Publish a data track.
    ///
    /// The engine models data as per-room packets, so there is no engine
    /// object to create; the publication exists in the local mirror and
    /// sends go through [`MediaControls::send_data`].
    pub async fn publish_data_track(
        &self,
        track: &LocalDataTrack,
    ) -> Result<LocalTrackPublication, HuddleError> {
        track.ensure_live()?;

        if self.room.lock().await.is_none() {
            return Err(HuddleError::NotConnected);
        }

        let record = LocalTrackPublication {
            sid: format!("TR{}", uuid::Uuid::new_v4().simple()),
            track_handle: track.handle(),
            name: track.name().to_string(),
            kind: TrackKind::Data,
            source: TrackSource::Data,
            muted: false,
        };

        if let Some(local) = self.local.lock().await.as_mut() {
            local.add_publication(record.clone());
        }

        tracing::info!(sid = %record.sid, "data track published");
        Ok(record)
    }

    /// Send a payload on a published data track.
    pub async fn send_data(&self, track: &LocalDataTrack, payload: &[u8]) -> Result<(), HuddleError> {
        track.ensure_live()?;

        let room = self.room.lock().await;
        let room = room.as_ref().ok_or(HuddleError::NotConnected)?;

        room.local_participant()
            .publish_data(DataPacket {
                payload: payload.to_vec(),
                reliable: track.reliable(),
                ..Default::default()
            })
            .await
            .map_err(|e| HuddleError::Engine(format!("send data: {e}")))
    }

    /// Unpublish a previously published track.
    ///
    /// Rejects released tracks before touching the engine, and unknown
    /// (never published) tracks with `InvalidArgument`.
    pub async fn unpublish_track(
        &self,
        track: &dyn LocalTrack,
    ) -> Result<LocalTrackPublication, HuddleError> {
        track.ensure_live()?;

        let engine_publication = self.engine_publications.lock().await.remove(&track.handle());
        if let Some(publication) = engine_publication {
            let room = self.room.lock().await;
            let room = room.as_ref().ok_or(HuddleError::NotConnected)?;
            room.local_participant()
                .unpublish_track(&publication.sid())
                .await
                .map_err(|e| HuddleError::Engine(format!("unpublish: {e}")))?;
        }

        let mut local = self.local.lock().await;
        let local = local.as_mut().ok_or(HuddleError::NotConnected)?;
        let removed = local
            .remove_publication_by_handle(track.handle())
            .ok_or_else(|| {
                HuddleError::InvalidArgument(format!("track '{}' is not published", track.name()))
            })?;

        tracing::info!(sid = %removed.sid, "track unpublished");
        Ok(removed)
    }

    /// Toggle the microphone on/off via the engine mute flag.
    pub async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), HuddleError> {
        self.set_source_enabled(LkTrackSource::Microphone, TrackSource::Microphone, enabled)
            .await?;
        *self.mic_enabled.lock().await = enabled;
        tracing::info!("microphone enabled: {enabled}");
        Ok(())
    }

    /// Toggle the camera on/off via the engine mute flag.
    pub async fn set_camera_enabled(&self, enabled: bool) -> Result<(), HuddleError> {
        self.set_source_enabled(LkTrackSource::Camera, TrackSource::Camera, enabled)
            .await?;
        *self.camera_enabled.lock().await = enabled;
        tracing::info!("camera enabled: {enabled}");
        Ok(())
    }

    pub async fn is_microphone_enabled(&self) -> bool {
        *self.mic_enabled.lock().await
    }

    pub async fn is_camera_enabled(&self) -> bool {
        *self.camera_enabled.lock().await
    }

    /// Capture source for feeding PCM frames from host audio capture.
    pub async fn audio_source(&self) -> Option<NativeAudioSource> {
        self.audio_source.lock().await.clone()
    }

    /// Capture source for feeding frames from host video capture.
    pub async fn video_source(&self) -> Option<NativeVideoSource> {
        self.video_source.lock().await.clone()
    }

    async fn record_publication(
        &self,
        track_handle: u64,
        engine_publication: LkLocalTrackPublication,
        record: LocalTrackPublication,
    ) {
        if let Some(local) = self.local.lock().await.as_mut() {
            local.add_publication(record);
        }
        self.engine_publications
            .lock()
            .await
            .insert(track_handle, engine_publication);
    }

    async fn set_source_enabled(
        &self,
        engine_source: LkTrackSource,
        source: TrackSource,
        enabled: bool,
    ) -> Result<(), HuddleError> {
        {
            let room = self.room.lock().await;
            let room = room.as_ref().ok_or(HuddleError::NotConnected)?;
            let local = room.local_participant();
            for (_, publication) in local.track_publications() {
                if publication.source() == engine_source {
                    if enabled {
                        publication.unmute();
                    } else {
                        publication.mute();
                    }
                    break;
                }
            }
        }

        // The engine echoes the change back as a TrackMuted/TrackUnmuted
        // room event; listeners hear about it on that path.
        if let Some(state) = self.local.lock().await.as_mut() {
            state.set_muted_by_source(source, !enabled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::LocalParticipantState;

    fn detached_controls() -> MediaControls {
        MediaControls::new(Arc::new(Mutex::new(None)), Arc::new(Mutex::new(None)))
    }

    fn controls_with_local_mirror() -> MediaControls {
        let local = LocalParticipantState::new(1, "PA_LOCAL", "me").unwrap();
        MediaControls::new(Arc::new(Mutex::new(None)), Arc::new(Mutex::new(Some(local))))
    }

    #[tokio::test]
    async fn publish_released_audio_track_is_rejected_before_engine() {
        let controls = detached_controls();
        let track = LocalAudioTrack::new("mic", AudioCaptureOptions::default());
        track.release();
        let result = controls.publish_audio_track(&track).await;
        assert!(matches!(result, Err(HuddleError::TrackReleased(_))));
    }

    #[tokio::test]
    async fn publish_released_video_track_is_rejected_before_engine() {
        let controls = detached_controls();
        let track = LocalVideoTrack::new("cam", VideoCaptureResolution::default());
        track.release();
        let result = controls.publish_video_track(&track).await;
        assert!(matches!(result, Err(HuddleError::TrackReleased(_))));
    }

    #[tokio::test]
    async fn publish_released_data_track_is_rejected() {
        let controls = detached_controls();
        let track = LocalDataTrack::new("chat", true);
        track.release();
        let result = controls.publish_data_track(&track).await;
        assert!(matches!(result, Err(HuddleError::TrackReleased(_))));
    }

    #[tokio::test]
    async fn publish_without_room_is_not_connected() {
        let controls = detached_controls();
        let track = LocalAudioTrack::new("mic", AudioCaptureOptions::default());
        let result = controls.publish_audio_track(&track).await;
        assert!(matches!(result, Err(HuddleError::NotConnected)));
    }

    #[tokio::test]
    async fn unpublish_released_track_is_rejected() {
        let controls = controls_with_local_mirror();
        let track = LocalDataTrack::new("chat", true);
        track.release();
        let result = controls.unpublish_track(&track).await;
        assert!(matches!(result, Err(HuddleError::TrackReleased(_))));
    }

    #[tokio::test]
    async fn unpublish_unknown_track_is_invalid_argument() {
        let controls = controls_with_local_mirror();
        let track = LocalDataTrack::new("chat", true);
        let result = controls.unpublish_track(&track).await;
        assert!(matches!(result, Err(HuddleError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn send_data_on_released_track_is_rejected() {
        let controls = detached_controls();
        let track = LocalDataTrack::new("chat", true);
        track.release();
        let result = controls.send_data(&track, b"hello").await;
        assert!(matches!(result, Err(HuddleError::TrackReleased(_))));
    }

    #[tokio::test]
    async fn mute_toggle_without_room_is_not_connected() {
        let controls = detached_controls();
        let result = controls.set_microphone_enabled(false).await;
        assert!(matches!(result, Err(HuddleError::NotConnected)));
        assert!(!controls.is_microphone_enabled().await);
    }
}
