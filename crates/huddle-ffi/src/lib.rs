//! UniFFI bindings for huddle-core.
//!
//! Provides a `HuddleClient` object that wraps the room session, media
//! controls, and preference store behind a blocking façade over a
//! private tokio runtime, plus a raw C ABI for video surface
//! attach/detach on hosts that bypass the managed bindings.

use std::ffi::{CStr, c_char, c_void};
use std::sync::{Arc, Mutex as StdMutex};

use huddle_core::events::{
    ConnectionQuality as CoreConnectionQuality, ConnectionState as CoreConnectionState,
    ParticipantInfo as CoreParticipantInfo, PublicationInfo as CorePublicationInfo,
    RoomEvent as CoreRoomEvent, TrackInfo as CoreTrackInfo, TrackKind as CoreTrackKind,
    TrackSource as CoreTrackSource,
};
use huddle_core::layout::ParticipantTile as CoreParticipantTile;
use huddle_core::HuddleError as CoreHuddleError;
use huddle_core::track::LocalTrackPublication as CoreLocalTrackPublication;

uniffi::setup_scaffolding!();

// ── Namespace functions ──────────────────────────────────────────────

/// Initialize tracing/logging. Call once from the host before creating
/// a `HuddleClient`.
#[uniffi::export]
pub fn init_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                    "huddle_core=debug,huddle_ffi=debug,huddle_video=info"
                        .parse()
                        .unwrap()
                }),
            )
            .with_ansi(false)
            .init();
    });
}

// ── FFI-safe type conversions ────────────────────────────────────────

#[derive(Debug, Clone, uniffi::Enum)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

impl From<CoreConnectionState> for ConnectionState {
    fn from(s: CoreConnectionState) -> Self {
        match s {
            CoreConnectionState::Disconnected => Self::Disconnected,
            CoreConnectionState::Connecting => Self::Connecting,
            CoreConnectionState::Connected => Self::Connected,
            CoreConnectionState::Reconnecting { attempt } => Self::Reconnecting { attempt },
        }
    }
}

#[derive(Debug, Clone, uniffi::Enum)]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Poor,
    Lost,
}

impl From<CoreConnectionQuality> for ConnectionQuality {
    fn from(q: CoreConnectionQuality) -> Self {
        match q {
            CoreConnectionQuality::Excellent => Self::Excellent,
            CoreConnectionQuality::Good => Self::Good,
            CoreConnectionQuality::Poor => Self::Poor,
            CoreConnectionQuality::Lost => Self::Lost,
        }
    }
}

#[derive(Debug, Clone, uniffi::Enum)]
pub enum TrackKind {
    Audio,
    Video,
    Data,
}

impl From<CoreTrackKind> for TrackKind {
    fn from(k: CoreTrackKind) -> Self {
        match k {
            CoreTrackKind::Audio => Self::Audio,
            CoreTrackKind::Video => Self::Video,
            CoreTrackKind::Data => Self::Data,
        }
    }
}

#[derive(Debug, Clone, uniffi::Enum)]
pub enum TrackSource {
    Microphone,
    Camera,
    ScreenShare,
    Data,
    Unknown,
}

impl From<CoreTrackSource> for TrackSource {
    fn from(s: CoreTrackSource) -> Self {
        match s {
            CoreTrackSource::Microphone => Self::Microphone,
            CoreTrackSource::Camera => Self::Camera,
            CoreTrackSource::ScreenShare => Self::ScreenShare,
            CoreTrackSource::Data => Self::Data,
            CoreTrackSource::Unknown => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct ParticipantInfo {
    pub sid: String,
    pub identity: String,
    pub name: Option<String>,
    pub is_muted: bool,
    pub has_video: bool,
    pub video_track_sid: Option<String>,
    pub speaking: bool,
    pub connection_quality: ConnectionQuality,
}

impl From<CoreParticipantInfo> for ParticipantInfo {
    fn from(p: CoreParticipantInfo) -> Self {
        Self {
            sid: p.sid,
            identity: p.identity,
            name: p.name,
            is_muted: p.is_muted,
            has_video: p.has_video,
            video_track_sid: p.video_track_sid,
            speaking: p.speaking,
            connection_quality: p.connection_quality.into(),
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct TrackInfo {
    pub sid: String,
    pub participant_sid: String,
    pub kind: TrackKind,
    pub source: TrackSource,
}

impl From<CoreTrackInfo> for TrackInfo {
    fn from(t: CoreTrackInfo) -> Self {
        Self {
            sid: t.sid,
            participant_sid: t.participant_sid,
            kind: t.kind.into(),
            source: t.source.into(),
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct PublicationInfo {
    pub sid: String,
    pub name: String,
    pub kind: TrackKind,
    pub source: TrackSource,
    pub muted: bool,
    pub subscribed: bool,
}

impl From<CorePublicationInfo> for PublicationInfo {
    fn from(p: CorePublicationInfo) -> Self {
        Self {
            sid: p.sid,
            name: p.name,
            kind: p.kind.into(),
            source: p.source.into(),
            muted: p.muted,
            subscribed: p.subscribed,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct LocalTrackPublication {
    pub sid: String,
    pub name: String,
    pub kind: TrackKind,
    pub source: TrackSource,
    pub muted: bool,
}

impl From<CoreLocalTrackPublication> for LocalTrackPublication {
    fn from(p: CoreLocalTrackPublication) -> Self {
        Self {
            sid: p.sid,
            name: p.name,
            kind: p.kind.into(),
            source: p.source.into(),
            muted: p.muted,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct LocalParticipantInfo {
    pub handle: u64,
    pub sid: String,
    pub identity: String,
    pub audio_tracks: Vec<LocalTrackPublication>,
    pub video_tracks: Vec<LocalTrackPublication>,
    pub data_tracks: Vec<LocalTrackPublication>,
}

impl From<huddle_core::LocalParticipantState> for LocalParticipantInfo {
    fn from(p: huddle_core::LocalParticipantState) -> Self {
        Self {
            handle: p.handle(),
            sid: p.sid().to_string(),
            identity: p.identity().to_string(),
            audio_tracks: p.audio_tracks().iter().cloned().map(Into::into).collect(),
            video_tracks: p.video_tracks().iter().cloned().map(Into::into).collect(),
            data_tracks: p.data_tracks().iter().cloned().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct ParticipantTile {
    pub sid: String,
    pub identity: String,
    pub primary: bool,
    pub show_identity_badge: bool,
    pub stub: bool,
    pub selected: bool,
    pub mirror: bool,
    pub video_track_sid: Option<String>,
}

impl From<CoreParticipantTile> for ParticipantTile {
    fn from(t: CoreParticipantTile) -> Self {
        Self {
            sid: t.sid,
            identity: t.identity,
            primary: t.primary,
            show_identity_badge: t.show_identity_badge,
            stub: t.stub,
            selected: t.selected,
            mirror: t.mirror,
            video_track_sid: t.video_track_sid,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct Preferences {
    pub display_name: Option<String>,
    pub mic_enabled_on_join: bool,
    pub camera_enabled_on_join: bool,
    pub mirror_self_view: bool,
}

impl From<huddle_core::Preferences> for Preferences {
    fn from(p: huddle_core::Preferences) -> Self {
        Self {
            display_name: p.display_name,
            mic_enabled_on_join: p.mic_enabled_on_join,
            camera_enabled_on_join: p.camera_enabled_on_join,
            mirror_self_view: p.mirror_self_view,
        }
    }
}

#[derive(Debug, Clone, uniffi::Enum)]
pub enum HuddleEvent {
    ConnectionStateChanged { state: ConnectionState },
    ParticipantConnected { info: ParticipantInfo },
    ParticipantDisconnected { participant_sid: String },
    TrackPublished { participant_sid: String, publication: PublicationInfo },
    TrackUnpublished { participant_sid: String, track_sid: String },
    TrackSubscribed { info: TrackInfo },
    TrackUnsubscribed { track_sid: String },
    TrackSubscriptionFailed { participant_sid: String, track_sid: String, error: String },
    TrackMuted { participant_sid: String, source: TrackSource },
    TrackUnmuted { participant_sid: String, source: TrackSource },
    ActiveSpeakersChanged { participant_sids: Vec<String> },
    ConnectionQualityChanged { participant_sid: String, quality: ConnectionQuality },
    DataReceived { participant_sid: String, payload: Vec<u8>, reliable: bool },
}

impl From<CoreRoomEvent> for HuddleEvent {
    fn from(e: CoreRoomEvent) -> Self {
        match e {
            CoreRoomEvent::ConnectionStateChanged(s) => {
                Self::ConnectionStateChanged { state: s.into() }
            }
            CoreRoomEvent::ParticipantConnected(p) => {
                Self::ParticipantConnected { info: p.into() }
            }
            CoreRoomEvent::ParticipantDisconnected(sid) => {
                Self::ParticipantDisconnected { participant_sid: sid }
            }
            CoreRoomEvent::TrackPublished { participant_sid, publication } => {
                Self::TrackPublished { participant_sid, publication: publication.into() }
            }
            CoreRoomEvent::TrackUnpublished { participant_sid, track_sid } => {
                Self::TrackUnpublished { participant_sid, track_sid }
            }
            CoreRoomEvent::TrackSubscribed(t) => Self::TrackSubscribed { info: t.into() },
            CoreRoomEvent::TrackUnsubscribed(sid) => Self::TrackUnsubscribed { track_sid: sid },
            CoreRoomEvent::TrackSubscriptionFailed { participant_sid, track_sid, error } => {
                Self::TrackSubscriptionFailed { participant_sid, track_sid, error }
            }
            CoreRoomEvent::TrackMuted { participant_sid, source } => {
                Self::TrackMuted { participant_sid, source: source.into() }
            }
            CoreRoomEvent::TrackUnmuted { participant_sid, source } => {
                Self::TrackUnmuted { participant_sid, source: source.into() }
            }
            CoreRoomEvent::ActiveSpeakersChanged(sids) => {
                Self::ActiveSpeakersChanged { participant_sids: sids }
            }
            CoreRoomEvent::ConnectionQualityChanged { participant_sid, quality } => {
                Self::ConnectionQualityChanged { participant_sid, quality: quality.into() }
            }
            CoreRoomEvent::DataReceived { participant_sid, payload, reliable } => {
                Self::DataReceived { participant_sid, payload, reliable }
            }
        }
    }
}

// ── Error conversion ─────────────────────────────────────────────────

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum HuddleError {
    #[error("invalid argument: {msg}")]
    InvalidArgument { msg: String },
    #[error("track released: {msg}")]
    TrackReleased { msg: String },
    #[error("not connected")]
    NotConnected,
    #[error("connection error: {msg}")]
    Connection { msg: String },
    #[error("engine error: {msg}")]
    Engine { msg: String },
    #[error("auth error: {msg}")]
    Auth { msg: String },
    #[error("http error: {msg}")]
    Http { msg: String },
    #[error("invalid url: {msg}")]
    InvalidUrl { msg: String },
}

impl From<CoreHuddleError> for HuddleError {
    fn from(e: CoreHuddleError) -> Self {
        tracing::error!("HuddleError: {e}");
        match e {
            CoreHuddleError::InvalidArgument(msg) => Self::InvalidArgument { msg },
            CoreHuddleError::TrackReleased(msg) => Self::TrackReleased { msg },
            CoreHuddleError::NotConnected => Self::NotConnected,
            CoreHuddleError::Connection(msg) => Self::Connection { msg },
            CoreHuddleError::Engine(msg) => Self::Engine { msg },
            CoreHuddleError::Auth(msg) => Self::Auth { msg },
            CoreHuddleError::Http(msg) => Self::Http { msg },
            CoreHuddleError::InvalidUrl(msg) => Self::InvalidUrl { msg },
        }
    }
}

// ── Callback interface ───────────────────────────────────────────────

#[uniffi::export(with_foreign)]
pub trait HuddleEventListener: Send + Sync {
    fn on_event(&self, event: HuddleEvent);
}

// ── Bridge listener: FFI callback → core listener ────────────────────

struct BridgeListener {
    ffi_listener: Arc<dyn HuddleEventListener>,
}

impl huddle_core::RoomEventListener for BridgeListener {
    fn on_event(&self, event: CoreRoomEvent) {
        self.ffi_listener.on_event(event.into());
    }
}

// ── HuddleClient: main FFI object ────────────────────────────────────

#[derive(uniffi::Object)]
pub struct HuddleClient {
    session: huddle_core::RoomSession,
    controls: huddle_core::MediaControls,
    prefs: huddle_core::PreferencesStore,
    mic_track: StdMutex<Option<huddle_core::LocalAudioTrack>>,
    camera_track: StdMutex<Option<huddle_core::LocalVideoTrack>>,
    data_track: StdMutex<Option<huddle_core::LocalDataTrack>>,
    rt: tokio::runtime::Runtime,
}

#[uniffi::export]
impl HuddleClient {
    #[uniffi::constructor]
    pub fn new(data_dir: String) -> Arc<Self> {
        let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
        let prefs = huddle_core::PreferencesStore::new(&data_dir);
        let session = huddle_core::RoomSession::new();
        let controls = session.controls();

        Arc::new(Self {
            session,
            controls,
            prefs,
            mic_track: StdMutex::new(None),
            camera_track: StdMutex::new(None),
            data_track: StdMutex::new(None),
            rt,
        })
    }

    /// Connect via the deployment's token service.
    ///
    /// Panics must not unwind across the FFI (UB), so the whole call is
    /// wrapped in catch_unwind and surfaced as a connection error.
    pub fn connect(
        &self,
        service_url: String,
        room_name: String,
        identity: Option<String>,
    ) -> Result<(), HuddleError> {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.rt.block_on(async {
                self.session
                    .connect(&service_url, &room_name, identity.as_deref())
                    .await
                    .map_err(HuddleError::from)
            })
        }));

        match result {
            Ok(outcome) => outcome,
            Err(panic_info) => {
                let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                tracing::error!("panic caught in connect: {msg}");
                Err(HuddleError::Connection { msg: format!("panic in connect: {msg}") })
            }
        }
    }

    /// Connect directly with an engine URL and token.
    pub fn connect_with_token(&self, engine_url: String, token: String) -> Result<(), HuddleError> {
        self.rt.block_on(async {
            self.session
                .connect_with_token(&engine_url, &token)
                .await
                .map_err(HuddleError::from)
        })
    }

    pub fn disconnect(&self) {
        self.rt.block_on(self.session.disconnect());
        *self.mic_track.lock().unwrap() = None;
        *self.camera_track.lock().unwrap() = None;
        *self.data_track.lock().unwrap() = None;
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.rt.block_on(self.session.connection_state()).into()
    }

    pub fn participants(&self) -> Vec<ParticipantInfo> {
        self.rt
            .block_on(self.session.participants())
            .into_iter()
            .map(ParticipantInfo::from)
            .collect()
    }

    pub fn local_participant(&self) -> Option<LocalParticipantInfo> {
        self.rt
            .block_on(self.session.local_participant())
            .map(LocalParticipantInfo::from)
    }

    pub fn active_speakers(&self) -> Vec<String> {
        self.rt.block_on(self.session.active_speakers())
    }

    pub fn publish_microphone(&self) -> Result<LocalTrackPublication, HuddleError> {
        let (track, publication) = self
            .rt
            .block_on(self.controls.publish_microphone())
            .map_err(HuddleError::from)?;
        *self.mic_track.lock().unwrap() = Some(track);
        Ok(publication.into())
    }

    pub fn unpublish_microphone(&self) -> Result<LocalTrackPublication, HuddleError> {
        let track = self.mic_track.lock().unwrap().take().ok_or_else(|| {
            HuddleError::InvalidArgument { msg: "microphone is not published".into() }
        })?;
        self.rt
            .block_on(self.controls.unpublish_track(&track))
            .map(Into::into)
            .map_err(HuddleError::from)
    }

    pub fn publish_camera(&self) -> Result<LocalTrackPublication, HuddleError> {
        let (track, publication) = self
            .rt
            .block_on(self.controls.publish_camera())
            .map_err(HuddleError::from)?;
        *self.camera_track.lock().unwrap() = Some(track);
        Ok(publication.into())
    }

    pub fn unpublish_camera(&self) -> Result<LocalTrackPublication, HuddleError> {
        let track = self.camera_track.lock().unwrap().take().ok_or_else(|| {
            HuddleError::InvalidArgument { msg: "camera is not published".into() }
        })?;
        self.rt
            .block_on(self.controls.unpublish_track(&track))
            .map(Into::into)
            .map_err(HuddleError::from)
    }

    pub fn publish_data_track(&self, reliable: bool) -> Result<LocalTrackPublication, HuddleError> {
        let track = huddle_core::LocalDataTrack::new("data", reliable);
        let publication = self
            .rt
            .block_on(self.controls.publish_data_track(&track))
            .map_err(HuddleError::from)?;
        *self.data_track.lock().unwrap() = Some(track);
        Ok(publication.into())
    }

    pub fn send_data(&self, payload: Vec<u8>) -> Result<(), HuddleError> {
        let guard = self.data_track.lock().unwrap();
        let track = guard.as_ref().ok_or_else(|| HuddleError::InvalidArgument {
            msg: "no data track published".into(),
        })?;
        self.rt
            .block_on(self.controls.send_data(track, &payload))
            .map_err(HuddleError::from)
    }

    pub fn set_microphone_enabled(&self, enabled: bool) -> Result<(), HuddleError> {
        self.rt
            .block_on(self.controls.set_microphone_enabled(enabled))
            .map_err(HuddleError::from)
    }

    pub fn set_camera_enabled(&self, enabled: bool) -> Result<(), HuddleError> {
        self.rt
            .block_on(self.controls.set_camera_enabled(enabled))
            .map_err(HuddleError::from)
    }

    pub fn is_microphone_enabled(&self) -> bool {
        self.rt.block_on(self.controls.is_microphone_enabled())
    }

    pub fn is_camera_enabled(&self) -> bool {
        self.rt.block_on(self.controls.is_camera_enabled())
    }

    pub fn add_listener(&self, listener: Arc<dyn HuddleEventListener>) {
        let bridge = Arc::new(BridgeListener { ffi_listener: listener });
        self.session.add_listener(bridge);
    }

    pub fn layout_tiles(&self) -> Vec<ParticipantTile> {
        self.rt
            .block_on(self.session.layout_tiles())
            .into_iter()
            .map(ParticipantTile::from)
            .collect()
    }

    pub fn pin_participant(&self, participant_sid: String) -> Result<(), HuddleError> {
        self.rt
            .block_on(self.session.pin_participant(&participant_sid))
            .map_err(HuddleError::from)
    }

    pub fn clear_pin(&self) {
        self.rt.block_on(self.session.clear_pin());
    }

    pub fn select_participant(&self, participant_sid: String) -> Result<(), HuddleError> {
        self.rt
            .block_on(self.session.select_participant(&participant_sid))
            .map_err(HuddleError::from)
    }

    pub fn set_mirror_local(&self, mirror: bool) {
        self.rt.block_on(self.session.set_mirror_local(mirror));
    }

    pub fn video_track_sids(&self) -> Vec<String> {
        self.rt.block_on(self.session.video_track_sids())
    }

    /// Pull decoded remote audio into `out`-sized chunks.
    ///
    /// Returns up to `max_samples` i16 PCM samples; fewer (or none) when
    /// the playout buffer runs dry.
    pub fn pull_audio_playback(&self, max_samples: u32) -> Vec<i16> {
        let mut out = vec![0i16; max_samples as usize];
        let available = self.session.playout_buffer().pull(&mut out);
        out.truncate(available);
        out
    }

    pub fn get_preferences(&self) -> Preferences {
        self.prefs.get().into()
    }

    pub fn set_display_name(&self, name: Option<String>) {
        self.prefs.set_display_name(name);
    }

    pub fn set_mic_enabled_on_join(&self, enabled: bool) {
        self.prefs.set_mic_enabled_on_join(enabled);
    }

    pub fn set_camera_enabled_on_join(&self, enabled: bool) {
        self.prefs.set_camera_enabled_on_join(enabled);
    }

    pub fn set_mirror_self_view(&self, mirror: bool) {
        self.prefs.set_mirror_self_view(mirror);
    }
}

// ── C ABI: video surface attach/detach ───────────────────────────────

/// Frame delivery callback for hosts driving rendering through the C
/// ABI. Plane pointers are valid only for the duration of the call.
pub type HuddleFrameCallback = unsafe extern "C" fn(
    ctx: *mut c_void,
    y: *const u8,
    y_stride: u32,
    u: *const u8,
    u_stride: u32,
    v: *const u8,
    v_stride: u32,
    width: u32,
    height: u32,
    rotation_degrees: u32,
);

/// Wrapper around the caller's context pointer that implements Send/Sync.
///
/// # Safety
/// The caller guarantees the context stays valid until
/// `huddle_detach_video_surface` and tolerates calls from the renderer
/// task's thread.
struct CallbackCtx(*mut c_void);

unsafe impl Send for CallbackCtx {}
unsafe impl Sync for CallbackCtx {}

struct CallbackSink {
    callback: HuddleFrameCallback,
    ctx: CallbackCtx,
}

impl huddle_video::FrameSink for CallbackSink {
    fn on_frame(&self, frame: &huddle_video::I420Frame<'_>) {
        unsafe {
            (self.callback)(
                self.ctx.0,
                frame.y.as_ptr(),
                frame.stride_y,
                frame.u.as_ptr(),
                frame.stride_u,
                frame.v.as_ptr(),
                frame.stride_v,
                frame.width,
                frame.height,
                frame.rotation_degrees,
            );
        }
    }
}

/// Attach a frame callback to a subscribed video track.
///
/// `client` must be a valid pointer to a live `HuddleClient` (obtained
/// by converting an `Arc<HuddleClient>` via `Arc::into_raw`); the caller
/// retains ownership. Every pointer argument is validated — null client,
/// null SID, or null callback is rejected with -1 rather than forwarded.
///
/// # Safety
/// - `client` must point to a live `HuddleClient`.
/// - `track_sid` must be a valid null-terminated UTF-8 C string.
/// - `ctx` (may be null) must stay valid until detach.
///
/// Returns 0 on success, -1 on invalid arguments, -2 if the track is
/// not subscribed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn huddle_attach_video_surface(
    client: *const HuddleClient,
    track_sid: *const c_char,
    callback: Option<HuddleFrameCallback>,
    ctx: *mut c_void,
) -> i32 {
    let Some(callback) = callback else {
        return -1;
    };
    if client.is_null() || track_sid.is_null() {
        return -1;
    }

    let client = unsafe { &*client };
    let sid = match unsafe { CStr::from_ptr(track_sid) }.to_str() {
        Ok(s) => s.to_string(),
        Err(_) => return -1,
    };

    let track = client.rt.block_on(client.session.get_video_track(&sid));
    match track {
        Some(video_track) => {
            let sink = Arc::new(CallbackSink { callback, ctx: CallbackCtx(ctx) });
            huddle_video::attach_renderer(sid, video_track, sink, Some(client.rt.handle().clone()));
            0
        }
        None => {
            tracing::warn!("no subscribed video track for SID {sid}");
            -2
        }
    }
}

/// Detach the frame callback for a track, stopping delivery.
///
/// # Safety
/// `track_sid` must be a valid null-terminated UTF-8 C string.
///
/// Returns 0 on success, -1 on invalid arguments.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn huddle_detach_video_surface(track_sid: *const c_char) -> i32 {
    if track_sid.is_null() {
        return -1;
    }
    let sid = match unsafe { CStr::from_ptr(track_sid) }.to_str() {
        Ok(s) => s,
        Err(_) => return -1,
    };
    huddle_video::detach_renderer(sid);
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_new_and_failed_connect_do_not_crash() {
        let dir = std::env::temp_dir().join("huddle-ffi-test");
        let client = HuddleClient::new(dir.to_str().unwrap().to_string());

        // No token service is running here; the point is that the error
        // comes back through the FFI surface instead of unwinding.
        let result = client.connect(
            "huddle.invalid".to_string(),
            "standup".to_string(),
            Some("tester".to_string()),
        );
        assert!(result.is_err());
        assert!(matches!(client.connection_state(), ConnectionState::Disconnected));
    }

    #[test]
    fn media_operations_require_a_room() {
        let dir = std::env::temp_dir().join("huddle-ffi-test-media");
        let client = HuddleClient::new(dir.to_str().unwrap().to_string());

        assert!(matches!(
            client.publish_microphone(),
            Err(HuddleError::NotConnected)
        ));
        assert!(matches!(
            client.send_data(vec![1, 2, 3]),
            Err(HuddleError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn attach_rejects_null_arguments() {
        let status = unsafe {
            huddle_attach_video_surface(
                std::ptr::null(),
                std::ptr::null(),
                None,
                std::ptr::null_mut(),
            )
        };
        assert_eq!(status, -1);

        let status = unsafe { huddle_detach_video_surface(std::ptr::null()) };
        assert_eq!(status, -1);
    }

    #[test]
    fn preferences_round_trip_through_the_client() {
        let dir = tempdir_path("huddle-ffi-test-prefs");
        let client = HuddleClient::new(dir.clone());
        client.set_display_name(Some("Alice".to_string()));
        client.set_mic_enabled_on_join(false);
        let prefs = client.get_preferences();
        assert_eq!(prefs.display_name, Some("Alice".to_string()));
        assert!(!prefs.mic_enabled_on_join);
    }

    fn tempdir_path(name: &str) -> String {
        let dir = std::env::temp_dir().join(name).join(format!("{}", std::process::id()));
        dir.to_str().unwrap().to_string()
    }
}
