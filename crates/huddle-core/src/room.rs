use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use livekit::participant::ConnectionQuality as LkConnectionQuality;
use livekit::prelude::{
    DataPacketKind, RemoteParticipant, Room, RoomEvent as LkRoomEvent, RoomOptions,
};
use livekit::track::{
    RemoteTrack, RemoteVideoTrack, TrackKind as LkTrackKind, TrackSource as LkTrackSource,
};
use livekit::webrtc::audio_stream::native::NativeAudioStream;
use tokio::sync::Mutex;

use crate::auth::TokenService;
use crate::controls::MediaControls;
use crate::error::HuddleError;
use crate::events::{
    ConnectionQuality, ConnectionState, EventEmitter, ParticipantInfo, PublicationInfo, RoomEvent,
    RoomEventListener, TrackInfo, TrackKind, TrackSource,
};
use crate::layout::{ParticipantTile, RoomLayout};
use crate::participant::{LocalParticipantState, ParticipantRegistry, RemoteParticipantState};
use crate::playout::PlayoutBuffer;
use crate::track::next_object_handle;

pub(crate) type SharedRoom = Arc<Mutex<Option<Arc<Room>>>>;
pub(crate) type SharedLocal = Arc<Mutex<Option<LocalParticipantState>>>;

const PLAYOUT_SAMPLE_RATE: i32 = 48_000;
const PLAYOUT_CHANNELS: i32 = 1;

/// Manages the lifecycle of an engine room connection.
///
/// All engine events funnel through a single loop that mirrors session
/// state (participants, publications, subscriptions) and fans out domain
/// events to registered listeners, in engine order.
pub struct RoomSession {
    room: SharedRoom,
    emitter: EventEmitter,
    registry: Arc<Mutex<ParticipantRegistry>>,
    local: SharedLocal,
    connection_state: Arc<Mutex<ConnectionState>>,
    subscribed_video: Arc<Mutex<HashMap<String, RemoteVideoTrack>>>,
    playout: Arc<PlayoutBuffer>,
    layout: Arc<Mutex<RoomLayout>>,
}

/// Shared state threaded into the event loop task.
struct EventLoopCtx {
    emitter: EventEmitter,
    registry: Arc<Mutex<ParticipantRegistry>>,
    local: SharedLocal,
    connection_state: Arc<Mutex<ConnectionState>>,
    room: SharedRoom,
    subscribed_video: Arc<Mutex<HashMap<String, RemoteVideoTrack>>>,
    playout: Arc<PlayoutBuffer>,
    layout: Arc<Mutex<RoomLayout>>,
}

impl RoomSession {
    pub fn new() -> Self {
        Self {
            room: Arc::new(Mutex::new(None)),
            emitter: EventEmitter::new(),
            registry: Arc::new(Mutex::new(ParticipantRegistry::new())),
            local: Arc::new(Mutex::new(None)),
            connection_state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            subscribed_video: Arc::new(Mutex::new(HashMap::new())),
            playout: Arc::new(PlayoutBuffer::new()),
            layout: Arc::new(Mutex::new(RoomLayout::new())),
        }
    }

    /// Register a listener for room events.
    pub fn add_listener(&self, listener: Arc<dyn RoomEventListener>) {
        self.emitter.add_listener(listener);
    }

    /// Create media controls bound to this session.
    pub fn controls(&self) -> MediaControls {
        MediaControls::new(self.room.clone(), self.local.clone())
    }

    /// Buffer that host audio output pulls decoded remote PCM from.
    pub fn playout_buffer(&self) -> Arc<PlayoutBuffer> {
        self.playout.clone()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.connection_state.lock().await.clone()
    }

    /// Snapshot of the mirrored remote participants.
    pub async fn participants(&self) -> Vec<ParticipantInfo> {
        self.registry.lock().await.snapshot()
    }

    /// Snapshot of the local participant mirror (for the self-view tile
    /// and publication inspection).
    pub async fn local_participant(&self) -> Option<LocalParticipantState> {
        self.local.lock().await.clone()
    }

    pub async fn active_speakers(&self) -> Vec<String> {
        self.registry.lock().await.active_speakers().to_vec()
    }

    /// Look up a subscribed remote video track by SID, for renderers.
    pub async fn get_video_track(&self, track_sid: &str) -> Option<RemoteVideoTrack> {
        self.subscribed_video.lock().await.get(track_sid).cloned()
    }

    pub async fn video_track_sids(&self) -> Vec<String> {
        self.subscribed_video.lock().await.keys().cloned().collect()
    }

    /// Render-ready tile snapshot (primary first).
    pub async fn layout_tiles(&self) -> Vec<ParticipantTile> {
        self.layout.lock().await.tiles()
    }

    /// Pin a participant to the primary slot.
    pub async fn pin_participant(&self, sid: &str) -> Result<(), HuddleError> {
        self.layout.lock().await.pin(sid)
    }

    pub async fn clear_pin(&self) {
        self.layout.lock().await.unpin();
    }

    /// Toggle thumbnail selection for a participant.
    pub async fn select_participant(&self, sid: &str) -> Result<(), HuddleError> {
        self.layout.lock().await.select(sid)
    }

    pub async fn set_mirror_local(&self, mirror: bool) {
        self.layout.lock().await.set_mirror_local(mirror);
    }

    /// Connect via the deployment's token service.
    pub async fn connect(
        &self,
        service_url: &str,
        room_name: &str,
        identity: Option<&str>,
    ) -> Result<(), HuddleError> {
        self.set_connection_state(ConnectionState::Connecting).await;

        let credentials = match TokenService::request_token(service_url, room_name, identity).await
        {
            Ok(credentials) => credentials,
            Err(e) => {
                self.set_connection_state(ConnectionState::Disconnected).await;
                return Err(e);
            }
        };

        self.connect_with_token(&credentials.engine_url, &credentials.token)
            .await
    }

    /// Connect directly with an engine URL and token (useful for testing).
    pub async fn connect_with_token(
        &self,
        engine_url: &str,
        token: &str,
    ) -> Result<(), HuddleError> {
        self.set_connection_state(ConnectionState::Connecting).await;

        let mut options = RoomOptions::default();
        options.auto_subscribe = true;

        let (room, events) = match Room::connect(engine_url, token, options).await {
            Ok(pair) => pair,
            Err(e) => {
                self.set_connection_state(ConnectionState::Disconnected).await;
                return Err(HuddleError::Connection(e.to_string()));
            }
        };

        let room = Arc::new(room);

        // Mirror the local participant. Engine-reported identifiers go
        // through the same validation as everything else.
        {
            let engine_local = room.local_participant();
            let state = match LocalParticipantState::new(
                next_object_handle(),
                engine_local.sid().to_string(),
                engine_local.identity().to_string(),
            ) {
                Ok(state) => state,
                Err(e) => {
                    if let Err(close_err) = room.close().await {
                        tracing::warn!("error closing room: {close_err}");
                    }
                    self.set_connection_state(ConnectionState::Disconnected).await;
                    return Err(e);
                }
            };
            self.registry.lock().await.set_local_sid(state.sid().to_string());
            self.layout.lock().await.set_local(state.sid(), state.identity());
            *self.local.lock().await = Some(state);
        }

        // Seed remote participants already in the room.
        {
            let mut registry = self.registry.lock().await;
            let mut layout = self.layout.lock().await;
            for (_, participant) in room.remote_participants() {
                match Self::mirror_remote(&participant) {
                    Ok(state) => {
                        let info = state.info();
                        layout.participant_joined(&state.sid, &state.identity);
                        registry.add(state);
                        self.emitter.emit(RoomEvent::ParticipantConnected(info));
                    }
                    Err(e) => {
                        tracing::warn!("ignoring participant with invalid identifiers: {e}")
                    }
                }
            }
        }

        *self.room.lock().await = Some(room.clone());
        self.set_connection_state(ConnectionState::Connected).await;

        let ctx = EventLoopCtx {
            emitter: self.emitter.clone(),
            registry: self.registry.clone(),
            local: self.local.clone(),
            connection_state: self.connection_state.clone(),
            room: self.room.clone(),
            subscribed_video: self.subscribed_video.clone(),
            playout: self.playout.clone(),
            layout: self.layout.clone(),
        };

        tokio::spawn(async move {
            Self::event_loop(events, ctx).await;
        });

        Ok(())
    }

    /// Disconnect from the current room and reset every mirror.
    pub async fn disconnect(&self) {
        let room = self.room.lock().await.take();
        if let Some(room) = room {
            if let Err(e) = room.close().await {
                tracing::warn!("error closing room: {e}");
            }
        }
        self.registry.lock().await.clear();
        *self.local.lock().await = None;
        self.subscribed_video.lock().await.clear();
        self.playout.clear();
        self.layout.lock().await.clear();
        self.set_connection_state(ConnectionState::Disconnected).await;
    }

    async fn set_connection_state(&self, state: ConnectionState) {
        *self.connection_state.lock().await = state.clone();
        self.emitter.emit(RoomEvent::ConnectionStateChanged(state));
    }

    fn map_kind(kind: LkTrackKind) -> TrackKind {
        match kind {
            LkTrackKind::Audio => TrackKind::Audio,
            LkTrackKind::Video => TrackKind::Video,
        }
    }

    fn map_source(source: LkTrackSource) -> TrackSource {
        match source {
            LkTrackSource::Microphone => TrackSource::Microphone,
            LkTrackSource::Camera => TrackSource::Camera,
            LkTrackSource::Screenshare => TrackSource::ScreenShare,
            _ => TrackSource::Unknown,
        }
    }

    fn map_quality(quality: LkConnectionQuality) -> ConnectionQuality {
        match quality {
            LkConnectionQuality::Excellent => ConnectionQuality::Excellent,
            LkConnectionQuality::Good => ConnectionQuality::Good,
            LkConnectionQuality::Poor => ConnectionQuality::Poor,
            LkConnectionQuality::Lost => ConnectionQuality::Lost,
        }
    }

    /// Build the mirror for an engine-reported remote participant.
    ///
    /// Publication metadata is seeded as unsubscribed: video availability
    /// is only ever set by TrackSubscribed, so hosts never attach a
    /// surface to a track whose frames cannot arrive yet.
    fn mirror_remote(participant: &RemoteParticipant) -> Result<RemoteParticipantState, HuddleError> {
        let name = {
            let n = participant.name().to_string();
            if n.is_empty() { None } else { Some(n) }
        };
        let mut state = RemoteParticipantState::new(
            participant.sid().to_string(),
            participant.identity().to_string(),
            name,
        )?;
        for (_, publication) in participant.track_publications() {
            state.add_publication(PublicationInfo {
                sid: publication.sid().to_string(),
                name: publication.name().to_string(),
                kind: Self::map_kind(publication.kind()),
                source: Self::map_source(publication.source()),
                muted: publication.is_muted(),
                subscribed: false,
            });
        }
        Ok(state)
    }

    async fn event_loop(
        mut events: tokio::sync::mpsc::UnboundedReceiver<LkRoomEvent>,
        ctx: EventLoopCtx,
    ) {
        let mut reconnect_attempt: u32 = 0;
        // Playout tasks per subscribed audio track, aborted on unsubscribe
        // and on disconnect.
        let mut audio_tasks: HashMap<String, tokio::task::JoinHandle<()>> = HashMap::new();

        while let Some(event) = events.recv().await {
            match event {
                LkRoomEvent::Connected { .. } => {
                    reconnect_attempt = 0;
                    *ctx.connection_state.lock().await = ConnectionState::Connected;
                    ctx.emitter
                        .emit(RoomEvent::ConnectionStateChanged(ConnectionState::Connected));
                }

                LkRoomEvent::Reconnecting => {
                    reconnect_attempt += 1;
                    let state = ConnectionState::Reconnecting { attempt: reconnect_attempt };
                    *ctx.connection_state.lock().await = state.clone();
                    ctx.emitter.emit(RoomEvent::ConnectionStateChanged(state));
                }

                LkRoomEvent::Reconnected => {
                    reconnect_attempt = 0;
                    *ctx.connection_state.lock().await = ConnectionState::Connected;
                    ctx.emitter
                        .emit(RoomEvent::ConnectionStateChanged(ConnectionState::Connected));
                }

                LkRoomEvent::Disconnected { reason } => {
                    tracing::info!("room disconnected: {reason:?}");
                    *ctx.connection_state.lock().await = ConnectionState::Disconnected;
                    ctx.emitter.emit(RoomEvent::ConnectionStateChanged(
                        ConnectionState::Disconnected,
                    ));
                    ctx.registry.lock().await.clear();
                    *ctx.local.lock().await = None;
                    ctx.subscribed_video.lock().await.clear();
                    ctx.playout.clear();
                    ctx.layout.lock().await.clear();
                    for (sid, handle) in audio_tasks.drain() {
                        handle.abort();
                        tracing::debug!("audio playout task aborted on disconnect: {sid}");
                    }
                    *ctx.room.lock().await = None;
                    break;
                }

                LkRoomEvent::ParticipantConnected(participant) => {
                    match Self::mirror_remote(&participant) {
                        Ok(state) => {
                            let info = state.info();
                            ctx.layout
                                .lock()
                                .await
                                .participant_joined(&state.sid, &state.identity);
                            ctx.registry.lock().await.add(state);
                            ctx.emitter.emit(RoomEvent::ParticipantConnected(info));
                        }
                        Err(e) => {
                            tracing::warn!("ignoring participant with invalid identifiers: {e}")
                        }
                    }
                }

                LkRoomEvent::ParticipantDisconnected(participant) => {
                    let sid = participant.sid().to_string();
                    ctx.registry.lock().await.remove(&sid);
                    ctx.layout.lock().await.participant_left(&sid);
                    ctx.emitter.emit(RoomEvent::ParticipantDisconnected(sid));
                }

                LkRoomEvent::TrackPublished { publication, participant } => {
                    let participant_sid = participant.sid().to_string();
                    let info = PublicationInfo {
                        sid: publication.sid().to_string(),
                        name: publication.name().to_string(),
                        kind: Self::map_kind(publication.kind()),
                        source: Self::map_source(publication.source()),
                        muted: publication.is_muted(),
                        subscribed: false,
                    };
                    if let Some(p) = ctx.registry.lock().await.get_mut(&participant_sid) {
                        p.add_publication(info.clone());
                    }
                    ctx.emitter.emit(RoomEvent::TrackPublished { participant_sid, publication: info });
                }

                LkRoomEvent::TrackUnpublished { publication, participant } => {
                    let participant_sid = participant.sid().to_string();
                    let track_sid = publication.sid().to_string();
                    if let Some(p) = ctx.registry.lock().await.get_mut(&participant_sid) {
                        p.remove_publication(&track_sid);
                    }
                    ctx.emitter.emit(RoomEvent::TrackUnpublished { participant_sid, track_sid });
                }

                LkRoomEvent::TrackSubscribed { track, publication, participant } => {
                    let participant_sid = participant.sid().to_string();
                    let track_sid = publication.sid().to_string();
                    let kind = Self::map_kind(publication.kind());
                    let source = Self::map_source(publication.source());

                    {
                        let mut registry = ctx.registry.lock().await;
                        if let Some(p) = registry.get_mut(&participant_sid) {
                            match p.publication_mut(&track_sid) {
                                Some(record) => record.subscribed = true,
                                None => p.add_publication(PublicationInfo {
                                    sid: track_sid.clone(),
                                    name: publication.name().to_string(),
                                    kind,
                                    source,
                                    muted: publication.is_muted(),
                                    subscribed: true,
                                }),
                            }
                        }
                    }

                    if kind == TrackKind::Video {
                        if let RemoteTrack::Video(video_track) = &track {
                            ctx.subscribed_video
                                .lock()
                                .await
                                .insert(track_sid.clone(), video_track.clone());
                        }
                        ctx.layout
                            .lock()
                            .await
                            .set_video(&participant_sid, Some(track_sid.clone()));
                    }

                    // Pump decoded remote audio into the shared playout
                    // buffer; host audio output pulls from there.
                    if kind == TrackKind::Audio {
                        if let RemoteTrack::Audio(audio_track) = &track {
                            let rtc_track = audio_track.rtc_track();
                            let mut stream = NativeAudioStream::new(
                                rtc_track,
                                PLAYOUT_SAMPLE_RATE,
                                PLAYOUT_CHANNELS,
                            );
                            let playout = ctx.playout.clone();
                            let sid = track_sid.clone();
                            let handle = tokio::spawn(async move {
                                tracing::debug!("audio playout started for track {sid}");
                                while let Some(frame) = stream.next().await {
                                    playout.push(&frame.data);
                                }
                                tracing::debug!("audio playout ended for track {sid}");
                            });
                            audio_tasks.insert(track_sid.clone(), handle);
                        }
                    }

                    ctx.emitter.emit(RoomEvent::TrackSubscribed(TrackInfo {
                        sid: track_sid,
                        participant_sid,
                        kind,
                        source,
                    }));
                }

                LkRoomEvent::TrackUnsubscribed { publication, participant, .. } => {
                    let participant_sid = participant.sid().to_string();
                    let track_sid = publication.sid().to_string();
                    let is_video = publication.kind() == LkTrackKind::Video;

                    {
                        let mut registry = ctx.registry.lock().await;
                        if let Some(p) = registry.get_mut(&participant_sid) {
                            if let Some(record) = p.publication_mut(&track_sid) {
                                record.subscribed = false;
                            }
                        }
                    }

                    if is_video {
                        ctx.subscribed_video.lock().await.remove(&track_sid);
                        ctx.layout.lock().await.set_video(&participant_sid, None);
                    } else if let Some(handle) = audio_tasks.remove(&track_sid) {
                        handle.abort();
                        tracing::debug!("audio playout task aborted for track {track_sid}");
                    }

                    ctx.emitter.emit(RoomEvent::TrackUnsubscribed(track_sid));
                }

                LkRoomEvent::TrackSubscriptionFailed { participant, error, track_sid } => {
                    let participant_sid = participant.sid().to_string();
                    let track_sid = track_sid.to_string();
                    tracing::warn!(
                        "track subscription failed: participant={participant_sid} track={track_sid} error={error}"
                    );
                    ctx.emitter.emit(RoomEvent::TrackSubscriptionFailed {
                        participant_sid,
                        track_sid,
                        error: error.to_string(),
                    });
                }

                LkRoomEvent::TrackMuted { participant, publication } => {
                    let participant_sid = participant.sid().to_string();
                    let track_sid = publication.sid().to_string();
                    let source = Self::map_source(publication.source());

                    {
                        let mut registry = ctx.registry.lock().await;
                        if let Some(p) = registry.get_mut(&participant_sid) {
                            if let Some(record) = p.publication_mut(&track_sid) {
                                record.muted = true;
                            }
                        }
                    }
                    {
                        let mut local = ctx.local.lock().await;
                        if let Some(state) = local.as_mut() {
                            if state.sid() == participant_sid {
                                state.set_muted_by_source(source, true);
                            }
                        }
                    }

                    ctx.emitter.emit(RoomEvent::TrackMuted { participant_sid, source });
                }

                LkRoomEvent::TrackUnmuted { participant, publication } => {
                    let participant_sid = participant.sid().to_string();
                    let track_sid = publication.sid().to_string();
                    let source = Self::map_source(publication.source());

                    {
                        let mut registry = ctx.registry.lock().await;
                        if let Some(p) = registry.get_mut(&participant_sid) {
                            if let Some(record) = p.publication_mut(&track_sid) {
                                record.muted = false;
                            }
                        }
                    }
                    {
                        let mut local = ctx.local.lock().await;
                        if let Some(state) = local.as_mut() {
                            if state.sid() == participant_sid {
                                state.set_muted_by_source(source, false);
                            }
                        }
                    }

                    ctx.emitter.emit(RoomEvent::TrackUnmuted { participant_sid, source });
                }

                LkRoomEvent::ActiveSpeakersChanged { speakers } => {
                    let sids: Vec<String> =
                        speakers.iter().map(|p| p.sid().to_string()).collect();
                    ctx.registry.lock().await.set_active_speakers(sids.clone());
                    ctx.layout.lock().await.set_dominant_speaker(sids.first().cloned());
                    ctx.emitter.emit(RoomEvent::ActiveSpeakersChanged(sids));
                }

                LkRoomEvent::ConnectionQualityChanged { quality, participant } => {
                    let participant_sid = participant.sid().to_string();
                    let quality = Self::map_quality(quality);

                    {
                        let mut registry = ctx.registry.lock().await;
                        if let Some(p) = registry.get_mut(&participant_sid) {
                            p.connection_quality = quality.clone();
                        }
                    }

                    ctx.emitter.emit(RoomEvent::ConnectionQualityChanged {
                        participant_sid,
                        quality,
                    });
                }

                LkRoomEvent::DataReceived { payload, kind, participant, .. } => {
                    let participant_sid = participant
                        .as_ref()
                        .map(|p| p.sid().to_string())
                        .unwrap_or_default();
                    tracing::debug!(
                        "data received: from={participant_sid} kind={kind:?} len={}",
                        payload.len()
                    );
                    ctx.emitter.emit(RoomEvent::DataReceived {
                        participant_sid,
                        payload: payload.to_vec(),
                        reliable: matches!(kind, DataPacketKind::Reliable),
                    });
                }

                _ => {
                    tracing::debug!("unhandled engine event: {event:?}");
                }
            }
        }

        tracing::info!("room event loop ended");
    }
}

impl Default for RoomSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_disconnected_and_empty() {
        let session = RoomSession::new();
        assert_eq!(session.connection_state().await, ConnectionState::Disconnected);
        assert!(session.participants().await.is_empty());
        assert!(session.local_participant().await.is_none());
        assert!(session.active_speakers().await.is_empty());
        assert!(session.video_track_sids().await.is_empty());
        assert!(session.layout_tiles().await.is_empty());
    }

    #[tokio::test]
    async fn pin_before_connect_is_rejected() {
        let session = RoomSession::new();
        let result = session.pin_participant("PA1").await;
        assert!(matches!(result, Err(HuddleError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn disconnect_when_never_connected_is_a_noop() {
        let session = RoomSession::new();
        session.disconnect().await;
        assert_eq!(session.connection_state().await, ConnectionState::Disconnected);
    }
}
