use crate::error::HuddleError;
use crate::events::{ConnectionQuality, ParticipantInfo, PublicationInfo, TrackKind};
use crate::track::LocalTrackPublication;

fn validate_identifiers(sid: &str, identity: &str) -> Result<(), HuddleError> {
    if sid.is_empty() {
        return Err(HuddleError::InvalidArgument("participant sid is empty".into()));
    }
    if identity.is_empty() {
        return Err(HuddleError::InvalidArgument("participant identity is empty".into()));
    }
    Ok(())
}

/// Mirror of the engine's local participant object.
///
/// Owns the three publication collections. They are exposed as slices
/// only — the sole mutation path is the publish/unpublish bookkeeping
/// used by [`crate::controls::MediaControls`], so host code cannot alter
/// them out from under the engine.
#[derive(Debug, Clone)]
pub struct LocalParticipantState {
    handle: u64,
    sid: String,
    identity: String,
    audio: Vec<LocalTrackPublication>,
    video: Vec<LocalTrackPublication>,
    data: Vec<LocalTrackPublication>,
}

impl LocalParticipantState {
    /// Identifiers are validated before any state is constructed.
    pub fn new(handle: u64, sid: impl Into<String>, identity: impl Into<String>) -> Result<Self, HuddleError> {
        let sid = sid.into();
        let identity = identity.into();
        validate_identifiers(&sid, &identity)?;
        Ok(Self {
            handle,
            sid,
            identity,
            audio: Vec::new(),
            video: Vec::new(),
            data: Vec::new(),
        })
    }

    pub fn handle(&self) -> u64 {
        self.handle
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn audio_tracks(&self) -> &[LocalTrackPublication] {
        &self.audio
    }

    pub fn video_tracks(&self) -> &[LocalTrackPublication] {
        &self.video
    }

    pub fn data_tracks(&self) -> &[LocalTrackPublication] {
        &self.data
    }

    fn list_mut(&mut self, kind: TrackKind) -> &mut Vec<LocalTrackPublication> {
        match kind {
            TrackKind::Audio => &mut self.audio,
            TrackKind::Video => &mut self.video,
            TrackKind::Data => &mut self.data,
        }
    }

    pub(crate) fn add_publication(&mut self, publication: LocalTrackPublication) {
        let list = self.list_mut(publication.kind);
        if !list.iter().any(|p| p.sid == publication.sid) {
            list.push(publication);
        }
    }

    pub(crate) fn remove_publication_by_handle(&mut self, track_handle: u64) -> Option<LocalTrackPublication> {
        for kind in [TrackKind::Audio, TrackKind::Video, TrackKind::Data] {
            let list = self.list_mut(kind);
            if let Some(pos) = list.iter().position(|p| p.track_handle == track_handle) {
                return Some(list.remove(pos));
            }
        }
        None
    }

    pub(crate) fn set_muted_by_source(&mut self, source: crate::events::TrackSource, muted: bool) {
        for list in [&mut self.audio, &mut self.video, &mut self.data] {
            for publication in list.iter_mut() {
                if publication.source == source {
                    publication.muted = muted;
                }
            }
        }
    }
}

/// Mirror of an engine-reported remote participant.
#[derive(Debug, Clone)]
pub struct RemoteParticipantState {
    pub sid: String,
    pub identity: String,
    pub name: Option<String>,
    pub speaking: bool,
    pub connection_quality: ConnectionQuality,
    audio: Vec<PublicationInfo>,
    video: Vec<PublicationInfo>,
    data: Vec<PublicationInfo>,
}

impl RemoteParticipantState {
    /// Same identifier contract as the local participant; the event loop
    /// drops engine reports that violate it rather than mirroring them.
    pub fn new(sid: impl Into<String>, identity: impl Into<String>, name: Option<String>) -> Result<Self, HuddleError> {
        let sid = sid.into();
        let identity = identity.into();
        validate_identifiers(&sid, &identity)?;
        Ok(Self {
            sid,
            identity,
            name,
            speaking: false,
            connection_quality: ConnectionQuality::Good,
            audio: Vec::new(),
            video: Vec::new(),
            data: Vec::new(),
        })
    }

    pub fn audio_tracks(&self) -> &[PublicationInfo] {
        &self.audio
    }

    pub fn video_tracks(&self) -> &[PublicationInfo] {
        &self.video
    }

    pub fn data_tracks(&self) -> &[PublicationInfo] {
        &self.data
    }

    fn list_mut(&mut self, kind: TrackKind) -> &mut Vec<PublicationInfo> {
        match kind {
            TrackKind::Audio => &mut self.audio,
            TrackKind::Video => &mut self.video,
            TrackKind::Data => &mut self.data,
        }
    }

    pub(crate) fn add_publication(&mut self, publication: PublicationInfo) {
        let list = self.list_mut(publication.kind);
        if !list.iter().any(|p| p.sid == publication.sid) {
            list.push(publication);
        }
    }

    pub(crate) fn remove_publication(&mut self, track_sid: &str) -> Option<PublicationInfo> {
        for kind in [TrackKind::Audio, TrackKind::Video, TrackKind::Data] {
            let list = self.list_mut(kind);
            if let Some(pos) = list.iter().position(|p| p.sid == track_sid) {
                return Some(list.remove(pos));
            }
        }
        None
    }

    pub(crate) fn publication_mut(&mut self, track_sid: &str) -> Option<&mut PublicationInfo> {
        self.audio
            .iter_mut()
            .chain(self.video.iter_mut())
            .chain(self.data.iter_mut())
            .find(|p| p.sid == track_sid)
    }

    /// Host-facing snapshot. Video presence is derived from subscription
    /// state, not publication metadata, so the UI never builds a surface
    /// for a track whose frames cannot arrive yet.
    pub fn info(&self) -> ParticipantInfo {
        let video_track_sid = self
            .video
            .iter()
            .find(|p| p.subscribed)
            .map(|p| p.sid.clone());
        ParticipantInfo {
            sid: self.sid.clone(),
            identity: self.identity.clone(),
            name: self.name.clone(),
            is_muted: self.audio.iter().any(|p| p.muted),
            has_video: video_track_sid.is_some(),
            video_track_sid,
            speaking: self.speaking,
            connection_quality: self.connection_quality.clone(),
        }
    }
}

/// The room's mirror of remote participants, keyed by SID.
///
/// Updated only by the room event loop. Read by hosts through snapshots.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    participants: Vec<RemoteParticipantState>,
    active_speakers: Vec<String>,
    local_sid: Option<String>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_local_sid(&mut self, sid: String) {
        self.local_sid = Some(sid);
    }

    pub fn local_sid(&self) -> Option<&str> {
        self.local_sid.as_deref()
    }

    pub fn add(&mut self, participant: RemoteParticipantState) {
        if !self.participants.iter().any(|p| p.sid == participant.sid) {
            self.participants.push(participant);
        }
    }

    pub fn remove(&mut self, sid: &str) -> Option<RemoteParticipantState> {
        self.active_speakers.retain(|s| s != sid);
        let pos = self.participants.iter().position(|p| p.sid == sid)?;
        Some(self.participants.remove(pos))
    }

    pub fn get(&self, sid: &str) -> Option<&RemoteParticipantState> {
        self.participants.iter().find(|p| p.sid == sid)
    }

    pub fn get_mut(&mut self, sid: &str) -> Option<&mut RemoteParticipantState> {
        self.participants.iter_mut().find(|p| p.sid == sid)
    }

    pub fn set_active_speakers(&mut self, sids: Vec<String>) {
        for p in self.participants.iter_mut() {
            p.speaking = sids.contains(&p.sid);
        }
        self.active_speakers = sids;
    }

    pub fn active_speakers(&self) -> &[String] {
        &self.active_speakers
    }

    pub fn count(&self) -> usize {
        self.participants.len()
    }

    pub fn snapshot(&self) -> Vec<ParticipantInfo> {
        self.participants.iter().map(RemoteParticipantState::info).collect()
    }

    pub fn clear(&mut self) {
        self.participants.clear();
        self.active_speakers.clear();
        self.local_sid = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TrackSource;

    fn make_publication(sid: &str, kind: TrackKind) -> PublicationInfo {
        PublicationInfo {
            sid: sid.to_string(),
            name: format!("track-{sid}"),
            kind,
            source: match kind {
                TrackKind::Audio => TrackSource::Microphone,
                TrackKind::Video => TrackSource::Camera,
                TrackKind::Data => TrackSource::Data,
            },
            muted: false,
            subscribed: false,
        }
    }

    fn make_remote(sid: &str, identity: &str) -> RemoteParticipantState {
        RemoteParticipantState::new(sid, identity, None).unwrap()
    }

    #[test]
    fn local_participant_rejects_empty_sid() {
        let result = LocalParticipantState::new(7, "", "alice");
        assert!(matches!(result, Err(HuddleError::InvalidArgument(_))));
    }

    #[test]
    fn local_participant_rejects_empty_identity() {
        let result = LocalParticipantState::new(7, "PA123", "");
        assert!(matches!(result, Err(HuddleError::InvalidArgument(_))));
    }

    #[test]
    fn local_participant_valid_identifiers_succeed() {
        let local = LocalParticipantState::new(7, "PA123", "alice").unwrap();
        assert_eq!(local.handle(), 7);
        assert_eq!(local.sid(), "PA123");
        assert_eq!(local.identity(), "alice");
        assert!(local.audio_tracks().is_empty());
        assert!(local.video_tracks().is_empty());
        assert!(local.data_tracks().is_empty());
    }

    #[test]
    fn local_publication_bookkeeping_routes_by_kind() {
        let mut local = LocalParticipantState::new(1, "PA123", "alice").unwrap();
        local.add_publication(LocalTrackPublication {
            sid: "TR1".into(),
            track_handle: 11,
            name: "mic".into(),
            kind: TrackKind::Audio,
            source: TrackSource::Microphone,
            muted: false,
        });
        local.add_publication(LocalTrackPublication {
            sid: "TR2".into(),
            track_handle: 12,
            name: "cam".into(),
            kind: TrackKind::Video,
            source: TrackSource::Camera,
            muted: false,
        });
        assert_eq!(local.audio_tracks().len(), 1);
        assert_eq!(local.video_tracks().len(), 1);
        assert!(local.data_tracks().is_empty());

        let removed = local.remove_publication_by_handle(11).unwrap();
        assert_eq!(removed.sid, "TR1");
        assert!(local.audio_tracks().is_empty());
        assert!(local.remove_publication_by_handle(11).is_none());
    }

    #[test]
    fn remote_participant_rejects_empty_identifiers() {
        assert!(RemoteParticipantState::new("", "bob", None).is_err());
        assert!(RemoteParticipantState::new("PA200", "", None).is_err());
    }

    #[test]
    fn remote_snapshot_derives_video_from_subscription() {
        let mut remote = make_remote("PA200", "bob");
        remote.add_publication(make_publication("TRV1", TrackKind::Video));
        assert!(!remote.info().has_video);

        remote.publication_mut("TRV1").unwrap().subscribed = true;
        let info = remote.info();
        assert!(info.has_video);
        assert_eq!(info.video_track_sid.as_deref(), Some("TRV1"));
    }

    #[test]
    fn remote_snapshot_derives_muted_from_audio_publications() {
        let mut remote = make_remote("PA200", "bob");
        remote.add_publication(make_publication("TRA1", TrackKind::Audio));
        assert!(!remote.info().is_muted);
        remote.publication_mut("TRA1").unwrap().muted = true;
        assert!(remote.info().is_muted);
    }

    #[test]
    fn registry_ignores_duplicate_adds() {
        let mut registry = ParticipantRegistry::new();
        registry.add(make_remote("PA1", "alice"));
        registry.add(make_remote("PA1", "alice"));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn registry_remove_clears_speaker_membership() {
        let mut registry = ParticipantRegistry::new();
        registry.add(make_remote("PA1", "alice"));
        registry.add(make_remote("PA2", "bob"));
        registry.set_active_speakers(vec!["PA1".to_string()]);
        assert!(registry.get("PA1").unwrap().speaking);

        registry.remove("PA1");
        assert!(registry.active_speakers().is_empty());
        assert!(registry.get("PA1").is_none());
        assert!(registry.get("PA2").is_some());
    }

    #[test]
    fn registry_clear_resets_everything() {
        let mut registry = ParticipantRegistry::new();
        registry.set_local_sid("PAL".to_string());
        registry.add(make_remote("PA1", "alice"));
        registry.set_active_speakers(vec!["PA1".to_string()]);
        registry.clear();
        assert_eq!(registry.count(), 0);
        assert!(registry.active_speakers().is_empty());
        assert!(registry.local_sid().is_none());
    }
}
