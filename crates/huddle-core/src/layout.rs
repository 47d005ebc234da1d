use crate::error::HuddleError;

/// One tile in the room grid, ready for a host to render.
///
/// `stub` means no live video — hosts draw the avatar placeholder.
/// `show_identity_badge` follows the original room UI: the primary tile
/// always carries the badge, thumbnails only when selected.
#[derive(Debug, Clone, PartialEq, Eq)]
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

#[derive(Debug, Clone)]
struct TileEntry {
    sid: String,
    identity: String,
    video_track_sid: Option<String>,
    is_local: bool,
}

/// Headless model of the room's primary/thumbnail composition.
///
/// Primary slot precedence: pinned participant, else the current dominant
/// speaker, else the first remote in join order, else the local
/// participant. Thumbnails keep join order.
#[derive(Debug, Default)]
pub struct RoomLayout {
    entries: Vec<TileEntry>,
    pinned: Option<String>,
    dominant_speaker: Option<String>,
    selected: Option<String>,
    mirror_local: bool,
}

impl RoomLayout {
    pub fn new() -> Self {
        Self {
            mirror_local: true,
            ..Self::default()
        }
    }

    pub fn set_local(&mut self, sid: impl Into<String>, identity: impl Into<String>) {
        let sid = sid.into();
        if self.entries.iter().any(|e| e.sid == sid) {
            return;
        }
        // Local always leads the thumbnail strip.
        self.entries.insert(
            0,
            TileEntry {
                sid,
                identity: identity.into(),
                video_track_sid: None,
                is_local: true,
            },
        );
    }

    pub fn participant_joined(&mut self, sid: impl Into<String>, identity: impl Into<String>) {
        let sid = sid.into();
        if self.entries.iter().any(|e| e.sid == sid) {
            return;
        }
        self.entries.push(TileEntry {
            sid,
            identity: identity.into(),
            video_track_sid: None,
            is_local: false,
        });
    }

    pub fn participant_left(&mut self, sid: &str) {
        self.entries.retain(|e| e.sid != sid);
        if self.pinned.as_deref() == Some(sid) {
            self.pinned = None;
        }
        if self.dominant_speaker.as_deref() == Some(sid) {
            self.dominant_speaker = None;
        }
        if self.selected.as_deref() == Some(sid) {
            self.selected = None;
        }
    }

    pub fn set_video(&mut self, sid: &str, video_track_sid: Option<String>) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.sid == sid) {
            entry.video_track_sid = video_track_sid;
        }
    }

    /// Pin a participant to the primary slot.
    pub fn pin(&mut self, sid: &str) -> Result<(), HuddleError> {
        if !self.entries.iter().any(|e| e.sid == sid) {
            return Err(HuddleError::InvalidArgument(format!("unknown participant: {sid}")));
        }
        self.pinned = Some(sid.to_string());
        Ok(())
    }

    pub fn unpin(&mut self) {
        self.pinned = None;
    }

    pub fn pinned(&self) -> Option<&str> {
        self.pinned.as_deref()
    }

    /// Toggle thumbnail selection (controls the badge on thumbnails).
    pub fn select(&mut self, sid: &str) -> Result<(), HuddleError> {
        if !self.entries.iter().any(|e| e.sid == sid) {
            return Err(HuddleError::InvalidArgument(format!("unknown participant: {sid}")));
        }
        if self.selected.as_deref() == Some(sid) {
            self.selected = None;
        } else {
            self.selected = Some(sid.to_string());
        }
        Ok(())
    }

    pub fn set_dominant_speaker(&mut self, sid: Option<String>) {
        // Keep the last speaker promoted during silence.
        if sid.is_some() {
            self.dominant_speaker = sid;
        }
    }

    pub fn set_mirror_local(&mut self, mirror: bool) {
        self.mirror_local = mirror;
    }

    pub fn primary_sid(&self) -> Option<&str> {
        if let Some(pinned) = self.pinned.as_deref() {
            return Some(pinned);
        }
        if let Some(speaker) = self.dominant_speaker.as_deref() {
            if self.entries.iter().any(|e| e.sid == speaker) {
                return Some(speaker);
            }
        }
        self.entries
            .iter()
            .find(|e| !e.is_local)
            .or_else(|| self.entries.first())
            .map(|e| e.sid.as_str())
    }

    /// Render-ready tiles: primary first, thumbnails in join order.
    pub fn tiles(&self) -> Vec<ParticipantTile> {
        let primary_sid = self.primary_sid();
        let mut tiles = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let primary = Some(entry.sid.as_str()) == primary_sid;
            let selected = self.selected.as_deref() == Some(entry.sid.as_str());
            tiles.push(ParticipantTile {
                sid: entry.sid.clone(),
                identity: entry.identity.clone(),
                primary,
                show_identity_badge: primary || selected,
                stub: entry.video_track_sid.is_none(),
                selected,
                mirror: entry.is_local && self.mirror_local,
                video_track_sid: entry.video_track_sid.clone(),
            });
        }
        tiles.sort_by_key(|t| !t.primary);
        tiles
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.pinned = None;
        self.dominant_speaker = None;
        self.selected = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout_with_room() -> RoomLayout {
        let mut layout = RoomLayout::new();
        layout.set_local("PAL", "me");
        layout.participant_joined("PA1", "alice");
        layout.participant_joined("PA2", "bob");
        layout
    }

    #[test]
    fn first_remote_is_primary_by_default() {
        let layout = layout_with_room();
        assert_eq!(layout.primary_sid(), Some("PA1"));
        let tiles = layout.tiles();
        assert_eq!(tiles[0].sid, "PA1");
        assert!(tiles[0].primary);
        assert!(tiles[0].show_identity_badge);
    }

    #[test]
    fn local_is_primary_when_alone() {
        let mut layout = RoomLayout::new();
        layout.set_local("PAL", "me");
        assert_eq!(layout.primary_sid(), Some("PAL"));
    }

    #[test]
    fn dominant_speaker_is_promoted() {
        let mut layout = layout_with_room();
        layout.set_dominant_speaker(Some("PA2".to_string()));
        assert_eq!(layout.primary_sid(), Some("PA2"));
        // Silence keeps the last speaker in the primary slot.
        layout.set_dominant_speaker(None);
        assert_eq!(layout.primary_sid(), Some("PA2"));
    }

    #[test]
    fn pin_overrides_dominant_speaker() {
        let mut layout = layout_with_room();
        layout.set_dominant_speaker(Some("PA2".to_string()));
        layout.pin("PA1").unwrap();
        assert_eq!(layout.primary_sid(), Some("PA1"));
        layout.unpin();
        assert_eq!(layout.primary_sid(), Some("PA2"));
    }

    #[test]
    fn pin_unknown_participant_is_rejected() {
        let mut layout = layout_with_room();
        assert!(matches!(
            layout.pin("PA99"),
            Err(HuddleError::InvalidArgument(_))
        ));
    }

    #[test]
    fn departure_clears_pin_and_promotion() {
        let mut layout = layout_with_room();
        layout.pin("PA1").unwrap();
        layout.participant_left("PA1");
        assert_eq!(layout.pinned(), None);
        assert_eq!(layout.primary_sid(), Some("PA2"));
    }

    #[test]
    fn stub_follows_video_availability() {
        let mut layout = layout_with_room();
        let tile = |layout: &RoomLayout, sid: &str| {
            layout.tiles().into_iter().find(|t| t.sid == sid).unwrap()
        };
        assert!(tile(&layout, "PA1").stub);

        layout.set_video("PA1", Some("TRV1".to_string()));
        let t = tile(&layout, "PA1");
        assert!(!t.stub);
        assert_eq!(t.video_track_sid.as_deref(), Some("TRV1"));

        layout.set_video("PA1", None);
        assert!(tile(&layout, "PA1").stub);
    }

    #[test]
    fn thumbnail_badge_requires_selection() {
        let mut layout = layout_with_room();
        let bob = |layout: &RoomLayout| {
            layout.tiles().into_iter().find(|t| t.sid == "PA2").unwrap()
        };
        assert!(!bob(&layout).show_identity_badge);

        layout.select("PA2").unwrap();
        assert!(bob(&layout).show_identity_badge);

        // Selecting again toggles off.
        layout.select("PA2").unwrap();
        assert!(!bob(&layout).show_identity_badge);
    }

    #[test]
    fn only_local_tile_mirrors() {
        let mut layout = layout_with_room();
        let tiles = layout.tiles();
        assert!(tiles.iter().find(|t| t.sid == "PAL").unwrap().mirror);
        assert!(!tiles.iter().find(|t| t.sid == "PA1").unwrap().mirror);

        layout.set_mirror_local(false);
        assert!(!layout.tiles().iter().find(|t| t.sid == "PAL").unwrap().mirror);
    }

    #[test]
    fn clear_empties_the_grid() {
        let mut layout = layout_with_room();
        layout.clear();
        assert!(layout.tiles().is_empty());
        assert_eq!(layout.primary_sid(), None);
    }
}
