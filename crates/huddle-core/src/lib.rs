//! Huddle core: engine-facing business logic for video rooms.
//!
//! Pure Rust crate with no platform dependencies. Mirrors session state
//! (participants, tracks, publications) from the underlying RTC engine
//! into host-visible objects. Consumed by native UI shells via the
//! `huddle-ffi` bindings.

pub mod auth;
pub mod controls;
pub mod error;
pub mod events;
pub mod layout;
pub mod participant;
pub mod playout;
pub mod prefs;
pub mod room;
pub mod track;

pub use auth::{SessionCredentials, TokenService};
pub use controls::MediaControls;
pub use error::HuddleError;
pub use events::{RoomEvent, RoomEventListener};
pub use layout::{ParticipantTile, RoomLayout};
pub use participant::{LocalParticipantState, RemoteParticipantState};
pub use playout::PlayoutBuffer;
pub use prefs::{Preferences, PreferencesStore};
pub use room::RoomSession;
pub use track::{
    AudioCaptureOptions, LocalAudioTrack, LocalDataTrack, LocalTrack, LocalTrackPublication,
    LocalVideoTrack, VideoCaptureResolution,
};
