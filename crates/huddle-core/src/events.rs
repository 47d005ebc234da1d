use std::sync::Arc;

/// Events emitted by the SDK to host listeners.
///
/// Every event originates from the engine event loop in [`crate::room`]
/// and is delivered on that single path, in engine order.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    ConnectionStateChanged(ConnectionState),
    ParticipantConnected(ParticipantInfo),
    ParticipantDisconnected(String), // participant SID
    TrackPublished { participant_sid: String, publication: PublicationInfo },
    TrackUnpublished { participant_sid: String, track_sid: String },
    TrackSubscribed(TrackInfo),
    TrackUnsubscribed(String), // track SID
    TrackSubscriptionFailed { participant_sid: String, track_sid: String, error: String },
    TrackMuted { participant_sid: String, source: TrackSource },
    TrackUnmuted { participant_sid: String, source: TrackSource },
    ActiveSpeakersChanged(Vec<String>), // participant SIDs
    ConnectionQualityChanged { participant_sid: String, quality: ConnectionQuality },
    DataReceived { participant_sid: String, payload: Vec<u8>, reliable: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Poor,
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSource {
    Microphone,
    Camera,
    ScreenShare,
    Data,
    Unknown,
}

/// Snapshot of a remote participant, as mirrored from the engine.
#[derive(Debug, Clone)]
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

/// A subscribed track, identified for the host (renderer lookup, playout).
#[derive(Debug, Clone)]
pub struct TrackInfo {
    pub sid: String,
    pub participant_sid: String,
    pub kind: TrackKind,
    pub source: TrackSource,
}

/// One track publication as reported by the engine.
#[derive(Debug, Clone)]
pub struct PublicationInfo {
    pub sid: String,
    pub name: String,
    pub kind: TrackKind,
    pub source: TrackSource,
    pub muted: bool,
    pub subscribed: bool,
}

/// Trait for receiving events from the SDK.
/// Implementations must be Send + Sync (called from tokio tasks).
pub trait RoomEventListener: Send + Sync {
    fn on_event(&self, event: RoomEvent);
}

/// Internal event emitter that dispatches to registered listeners.
///
/// Listeners are `Arc`s, so a null registration cannot be expressed here;
/// the raw-pointer boundaries in `huddle-ffi` validate for null before a
/// listener ever reaches this type.
#[derive(Clone)]
pub struct EventEmitter {
    listeners: Arc<std::sync::RwLock<Vec<Arc<dyn RoomEventListener>>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(std::sync::RwLock::new(Vec::new())),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn RoomEventListener>) {
        self.listeners.write().unwrap().push(listener);
    }

    pub fn emit(&self, event: RoomEvent) {
        let listeners = self.listeners.read().unwrap();
        for listener in listeners.iter() {
            listener.on_event(event.clone());
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener {
        count: Arc<AtomicUsize>,
    }

    impl RoomEventListener for CountingListener {
        fn on_event(&self, _event: RoomEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn emitter_dispatches_to_listener() {
        let emitter = EventEmitter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let listener = Arc::new(CountingListener { count: count.clone() });

        emitter.add_listener(listener);
        emitter.emit(RoomEvent::ConnectionStateChanged(ConnectionState::Connected));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn emitter_dispatches_to_multiple_listeners() {
        let emitter = EventEmitter::new();
        let count1 = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::new(AtomicUsize::new(0));

        emitter.add_listener(Arc::new(CountingListener { count: count1.clone() }));
        emitter.add_listener(Arc::new(CountingListener { count: count2.clone() }));

        emitter.emit(RoomEvent::ConnectionStateChanged(ConnectionState::Connected));

        assert_eq!(count1.load(Ordering::SeqCst), 1);
        assert_eq!(count2.load(Ordering::SeqCst), 1);
    }

    struct EventCapture {
        events: Arc<std::sync::Mutex<Vec<RoomEvent>>>,
    }

    impl RoomEventListener for EventCapture {
        fn on_event(&self, event: RoomEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn emitter_delivers_correct_events() {
        let emitter = EventEmitter::new();
        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let listener = Arc::new(EventCapture { events: events.clone() });

        emitter.add_listener(listener);
        emitter.emit(RoomEvent::ParticipantDisconnected("PA100".to_string()));

        let captured = events.lock().unwrap();
        assert_eq!(captured.len(), 1);
        match &captured[0] {
            RoomEvent::ParticipantDisconnected(sid) => assert_eq!(sid, "PA100"),
            _ => panic!("expected ParticipantDisconnected"),
        }
    }

    #[test]
    fn emitter_preserves_event_order() {
        let emitter = EventEmitter::new();
        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        emitter.add_listener(Arc::new(EventCapture { events: events.clone() }));

        emitter.emit(RoomEvent::ConnectionStateChanged(ConnectionState::Connecting));
        emitter.emit(RoomEvent::ConnectionStateChanged(ConnectionState::Connected));

        let captured = events.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert!(matches!(
            captured[0],
            RoomEvent::ConnectionStateChanged(ConnectionState::Connecting)
        ));
        assert!(matches!(
            captured[1],
            RoomEvent::ConnectionStateChanged(ConnectionState::Connected)
        ));
    }
}
