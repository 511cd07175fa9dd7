use crate::controller::{PeerEvent, PeerSession, TimerKey};
use tandem_core::{MediaKind, StreamKey};
use tracing::{debug, info};

impl PeerSession {
    pub(super) fn announce_track(&mut self, stream_key: StreamKey, kind: MediaKind) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let entry = session.tracks.entry(stream_key.clone()).or_default();
        if entry.ready_emitted {
            debug!("{} track on {} after readiness, ignored", kind, stream_key);
            return;
        }
        entry.seen_kinds.insert(kind);

        self.timers.arm(
            TimerKey::TrackDebounce(stream_key),
            self.config.track_debounce,
            self.epoch,
        );
    }

    pub(super) fn stream_settled(&mut self, stream_key: StreamKey) {
        let Some(entry) = self
            .session
            .as_mut()
            .and_then(|s| s.tracks.get_mut(&stream_key))
        else {
            return;
        };
        if entry.ready_emitted {
            return;
        }
        entry.ready_emitted = true;
        let kinds: Vec<MediaKind> = entry.seen_kinds.iter().copied().collect();

        info!("Stream {} ready with {:?}", stream_key, kinds);
        self.emit(PeerEvent::StreamReady { stream_key, kinds });
    }
}
