use actor_protocol::{Focus, MediaMetadata, PlaybackState};
use async_trait::async_trait;
use core_types::LinkId;
use std::sync::{Arc, Mutex, MutexGuard};

/// Host media session the bridge reports to
///
/// The session actor is its only caller, one call at a time.
#[async_trait]
pub trait MediaControlSink: Send + Sync + 'static {
    async fn on_playback_state_changed(&self, link_id: LinkId, state: PlaybackState);

    async fn on_metadata_changed(&self, link_id: LinkId, metadata: &MediaMetadata);

    /// Ask for audio focus before playback starts
    async fn request_focus(&self) -> Focus;

    async fn release_focus(&self);
}

/// One call made on a [`RecordingSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    Playback(LinkId, PlaybackState),
    Metadata(LinkId, MediaMetadata),
    RequestFocus,
    ReleaseFocus,
}

#[derive(Debug)]
struct Recording {
    focus_answer: Focus,
    calls: Vec<SinkCall>,
}

/// Sink that records every call; focus answer is configurable
#[derive(Debug, Clone)]
pub struct RecordingSink {
    inner: Arc<Mutex<Recording>>,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new(Focus::Granted)
    }
}

impl RecordingSink {
    pub fn new(focus_answer: Focus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Recording {
                focus_answer,
                calls: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_focus_answer(&self, answer: Focus) {
        self.lock().focus_answer = answer;
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.lock().calls.clone()
    }

    /// Playback states reported for `link_id`, oldest first
    pub fn playback_for(&self, link_id: LinkId) -> Vec<PlaybackState> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                SinkCall::Playback(id, state) if *id == link_id => Some(*state),
                _ => None,
            })
            .collect()
    }

    /// Most recent metadata reported for `link_id`
    pub fn last_metadata(&self, link_id: LinkId) -> Option<MediaMetadata> {
        self.lock().calls.iter().rev().find_map(|call| match call {
            SinkCall::Metadata(id, meta) if *id == link_id => Some(meta.clone()),
            _ => None,
        })
    }
}

#[async_trait]
impl MediaControlSink for RecordingSink {
    async fn on_playback_state_changed(&self, link_id: LinkId, state: PlaybackState) {
        self.lock().calls.push(SinkCall::Playback(link_id, state));
    }

    async fn on_metadata_changed(&self, link_id: LinkId, metadata: &MediaMetadata) {
        self.lock()
            .calls
            .push(SinkCall::Metadata(link_id, metadata.clone()));
    }

    async fn request_focus(&self) -> Focus {
        let mut rec = self.lock();
        rec.calls.push(SinkCall::RequestFocus);
        rec.focus_answer
    }

    async fn release_focus(&self) {
        self.lock().calls.push(SinkCall::ReleaseFocus);
    }
}
