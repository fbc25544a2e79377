use actor_protocol::{MediaMetadata, PlaybackState};
use core_types::LinkId;
use std::collections::BTreeMap;

/// One connection to a remote Bluetooth peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub link_id: LinkId,
    pub profile: Option<String>,
    pub address: Option<String>,
    pub playback: PlaybackState,
    pub metadata: MediaMetadata,
}

impl Link {
    fn new(link_id: LinkId) -> Self {
        Self {
            link_id,
            profile: None,
            address: None,
            playback: PlaybackState::Stopped,
            metadata: MediaMetadata::default(),
        }
    }
}

/// At most one [`Link`] per link id
#[derive(Debug, Default)]
pub struct LinkTable {
    links: BTreeMap<LinkId, Link>,
    last_touched: Option<LinkId>,
}

impl LinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the link and mark it most recently used
    pub fn touch(&mut self, link_id: LinkId) -> &mut Link {
        self.last_touched = Some(link_id);
        self.links
            .entry(link_id)
            .or_insert_with(|| Link::new(link_id))
    }

    pub fn get(&self, link_id: LinkId) -> Option<&Link> {
        self.links.get(&link_id)
    }

    pub fn get_mut(&mut self, link_id: LinkId) -> Option<&mut Link> {
        self.links.get_mut(&link_id)
    }

    pub fn contains(&self, link_id: LinkId) -> bool {
        self.links.contains_key(&link_id)
    }

    pub fn remove(&mut self, link_id: LinkId) -> Option<Link> {
        if self.last_touched == Some(link_id) {
            self.last_touched = None;
        }
        self.links.remove(&link_id)
    }

    /// Ids of every link except `keep`
    pub fn others(&self, keep: LinkId) -> Vec<LinkId> {
        self.links.keys().copied().filter(|id| *id != keep).collect()
    }

    pub fn ids(&self) -> Vec<LinkId> {
        self.links.keys().copied().collect()
    }

    /// The playing link; the most recently touched one wins a tie
    pub fn playing(&self) -> Option<LinkId> {
        if let Some(id) = self.last_touched {
            if self.links.get(&id).map(|l| l.playback) == Some(PlaybackState::Playing) {
                return Some(id);
            }
        }
        self.links
            .values()
            .find(|l| l.playback == PlaybackState::Playing)
            .map(|l| l.link_id)
    }

    /// Default target for a host intent
    pub fn default_target(&self) -> Option<LinkId> {
        self.playing()
            .or(self.last_touched)
            .or_else(|| self.links.keys().next().copied())
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
