use crate::channel::Role;
use crate::link::LinkState;
use tandem_core::SessionId;

/// Read-only view of one remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerView {
    pub id: SessionId,
    /// Name taken from the room roster.
    pub provisional_name: String,
    /// Name the peer announced over its own channel.
    pub confirmed_name: Option<String>,
    pub role: Role,
    pub state: LinkState,
    pub open: bool,
}

impl PeerView {
    pub fn display_name(&self) -> &str {
        self.confirmed_name
            .as_deref()
            .unwrap_or(&self.provisional_name)
    }
}

/// Peers with a live link, in the order they were added.
#[derive(Debug, Default)]
pub struct PeerDirectory {
    peers: Vec<PeerView>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a peer, replacing any earlier entry for the same session.
    pub fn insert(&mut self, id: SessionId, name: impl Into<String>, role: Role) {
        let view = PeerView {
            id,
            provisional_name: name.into(),
            confirmed_name: None,
            role,
            state: LinkState::Idle,
            open: false,
        };
        match self.get_mut(&id) {
            Some(existing) => *existing = view,
            None => self.peers.push(view),
        }
    }

    pub fn set_state(&mut self, id: &SessionId, state: LinkState) {
        if let Some(peer) = self.get_mut(id) {
            peer.state = state;
        }
    }

    pub fn mark_open(&mut self, id: &SessionId) {
        if let Some(peer) = self.get_mut(id) {
            peer.open = true;
        }
    }

    /// Records the self-announced name; returns true when it changed.
    pub fn confirm(&mut self, id: &SessionId, name: impl Into<String>) -> bool {
        let name = name.into();
        match self.get_mut(id) {
            Some(peer) if peer.confirmed_name.as_deref() != Some(name.as_str()) => {
                peer.confirmed_name = Some(name);
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, id: &SessionId) -> Option<PeerView> {
        let index = self.peers.iter().position(|p| p.id == *id)?;
        Some(self.peers.remove(index))
    }

    pub fn get(&self, id: &SessionId) -> Option<&PeerView> {
        self.peers.iter().find(|p| p.id == *id)
    }

    fn get_mut(&mut self, id: &SessionId) -> Option<&mut PeerView> {
        self.peers.iter_mut().find(|p| p.id == *id)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.get(id).is_some()
    }

    pub fn snapshot(&self) -> Vec<PeerView> {
        self.peers.clone()
    }

    pub fn clear(&mut self) {
        self.peers.clear();
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
