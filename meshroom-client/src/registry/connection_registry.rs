use crate::registry::peer_link::PeerLink;
use crate::session::{LinkState, Role};
use crate::transport::{PeerTransportFactory, TransportEvent, TransportEventSink};
use anyhow::Result;
use meshroom_core::{IceServerConfig, ParticipantId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// All links of one local session, at most one per remote participant.
pub struct ConnectionRegistry {
    links: HashMap<ParticipantId, PeerLink>,
    factory: Arc<dyn PeerTransportFactory>,
    ice_servers: Vec<IceServerConfig>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    next_link_id: u64,
}

impl ConnectionRegistry {
    pub fn new(
        factory: Arc<dyn PeerTransportFactory>,
        ice_servers: Vec<IceServerConfig>,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            links: HashMap::new(),
            factory,
            ice_servers,
            event_tx,
            next_link_id: 1,
        }
    }

    /// Servers used for links created from now on.
    pub fn set_ice_servers(&mut self, ice_servers: Vec<IceServerConfig>) {
        self.ice_servers = ice_servers;
    }

    pub fn ice_servers(&self) -> &[IceServerConfig] {
        &self.ice_servers
    }

    /// Returns the link to `remote_id`, creating it with `role` if absent.
    /// The flag is true when the link was created by this call.
    pub async fn get_or_create(
        &mut self,
        remote_id: &ParticipantId,
        role: Role,
    ) -> Result<(&mut PeerLink, bool)> {
        if self.links.contains_key(remote_id) {
            let link = self
                .links
                .get_mut(remote_id)
                .ok_or_else(|| anyhow::anyhow!("link to {} vanished", remote_id))?;
            return Ok((link, false));
        }

        let link_id = self.next_link_id;
        self.next_link_id += 1;

        let sink = TransportEventSink::new(remote_id.clone(), link_id, self.event_tx.clone());
        let transport = self
            .factory
            .create(remote_id, &self.ice_servers, sink)
            .await?;

        info!("Created link #{} to {} as {:?}", link_id, remote_id, role);
        let link = self
            .links
            .entry(remote_id.clone())
            .or_insert(PeerLink::new(remote_id.clone(), link_id, role, transport));
        Ok((link, true))
    }

    pub fn get(&self, remote_id: &ParticipantId) -> Option<&PeerLink> {
        self.links.get(remote_id)
    }

    pub fn get_mut(&mut self, remote_id: &ParticipantId) -> Option<&mut PeerLink> {
        self.links.get_mut(remote_id)
    }

    pub fn contains(&self, remote_id: &ParticipantId) -> bool {
        self.links.contains_key(remote_id)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn remote_ids(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<ParticipantId> = self.links.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Closes the transport, drops buffered candidates and forgets the link.
    /// Returns the closed link's id, or `None` if there was no link.
    pub async fn close(&mut self, remote_id: &ParticipantId) -> Option<u64> {
        let mut link = self.links.remove(remote_id)?;
        link.pending_candidates.clear();
        link.state = LinkState::Closed;

        if let Err(e) = link.transport.close().await {
            warn!("Error closing link to {}: {:#}", remote_id, e);
        }
        debug!("Closed link #{} to {}", link.link_id, remote_id);
        Some(link.link_id)
    }

    /// Closes every link. Safe to call more than once.
    pub async fn close_all(&mut self) {
        for remote_id in self.remote_ids() {
            self.close(&remote_id).await;
        }
    }
}
