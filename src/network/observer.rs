//! Capability-set observer: keeps the active-network map for one request
//! and republishes a full projected snapshot on every change.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::session::{
    require_all, ListenerHandle, ObservableSession, ObserverError, ObserverSession, Permission,
    PermissionCheck, SessionState, TaskQueue,
};

use super::platform::{ConnectivityPlatform, NetworkCallback};
use super::types::{NetworkCapabilities, NetworkHandle};
use super::view::{AllNetworks, CellularView, NetworkView, WifiView};

/// Projected network map, keyed by network.
pub type NetworkSnapshot<E> = BTreeMap<NetworkHandle, E>;

#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent<E> {
    /// The complete current snapshot; never an incremental patch.
    NetworksChanged(NetworkSnapshot<E>),
}

#[derive(Debug)]
enum Work {
    Callback(NetworkCallback),
    Reset,
}

struct ActiveNetworks<V: NetworkView> {
    view: Arc<V>,
    networks: HashMap<NetworkHandle, NetworkCapabilities>,
    events: mpsc::UnboundedSender<NetworkEvent<V::Entry>>,
    published: watch::Sender<NetworkSnapshot<V::Entry>>,
}

impl<V: NetworkView> ActiveNetworks<V> {
    fn handle(&mut self, work: Work) {
        match work {
            Work::Callback(callback) => {
                self.apply(callback);
                self.publish();
            }
            Work::Reset => {
                self.networks.clear();
                self.published.send_replace(NetworkSnapshot::new());
            }
        }
    }

    fn apply(&mut self, callback: NetworkCallback) {
        match callback {
            NetworkCallback::CapabilitiesChanged(network, caps) => {
                self.networks.insert(network, caps);
            }
            NetworkCallback::Lost(network) => {
                if self.networks.remove(&network).is_none() {
                    tracing::trace!(%network, "Lost unknown network");
                }
            }
            NetworkCallback::Unavailable => self.networks.clear(),
        }
    }

    fn publish(&self) {
        let snapshot: NetworkSnapshot<V::Entry> = self
            .networks
            .iter()
            .filter_map(|(network, caps)| {
                self.view
                    .project(*network, caps)
                    .map(|entry| (*network, entry))
            })
            .collect();
        tracing::debug!(
            tracked = self.networks.len(),
            published = snapshot.len(),
            "Networks changed"
        );
        self.published.send_replace(snapshot.clone());
        if self.events.send(NetworkEvent::NetworksChanged(snapshot)).is_err() {
            tracing::trace!("Network listener gone, dropping snapshot");
        }
    }
}

/// Observer of the networks matching one request.
pub struct NetworkCapabilitySetObserver<P: ConnectivityPlatform, V: NetworkView> {
    platform: Arc<P>,
    view: Arc<V>,
    queue: TaskQueue<Work>,
    permissions: Arc<dyn PermissionCheck>,
    session: ObserverSession,
    registration: Option<ListenerHandle>,
    snapshot: watch::Receiver<NetworkSnapshot<V::Entry>>,
}

/// Cellular data networks resolved to their subscriptions.
pub type CellularDataObserver<P, R> = NetworkCapabilitySetObserver<P, CellularView<R>>;

/// Wi-Fi networks with their transport info.
pub type WifiObserver<P> = NetworkCapabilitySetObserver<P, WifiView>;

/// All networks of a request with full capabilities.
pub type NetworkObserver<P> = NetworkCapabilitySetObserver<P, AllNetworks>;

impl<P: ConnectivityPlatform, V: NetworkView> NetworkCapabilitySetObserver<P, V> {
    /// Must be called from within a tokio runtime.
    pub fn new(
        platform: Arc<P>,
        view: V,
        permissions: Arc<dyn PermissionCheck>,
    ) -> (Self, mpsc::UnboundedReceiver<NetworkEvent<V::Entry>>) {
        let (events, rx) = mpsc::unbounded_channel();
        let (published, snapshot) = watch::channel(NetworkSnapshot::new());
        let view = Arc::new(view);

        let mut active = ActiveNetworks {
            view: Arc::clone(&view),
            networks: HashMap::new(),
            events,
            published,
        };
        let queue = TaskQueue::spawn("network", move |work: Work| active.handle(work));

        (
            Self {
                platform,
                view,
                queue,
                permissions,
                session: ObserverSession::new("network"),
                registration: None,
                snapshot,
            },
            rx,
        )
    }

    /// Copy of the last published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> NetworkSnapshot<V::Entry> {
        self.snapshot.borrow().clone()
    }

    /// Receiver that always holds the latest snapshot.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<NetworkSnapshot<V::Entry>> {
        self.snapshot.clone()
    }

    /// The system default network.
    #[must_use]
    pub fn active_network(&self) -> Option<NetworkHandle> {
        self.platform.active_network()
    }

    /// Wait until every queued callback has been handled.
    ///
    /// # Errors
    ///
    /// Returns `ObserverError::ChannelClosed` if the queue has shut down.
    pub async fn flush(&self) -> Result<(), ObserverError> {
        self.queue.flush().await
    }

    pub async fn shutdown(mut self) {
        let _ = self.stop_observing();
        self.queue.shutdown().await;
    }
}

impl<P: ConnectivityPlatform, V: NetworkView> ObservableSession for NetworkCapabilitySetObserver<P, V> {
    fn start_observing(&mut self) -> Result<(), ObserverError> {
        require_all(self.permissions.as_ref(), &[Permission::NetworkState])?;
        require_all(self.permissions.as_ref(), self.view.extra_permissions())?;
        if self.session.is_observing() {
            tracing::debug!("Network observer already observing");
            return Ok(());
        }

        let request = self.view.request();
        let sink = self.queue.sink().map(Work::Callback);
        self.registration = Some(self.platform.register_network_callback(&request, sink)?);
        self.session.begin();
        tracing::info!(?request, "Observing networks");
        Ok(())
    }

    fn stop_observing(&mut self) -> Result<(), ObserverError> {
        if !self.session.end() {
            return Ok(());
        }
        if let Some(handle) = self.registration.take() {
            self.platform.unregister_network_callback(handle);
        }
        self.queue.push(Work::Reset);
        Ok(())
    }

    fn state(&self) -> SessionState {
        self.session.state()
    }
}
