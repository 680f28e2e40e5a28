//! # Node Runtime
//!
//! Owns the container and the shutdown channel shared by every background
//! loop (liveness monitors, locality sensors, the merge engine).
//!
//! ## Startup Sequence
//!
//! 1. Boot the coordinator (identity, presence, pinned RPC endpoint,
//!    liveness monitor, merge engine, topology binding)
//! 2. Boot storage peers and their locality sensors
//! 3. Attach storage peers at the rendezvous (demo mode)
//! 4. Fail fast if any peer already sees two coordinators
//! 5. Report the topology and re-check coordinators every interval until
//!    shutdown; a second coordinator surfaces through
//!    [`NodeRuntime::fatal_error`]

use crate::container::subsystems::check_coordinators;
use crate::container::{NodeConfig, StartupError, SubsystemContainer};
use pc_01_membership::{AdvertisementDirectory, Peer};
use pc_02_locality::BroadcastTopology;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Upper bound on waiting for background loops after the shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct NodeRuntime {
    container: SubsystemContainer,
    tasks: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    fatal_rx: Option<oneshot::Receiver<StartupError>>,
}

impl NodeRuntime {
    /// Runtime on a private in-process directory (demo mode).
    #[must_use]
    pub fn new(config: NodeConfig) -> Self {
        info!(mode = %config.node.mode, "creating PeerCloud node runtime");
        Self::from_container(SubsystemContainer::new(config))
    }

    /// Runtime on a directory shared with the rest of the cluster.
    #[must_use]
    pub fn with_directory(config: NodeConfig, directory: Arc<dyn AdvertisementDirectory>) -> Self {
        info!(mode = %config.node.mode, "creating PeerCloud node runtime on a shared directory");
        Self::from_container(SubsystemContainer::with_directory(config, directory))
    }

    fn from_container(container: SubsystemContainer) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            container,
            tasks: Vec::new(),
            shutdown_tx,
            shutdown_rx,
            fatal_rx: None,
        }
    }

    /// Boot every subsystem, then start the coordinator guard and the topology reporter.
    pub fn start(&mut self) -> Result<(), StartupError> {
        info!("===========================================");
        info!("  PeerCloud Node Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        self.container.start(&self.shutdown_rx)?;
        self.tasks.extend(self.container.take_tasks());

        let peers = self.container.peers();
        if let Err(e) = check_coordinators(&peers) {
            error!(error = %e, "cluster misconfigured at startup");
            self.shutdown_tx.send_replace(true);
            return Err(e);
        }
        let (fatal_tx, fatal_rx) = oneshot::channel();
        self.fatal_rx = Some(fatal_rx);
        self.tasks.push(tokio::spawn(guard_coordinators(
            peers,
            self.container.config().membership.sweep_interval(),
            self.shutdown_rx.clone(),
            fatal_tx,
        )));

        if let Some(topology) = self.container.topology() {
            let interval = self.container.config().locality.poll_interval();
            self.tasks.push(tokio::spawn(report_topology(
                Arc::clone(topology),
                interval,
                self.shutdown_rx.clone(),
            )));
        }
        info!(tasks = self.tasks.len(), "node started");
        Ok(())
    }

    pub fn container(&self) -> &SubsystemContainer {
        &self.container
    }

    /// Resolves once a background check finds the cluster unusable.
    /// Pends forever otherwise, so it can sit in a `select!` next to Ctrl+C.
    pub async fn fatal_error(&mut self) -> StartupError {
        let Some(rx) = self.fatal_rx.as_mut() else {
            return std::future::pending().await;
        };
        let received = rx.await;
        self.fatal_rx = None;
        match received {
            Ok(e) => e,
            Err(_) => std::future::pending().await,
        }
    }

    /// Signal every loop to stop and wait for them, bounded by a grace period.
    pub async fn shutdown(&mut self) {
        info!("initiating graceful shutdown");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!(error = %e, "failed to send shutdown signal");
        }

        for task in self.tasks.drain(..) {
            match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "background task failed"),
                Err(_) => warn!("background task did not stop within the grace period"),
            }
        }

        if let Some(topology) = self.container.topology() {
            info!("final topology:\n{topology}");
        }
        info!("shutdown complete");
    }
}

/// Re-check every peer's coordinator view each sweep interval.
async fn guard_coordinators(
    peers: Vec<Arc<Peer>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    fatal: oneshot::Sender<StartupError>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    while !*shutdown.borrow() {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = check_coordinators(&peers) {
                    error!(error = %e, "cluster misconfigured");
                    if fatal.send(e).is_err() {
                        warn!("fatal error dropped; runtime already gone");
                    }
                    return;
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}

async fn report_topology(
    topology: Arc<BroadcastTopology>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    while !*shutdown.borrow() {
        tokio::select! {
            _ = ticker.tick() => {
                info!(
                    domains = topology.num_domains(),
                    peers = topology.num_peers(),
                    "topology"
                );
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}
