//! Connectivity monitor.
//!
//! Tracks whether the ingestion endpoint is believed reachable and tells
//! subscribers about each offline → online edge. Reachability reports come
//! from the host platform via [`ConnectivityMonitor::report`] or from a
//! [`ReachabilityProbe`] polled in the background.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use sync_core::{ReachabilityTracker, Transition};
use tokio::task::JoinHandle;

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Shared view of network reachability.
///
/// Clones share the same state and subscribers.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<Mutex<MonitorInner>>,
}

struct MonitorInner {
    tracker: ReachabilityTracker,
    subscribers: BTreeMap<u64, Callback>,
    next_id: u64,
}

impl ConnectivityMonitor {
    /// Create a monitor with the given initial reachability.
    ///
    /// Starting online does not count as a transition.
    pub fn new(initially_online: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MonitorInner {
                tracker: ReachabilityTracker::new(initially_online),
                subscribers: BTreeMap::new(),
                next_id: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the endpoint is currently believed reachable.
    pub fn is_online(&self) -> bool {
        self.lock().tracker.is_online()
    }

    /// Feed a reachability observation.
    ///
    /// Subscribers run once per offline → online edge, on the caller's
    /// task, after the monitor's lock is released.
    pub fn report(&self, reachable: bool) {
        let callbacks: Vec<Callback> = {
            let mut inner = self.lock();
            match inner.tracker.observe(reachable) {
                Some(Transition::BecameReachable) => {
                    tracing::info!(
                        "Connectivity restored, notifying {} subscribers",
                        inner.subscribers.len()
                    );
                    inner.subscribers.values().cloned().collect()
                }
                Some(Transition::BecameUnreachable) => {
                    tracing::info!("Connectivity lost");
                    Vec::new()
                }
                None => Vec::new(),
            }
        };

        for callback in callbacks {
            callback();
        }
    }

    /// Run `callback` on every offline → online transition.
    ///
    /// The callback stays registered until the returned [`Subscription`]
    /// is dropped or explicitly unsubscribed.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.insert(id, Arc::new(callback));

        Subscription {
            monitor: Arc::downgrade(&self.inner),
            id: Some(id),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Poll `probe` every `interval` and report what it sees.
    ///
    /// The task runs until the returned handle is aborted.
    pub fn spawn_poller<P>(&self, probe: P, interval: Duration) -> JoinHandle<()>
    where
        P: ReachabilityProbe + 'static,
    {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let reachable = probe.probe().await;
                monitor.report(reachable);
            }
        })
    }
}

impl fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("ConnectivityMonitor")
            .field("online", &inner.tracker.is_online())
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

/// Handle to a reachability subscription.
///
/// Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    monitor: Weak<Mutex<MonitorInner>>,
    id: Option<u64>,
}

impl Subscription {
    /// Stop receiving notifications.
    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        if let Some(monitor) = self.monitor.upgrade() {
            monitor
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .subscribers
                .remove(&id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Something that can check whether the endpoint is reachable.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// One reachability check.
    async fn probe(&self) -> bool;
}

/// Probe that succeeds when a TCP connection to `address` can be opened.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    /// Probe `address` (`host:port`), giving up after `timeout`.
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn probe(&self) -> bool {
        let connect = tokio::net::TcpStream::connect(&self.address);
        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!("Probe of {} failed: {}", self.address, e);
                false
            }
            Err(_) => {
                tracing::debug!("Probe of {} timed out", self.address);
                false
            }
        }
    }
}
