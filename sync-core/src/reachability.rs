//! Reachability edge detection.
//!
//! Platform reachability signals are level-triggered and noisy: pollers
//! report "online" over and over. The tracker collapses them into edges so
//! that subscribers hear about each offline → online transition once.

/// A change in reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Offline → online.
    BecameReachable,
    /// Online → offline.
    BecameUnreachable,
}

/// Tracks the last observed reachability and reports edges.
#[derive(Debug, Clone)]
pub struct ReachabilityTracker {
    online: bool,
}

impl ReachabilityTracker {
    /// Create a tracker with a known initial reachability.
    ///
    /// Starting online produces no event; the first edge is the first
    /// observed change.
    pub fn new(online: bool) -> Self {
        Self { online }
    }

    /// Record an observation and return the edge it caused, if any.
    pub fn observe(&mut self, reachable: bool) -> Option<Transition> {
        let transition = match (self.online, reachable) {
            (false, true) => Some(Transition::BecameReachable),
            (true, false) => Some(Transition::BecameUnreachable),
            _ => None,
        };
        self.online = reachable;
        transition
    }

    /// Last observed reachability.
    pub fn is_online(&self) -> bool {
        self.online
    }
}
