//! Event system for portal operations
//!
//! Provides an event bus for notifying listeners about portal operations.
//! Useful for:
//! - Audit logging
//! - Real-time notifications
//! - Sync triggers

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Portal events emitted by services
#[derive(Debug, Clone)]
pub enum PortalEvent {
    // Identity events
    IdentityOnboarded {
        id: String,
        usn: String,
    },
    BioUpdated {
        id: String,
    },
    ProfileSynced {
        id: String,
    },

    // Content events
    NoteUploaded {
        id: String,
        subject: String,
        semester: String,
    },

    // Social graph events
    FollowToggled {
        follower_id: String,
        following_id: String,
        following: bool,
    },

    // Administrative events
    BadgeGranted {
        usn: String,
        badge_type: String,
    },
    SemesterPromoted {
        from: String,
        to: String,
        count: u64,
    },
    CycleRotated {
        from: String,
        to: String,
        count: u64,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    /// Handle an event
    fn on_event(&self, event: &PortalEvent);
}

/// Event bus for broadcasting portal events
pub struct EventBus {
    sender: broadcast::Sender<PortalEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new event bus with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: PortalEvent) {
        trace!(event = ?event, "Emitting portal event");
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PortalEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &PortalEvent) {
        match event {
            PortalEvent::IdentityOnboarded { id, usn } => {
                debug!(id = %id, usn = %usn, "Identity onboarded");
            }
            PortalEvent::NoteUploaded { id, subject, semester } => {
                debug!(id = %id, subject = %subject, semester = %semester, "Note uploaded");
            }
            PortalEvent::FollowToggled {
                follower_id,
                following_id,
                following,
            } => {
                debug!(
                    follower = %follower_id,
                    following = %following_id,
                    state = following,
                    "Follow toggled"
                );
            }
            PortalEvent::BadgeGranted { usn, badge_type } => {
                debug!(usn = %usn, badge_type = %badge_type, "Badge granted");
            }
            PortalEvent::SemesterPromoted { from, to, count } => {
                debug!(from = %from, to = %to, count = count, "Semester promoted");
            }
            _ => {
                trace!(event = ?event, "Portal event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_emit_receive() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.emit(PortalEvent::FollowToggled {
            follower_id: "a".into(),
            following_id: "b".into(),
            following: true,
        });

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .expect("timeout")
            .expect("receive error");

        match event {
            PortalEvent::FollowToggled {
                follower_id,
                following,
                ..
            } => {
                assert_eq!(follower_id, "a");
                assert!(following);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_event_bus_no_subscribers() {
        let bus = EventBus::new();
        // Should not panic even with no subscribers
        bus.emit(PortalEvent::BioUpdated { id: "user-1".into() });
    }
}
