// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// Event Bus Implementation - Pub/Sub for Domain Events
//
// Provides in-memory event streaming using tokio broadcast channels.
// Workflows publish after their unit of work commits, so subscribers only
// ever observe committed state. Events are lost on restart.

use crate::domain::activity::ActivityId;
use crate::domain::events::{ActivityEvent, ApplicationEvent, AttendanceEvent, DeletionRequestEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Unified domain event type for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Activity(ActivityEvent),
    Application(ApplicationEvent),
    Attendance(AttendanceEvent),
    DeletionRequest(DeletionRequestEvent),
}

impl DomainEvent {
    /// Live activity the event refers to, if any
    pub fn activity_id(&self) -> Option<ActivityId> {
        match self {
            DomainEvent::Activity(event) => Some(match event {
                ActivityEvent::ActivityCreated { activity_id, .. }
                | ActivityEvent::ActivityUpdated { activity_id, .. }
                | ActivityEvent::ActivityModerated { activity_id, .. }
                | ActivityEvent::ActivityStatusChanged { activity_id, .. }
                | ActivityEvent::ActivityDeleted { activity_id, .. } => *activity_id,
            }),
            DomainEvent::Application(event) => match event {
                ApplicationEvent::ApplicationSubmitted { activity_id, .. }
                | ApplicationEvent::ApplicationApproved { activity_id, .. } => Some(*activity_id),
                ApplicationEvent::ApplicationRejected { activity_id, .. }
                | ApplicationEvent::ApplicationCancelled { activity_id, .. } => *activity_id,
            },
            DomainEvent::Attendance(event) => Some(match event {
                AttendanceEvent::CheckInCodeIssued { activity_id, .. }
                | AttendanceEvent::StudentCheckedIn { activity_id, .. }
                | AttendanceEvent::StudentsMarkedAbsent { activity_id, .. } => *activity_id,
            }),
            DomainEvent::DeletionRequest(event) => match event {
                DeletionRequestEvent::DeletionRequested { activity_id, .. } => Some(*activity_id),
                DeletionRequestEvent::DeletionRequestApproved { activity_id, .. } => *activity_id,
                DeletionRequestEvent::DeletionRequestRejected { .. } => None,
            },
        }
    }
}

/// Event bus for publishing and subscribing to domain events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish_activity_event(&self, event: ActivityEvent) {
        self.publish(DomainEvent::Activity(event));
    }

    pub fn publish_application_event(&self, event: ApplicationEvent) {
        self.publish(DomainEvent::Application(event));
    }

    pub fn publish_attendance_event(&self, event: AttendanceEvent) {
        self.publish(DomainEvent::Attendance(event));
    }

    pub fn publish_deletion_request_event(&self, event: DeletionRequestEvent) {
        self.publish(DomainEvent::DeletionRequest(event));
    }

    fn publish(&self, event: DomainEvent) {
        debug!("Publishing event: {:?}", event);

        // send() only fails when nobody is subscribed
        let receiver_count = self.sender.send(event).unwrap_or(0);

        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all domain events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to the events of a single activity
    pub fn subscribe_activity(&self, activity_id: ActivityId) -> ActivityEventReceiver {
        ActivityEventReceiver {
            receiver: self.sender.subscribe(),
            activity_id,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all domain events
pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver filtered to one activity
pub struct ActivityEventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
    activity_id: ActivityId,
}

impl ActivityEventReceiver {
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.activity_id() == Some(self.activity_id) {
                return Ok(event);
            }
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activity::ActivityStatus;
    use crate::domain::actor::UserId;
    use chrono::Utc;

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let activity_id = ActivityId::new();
        event_bus.publish_activity_event(ActivityEvent::ActivityCreated {
            activity_id,
            organizer_id: UserId::new(),
            created_at: Utc::now(),
        });

        match receiver.recv().await.unwrap() {
            DomainEvent::Activity(ActivityEvent::ActivityCreated { activity_id: id, .. }) => {
                assert_eq!(id, activity_id);
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_activity_event_filtering() {
        let event_bus = EventBus::new(10);
        let activity_id = ActivityId::new();
        let mut receiver = event_bus.subscribe_activity(activity_id);

        event_bus.publish_activity_event(ActivityEvent::ActivityStatusChanged {
            activity_id: ActivityId::new(),
            from: ActivityStatus::Open,
            to: ActivityStatus::Upcoming,
            changed_at: Utc::now(),
        });
        event_bus.publish_attendance_event(AttendanceEvent::StudentsMarkedAbsent {
            activity_id,
            count: 3,
            marked_at: Utc::now(),
        });

        match receiver.recv().await.unwrap() {
            DomainEvent::Attendance(AttendanceEvent::StudentsMarkedAbsent { count, .. }) => {
                assert_eq!(count, 3);
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus.publish_deletion_request_event(DeletionRequestEvent::DeletionRequestRejected {
            request_id: crate::domain::deletion_request::DeletionRequestId::new(),
            reviewer_id: UserId::new(),
            reviewed_at: Utc::now(),
        });

        let _ = receiver1.recv().await.unwrap();
        let _ = receiver2.recv().await.unwrap();
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = DomainEvent::Application(ApplicationEvent::ApplicationCancelled {
            application_id: crate::domain::application::ApplicationId::new(),
            activity_id: None,
            seat_released: true,
            cancelled_at: Utc::now(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "application");
        assert!(json.get("ApplicationCancelled").is_some());
    }

    #[test]
    fn test_try_recv_empty() {
        let event_bus = EventBus::new(4);
        let mut receiver = event_bus.subscribe();
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }
}
