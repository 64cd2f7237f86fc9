//! The `EventSink` capability: live emission of structured events at every
//! action/cluster/node status transition.
//!
//! This is deliberately decoupled from [`fleetcore_store::StoredEvent`]: the
//! sink is the live-forwarding side of the same data (§6), the Store's
//! `StoredEvent` table is its durable counterpart. A caller that wants both
//! persists a `StoredEvent` through the Store and emits an [`Event`] here;
//! neither crate depends on the other.
use std::sync::Arc;

use anyhow::Result;
use fleetcore_context::Context;
use fleetcore_models::DataMap;
use fleetcore_models::EventLevel;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

/// One structured event describing a status transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub level: EventLevel,
    /// Id of the object the event is about (cluster id, node id, action id).
    pub oid: String,
    /// Kind of object, e.g. `"CLUSTER"`, `"NODE"`, `"ACTION"`.
    pub otype: String,
    pub oname: String,
    pub cluster_id: String,
    pub action: String,
    pub status: String,
    pub reason: String,
    pub project: String,
    #[serde(default)]
    pub meta: DataMap,
    pub timestamp: OffsetDateTime,
}

impl Event {
    pub fn new(otype: &'static str, oid: impl Into<String>, oname: impl Into<String>, cluster_id: impl Into<String>, project: impl Into<String>) -> Self {
        Event {
            level: EventLevel::Info,
            oid: oid.into(),
            otype: otype.to_string(),
            oname: oname.into(),
            cluster_id: cluster_id.into(),
            action: String::new(),
            status: String::new(),
            reason: String::new(),
            project: project.into(),
            meta: DataMap::new(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn level(mut self, level: EventLevel) -> Self {
        self.level = level;
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }
}

/// Emits events to the backing event streaming platform.
#[derive(Clone)]
pub struct Events(Arc<dyn EventsBackend>);

impl Events {
    pub async fn emit(&self, context: &Context, event: Event) -> Result<()> {
        self.0.emit(context, event).await
    }
}

impl<T> From<T> for Events
where
    T: EventsBackend + 'static,
{
    fn from(value: T) -> Self {
        Events(Arc::new(value))
    }
}

/// Operations implemented by event streaming platforms.
#[async_trait::async_trait]
pub trait EventsBackend: Send + Sync {
    async fn emit(&self, context: &Context, event: Event) -> Result<()>;
}

#[cfg(any(test, feature = "test-fixture"))]
pub use self::fixture::EventsFixture;
#[cfg(any(test, feature = "test-fixture"))]
pub use self::fixture::EventsFixtureBackend;

#[cfg(any(test, feature = "test-fixture"))]
mod fixture {
    use std::time::Duration;

    use anyhow::Result;
    use fleetcore_context::Context;
    use tokio::sync::broadcast;
    use tokio::sync::broadcast::Receiver;
    use tokio::sync::broadcast::Sender;

    use super::Event;
    use super::EventsBackend;

    /// Introspection tools for events emitted during unit tests.
    pub struct EventsFixture {
        events: Receiver<Event>,
        send: Sender<Event>,
    }

    impl Clone for EventsFixture {
        fn clone(&self) -> Self {
            EventsFixture {
                events: self.send.subscribe(),
                send: self.send.clone(),
            }
        }
    }

    impl Default for EventsFixture {
        fn default() -> Self {
            EventsFixture::new()
        }
    }

    impl EventsFixture {
        pub fn new() -> EventsFixture {
            let (send, events) = broadcast::channel(64);
            EventsFixture { events, send }
        }

        pub fn backend(&self) -> EventsFixtureBackend {
            EventsFixtureBackend { send: self.send.clone() }
        }

        pub async fn pop(&mut self) -> Result<Event> {
            let event = self.events.recv().await?;
            Ok(event)
        }

        pub async fn pop_timeout(&mut self, timeout: Duration) -> Result<Event> {
            tokio::time::timeout(timeout, self.pop()).await?
        }
    }

    /// Events backend for unit tests.
    pub struct EventsFixtureBackend {
        send: Sender<Event>,
    }

    #[async_trait::async_trait]
    impl EventsBackend for EventsFixtureBackend {
        async fn emit(&self, _context: &Context, event: Event) -> Result<()> {
            self.send.send(event)?;
            Ok(())
        }
    }
}
