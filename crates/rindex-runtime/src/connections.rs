//! Table of live client connections.
//!
//! Each connection is owned by the registry under a generated UUID v7 and
//! carries a [`ConnectionSink`] that delivers serialized [`Envelope`]s.
//! Connections subscribe to named channels; events can be pushed to one
//! connection, to every connection matching a predicate, or to the
//! subscribers of a set of channels.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use rindex_types::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{RuntimeError, RuntimeResult};

pub type ConnectionId = Uuid;

/// Wire form of a pushed event: `{"en": <event>, "ed": <data>}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "en")]
    pub event: String,
    #[serde(rename = "ed")]
    pub data: Value,
}

impl Envelope {
    pub fn new<T: Serialize + ?Sized>(event: impl Into<String>, data: &T) -> RuntimeResult<Self> {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_value(data)?,
        })
    }

    pub fn to_json(&self) -> RuntimeResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Outbound half of a client connection.
#[async_trait]
pub trait ConnectionSink: Send + Sync {
    /// Deliver one serialized envelope.
    async fn send(&self, id: ConnectionId, payload: String) -> RuntimeResult<()>;
}

/// Sink backed by an unbounded tokio channel; the receiver side is handed to
/// whatever writes to the client.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ConnectionSink for ChannelSink {
    async fn send(&self, id: ConnectionId, payload: String) -> RuntimeResult<()> {
        self.tx
            .send(payload)
            .map_err(|_| RuntimeError::ConnectionClosed(id))
    }
}

/// What predicates passed to [`ConnectionRegistry::broadcast`] can see.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub channels: BTreeSet<String>,
    pub connected_at: Timestamp,
}

struct Connection {
    info: ConnectionInfo,
    sink: Arc<dyn ConnectionSink>,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and return its generated id.
    pub fn add(&self, sink: Arc<dyn ConnectionSink>) -> ConnectionId {
        let id = Uuid::now_v7();
        let info = ConnectionInfo {
            id,
            channels: BTreeSet::new(),
            connected_at: Timestamp::now(),
        };
        self.write().insert(id, Connection { info, sink });
        debug!(connection = %id, "connection added");
        id
    }

    /// Forget a connection. Returns `false` if it was not registered.
    pub fn remove(&self, id: &ConnectionId) -> bool {
        let removed = self.write().remove(id).is_some();
        if removed {
            debug!(connection = %id, "connection removed");
        }
        removed
    }

    /// Subscribe a connection to a channel. Returns `false` if it already was.
    pub fn subscribe(&self, id: &ConnectionId, channel: &str) -> RuntimeResult<bool> {
        let mut connections = self.write();
        let connection = connections
            .get_mut(id)
            .ok_or(RuntimeError::UnknownConnection(*id))?;
        Ok(connection.info.channels.insert(channel.to_string()))
    }

    pub fn unsubscribe(&self, id: &ConnectionId, channel: &str) -> RuntimeResult<bool> {
        let mut connections = self.write();
        let connection = connections
            .get_mut(id)
            .ok_or(RuntimeError::UnknownConnection(*id))?;
        Ok(connection.info.channels.remove(channel))
    }

    pub fn info(&self, id: &ConnectionId) -> Option<ConnectionInfo> {
        self.read().get(id).map(|c| c.info.clone())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Push an event to one connection.
    pub async fn emit<T: Serialize + ?Sized>(
        &self,
        id: &ConnectionId,
        event: &str,
        data: &T,
    ) -> RuntimeResult<()> {
        let sink = self
            .read()
            .get(id)
            .map(|c| Arc::clone(&c.sink))
            .ok_or(RuntimeError::UnknownConnection(*id))?;
        let payload = Envelope::new(event, data)?.to_json()?;
        sink.send(*id, payload).await
    }

    /// Push an event to every connection matching `predicate`. Returns how
    /// many connections received it.
    pub async fn broadcast<P, T>(&self, predicate: P, event: &str, data: &T) -> RuntimeResult<usize>
    where
        P: Fn(&ConnectionInfo) -> bool,
        T: Serialize + ?Sized,
    {
        let targets = self.targets(|info| predicate(info));
        self.deliver(targets, event, data).await
    }

    /// Push an event once to every connection subscribed to any of
    /// `channels`. Returns how many connections received it.
    pub async fn channel_emit<S, T>(&self, channels: &[S], event: &str, data: &T) -> RuntimeResult<usize>
    where
        S: AsRef<str>,
        T: Serialize + ?Sized,
    {
        let targets = self.targets(|info| {
            channels
                .iter()
                .any(|channel| info.channels.contains(channel.as_ref()))
        });
        self.deliver(targets, event, data).await
    }

    fn targets(
        &self,
        predicate: impl Fn(&ConnectionInfo) -> bool,
    ) -> Vec<(ConnectionId, Arc<dyn ConnectionSink>)> {
        self.read()
            .values()
            .filter(|c| predicate(&c.info))
            .map(|c| (c.info.id, Arc::clone(&c.sink)))
            .collect()
    }

    /// Send to each target; connections whose sink fails are dropped.
    async fn deliver<T: Serialize + ?Sized>(
        &self,
        targets: Vec<(ConnectionId, Arc<dyn ConnectionSink>)>,
        event: &str,
        data: &T,
    ) -> RuntimeResult<usize> {
        let payload = Envelope::new(event, data)?.to_json()?;
        let mut delivered = 0;
        for (id, sink) in targets {
            match sink.send(id, payload.clone()).await {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(connection = %id, event, error = %err, "dropping unreachable connection");
                    self.remove(&id);
                }
            }
        }
        Ok(delivered)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ConnectionId, Connection>> {
        self.connections.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ConnectionId, Connection>> {
        self.connections.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connections", &self.len())
            .finish()
    }
}
