//! Change notifications for table writes.
//!
//! Every successful write through [`crate::store::Notifying`] is published on a
//! broadcast channel. Subscribers filter by table and are expected to refetch
//! whatever they display; events carry the row id only, not the row.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Profiles,
    Sweets,
    Orders,
    Settings,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Profiles => "profiles",
            Table::Sweets => "sweets",
            Table::Orders => "orders",
            Table::Settings => "settings",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profiles" => Ok(Table::Profiles),
            "sweets" => Ok(Table::Sweets),
            "orders" => Ok(Table::Orders),
            "settings" => Ok(Table::Settings),
            other => Err(format!("unknown table: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub id: String,
}

#[derive(Clone)]
pub struct ChangeHub {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        ChangeHub { tx }
    }

    pub fn publish(&self, table: Table, kind: ChangeKind, id: impl Into<String>) {
        let event = ChangeEvent { table, kind, id: id.into() };
        log::debug!("change on {}: {:?} {}", event.table, event.kind, event.id);
        // No subscribers is not an error
        let _ = self.tx.send(event);
    }

    /// Subscribe to one table, or to every table with `None`.
    pub fn subscribe(&self, table: Option<Table>) -> Subscription {
        Subscription { rx: self.tx.subscribe(), table }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A live subscription. Dropping it (or calling [`Subscription::unsubscribe`]) detaches it.
pub struct Subscription {
    rx: broadcast::Receiver<ChangeEvent>,
    table: Option<Table>,
}

impl Subscription {
    /// Next matching event; `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("realtime subscriber lagged, skipped {} events", skipped);
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking poll for an already-delivered matching event.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}

    fn matches(&self, event: &ChangeEvent) -> bool {
        self.table.map_or(true, |t| t == event.table)
    }
}
