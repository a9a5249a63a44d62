//! Broadcast groups.
//!
//! Each live connection owns an outbox; a room's group is the set of
//! connections that receive its broadcasts. Delivery is best effort: a closed
//! outbox is skipped, and a full one drops the event.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::protocol::Outbound;

pub const OUTBOX_CAPACITY: usize = 256;

pub type Outbox = mpsc::Receiver<Outbound>;

#[derive(Debug, Default)]
struct Groups {
    outboxes: HashMap<Uuid, mpsc::Sender<Outbound>>,
    members: HashMap<String, Vec<Uuid>>,
}

#[derive(Debug, Default)]
pub struct Hub {
    groups: Mutex<Groups>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    fn groups(&self) -> MutexGuard<'_, Groups> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn connect(&self, connection: Uuid) -> Outbox {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        self.groups().outboxes.insert(connection, tx);
        rx
    }

    /// Forgets the connection and takes it out of every group.
    pub fn disconnect(&self, connection: Uuid) {
        let mut groups = self.groups();
        groups.outboxes.remove(&connection);
        groups.members.retain(|_, members| {
            members.retain(|member| *member != connection);
            !members.is_empty()
        });
    }

    pub fn join(&self, room: &str, connection: Uuid) {
        let mut groups = self.groups();
        let members = groups.members.entry(room.to_owned()).or_default();
        if !members.contains(&connection) {
            members.push(connection);
        }
    }

    /// Detaches every member from the room's group.
    pub fn evict_all(&self, room: &str) {
        self.groups().members.remove(room);
    }

    pub fn members(&self, room: &str) -> Vec<Uuid> {
        self.groups().members.get(room).cloned().unwrap_or_default()
    }

    pub fn emit(&self, connection: Uuid, event: Outbound) {
        if let Some(outbox) = self.groups().outboxes.get(&connection) {
            deliver(connection, outbox, event);
        }
    }

    pub fn broadcast(&self, room: &str, event: Outbound) {
        self.fan_out(room, None, event);
    }

    pub fn broadcast_except(&self, room: &str, sender: Uuid, event: Outbound) {
        self.fan_out(room, Some(sender), event);
    }

    fn fan_out(&self, room: &str, skip: Option<Uuid>, event: Outbound) {
        let groups = self.groups();
        let Some(members) = groups.members.get(room) else {
            return;
        };

        for member in members.iter().filter(|member| Some(**member) != skip) {
            if let Some(outbox) = groups.outboxes.get(member) {
                deliver(*member, outbox, event.clone());
            }
        }
    }
}

fn deliver(connection: Uuid, outbox: &mpsc::Sender<Outbound>, event: Outbound) {
    if let Err(TrySendError::Full(_)) = outbox.try_send(event) {
        tracing::warn!(%connection, "outbox full, event dropped");
    }
}
