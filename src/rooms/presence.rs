//! Who is connected to which room, in join order.
//!
//! Presence describes this process's live sockets only. It starts empty and is
//! never persisted.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEntry {
    pub connection: Uuid,
    pub name: String,
}

#[derive(Debug, Default)]
pub struct Presence {
    rooms: Mutex<BTreeMap<String, Vec<PresenceEntry>>>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    fn rooms(&self) -> MutexGuard<'_, BTreeMap<String, Vec<PresenceEntry>>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_member(&self, room: &str, connection: Uuid, name: &str) {
        self.rooms()
            .entry(room.to_owned())
            .or_default()
            .push(PresenceEntry { connection, name: name.to_owned() });
    }

    /// Drops the connection from every room it appears in and returns those rooms.
    pub fn remove_member(&self, connection: Uuid) -> Vec<String> {
        let mut rooms = self.rooms();
        let mut left = Vec::new();

        rooms.retain(|code, members| {
            let before = members.len();
            members.retain(|entry| entry.connection != connection);
            if members.len() != before {
                left.push(code.clone());
            }
            !members.is_empty()
        });

        left
    }

    pub fn list_names(&self, room: &str) -> Vec<String> {
        self.rooms()
            .get(room)
            .map(|members| members.iter().map(|entry| entry.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn clear(&self, room: &str) {
        self.rooms().remove(room);
    }

    pub fn contains(&self, room: &str, connection: Uuid) -> bool {
        self.rooms()
            .get(room)
            .is_some_and(|members| members.iter().any(|entry| entry.connection == connection))
    }
}
