//! Recently visited rooms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_core::RoomId;

use crate::error::StoreError;
use crate::store::{KeyValueStore, load_json, save_json};

pub const HISTORY_KEY: &str = "tally-room-history";
pub const MAX_HISTORY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomHistoryEntry {
    pub room_id: RoomId,
    pub last_visited: DateTime<Utc>,
    pub player_names: Vec<String>,
}

/// At most [`MAX_HISTORY`] entries, one per room, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomHistory {
    entries: Vec<RoomHistoryEntry>,
}

impl RoomHistory {
    pub fn load(store: &dyn KeyValueStore) -> Result<Self, StoreError> {
        let entries: Vec<RoomHistoryEntry> = load_json(store, HISTORY_KEY)?.unwrap_or_default();
        let mut history = Self::default();
        for entry in entries {
            history.record(entry);
        }
        Ok(history)
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        save_json(store, HISTORY_KEY, &self.entries)
    }

    pub fn entries(&self) -> &[RoomHistoryEntry] {
        &self.entries
    }

    /// Inserts or replaces the entry for `entry.room_id`.
    pub fn record(&mut self, entry: RoomHistoryEntry) {
        match self.entries.iter_mut().find(|e| e.room_id == entry.room_id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self.entries
            .sort_by(|a, b| b.last_visited.cmp(&a.last_visited));
        self.entries.truncate(MAX_HISTORY);
    }

    pub fn remove(&mut self, room_id: &RoomId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.room_id != room_id);
        self.entries.len() != before
    }
}

/// Loads, records and saves in one step.
pub fn record_visit(store: &dyn KeyValueStore, entry: RoomHistoryEntry) -> Result<(), StoreError> {
    let mut history = RoomHistory::load(store)?;
    history.record(entry);
    history.save(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeDelta;

    fn entry(room: &str, minutes_ago: i64) -> RoomHistoryEntry {
        RoomHistoryEntry {
            room_id: room.parse().unwrap(),
            last_visited: Utc::now() - TimeDelta::minutes(minutes_ago),
            player_names: vec![format!("{room}-player")],
        }
    }

    #[test]
    fn test_capped_and_sorted() {
        let mut history = RoomHistory::default();
        for i in 0..15 {
            history.record(entry(&format!("R{i}"), i64::from(i)));
        }
        assert_eq!(history.entries().len(), MAX_HISTORY);
        assert_eq!(history.entries()[0].room_id.as_str(), "R0");
        assert!(
            history
                .entries()
                .windows(2)
                .all(|w| w[0].last_visited >= w[1].last_visited)
        );
    }

    #[test]
    fn test_upsert_keeps_one_entry_per_room() {
        let mut history = RoomHistory::default();
        history.record(entry("AB12", 30));
        history.record(entry("CD34", 10));
        let mut again = entry("AB12", 0);
        again.player_names = vec!["Renamed".to_string()];
        history.record(again);

        assert_eq!(history.entries().len(), 2);
        assert_eq!(history.entries()[0].room_id.as_str(), "AB12");
        assert_eq!(history.entries()[0].player_names, vec!["Renamed".to_string()]);
    }

    #[test]
    fn test_persist_and_remove() {
        let store = MemoryStore::new();
        record_visit(&store, entry("AB12", 5)).unwrap();
        record_visit(&store, entry("CD34", 1)).unwrap();

        let mut history = RoomHistory::load(&store).unwrap();
        assert_eq!(history.entries().len(), 2);
        assert!(history.remove(&"AB12".parse().unwrap()));
        assert!(!history.remove(&"AB12".parse().unwrap()));
        history.save(&store).unwrap();

        let reloaded = RoomHistory::load(&store).unwrap();
        assert_eq!(reloaded.entries().len(), 1);
        assert_eq!(reloaded.entries()[0].room_id.as_str(), "CD34");
    }
}
