//! Per-room and global client settings kept in a [`KeyValueStore`].

use tally_core::{Language, PlayerId, RoomId};
use tally_proto::SessionCredential;

use crate::error::StoreError;
use crate::store::{KeyValueStore, load_json, save_json};

pub const LANGUAGE_KEY: &str = "tally-language";

pub fn managed_key(room_id: &RoomId) -> String {
    format!("tally-managed-{room_id}")
}

pub fn session_key(room_id: &RoomId) -> String {
    format!("tally-session-{room_id}")
}

/// Players this client added to `room_id`, in the order they were added.
pub fn load_managed(store: &dyn KeyValueStore, room_id: &RoomId) -> Result<Vec<PlayerId>, StoreError> {
    Ok(load_json(store, &managed_key(room_id))?.unwrap_or_default())
}

pub fn save_managed(
    store: &dyn KeyValueStore,
    room_id: &RoomId,
    players: &[PlayerId],
) -> Result<(), StoreError> {
    save_json(store, &managed_key(room_id), players)
}

pub fn load_credential(
    store: &dyn KeyValueStore,
    room_id: &RoomId,
) -> Result<Option<SessionCredential>, StoreError> {
    load_json(store, &session_key(room_id))
}

pub fn save_credential(
    store: &dyn KeyValueStore,
    room_id: &RoomId,
    credential: &SessionCredential,
) -> Result<(), StoreError> {
    save_json(store, &session_key(room_id), credential)
}

/// Stored as the bare code (`ja` / `en`); anything else reads as English.
pub fn load_language(store: &dyn KeyValueStore) -> Result<Language, StoreError> {
    Ok(store
        .get(LANGUAGE_KEY)?
        .map(|value| Language::parse_or_default(&value))
        .unwrap_or_default())
}

pub fn save_language(store: &dyn KeyValueStore, language: Language) -> Result<(), StoreError> {
    store.set(LANGUAGE_KEY, language.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_managed_is_per_room() {
        let store = MemoryStore::new();
        let ab: RoomId = "AB12".parse().unwrap();
        let cd: RoomId = "CD34".parse().unwrap();
        save_managed(&store, &ab, &[PlayerId::from("p1"), PlayerId::from("p2")]).unwrap();

        assert_eq!(
            load_managed(&store, &ab).unwrap(),
            vec![PlayerId::from("p1"), PlayerId::from("p2")]
        );
        assert!(load_managed(&store, &cd).unwrap().is_empty());
        assert_eq!(store.get("tally-managed-AB12").unwrap().as_deref(), Some(r#"["p1","p2"]"#));
    }

    #[test]
    fn test_language_default_and_toggle() {
        let store = MemoryStore::new();
        assert_eq!(load_language(&store).unwrap(), Language::En);
        save_language(&store, Language::En.toggled()).unwrap();
        assert_eq!(store.get(LANGUAGE_KEY).unwrap().as_deref(), Some("ja"));
        store.set(LANGUAGE_KEY, "fr").unwrap();
        assert_eq!(load_language(&store).unwrap(), Language::En);
    }

    #[test]
    fn test_credential_round_trip() {
        let store = MemoryStore::new();
        let room: RoomId = "AB12".parse().unwrap();
        assert_eq!(load_credential(&store, &room).unwrap(), None);
        let credential = SessionCredential::issue();
        save_credential(&store, &room, &credential).unwrap();
        assert_eq!(load_credential(&store, &room).unwrap(), Some(credential));
    }
}
