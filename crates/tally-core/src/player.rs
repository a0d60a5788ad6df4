use serde::{Deserialize, Serialize};

use crate::ability::Abilities;
use crate::color::Color;
use crate::ids::PlayerId;

/// Longest accepted player name, in characters.
pub const MAX_NAME_LEN: usize = 32;

/// One tracked participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default)]
    pub abilities: Abilities,
}

impl Player {
    /// A new player with every ability at 0.
    pub fn new(id: PlayerId, name: String, color: Option<Color>) -> Self {
        Self {
            id,
            name,
            color,
            abilities: Abilities::zeroed(),
        }
    }
}

/// Trims `name` and checks it is non-empty and not too long.
pub fn normalize_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_NAME_LEN {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Alice "), Some("Alice".to_string()));
        assert_eq!(normalize_name("   "), None);
        assert_eq!(normalize_name(&"あ".repeat(MAX_NAME_LEN)).map(|n| n.chars().count()), Some(MAX_NAME_LEN));
        assert_eq!(normalize_name(&"a".repeat(MAX_NAME_LEN + 1)), None);
    }

    #[test]
    fn test_new_player_is_zeroed() {
        let player = Player::new(PlayerId::from("p1"), "Alice".to_string(), Some(Color::BLUE));
        assert!(player.abilities.is_zeroed());
    }

    #[test]
    fn test_document_shape() {
        let player = Player::new(PlayerId::from("p1"), "Alice".to_string(), None);
        let json = serde_json::to_value(&player).unwrap();
        assert_eq!(json["id"], "p1");
        assert!(json.get("color").is_none());
        assert_eq!(json["abilities"]["STRENGTH"], 0);
    }
}
