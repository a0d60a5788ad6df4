//! Fixed ability table tracked for every player.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::language::Language;

/// How an ability's value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbilityTag {
    /// Unbounded non-negative counter.
    Counter,
    /// Boolean stored as 0 or 1.
    Toggle,
}

/// One of the abilities every player carries.
///
/// Serialized with the display keys the room document has always used, so
/// `STRENGTH` and `Extra Jump` appear verbatim in field paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AbilityKind {
    #[serde(rename = "STRENGTH")]
    Strength,
    #[serde(rename = "Extra Jump")]
    ExtraJump,
    #[serde(rename = "STAMINA")]
    Stamina,
    #[serde(rename = "HEALTH")]
    Health,
    #[serde(rename = "RANGE")]
    Range,
    #[serde(rename = "SPRINT SPEED")]
    SprintSpeed,
    #[serde(rename = "TUMBLE LAUNCH")]
    TumbleLaunch,
    #[serde(rename = "TUMBLE WINGS")]
    TumbleWings,
    #[serde(rename = "CROUCH REST")]
    CrouchRest,
    #[serde(rename = "MAP PLAYER COUNT")]
    MapPlayerCount,
}

impl AbilityKind {
    pub const COUNT: usize = 10;

    /// Every kind, in display order.
    pub const ALL: [AbilityKind; Self::COUNT] = [
        AbilityKind::Strength,
        AbilityKind::ExtraJump,
        AbilityKind::Stamina,
        AbilityKind::Health,
        AbilityKind::Range,
        AbilityKind::SprintSpeed,
        AbilityKind::TumbleLaunch,
        AbilityKind::TumbleWings,
        AbilityKind::CrouchRest,
        AbilityKind::MapPlayerCount,
    ];

    pub const fn tag(self) -> AbilityTag {
        match self {
            AbilityKind::MapPlayerCount => AbilityTag::Toggle,
            _ => AbilityTag::Counter,
        }
    }

    pub const fn is_toggle(self) -> bool {
        matches!(self.tag(), AbilityTag::Toggle)
    }

    const fn index(self) -> usize {
        self as usize
    }

    /// Key used in the room document and in field paths.
    pub const fn key(self) -> &'static str {
        match self {
            AbilityKind::Strength => "STRENGTH",
            AbilityKind::ExtraJump => "Extra Jump",
            AbilityKind::Stamina => "STAMINA",
            AbilityKind::Health => "HEALTH",
            AbilityKind::Range => "RANGE",
            AbilityKind::SprintSpeed => "SPRINT SPEED",
            AbilityKind::TumbleLaunch => "TUMBLE LAUNCH",
            AbilityKind::TumbleWings => "TUMBLE WINGS",
            AbilityKind::CrouchRest => "CROUCH REST",
            AbilityKind::MapPlayerCount => "MAP PLAYER COUNT",
        }
    }

    pub const fn label(self, language: Language) -> &'static str {
        match language {
            Language::En => self.key(),
            Language::Ja => match self {
                AbilityKind::Strength => "筋力",
                AbilityKind::ExtraJump => "追加ジャンプ",
                AbilityKind::Stamina => "スタミナ",
                AbilityKind::Health => "体力",
                AbilityKind::Range => "範囲",
                AbilityKind::SprintSpeed => "ダッシュ速度",
                AbilityKind::TumbleLaunch => "タンブルローンチ",
                AbilityKind::TumbleWings => "タンブルウィング",
                AbilityKind::CrouchRest => "しゃがみ休憩",
                AbilityKind::MapPlayerCount => "マップ表示人数",
            },
        }
    }

    /// In-game value shown for a stored counter value.
    pub fn display_value(self, value: u32) -> String {
        match self {
            AbilityKind::Health => (100 + u64::from(value) * 20).to_string(),
            AbilityKind::Stamina => (40 + u64::from(value) * 10).to_string(),
            AbilityKind::SprintSpeed => format!("{}%", 100 + u64::from(value) * 20),
            AbilityKind::MapPlayerCount => String::from(if value > 0 { "ON" } else { "OFF" }),
            _ => value.to_string(),
        }
    }
}

impl fmt::Display for AbilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Values for every [`AbilityKind`]; always complete.
///
/// On the wire this is a map keyed by [`AbilityKind::key`]. Missing keys read
/// as 0 and toggle values above 1 read as 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<AbilityKind, u32>",
    into = "BTreeMap<AbilityKind, u32>"
)]
pub struct Abilities {
    values: [u32; AbilityKind::COUNT],
}

impl Abilities {
    pub fn zeroed() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: AbilityKind) -> u32 {
        self.values[kind.index()]
    }

    /// Stores `value`, folding toggle kinds onto 0/1.
    pub(crate) fn set(&mut self, kind: AbilityKind, value: u32) {
        self.values[kind.index()] = if kind.is_toggle() { value.min(1) } else { value };
    }

    pub fn iter(&self) -> impl Iterator<Item = (AbilityKind, u32)> + '_ {
        AbilityKind::ALL.iter().map(|&kind| (kind, self.get(kind)))
    }

    pub fn is_zeroed(&self) -> bool {
        self.values.iter().all(|&v| v == 0)
    }
}

impl From<BTreeMap<AbilityKind, u32>> for Abilities {
    fn from(map: BTreeMap<AbilityKind, u32>) -> Self {
        let mut abilities = Abilities::zeroed();
        for (kind, value) in map {
            abilities.set(kind, value);
        }
        abilities
    }
}

impl From<Abilities> for BTreeMap<AbilityKind, u32> {
    fn from(abilities: Abilities) -> Self {
        abilities.iter().collect()
    }
}
