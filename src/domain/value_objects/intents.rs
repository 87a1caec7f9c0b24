//! Gateway intent flags.
//!
//! Intents are a bitfield sent in IDENTIFY that selects which event groups
//! the gateway delivers. The engine treats the value as opaque.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Gateway intents bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Intents(pub u64);

impl Intents {
    pub const GUILDS: u64 = 1 << 0;
    /// Privileged
    pub const GUILD_MEMBERS: u64 = 1 << 1;
    pub const GUILD_BANS: u64 = 1 << 2;
    pub const GUILD_EMOJIS_AND_STICKERS: u64 = 1 << 3;
    pub const GUILD_INTEGRATIONS: u64 = 1 << 4;
    pub const GUILD_WEBHOOKS: u64 = 1 << 5;
    pub const GUILD_INVITES: u64 = 1 << 6;
    pub const GUILD_VOICE_STATES: u64 = 1 << 7;
    /// Privileged
    pub const GUILD_PRESENCES: u64 = 1 << 8;
    pub const GUILD_MESSAGES: u64 = 1 << 9;
    pub const GUILD_MESSAGE_REACTIONS: u64 = 1 << 10;
    pub const GUILD_MESSAGE_TYPING: u64 = 1 << 11;
    pub const DIRECT_MESSAGES: u64 = 1 << 12;
    pub const DIRECT_MESSAGE_REACTIONS: u64 = 1 << 13;
    pub const DIRECT_MESSAGE_TYPING: u64 = 1 << 14;
    /// Privileged
    pub const MESSAGE_CONTENT: u64 = 1 << 15;
    pub const GUILD_SCHEDULED_EVENTS: u64 = 1 << 16;

    /// All intents combined
    pub const ALL: u64 = (1 << 17) - 1;

    /// Intents that must be enabled for the application before use
    pub const PRIVILEGED: u64 = Self::GUILD_MEMBERS | Self::GUILD_PRESENCES | Self::MESSAGE_CONTENT;

    const NAMES: [(&'static str, u64); 17] = [
        ("GUILDS", Self::GUILDS),
        ("GUILD_MEMBERS", Self::GUILD_MEMBERS),
        ("GUILD_BANS", Self::GUILD_BANS),
        ("GUILD_EMOJIS_AND_STICKERS", Self::GUILD_EMOJIS_AND_STICKERS),
        ("GUILD_INTEGRATIONS", Self::GUILD_INTEGRATIONS),
        ("GUILD_WEBHOOKS", Self::GUILD_WEBHOOKS),
        ("GUILD_INVITES", Self::GUILD_INVITES),
        ("GUILD_VOICE_STATES", Self::GUILD_VOICE_STATES),
        ("GUILD_PRESENCES", Self::GUILD_PRESENCES),
        ("GUILD_MESSAGES", Self::GUILD_MESSAGES),
        ("GUILD_MESSAGE_REACTIONS", Self::GUILD_MESSAGE_REACTIONS),
        ("GUILD_MESSAGE_TYPING", Self::GUILD_MESSAGE_TYPING),
        ("DIRECT_MESSAGES", Self::DIRECT_MESSAGES),
        ("DIRECT_MESSAGE_REACTIONS", Self::DIRECT_MESSAGE_REACTIONS),
        ("DIRECT_MESSAGE_TYPING", Self::DIRECT_MESSAGE_TYPING),
        ("MESSAGE_CONTENT", Self::MESSAGE_CONTENT),
        ("GUILD_SCHEDULED_EVENTS", Self::GUILD_SCHEDULED_EVENTS),
    ];

    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every intent, privileged ones included.
    pub const fn all() -> Self {
        Self(Self::ALL)
    }

    /// Every non-privileged intent.
    pub const fn standard() -> Self {
        Self(Self::ALL & !Self::PRIVILEGED)
    }

    pub const fn contains(&self, intent: u64) -> bool {
        self.0 & intent == intent
    }

    pub const fn is_privileged(&self) -> bool {
        self.0 & Self::PRIVILEGED != 0
    }

    pub fn insert(&mut self, intent: u64) {
        self.0 |= intent;
    }

    pub fn remove(&mut self, intent: u64) {
        self.0 &= !intent;
    }

    pub const fn bits(&self) -> u64 {
        self.0
    }

    /// Look up a single flag by its protocol name.
    pub fn flag(name: &str) -> Option<u64> {
        let name = name.trim();
        Self::NAMES
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, bit)| *bit)
    }
}

impl FromStr for Intents {
    type Err = String;

    /// Accepts `standard`, `all`, a raw integer, or flag names joined with `|`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("standard") {
            return Ok(Self::standard());
        }
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::all());
        }
        if let Ok(bits) = s.parse::<u64>() {
            return Ok(Self(bits));
        }

        s.split('|')
            .map(|name| Self::flag(name).ok_or_else(|| format!("Unknown intent: {}", name.trim())))
            .try_fold(Self::empty(), |acc, bit| bit.map(|b| Self(acc.0 | b)))
    }
}

impl fmt::Display for Intents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Intents {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Intents> for u64 {
    fn from(intents: Intents) -> Self {
        intents.0
    }
}

impl std::ops::BitOr for Intents {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}
