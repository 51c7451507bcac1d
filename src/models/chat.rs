//! Chat request types shared by the gateway and the dispatch engine.

// Author: kelexine (https://github.com/kelexine)

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single conversation turn as sent by the frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `user`, `assistant` or `system`.
    pub role: String,

    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

/// Game mode selected by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChatMode {
    /// The player tries to make the model admit it is an AI.
    #[default]
    ConvinceAi,
    /// The model interrogates the player to prove they are human.
    ProveHuman,
}

impl ChatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatMode::ConvinceAi => "convince-ai",
            ChatMode::ProveHuman => "prove-human",
        }
    }
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Difficulty from 1 (easiest) to 10 (impossible).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct RoastLevel(u8);

impl RoastLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    /// Returns `None` when `level` is outside `1..=10`.
    pub fn new(level: i64) -> Option<Self> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&level) {
            Some(Self(level as u8))
        } else {
            None
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    pub fn intensity(&self) -> RoastIntensity {
        match self.0 {
            0..=3 => RoastIntensity::Light,
            4..=6 => RoastIntensity::Medium,
            _ => RoastIntensity::Savage,
        }
    }
}

impl Default for RoastLevel {
    fn default() -> Self {
        Self(5)
    }
}

impl TryFrom<i64> for RoastLevel {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("roastLevel must be between 1 and 10, got {}", value))
    }
}

impl From<RoastLevel> for u8 {
    fn from(level: RoastLevel) -> Self {
        level.0
    }
}

impl fmt::Display for RoastLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoastIntensity {
    Light,
    Medium,
    Savage,
}

impl RoastIntensity {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoastIntensity::Light => "light",
            RoastIntensity::Medium => "medium",
            RoastIntensity::Savage => "savage",
        }
    }
}

/// A validated chat request handed to the dispatch engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub mode: ChatMode,
    pub roast_level: RoastLevel,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>, mode: ChatMode, roast_level: RoastLevel) -> Self {
        Self {
            messages,
            mode,
            roast_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_serde_kebab_case() {
        let mode: ChatMode = serde_json::from_str("\"prove-human\"").unwrap();
        assert_eq!(mode, ChatMode::ProveHuman);
        assert_eq!(serde_json::to_string(&ChatMode::ConvinceAi).unwrap(), "\"convince-ai\"");
        assert!(serde_json::from_str::<ChatMode>("\"debate\"").is_err());
    }

    #[test]
    fn test_roast_level_bounds() {
        assert!(RoastLevel::new(0).is_none());
        assert!(RoastLevel::new(11).is_none());
        assert_eq!(RoastLevel::new(1).unwrap().get(), 1);
        assert!(serde_json::from_str::<RoastLevel>("42").is_err());
        assert_eq!(serde_json::from_str::<RoastLevel>("7").unwrap().get(), 7);
    }

    #[test]
    fn test_roast_intensity_bands() {
        assert_eq!(RoastLevel::new(3).unwrap().intensity(), RoastIntensity::Light);
        assert_eq!(RoastLevel::new(4).unwrap().intensity(), RoastIntensity::Medium);
        assert_eq!(RoastLevel::new(6).unwrap().intensity(), RoastIntensity::Medium);
        assert_eq!(RoastLevel::new(7).unwrap().intensity(), RoastIntensity::Savage);
    }
}
