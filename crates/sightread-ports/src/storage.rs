use crate::types::*;
use serde::{Deserialize, Serialize};

fn default_hints_enabled() -> bool {
    true
}

fn default_hint_rate_limit_ms() -> Millis {
    30_000
}

fn default_hint_display_ms() -> Millis {
    5_000
}

fn default_streak_milestone() -> u32 {
    5
}

fn default_mistake_threshold() -> u32 {
    3
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsDto {
    pub selected_midi_in: Option<DeviceId>,
    pub selected_audio_in: Option<DeviceId>,
    pub lang: Lang,
    pub clef: Clef,
    #[serde(default = "default_hints_enabled")]
    pub hints_enabled: bool,
    #[serde(default = "default_hint_rate_limit_ms")]
    pub hint_rate_limit_ms: Millis,
    #[serde(default = "default_hint_display_ms")]
    pub hint_display_ms: Millis,
    #[serde(default = "default_streak_milestone")]
    pub streak_milestone: u32,
    #[serde(default = "default_mistake_threshold")]
    pub mistake_threshold: u32,
}

impl Default for SettingsDto {
    fn default() -> Self {
        Self {
            selected_midi_in: None,
            selected_audio_in: None,
            lang: Lang::En,
            clef: Clef::Treble,
            hints_enabled: default_hints_enabled(),
            hint_rate_limit_ms: default_hint_rate_limit_ms(),
            hint_display_ms: default_hint_display_ms(),
            streak_milestone: default_streak_milestone(),
            mistake_threshold: default_mistake_threshold(),
        }
    }
}

pub trait StoragePort: Send + Sync {
    fn load_settings(&self) -> Result<SettingsDto, StorageError>;
    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_settings_fill_defaults() {
        let settings: SettingsDto = serde_json::from_str(r#"{"lang":"es"}"#).unwrap();
        assert_eq!(settings.lang, Lang::Es);
        assert_eq!(settings.clef, Clef::Treble);
        assert!(settings.hints_enabled);
        assert_eq!(settings.hint_rate_limit_ms, 30_000);
        assert_eq!(settings.mistake_threshold, 3);
    }
}
