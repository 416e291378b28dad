use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ThemeError {
    #[error("timer seconds must be > 0 when the timer is enabled")]
    InvalidTimerSeconds,

    #[error("max lives must be > 0 when lives are enabled")]
    InvalidMaxLives,
}

//
// ─── THEME CONFIG ──────────────────────────────────────────────────────────────
//

/// Gameplay knobs an activity ships with.
///
/// `timer_seconds` is the budget for the whole session, not per question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ThemeConfigDraft", into = "ThemeConfigDraft")]
pub struct ThemeConfig {
    timer_enabled: bool,
    timer_seconds: u32,
    lives_enabled: bool,
    max_lives: u32,
}

/// Unvalidated wire shape of `ThemeConfig`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeConfigDraft {
    #[serde(default)]
    pub timer_enabled: bool,
    #[serde(default = "default_timer_seconds")]
    pub timer_seconds: u32,
    #[serde(default = "default_lives_enabled")]
    pub lives_enabled: bool,
    #[serde(default = "default_max_lives")]
    pub max_lives: u32,
}

pub const DEFAULT_TIMER_SECONDS: u32 = 300;
pub const DEFAULT_MAX_LIVES: u32 = 3;

fn default_timer_seconds() -> u32 {
    DEFAULT_TIMER_SECONDS
}

fn default_lives_enabled() -> bool {
    true
}

fn default_max_lives() -> u32 {
    DEFAULT_MAX_LIVES
}

impl ThemeConfig {
    /// Builds a validated theme.
    ///
    /// # Errors
    ///
    /// Returns `ThemeError` if an enabled timer has a zero budget or enabled
    /// lives have a zero maximum.
    pub fn new(
        timer_enabled: bool,
        timer_seconds: u32,
        lives_enabled: bool,
        max_lives: u32,
    ) -> Result<Self, ThemeError> {
        if timer_enabled && timer_seconds == 0 {
            return Err(ThemeError::InvalidTimerSeconds);
        }
        if lives_enabled && max_lives == 0 {
            return Err(ThemeError::InvalidMaxLives);
        }
        Ok(Self {
            timer_enabled,
            timer_seconds,
            lives_enabled,
            max_lives,
        })
    }

    /// No timer, no lives: a relaxed practice run.
    #[must_use]
    pub fn relaxed() -> Self {
        Self {
            timer_enabled: false,
            timer_seconds: DEFAULT_TIMER_SECONDS,
            lives_enabled: false,
            max_lives: DEFAULT_MAX_LIVES,
        }
    }

    #[must_use]
    pub fn timer_enabled(&self) -> bool {
        self.timer_enabled
    }

    #[must_use]
    pub fn timer_seconds(&self) -> u32 {
        self.timer_seconds
    }

    #[must_use]
    pub fn lives_enabled(&self) -> bool {
        self.lives_enabled
    }

    #[must_use]
    pub fn max_lives(&self) -> u32 {
        self.max_lives
    }
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            timer_enabled: false,
            timer_seconds: DEFAULT_TIMER_SECONDS,
            lives_enabled: true,
            max_lives: DEFAULT_MAX_LIVES,
        }
    }
}

impl TryFrom<ThemeConfigDraft> for ThemeConfig {
    type Error = ThemeError;

    fn try_from(draft: ThemeConfigDraft) -> Result<Self, Self::Error> {
        Self::new(
            draft.timer_enabled,
            draft.timer_seconds,
            draft.lives_enabled,
            draft.max_lives,
        )
    }
}

impl From<ThemeConfig> for ThemeConfigDraft {
    fn from(theme: ThemeConfig) -> Self {
        Self {
            timer_enabled: theme.timer_enabled,
            timer_seconds: theme.timer_seconds,
            lives_enabled: theme.lives_enabled,
            max_lives: theme.max_lives,
        }
    }
}
