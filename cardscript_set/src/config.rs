// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Configuration of the update scheduler.

bitflags::bitflags! {
    /// Classes of update that may be deferred until
    /// [`SetScriptManager::update_delayed`](crate::SetScriptManager::update_delayed).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct DelayFlags: u8 {
        /// Re-matching keywords over all card text.
        const KEYWORDS = 0b0000_0001;
        /// Re-running everything that reads the card list.
        const CARDS    = 0b0000_0010;
    }
}

impl Default for DelayFlags {
    fn default() -> Self {
        Self::KEYWORDS
    }
}

/// When a re-evaluated value counts as changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChangeDetection {
    /// Changed iff the rendered text form differs from before.
    #[default]
    RenderedForm,
    /// Every re-evaluation counts as a change.
    Always,
}

/// Settings for a [`SetScriptManager`](crate::SetScriptManager).
///
/// ```
/// use cardscript_set::{ChangeDetection, DelayFlags, ScriptConfig};
///
/// let config = ScriptConfig::builder()
///     .instruction_limit(100_000)
///     .delay(DelayFlags::KEYWORDS | DelayFlags::CARDS)
///     .build();
/// assert_eq!(config.instruction_limit(), Some(100_000));
/// assert_eq!(config.change_detection(), ChangeDetection::RenderedForm);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScriptConfig {
    instruction_limit: Option<u64>,
    change_detection: ChangeDetection,
    delay: DelayFlags,
}

impl ScriptConfig {
    /// Starts from the defaults.
    #[must_use]
    pub fn builder() -> ScriptConfigBuilder {
        ScriptConfigBuilder::default()
    }

    /// Per-evaluation instruction cap, if any.
    #[must_use]
    pub fn instruction_limit(&self) -> Option<u64> {
        self.instruction_limit
    }

    /// How changes are detected.
    #[must_use]
    pub fn change_detection(&self) -> ChangeDetection {
        self.change_detection
    }

    /// Which updates are deferred.
    #[must_use]
    pub fn delay(&self) -> DelayFlags {
        self.delay
    }
}

/// Builder for [`ScriptConfig`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ScriptConfigBuilder {
    config: ScriptConfig,
}

impl ScriptConfigBuilder {
    /// Caps the instructions a single evaluation may run.
    #[must_use]
    pub fn instruction_limit(mut self, limit: u64) -> Self {
        self.config.instruction_limit = Some(limit);
        self
    }

    /// Sets how changes are detected.
    #[must_use]
    pub fn change_detection(mut self, detection: ChangeDetection) -> Self {
        self.config.change_detection = detection;
        self
    }

    /// Sets which updates are deferred.
    #[must_use]
    pub fn delay(mut self, delay: DelayFlags) -> Self {
        self.config.delay = delay;
        self
    }

    /// Finishes the configuration.
    #[must_use]
    pub fn build(self) -> ScriptConfig {
        self.config
    }
}
