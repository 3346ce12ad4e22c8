// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A queue of messages for the user, shown at most once each.

use hashbrown::HashSet;

/// How bad a [`Diagnostic`] is.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    /// A script failed while running.
    Error,
    /// A script could not be parsed, or something else worth knowing.
    Warning,
}

/// One message for the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// How bad it is.
    pub severity: Severity,
    /// What happened.
    pub message: String,
}

/// Pending messages, deduplicated against everything already queued.
///
/// A message that was queued once is not queued again, even after it has
/// been drained: a script that fails on every keystroke is reported once.
///
/// ```
/// use cardscript_set::{Diagnostics, Severity};
///
/// let mut d = Diagnostics::default();
/// d.warning("parse error in `name`");
/// d.error("division by zero");
/// d.error("division by zero");
/// let drained = d.drain();
/// assert_eq!(drained.len(), 2);
/// assert_eq!(drained[0].severity, Severity::Error);
/// d.error("division by zero");
/// assert!(d.is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    pending: Vec<Diagnostic>,
    shown: HashSet<(Severity, String)>,
}

impl Diagnostics {
    /// Queues an error. Returns `false` if it was seen before.
    pub fn error(&mut self, message: impl Into<String>) -> bool {
        self.push(Severity::Error, message.into())
    }

    /// Queues a warning. Returns `false` if it was seen before.
    pub fn warning(&mut self, message: impl Into<String>) -> bool {
        self.push(Severity::Warning, message.into())
    }

    fn push(&mut self, severity: Severity, message: String) -> bool {
        if !self.shown.insert((severity, message.clone())) {
            return false;
        }
        self.pending.push(Diagnostic { severity, message });
        true
    }

    /// Number of pending messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// The pending messages, in queue order.
    #[must_use]
    pub fn pending(&self) -> &[Diagnostic] {
        &self.pending
    }

    /// Takes the pending messages, errors before warnings.
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        let mut out = std::mem::take(&mut self.pending);
        out.sort_by_key(|d| d.severity != Severity::Error);
        out
    }

    /// Forgets which messages were shown, so they can be queued again.
    pub fn forget_shown(&mut self) {
        self.shown.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_come_first_and_keep_their_order() {
        let mut d = Diagnostics::default();
        d.warning("w1");
        d.error("e1");
        d.warning("w2");
        d.error("e2");
        let messages: Vec<_> = d.drain().into_iter().map(|d| d.message).collect();
        assert_eq!(messages, ["e1", "e2", "w1", "w2"]);
    }

    #[test]
    fn same_text_with_other_severity_is_new() {
        let mut d = Diagnostics::default();
        assert!(d.error("x"));
        assert!(d.warning("x"));
        assert!(!d.error("x"));
        d.drain();
        d.forget_shown();
        assert!(d.error("x"));
    }
}
