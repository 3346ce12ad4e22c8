// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Field descriptions.

use std::rc::Rc;

use cardscript::{OptionalScript, ParseError};

/// What kind of content a field holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Free text.
    Text,
    /// One of a set of named choices, stored as the choice name.
    Choice,
    /// A color.
    Color,
    /// A yes/no flag.
    Boolean,
}

/// A field of a card or of the set.
///
/// A field may carry a script computing its value from other fields, and a
/// default script run once when a card is created.
///
/// ```
/// use cardscript_set::{Field, FieldKind};
///
/// let field = Field::new("title", FieldKind::Text)
///     .script("to_title(value)")
///     .identifying(true);
/// assert_eq!(field.name(), "title");
/// assert!(field.is_identifying());
/// ```
#[derive(Clone, Debug)]
pub struct Field {
    name: Rc<str>,
    index: u32,
    kind: FieldKind,
    script: OptionalScript,
    default_script: OptionalScript,
    identifying: bool,
}

impl Field {
    /// A scriptless field.
    #[must_use]
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            index: 0,
            kind,
            script: OptionalScript::default(),
            default_script: OptionalScript::default(),
            identifying: false,
        }
    }

    /// Sets the script computing the value.
    #[must_use]
    pub fn script(mut self, source: &str) -> Self {
        self.script = OptionalScript::new(source);
        self
    }

    /// Sets the script computing the initial value of new cards.
    #[must_use]
    pub fn default_script(mut self, source: &str) -> Self {
        self.default_script = OptionalScript::new(source);
        self
    }

    /// Marks the field as identifying its card, so that changes to it are
    /// visible to everything that reads the card list.
    #[must_use]
    pub fn identifying(mut self, identifying: bool) -> Self {
        self.identifying = identifying;
        self
    }

    /// The field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of the field among its siblings.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The kind of content.
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// The value script.
    #[must_use]
    pub fn value_script(&self) -> &OptionalScript {
        &self.script
    }

    /// The default script.
    #[must_use]
    pub fn initial_script(&self) -> &OptionalScript {
        &self.default_script
    }

    /// Returns `true` if the field identifies its card.
    #[must_use]
    pub fn is_identifying(&self) -> bool {
        self.identifying
    }

    /// Places the field at `index` and parses its scripts. Parse errors are
    /// pushed to `warnings`; the affected script then behaves as absent.
    pub(crate) fn prepare(mut self, index: u32, warnings: &mut Vec<ParseError>) -> Rc<Self> {
        self.index = index;
        let name = self.name.clone();
        for script in [&mut self.script, &mut self.default_script] {
            if let Err(e) = script.parse_named(false, Some(&name)) {
                warnings.push(e);
            }
        }
        Rc::new(self)
    }
}

/// Places and parses a list of fields.
pub(crate) fn prepare_all(fields: Vec<Field>, warnings: &mut Vec<ParseError>) -> Vec<Rc<Field>> {
    (0_u32..)
        .zip(fields)
        .map(|(i, f)| f.prepare(i, warnings))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broken_scripts_become_warnings() {
        let mut warnings = Vec::new();
        let fields = prepare_all(
            vec![
                Field::new("a", FieldKind::Text).script("1 +"),
                Field::new("b", FieldKind::Text).script("card.a"),
            ],
            &mut warnings,
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].filename.as_deref(), Some("a"));
        assert!(!fields[0].value_script().is_scripted());
        assert!(fields[1].value_script().is_scripted());
        assert_eq!(fields[1].index(), 1);
    }
}
