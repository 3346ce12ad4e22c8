// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Field values and their re-evaluation.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use cardscript::{Color, Context, ScriptError, ScriptResult, ScriptValue};
use cardscript_dirty::{Age, AgeClock};

use crate::config::ChangeDetection;
use crate::field::{Field, FieldKind};

/// The content of a value, typed by its [`FieldKind`].
#[derive(Clone, Debug, PartialEq)]
pub enum ValueContent {
    /// Content of a [`FieldKind::Text`] field.
    Text(String),
    /// Content of a [`FieldKind::Choice`] field.
    Choice(String),
    /// Content of a [`FieldKind::Color`] field.
    Color(Color),
    /// Content of a [`FieldKind::Boolean`] field.
    Boolean(bool),
}

impl ValueContent {
    /// The content of a field nobody has touched yet.
    #[must_use]
    pub fn default_for(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Text => Self::Text(String::new()),
            FieldKind::Choice => Self::Choice(String::new()),
            FieldKind::Color => Self::Color(Color::BLACK),
            FieldKind::Boolean => Self::Boolean(false),
        }
    }

    /// Converts a script result into content of the given kind.
    pub fn from_script(kind: FieldKind, value: &ScriptValue) -> ScriptResult<Self> {
        Ok(match kind {
            FieldKind::Text => Self::Text(value.to_string_value()?),
            FieldKind::Choice => Self::Choice(value.to_string_value()?),
            FieldKind::Color => Self::Color(value.to_color()?),
            FieldKind::Boolean => Self::Boolean(value.to_bool()?),
        })
    }

    /// The content as scripts see it.
    #[must_use]
    pub fn to_script_value(&self) -> ScriptValue {
        match self {
            Self::Text(s) | Self::Choice(s) => s.as_str().into(),
            Self::Color(c) => (*c).into(),
            Self::Boolean(b) => (*b).into(),
        }
    }

    /// The kind of field this content belongs to.
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Text(_) => FieldKind::Text,
            Self::Choice(_) => FieldKind::Choice,
            Self::Color(_) => FieldKind::Color,
            Self::Boolean(_) => FieldKind::Boolean,
        }
    }
}

/// The rendered form, which is what change detection compares.
impl fmt::Display for ValueContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) | Self::Choice(s) => f.write_str(s),
            Self::Color(c) => write!(f, "{c}"),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for ValueContent {
    fn from(s: &str) -> Self {
        Self::Text(s.into())
    }
}

/// The value of one field on one card (or on the set).
///
/// Content lives in a cell so that values can be shared between the data
/// model, scripts reading them and the scheduler refreshing them.
#[derive(Debug)]
pub struct Value {
    field: Rc<Field>,
    content: RefCell<ValueContent>,
    last_script_update: Cell<Age>,
    last_error: RefCell<Option<ScriptError>>,
    evaluations: Cell<u32>,
    defaulted: Cell<bool>,
}

impl Value {
    /// A value holding the default content of `field`.
    #[must_use]
    pub fn new(field: Rc<Field>) -> Self {
        Self {
            content: RefCell::new(ValueContent::default_for(field.kind())),
            field,
            last_script_update: Cell::new(Age::BEFORE_TIME),
            last_error: RefCell::new(None),
            evaluations: Cell::new(0),
            defaulted: Cell::new(false),
        }
    }

    /// The field this is a value of.
    #[must_use]
    pub fn field(&self) -> &Rc<Field> {
        &self.field
    }

    /// A copy of the content.
    #[must_use]
    pub fn content(&self) -> ValueContent {
        self.content.borrow().clone()
    }

    /// The rendered form of the content.
    #[must_use]
    pub fn rendered(&self) -> String {
        self.content.borrow().to_string()
    }

    /// Replaces the content, returning the old one. Scripts are not re-run;
    /// that is the scheduler's job.
    pub fn replace(&self, content: ValueContent) -> ValueContent {
        self.content.replace(content)
    }

    /// When the script last ran.
    #[must_use]
    pub fn last_script_update(&self) -> Age {
        self.last_script_update.get()
    }

    /// The error of the last script run, if it failed.
    #[must_use]
    pub fn last_error(&self) -> Option<ScriptError> {
        self.last_error.borrow().clone()
    }

    /// How often [`update`](Self::update) ran the script.
    #[must_use]
    pub fn evaluations(&self) -> u32 {
        self.evaluations.get()
    }

    /// Returns `true` if the field has a usable script.
    #[must_use]
    pub fn is_scripted(&self) -> bool {
        self.field.value_script().is_scripted()
    }

    /// Re-runs the field's script and stores the result.
    ///
    /// The current content is visible to the script as `value`. The age is
    /// bumped whether or not the script succeeds; on failure the previous
    /// content is kept and the error remembered. Returns whether the content
    /// changed according to `detection`.
    pub fn update(
        &self,
        ctx: &mut Context,
        clock: &AgeClock,
        detection: ChangeDetection,
    ) -> ScriptResult<bool> {
        let Some(script) = self.field.value_script().script() else {
            return Ok(false);
        };
        self.evaluations.set(self.evaluations.get() + 1);
        let current = self.content.borrow().to_script_value();
        let result = {
            let mut scope = ctx.local_scope();
            scope.set_variable("value", current);
            scope.eval(script, false)
        }
        .and_then(|v| ValueContent::from_script(self.field.kind(), &v));
        self.last_script_update.set(clock.now());
        match result {
            Ok(new) => {
                let changed = match detection {
                    ChangeDetection::RenderedForm => {
                        self.content.borrow().to_string() != new.to_string()
                    }
                    ChangeDetection::Always => true,
                };
                self.content.replace(new);
                self.last_error.replace(None);
                Ok(changed)
            }
            Err(e) => {
                self.last_error.replace(Some(e.clone()));
                Err(e)
            }
        }
    }

    /// Runs the default script once, for a freshly created card.
    ///
    /// Later calls do nothing. Returns whether content was set.
    pub fn apply_default(&self, ctx: &mut Context) -> ScriptResult<bool> {
        if self.defaulted.replace(true) {
            return Ok(false);
        }
        let Some(script) = self.field.initial_script().script() else {
            return Ok(false);
        };
        let result = ctx.eval(script, true)?;
        self.content
            .replace(ValueContent::from_script(self.field.kind(), &result)?);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(field: Field) -> Value {
        Value::new(field.prepare(0, &mut Vec::new()))
    }

    #[test]
    fn update_binds_the_current_content() {
        let v = value(Field::new("t", FieldKind::Text).script("to_upper(value)"));
        v.replace("shout".into());
        let mut ctx = Context::new();
        cardscript::builtins::register(&mut ctx);
        let clock = AgeClock::new();
        assert!(v.update(&mut ctx, &clock, ChangeDetection::RenderedForm).unwrap());
        assert_eq!(v.rendered(), "SHOUT");
        assert!(!v.update(&mut ctx, &clock, ChangeDetection::RenderedForm).unwrap());
        assert!(v.update(&mut ctx, &clock, ChangeDetection::Always).unwrap());
        assert_eq!(v.evaluations(), 3);
        assert!(ctx.get_variable("value").is_err());
    }

    #[test]
    fn errors_keep_content_and_bump_the_age() {
        let v = value(Field::new("n", FieldKind::Text).script("1 / 0"));
        v.replace("before".into());
        let clock = AgeClock::new();
        let before = clock.now();
        let mut ctx = Context::new();
        assert!(v.update(&mut ctx, &clock, ChangeDetection::RenderedForm).is_err());
        assert_eq!(v.rendered(), "before");
        assert!(v.last_script_update() > before);
        assert_eq!(v.last_error(), Some(ScriptError::DivisionByZero));
    }

    #[test]
    fn content_is_converted_per_kind() {
        let v = value(Field::new("c", FieldKind::Color).script("rgb(1, 2, 3)"));
        let mut ctx = Context::new();
        v.update(&mut ctx, &AgeClock::new(), ChangeDetection::RenderedForm)
            .unwrap();
        assert_eq!(v.content(), ValueContent::Color(Color::rgb(1, 2, 3)));

        let b = value(Field::new("b", FieldKind::Boolean).script("\"yes\""));
        b.update(&mut ctx, &AgeClock::new(), ChangeDetection::RenderedForm)
            .unwrap();
        assert_eq!(b.rendered(), "true");

        let bad = value(Field::new("b", FieldKind::Boolean).script("\"perhaps\""));
        assert!(matches!(
            bad.update(&mut ctx, &AgeClock::new(), ChangeDetection::RenderedForm),
            Err(ScriptError::Conversion { .. })
        ));
    }

    #[test]
    fn scriptless_values_never_run() {
        let v = value(Field::new("plain", FieldKind::Text));
        let mut ctx = Context::new();
        assert!(!v.update(&mut ctx, &AgeClock::new(), ChangeDetection::Always).unwrap());
        assert_eq!(v.evaluations(), 0);
        assert_eq!(v.last_script_update(), Age::BEFORE_TIME);
    }

    #[test]
    fn defaults_apply_once() {
        let v = value(Field::new("d", FieldKind::Text).default_script("\"fresh\""));
        let mut ctx = Context::new();
        assert!(v.apply_default(&mut ctx).unwrap());
        assert_eq!(v.rendered(), "fresh");
        v.replace("edited".into());
        assert!(!v.apply_default(&mut ctx).unwrap());
        assert_eq!(v.rendered(), "edited");
    }
}
