// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Script-bearing properties of data-model objects.

use std::rc::Rc;

use cardscript_dirty::{Dependency, DependencySink};

use crate::color::Color;
use crate::context::Context;
use crate::error::{ParseError, ScriptResult};
use crate::parser::Parser;
use crate::script::Script;
use crate::value::ScriptValue;

/// Source text plus the script parsed from it.
///
/// The source is authoritative. The parsed script is a cache that is absent
/// when the source is empty or fails to parse; such a script behaves as if
/// there were none.
///
/// ```
/// use cardscript::{Context, OptionalScript};
///
/// let mut ctx = Context::new();
/// let mut broken = OptionalScript::new("1 +");
/// assert!(broken.parse(false).is_err());
/// assert!(broken.invoke(&mut ctx, true).unwrap().is_nil());
/// assert_eq!(broken.unparsed(), "1 +");
/// ```
#[derive(Clone, Debug, Default)]
pub struct OptionalScript {
    unparsed: String,
    script: Option<Rc<Script>>,
}

impl OptionalScript {
    /// Creates an unparsed script. Call [`parse`](Self::parse) before use.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            unparsed: source.into(),
            script: None,
        }
    }

    /// The source text.
    #[must_use]
    pub fn unparsed(&self) -> &str {
        &self.unparsed
    }

    /// The parsed script, if any.
    #[must_use]
    pub fn script(&self) -> Option<&Rc<Script>> {
        self.script.as_ref()
    }

    /// Returns `true` if there is a parsed script.
    #[must_use]
    pub fn is_scripted(&self) -> bool {
        self.script.is_some()
    }

    /// Parses the source, replacing any earlier parse.
    ///
    /// Empty or blank source gives no script. On a parse error the script is
    /// cleared and the error returned; callers report it as a warning.
    pub fn parse(&mut self, string_mode: bool) -> Result<(), ParseError> {
        self.parse_named(string_mode, None)
    }

    /// Like [`parse`](Self::parse), naming the source in error messages.
    pub fn parse_named(&mut self, string_mode: bool, filename: Option<&str>) -> Result<(), ParseError> {
        self.script = None;
        if !string_mode && self.unparsed.trim().is_empty() {
            return Ok(());
        }
        let mut parser = Parser::new(&self.unparsed).string_mode(string_mode);
        if let Some(name) = filename {
            parser = parser.filename(name);
        }
        self.script = Some(parser.parse()?);
        Ok(())
    }

    /// Evaluates the script, or returns nil without one.
    pub fn invoke(&self, ctx: &mut Context, open_scope: bool) -> ScriptResult<ScriptValue> {
        match &self.script {
            Some(script) => ctx.eval(script, open_scope),
            None => Ok(ScriptValue::Nil),
        }
    }

    /// Analyses the script, reporting its reads by `dep` to `sink`.
    pub fn init_dependencies(&self, ctx: &mut Context, dep: Dependency, sink: &mut dyn DependencySink) {
        if let Some(script) = &self.script {
            ctx.dependencies(script, dep, sink);
        }
    }
}

/// An [`OptionalScript`] whose source is a string template: the whole text
/// is a string literal with `{...}` escapes.
///
/// ```
/// use cardscript::{Context, ScriptValue, StringScript};
///
/// let mut ctx = Context::new();
/// ctx.set_variable("n", ScriptValue::Int(4));
/// let title = StringScript::new("{n} of a kind").unwrap();
/// assert_eq!(title.invoke(&mut ctx).unwrap().to_string_value().unwrap(), "4 of a kind");
/// ```
#[derive(Clone, Debug, Default)]
pub struct StringScript {
    inner: OptionalScript,
}

impl StringScript {
    /// Parses `source` in string mode.
    pub fn new(source: impl Into<String>) -> Result<Self, ParseError> {
        let mut s = Self::default();
        s.set(source)?;
        Ok(s)
    }

    /// The template text.
    #[must_use]
    pub fn get(&self) -> &str {
        self.inner.unparsed()
    }

    /// Replaces the template text and reparses it. On a parse error the text
    /// is kept but the script is cleared.
    pub fn set(&mut self, source: impl Into<String>) -> Result<(), ParseError> {
        self.inner = OptionalScript::new(source);
        self.inner.parse(true)
    }

    /// Evaluates the template in a fresh scope.
    pub fn invoke(&self, ctx: &mut Context) -> ScriptResult<ScriptValue> {
        self.inner.invoke(ctx, true)
    }

    /// Analyses the template.
    pub fn init_dependencies(&self, ctx: &mut Context, dep: Dependency, sink: &mut dyn DependencySink) {
        self.inner.init_dependencies(ctx, dep, sink);
    }

    /// The underlying script.
    #[must_use]
    pub fn as_optional(&self) -> &OptionalScript {
        &self.inner
    }
}

/// Types a script result can be stored into.
pub trait FromScriptValue: Sized {
    /// Converts a script result.
    fn from_script_value(value: &ScriptValue) -> ScriptResult<Self>;
}

impl FromScriptValue for String {
    fn from_script_value(value: &ScriptValue) -> ScriptResult<Self> {
        value.to_string_value()
    }
}

impl FromScriptValue for i64 {
    fn from_script_value(value: &ScriptValue) -> ScriptResult<Self> {
        value.to_int()
    }
}

impl FromScriptValue for f64 {
    fn from_script_value(value: &ScriptValue) -> ScriptResult<Self> {
        value.to_double()
    }
}

impl FromScriptValue for bool {
    fn from_script_value(value: &ScriptValue) -> ScriptResult<Self> {
        value.to_bool()
    }
}

impl FromScriptValue for Color {
    fn from_script_value(value: &ScriptValue) -> ScriptResult<Self> {
        value.to_color()
    }
}

/// A property holding either a fixed value or a script computing it.
///
/// ```
/// use cardscript::{Context, Scriptable, ScriptValue};
///
/// let mut ctx = Context::new();
/// ctx.set_variable("w", ScriptValue::Int(3));
/// let mut width = Scriptable::scripted(0_i64, "w * 2").unwrap();
/// assert!(width.update(&mut ctx).unwrap());
/// assert_eq!(*width.get(), 6);
/// assert!(!width.update(&mut ctx).unwrap());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Scriptable<T> {
    script: OptionalScript,
    value: T,
}

impl<T> Scriptable<T> {
    /// A fixed value.
    #[must_use]
    pub fn fixed(value: T) -> Self {
        Self {
            script: OptionalScript::default(),
            value,
        }
    }

    /// A scripted value, `initial` until the first update.
    pub fn scripted(initial: T, source: impl Into<String>) -> Result<Self, ParseError> {
        let mut script = OptionalScript::new(source);
        script.parse(false)?;
        Ok(Self {
            script,
            value: initial,
        })
    }

    /// The current value.
    #[must_use]
    pub fn get(&self) -> &T {
        &self.value
    }

    /// The script.
    #[must_use]
    pub fn script(&self) -> &OptionalScript {
        &self.script
    }

    /// Returns `true` if the value is computed by a script.
    #[must_use]
    pub fn is_scripted(&self) -> bool {
        self.script.is_scripted()
    }
}

impl<T: FromScriptValue + PartialEq> Scriptable<T> {
    /// Re-runs the script. Returns whether the value changed.
    ///
    /// A fixed value never changes. On error the previous value is kept.
    pub fn update(&mut self, ctx: &mut Context) -> ScriptResult<bool> {
        if !self.script.is_scripted() {
            return Ok(false);
        }
        let result = self.script.invoke(ctx, true)?;
        let value = T::from_script_value(&result)?;
        if value == self.value {
            return Ok(false);
        }
        self.value = value;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardscript_dirty::ProbeSink;

    #[test]
    fn blank_source_is_scriptless() {
        let mut s = OptionalScript::new("   ");
        s.parse(false).unwrap();
        assert!(!s.is_scripted());
        assert!(s.invoke(&mut Context::new(), true).unwrap().is_nil());
    }

    #[test]
    fn reparse_is_idempotent() {
        let mut s = OptionalScript::new("1 + 1");
        s.parse(false).unwrap();
        let first = s.script().unwrap().dump();
        s.parse(false).unwrap();
        assert_eq!(s.script().unwrap().dump(), first);
    }

    #[test]
    fn failed_parse_clears_the_old_script() {
        let mut s = StringScript::new("ok").unwrap();
        assert!(s.as_optional().is_scripted());
        assert!(s.set("{ broken").is_err());
        assert_eq!(s.get(), "{ broken");
        assert!(!s.as_optional().is_scripted());
    }

    #[test]
    fn scriptless_analysis_reads_nothing() {
        let s = OptionalScript::new("");
        let mut probe = ProbeSink::new();
        s.init_dependencies(&mut Context::new(), Dependency::dummy(), &mut probe);
        assert!(!probe.touched_any());
    }

    #[test]
    fn errors_keep_the_previous_value() {
        let mut ctx = Context::new();
        let mut s = Scriptable::scripted(String::from("old"), "1 / 0").unwrap();
        assert!(s.update(&mut ctx).is_err());
        assert_eq!(s.get(), "old");
        let mut fixed = Scriptable::fixed(5_i64);
        assert!(!fixed.update(&mut ctx).unwrap());
    }
}
