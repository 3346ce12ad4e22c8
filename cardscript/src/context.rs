// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Evaluation environments.

use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use cardscript_dirty::{Dependency, DependencySink};
use hashbrown::HashMap;
use tracing::debug;

use crate::error::{ScriptError, ScriptResult};
use crate::eval::{self, Analyse, Evaluate};
use crate::function::Function;
use crate::script::Script;
use crate::value::{ScriptValue, unified};

/// Function calls nested deeper than this raise [`ScriptError::RecursionLimit`].
///
/// Every script call costs several interpreter frames, so the limit keeps
/// runaway recursion within a 2 MiB thread stack in unoptimised builds.
pub const MAX_CALL_DEPTH: usize = 64;

#[derive(Clone, Debug)]
struct Variable {
    value: ScriptValue,
    level: usize,
}

#[derive(Clone, Debug)]
struct Shadowed {
    name: Rc<str>,
    previous: Option<Variable>,
}

/// An evaluation environment: variables in nested scopes, a value stack and
/// the limits of the current evaluation.
///
/// Bindings made at the outermost level (level 0) are global and stay until
/// overwritten. Bindings made inside a scope shadow outer ones and are undone
/// when the scope closes.
///
/// ```
/// use cardscript::{Context, Parser, ScriptValue};
///
/// let mut ctx = Context::new();
/// ctx.set_variable("greeting", ScriptValue::from("hello"));
///
/// let script = Parser::new("greeting & \" world\"").parse().unwrap();
/// let value = ctx.eval(&script, true).unwrap();
/// assert_eq!(value.to_string_value().unwrap(), "hello world");
/// ```
#[derive(Debug, Default)]
pub struct Context {
    variables: HashMap<Rc<str>, Variable>,
    shadowed: Vec<Shadowed>,
    level: usize,
    pub(crate) stack: Vec<ScriptValue>,
    instruction_limit: Option<u64>,
    executed: u64,
    running: usize,
    depth: usize,
    analysing: Vec<Rc<Script>>,
}

impl Context {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of instructions a single top-level evaluation may run.
    pub fn set_instruction_limit(&mut self, limit: Option<u64>) {
        self.instruction_limit = limit;
    }

    /// The configured instruction cap.
    #[must_use]
    pub fn instruction_limit(&self) -> Option<u64> {
        self.instruction_limit
    }

    /// Binds `name` in the innermost scope.
    pub fn set_variable(&mut self, name: impl Into<Rc<str>>, value: ScriptValue) {
        let name = name.into();
        if self.level > 0 {
            match self.variables.get(&name) {
                Some(var) if var.level == self.level => {}
                previous => {
                    let previous = previous.cloned();
                    self.shadowed.push(Shadowed {
                        name: name.clone(),
                        previous,
                    });
                }
            }
        }
        self.variables.insert(
            name,
            Variable {
                value,
                level: self.level,
            },
        );
    }

    /// Looks up `name`, innermost binding first.
    pub fn get_variable(&self, name: &str) -> ScriptResult<ScriptValue> {
        self.get_variable_opt(name)
            .ok_or_else(|| ScriptError::UndefinedVariable(name.into()))
    }

    /// Looks up `name`, returning `None` if it is unbound.
    #[must_use]
    pub fn get_variable_opt(&self, name: &str) -> Option<ScriptValue> {
        self.variables.get(name).map(|v| v.value.clone())
    }

    /// Returns `true` if `name` is bound in the innermost scope.
    #[must_use]
    pub fn is_bound_in_current_scope(&self, name: &str) -> bool {
        self.level > 0 && self.variables.get(name).is_some_and(|v| v.level == self.level)
    }

    /// The current nesting level; 0 is the global scope.
    #[must_use]
    pub fn level(&self) -> usize {
        self.level
    }

    /// Opens a scope. Pass the returned mark to [`close_scope`](Self::close_scope).
    pub fn open_scope(&mut self) -> usize {
        self.level += 1;
        self.shadowed.len()
    }

    /// Closes the scope opened at `mark`, undoing its bindings.
    pub fn close_scope(&mut self, mark: usize) {
        self.level = self.level.saturating_sub(1);
        self.reset_bindings(mark);
    }

    /// Opens a scope that is closed when the guard drops.
    pub fn local_scope(&mut self) -> LocalScope<'_> {
        let mark = self.open_scope();
        LocalScope { ctx: self, mark }
    }

    pub(crate) fn shadow_mark(&self) -> usize {
        self.shadowed.len()
    }

    /// Undoes every binding made since `mark` without leaving the scope.
    pub(crate) fn reset_bindings(&mut self, mark: usize) {
        while self.shadowed.len() > mark {
            let Some(entry) = self.shadowed.pop() else {
                break;
            };
            match entry.previous {
                Some(var) => {
                    self.variables.insert(entry.name, var);
                }
                None => {
                    self.variables.remove(&entry.name);
                }
            }
        }
    }

    /// Current values of every variable bound since `mark`.
    pub(crate) fn bindings_since(&self, mark: usize) -> Vec<(Rc<str>, ScriptValue)> {
        self.shadowed
            .get(mark..)
            .unwrap_or_default()
            .iter()
            .filter_map(|s| Some((s.name.clone(), self.variables.get(&s.name)?.value.clone())))
            .collect()
    }

    /// Joins `value` into the binding of `name`, for control-flow merges.
    pub(crate) fn unify_variable(&mut self, name: Rc<str>, value: &ScriptValue) {
        let current = self
            .get_variable_opt(&name)
            .unwrap_or_else(|| ScriptValue::missing_variable(&name));
        self.set_variable(name, unified(&current, value));
    }

    pub(crate) fn pop(&mut self) -> ScriptResult<ScriptValue> {
        self.stack
            .pop()
            .ok_or_else(|| ScriptError::Internal("value stack underflow".into()))
    }

    pub(crate) fn pop_n(&mut self, n: usize) -> ScriptResult<Vec<ScriptValue>> {
        let at = self
            .stack
            .len()
            .checked_sub(n)
            .ok_or_else(|| ScriptError::Internal("value stack underflow".into()))?;
        Ok(self.stack.split_off(at))
    }

    pub(crate) fn top(&self) -> ScriptResult<&ScriptValue> {
        self.stack
            .last()
            .ok_or_else(|| ScriptError::Internal("value stack underflow".into()))
    }

    /// Counts one instruction against the limit.
    pub(crate) fn tick(&mut self) -> ScriptResult<()> {
        if let Some(limit) = self.instruction_limit {
            self.executed += 1;
            if self.executed > limit {
                return Err(ScriptError::InstructionLimit { limit });
            }
        }
        Ok(())
    }

    /// Evaluates `script`, in a fresh scope when `open_scope` is set.
    ///
    /// The value stack and the scope are restored whether or not evaluation
    /// succeeds.
    pub fn eval(&mut self, script: &Script, open_scope: bool) -> ScriptResult<ScriptValue> {
        if self.running == 0 {
            self.executed = 0;
        }
        self.running += 1;
        let result = eval::run(self, script, &mut Evaluate, open_scope);
        self.running -= 1;
        result
    }

    /// Runs `script` in dependency-analysis mode.
    ///
    /// Every external read is reported to `sink` as a read by `dep`. The
    /// result is an abstract stand-in for the script's value. Analysis never
    /// fails: anything that cannot be resolved becomes a dummy value.
    pub fn dependencies(
        &mut self,
        script: &Rc<Script>,
        dep: Dependency,
        sink: &mut dyn DependencySink,
    ) -> ScriptValue {
        self.analyse_script(script, dep, sink)
    }

    fn analyse_script(
        &mut self,
        script: &Rc<Script>,
        dep: Dependency,
        sink: &mut dyn DependencySink,
    ) -> ScriptValue {
        if self.analysing.iter().any(|s| Rc::ptr_eq(s, script)) {
            return ScriptValue::dummy();
        }
        self.analysing.push(script.clone());
        let mut mode = Analyse::new(dep, sink);
        let result = eval::run(self, script, &mut mode, true);
        self.analysing.pop();
        result.unwrap_or_else(|e| {
            debug!(error = %e, "dependency analysis degraded to dummy");
            ScriptValue::dummy()
        })
    }

    fn enter_call(&mut self) -> ScriptResult<()> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(ScriptError::RecursionLimit(MAX_CALL_DEPTH));
        }
        self.depth += 1;
        Ok(())
    }

    /// Calls `function` with the arguments already bound in the current
    /// scope.
    ///
    /// Calling nil returns the `input` argument. Calling a delayed error
    /// returns it. Calling anything else that is not a function gives a
    /// delayed [`ScriptError::NotCallable`].
    pub fn call_value(&mut self, function: &ScriptValue) -> ScriptResult<ScriptValue> {
        let f = match function {
            ScriptValue::Function(f) => f.clone(),
            ScriptValue::Nil => return Ok(self.get_variable_opt("input").unwrap_or_default()),
            ScriptValue::Error(_) => return Ok(function.clone()),
            ScriptValue::Abstract(_) => return Ok(ScriptValue::dummy()),
            v => return Ok(ScriptValue::error(ScriptError::NotCallable(v.type_name()))),
        };
        self.enter_call()?;
        let result = self.call_function(&f);
        self.depth -= 1;
        result
    }

    fn call_function(&mut self, f: &Function) -> ScriptResult<ScriptValue> {
        match f {
            Function::Script(script) => eval::run(self, script, &mut Evaluate, false),
            Function::Builtin(builtin) => builtin.call(self),
            Function::Compose(a, b) => {
                let input = self.call_value(a)?;
                self.set_variable("input", input);
                self.call_value(b)
            }
            Function::Closure { function, bindings } => {
                self.apply_bindings(bindings);
                self.call_value(function)
            }
        }
    }

    fn apply_bindings(&mut self, bindings: &[(Rc<str>, ScriptValue)]) {
        for (name, value) in bindings {
            if !self.is_bound_in_current_scope(name) {
                self.set_variable(name.clone(), value.clone());
            }
        }
    }

    /// Calls `function` in a fresh scope with the given named arguments.
    pub fn call_with(
        &mut self,
        function: &ScriptValue,
        args: &[(&str, ScriptValue)],
    ) -> ScriptResult<ScriptValue> {
        let mut scope = self.local_scope();
        for (name, value) in args {
            scope.set_variable(*name, value.clone());
        }
        scope.call_value(function)
    }

    /// The dependency-analysis counterpart of [`call_value`](Self::call_value).
    pub fn call_dependencies(
        &mut self,
        function: &ScriptValue,
        dep: Dependency,
        sink: &mut dyn DependencySink,
    ) -> ScriptValue {
        match function {
            ScriptValue::Function(f) => match &**f {
                Function::Script(script) => self.analyse_script(script, dep, sink),
                Function::Builtin(builtin) => {
                    if self.enter_call().is_err() {
                        return ScriptValue::dummy();
                    }
                    let result = builtin.dependencies(self, dep, sink);
                    self.depth -= 1;
                    result
                }
                Function::Compose(a, b) => {
                    let input = self.call_dependencies(a, dep, sink);
                    self.set_variable("input", input);
                    self.call_dependencies(b, dep, sink)
                }
                Function::Closure { function, bindings } => {
                    self.apply_bindings(bindings);
                    self.call_dependencies(function, dep, sink)
                }
            },
            ScriptValue::Abstract(a) => match &**a {
                crate::value::AbstractValue::Union(x, y) => {
                    let x = self.call_dependencies(x, dep, sink);
                    let y = self.call_dependencies(y, dep, sink);
                    unified(&x, &y)
                }
                _ => ScriptValue::dummy(),
            },
            ScriptValue::Nil => self.get_variable_opt("input").unwrap_or_else(ScriptValue::dummy),
            _ => ScriptValue::dummy(),
        }
    }

    /// Analyses a call of `function` in a fresh scope with the given named
    /// arguments.
    pub fn call_dependencies_with(
        &mut self,
        function: &ScriptValue,
        args: &[(&str, ScriptValue)],
        dep: Dependency,
        sink: &mut dyn DependencySink,
    ) -> ScriptValue {
        let mut scope = self.local_scope();
        for (name, value) in args {
            scope.set_variable(*name, value.clone());
        }
        scope.call_dependencies(function, dep, sink)
    }
}

/// A scope that closes itself when dropped, also on early return.
///
/// ```
/// use cardscript::{Context, ScriptValue};
///
/// let mut ctx = Context::new();
/// {
///     let mut scope = ctx.local_scope();
///     scope.set_variable("x", ScriptValue::Int(1));
///     assert!(scope.get_variable("x").is_ok());
/// }
/// assert!(ctx.get_variable("x").is_err());
/// ```
#[derive(Debug)]
pub struct LocalScope<'a> {
    ctx: &'a mut Context,
    mark: usize,
}

impl Deref for LocalScope<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        self.ctx
    }
}

impl DerefMut for LocalScope<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.ctx
    }
}

impl Drop for LocalScope<'_> {
    fn drop(&mut self) {
        self.ctx.close_scope(self.mark);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_scopes_shadow_and_restore() {
        let mut ctx = Context::new();
        ctx.set_variable("x", ScriptValue::Int(1));

        let mark = ctx.open_scope();
        ctx.set_variable("x", ScriptValue::Int(2));
        ctx.set_variable("y", ScriptValue::Int(3));
        ctx.set_variable("x", ScriptValue::Int(4));
        assert!(matches!(ctx.get_variable("x"), Ok(ScriptValue::Int(4))));
        ctx.close_scope(mark);

        assert!(matches!(ctx.get_variable("x"), Ok(ScriptValue::Int(1))));
        assert_eq!(
            ctx.get_variable("y").unwrap_err(),
            ScriptError::UndefinedVariable("y".into())
        );
        assert_eq!(ctx.level(), 0);
    }

    #[test]
    fn global_bindings_persist() {
        let mut ctx = Context::new();
        ctx.set_variable("g", ScriptValue::Int(1));
        ctx.set_variable("g", ScriptValue::Int(2));
        let mark = ctx.open_scope();
        ctx.close_scope(mark);
        assert!(matches!(ctx.get_variable("g"), Ok(ScriptValue::Int(2))));
    }

    #[test]
    fn local_scope_guard_closes_on_drop() {
        let mut ctx = Context::new();
        {
            let mut scope = ctx.local_scope();
            scope.set_variable("tmp", ScriptValue::Nil);
            assert_eq!(scope.level(), 1);
            assert!(scope.is_bound_in_current_scope("tmp"));
        }
        assert_eq!(ctx.level(), 0);
        assert!(ctx.get_variable_opt("tmp").is_none());
    }

    #[test]
    fn calling_nil_returns_input() {
        let mut ctx = Context::new();
        let v = ctx
            .call_with(&ScriptValue::Nil, &[("input", ScriptValue::Int(5))])
            .unwrap();
        assert!(matches!(v, ScriptValue::Int(5)));
        let v = ctx.call_with(&ScriptValue::Int(5), &[]).unwrap();
        assert!(matches!(v.as_error(), Some(ScriptError::NotCallable(_))));
    }

    #[test]
    fn bindings_since_reports_current_values() {
        let mut ctx = Context::new();
        let mark = ctx.open_scope();
        ctx.set_variable("a", ScriptValue::Int(1));
        ctx.set_variable("a", ScriptValue::Int(2));
        let b = ctx.bindings_since(mark);
        assert_eq!(b.len(), 1);
        assert!(matches!(b[0].1, ScriptValue::Int(2)));
        ctx.reset_bindings(mark);
        assert!(ctx.get_variable_opt("a").is_none());
        assert_eq!(ctx.level(), 1);
    }
}
