// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Callable values.

use std::fmt;
use std::rc::Rc;

use cardscript_dirty::{Dependency, DependencySink};

use crate::context::Context;
use crate::error::ScriptResult;
use crate::script::Script;
use crate::value::ScriptValue;

/// Something a script can call.
///
/// Arguments are passed as variable bindings in the scope opened for the
/// call. Unnamed arguments are bound to `input`.
#[derive(Clone, Debug)]
pub enum Function {
    /// A function literal `{ ... }` or a whole field script.
    Script(Rc<Script>),
    /// A function implemented by the host.
    Builtin(Rc<dyn BuiltinFunction>),
    /// `f + g`: calls `g` with `input` bound to the result of `f`.
    Compose(ScriptValue, ScriptValue),
    /// `f@(name: value)`: calls `f` with extra default arguments.
    ///
    /// Arguments given at the call site take precedence over the bound ones.
    Closure {
        /// The function being called.
        function: ScriptValue,
        /// The default arguments.
        bindings: Vec<(Rc<str>, ScriptValue)>,
    },
}

impl Function {
    /// Wraps a host function.
    #[must_use]
    pub fn builtin(f: impl BuiltinFunction + 'static) -> Self {
        Self::Builtin(Rc::new(f))
    }

    /// Returns a type name for messages.
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Self::Script(_) => "function".into(),
            Self::Builtin(b) => format!("function {}", b.name()),
            Self::Compose(..) => "composed function".into(),
            Self::Closure { function, .. } => format!("closure of {}", function.type_name()),
        }
    }
}

/// A function implemented by the host application.
pub trait BuiltinFunction: fmt::Debug {
    /// The name the function is registered under.
    fn name(&self) -> &str;

    /// Runs the function. Arguments are variables of `ctx`.
    fn call(&self, ctx: &mut Context) -> ScriptResult<ScriptValue>;

    /// Dependency analysis of a call.
    ///
    /// The default reads nothing external and returns a dummy. Functions that
    /// read host state, or call their function arguments, override this so
    /// that the reads are registered.
    fn dependencies(
        &self,
        ctx: &mut Context,
        dep: Dependency,
        sink: &mut dyn DependencySink,
    ) -> ScriptValue {
        let _ = (ctx, dep, sink);
        ScriptValue::dummy()
    }
}

/// Signature of [`NativeFunction::call`].
pub type NativeCall = fn(&mut Context) -> ScriptResult<ScriptValue>;

/// Signature of [`NativeFunction::with_dependencies`].
pub type NativeDependencies = fn(&mut Context, Dependency, &mut dyn DependencySink) -> ScriptValue;

/// A [`BuiltinFunction`] made of plain function pointers.
///
/// ```
/// use cardscript::{Context, Function, NativeFunction, Parser, ScriptValue};
///
/// let mut ctx = Context::new();
/// let twice = NativeFunction::new("twice", |ctx| {
///     let n = ctx.get_variable("input")?.to_int()?;
///     Ok(ScriptValue::Int(n * 2))
/// });
/// ctx.set_variable("twice", Function::builtin(twice).into());
///
/// let script = Parser::new("twice(21)").parse().unwrap();
/// assert!(matches!(ctx.eval(&script, true), Ok(ScriptValue::Int(42))));
/// ```
#[derive(Clone, Copy)]
pub struct NativeFunction {
    name: &'static str,
    call: NativeCall,
    dependencies: Option<NativeDependencies>,
}

impl NativeFunction {
    /// Creates a function that reads no external state.
    #[must_use]
    pub fn new(name: &'static str, call: NativeCall) -> Self {
        Self {
            name,
            call,
            dependencies: None,
        }
    }

    /// Adds custom dependency analysis.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: NativeDependencies) -> Self {
        self.dependencies = Some(dependencies);
        self
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("custom_dependencies", &self.dependencies.is_some())
            .finish_non_exhaustive()
    }
}

impl BuiltinFunction for NativeFunction {
    fn name(&self) -> &str {
        self.name
    }

    fn call(&self, ctx: &mut Context) -> ScriptResult<ScriptValue> {
        (self.call)(ctx)
    }

    fn dependencies(
        &self,
        ctx: &mut Context,
        dep: Dependency,
        sink: &mut dyn DependencySink,
    ) -> ScriptValue {
        match self.dependencies {
            Some(f) => f(ctx, dep, sink),
            None => ScriptValue::dummy(),
        }
    }
}
