// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cardscript: a small embedded expression language whose scripts can be run
//! in two modes.
//!
//! - **Evaluation** ([`Context::eval`]) computes a [`ScriptValue`].
//! - **Dependency analysis** ([`Context::dependencies`]) runs the same
//!   instructions over abstract values and reports every external read to a
//!   [`DependencySink`](cardscript_dirty::DependencySink), so the host learns
//!   which inputs a script depends on without real data.
//!
//! Both modes share one interpreter; they differ only in how variables,
//! members, jumps and calls are resolved. Analysis follows both arms of every
//! conditional and runs loop bodies once, so the reads it reports are an
//! over-approximation of what any evaluation can read.
//!
//! ## Quick Start
//!
//! ```rust
//! use cardscript::{Context, Parser, ScriptValue};
//!
//! let mut ctx = Context::new();
//! cardscript::builtins::register(&mut ctx);
//! ctx.set_variable("name", ScriptValue::from("goblin"));
//!
//! let script = Parser::new(r#"if length(name) > 3 then to_upper(name) else name"#)
//!     .parse()
//!     .unwrap();
//! let value = ctx.eval(&script, true).unwrap();
//! assert_eq!(value.to_string_value().unwrap(), "GOBLIN");
//! ```
//!
//! Host data is exposed through [`ScriptObject`]. An object decides what a
//! member read means in analysis mode: a card object, for example, marks the
//! field it was asked for.
//!
//! ## Errors
//!
//! Parse errors are [`ParseError`]s. Runtime failures are [`ScriptError`]s,
//! returned through [`ScriptResult`]. Some failures, such as a missing member,
//! are *delayed*: they produce a [`ScriptValue::Error`] that only raises when
//! it is used, and that `a or else b` replaces by `b`.
//!
//! ## Features
//!
//! This crate currently has no optional features.

mod color;
mod context;
mod error;
mod eval;
mod function;
mod object;
mod parser;
mod script;
mod scriptable;
mod value;

pub mod builtins;

pub use color::Color;
pub use context::{Context, LocalScope, MAX_CALL_DEPTH};
pub use error::{ParseError, ScriptError, ScriptResult};
pub use function::{BuiltinFunction, Function, NativeCall, NativeDependencies, NativeFunction};
pub use object::{
    Collection, CollectionIterator, RangeIterator, ScriptIterator, ScriptObject, ValuesIterator,
};
pub use parser::Parser;
pub use script::{BinaryOp, Instruction, Script, TernaryOp, UnaryOp};
pub use scriptable::{FromScriptValue, OptionalScript, Scriptable, StringScript};
pub use value::{AbstractValue, ScriptType, ScriptValue, compare, equal, quote_string, unified};
