// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compiled scripts: a flat instruction list over a stack machine.

use std::fmt::{self, Write as _};
use std::rc::Rc;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::error::{ScriptError, ScriptResult};
use crate::value::ScriptValue;

/// Operators taking one operand.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    /// Turns a collection into an iterator, for `for each`.
    MakeIterator,
    /// Arithmetic negation.
    Negate,
    /// Boolean negation.
    Not,
}

/// Operators taking two operands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    /// Inclusive integer range iterator, for `for x from a to b`.
    RangeIterator,
    /// Member access with a computed name, `a[b]`.
    Member,
    /// `+`: numbers, text, collections, or function composition.
    Add,
    /// `-`.
    Sub,
    /// `*`.
    Mul,
    /// `/`.
    Div,
    /// `mod`.
    Mod,
    /// `and`.
    And,
    /// `or`.
    Or,
    /// `==`.
    Eq,
    /// `!=`.
    Neq,
    /// `<`.
    Lt,
    /// `>`.
    Gt,
    /// `<=`.
    Le,
    /// `>=`.
    Ge,
    /// `&`: text concatenation.
    Concat,
    /// `or else`: the right operand when the left is a delayed error.
    OrElse,
}

/// Operators taking three operands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TernaryOp {
    /// `rgb(r, g, b)`.
    Rgb,
}

/// One instruction. Operands are indices into the tables of the owning
/// [`Script`], or instruction positions for jumps.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Push a constant.
    PushConst(u32),
    /// Drop the top of the stack.
    Pop,
    /// Continue at the given position.
    Jump(u32),
    /// Pop a condition, continue at the given position when it is false.
    JumpIfNot(u32),
    /// Push the value of a variable.
    GetVar(u32),
    /// Bind a variable to the top of the stack, leaving it there.
    SetVar(u32),
    /// Replace the top of the stack with its member named by a constant.
    MemberConst(u32),
    /// With an iterator below the top of the stack: push its next item, or
    /// drop the iterator and continue at the given position.
    Loop(u32),
    /// Call the function below the arguments, binding them to the names of
    /// the given argument list.
    Call(u32),
    /// Return the top of the stack.
    Ret,
    /// Apply a unary operator to the top of the stack.
    Unary(UnaryOp),
    /// Apply a binary operator to the two topmost values.
    Binary(BinaryOp),
    /// Apply a ternary operator to the three topmost values.
    Ternary(TernaryOp),
    /// Collect this many values into a list.
    MakeList(u32),
    /// Collect values into a keyed list, keys from the given argument list.
    MakeMap(u32),
    /// Bind the values above a function to the names of the given argument
    /// list, producing a closure.
    Closure(u32),
}

/// A parsed, executable script.
///
/// Scripts are produced by the [`Parser`](crate::Parser) and are immutable
/// afterwards.
#[derive(Clone, Debug, Default)]
pub struct Script {
    instructions: Vec<Instruction>,
    constants: Vec<ScriptValue>,
    names: Vec<Rc<str>>,
    arg_lists: Vec<SmallVec<[u32; 4]>>,
}

impl Script {
    /// The instruction list.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Returns the number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns `true` if there are no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub(crate) fn instruction(&self, pc: usize) -> ScriptResult<Instruction> {
        self.instructions
            .get(pc)
            .copied()
            .ok_or_else(|| ScriptError::Internal(format!("no instruction at {pc}")))
    }

    pub(crate) fn constant(&self, index: u32) -> ScriptResult<&ScriptValue> {
        self.constants
            .get(index as usize)
            .ok_or_else(|| ScriptError::Internal(format!("no constant {index}")))
    }

    pub(crate) fn name(&self, index: u32) -> ScriptResult<&Rc<str>> {
        self.names
            .get(index as usize)
            .ok_or_else(|| ScriptError::Internal(format!("no variable name {index}")))
    }

    pub(crate) fn arg_list(&self, index: u32) -> ScriptResult<&[u32]> {
        self.arg_lists
            .get(index as usize)
            .map(|l| l.as_slice())
            .ok_or_else(|| ScriptError::Internal(format!("no argument list {index}")))
    }

    /// Returns the variable names the script reads or binds.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(|n| &**n)
    }

    /// Renders a human readable listing of the instructions.
    ///
    /// ```
    /// use cardscript::Parser;
    ///
    /// let script = Parser::new("1 + x").parse().unwrap();
    /// let listing = script.dump();
    /// assert!(listing.contains("get    x"));
    /// assert!(listing.contains("binary Add"));
    /// ```
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (pc, instr) in self.instructions.iter().enumerate() {
            let _ = writeln!(out, "{pc:4}: {}", self.describe(*instr));
        }
        out
    }

    fn describe(&self, instr: Instruction) -> String {
        let name = |i: u32| self.name(i).map_or("?", |n| &**n).to_owned();
        let args = |i: u32| {
            self.arg_list(i)
                .map(|l| l.iter().map(|&n| name(n)).collect::<Vec<_>>().join(", "))
                .unwrap_or_default()
        };
        match instr {
            Instruction::PushConst(i) => match self.constant(i) {
                Ok(ScriptValue::Function(_)) => "push   <function>".into(),
                Ok(c) => format!("push   {}", c.to_code().unwrap_or_else(|_| "<error>".into())),
                Err(_) => "push   ?".into(),
            },
            Instruction::Pop => "pop".into(),
            Instruction::Jump(t) => format!("jump   {t}"),
            Instruction::JumpIfNot(t) => format!("jnot   {t}"),
            Instruction::GetVar(n) => format!("get    {}", name(n)),
            Instruction::SetVar(n) => format!("set    {}", name(n)),
            Instruction::MemberConst(i) => format!(
                "member {}",
                self.constant(i).map(ToString::to_string).unwrap_or_default()
            ),
            Instruction::Loop(t) => format!("loop   {t}"),
            Instruction::Call(a) => format!("call   ({})", args(a)),
            Instruction::Ret => "ret".into(),
            Instruction::Unary(op) => format!("unary  {op:?}"),
            Instruction::Binary(op) => format!("binary {op:?}"),
            Instruction::Ternary(op) => format!("ternary {op:?}"),
            Instruction::MakeList(n) => format!("list   {n}"),
            Instruction::MakeMap(a) => format!("map    [{}]", args(a)),
            Instruction::Closure(a) => format!("close  @({})", args(a)),
        }
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump())
    }
}

/// Incrementally assembles a [`Script`].
#[derive(Debug, Default)]
pub(crate) struct ScriptBuilder {
    script: Script,
    name_ids: HashMap<Rc<str>, u32>,
}

impl ScriptBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Position of the next instruction.
    pub(crate) fn position(&self) -> u32 {
        to_u32(self.script.instructions.len())
    }

    pub(crate) fn emit(&mut self, instr: Instruction) -> u32 {
        let at = self.position();
        self.script.instructions.push(instr);
        at
    }

    pub(crate) fn push_const(&mut self, value: ScriptValue) {
        let index = to_u32(self.script.constants.len());
        self.script.constants.push(value);
        self.emit(Instruction::PushConst(index));
    }

    pub(crate) fn member_const(&mut self, name: &str) {
        let index = to_u32(self.script.constants.len());
        self.script.constants.push(ScriptValue::from(name));
        self.emit(Instruction::MemberConst(index));
    }

    pub(crate) fn name(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.name_ids.get(name) {
            return id;
        }
        let id = to_u32(self.script.names.len());
        let name: Rc<str> = name.into();
        self.script.names.push(name.clone());
        self.name_ids.insert(name, id);
        id
    }

    pub(crate) fn arg_list<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> u32 {
        let list = names.into_iter().map(|n| self.name(n)).collect();
        let index = to_u32(self.script.arg_lists.len());
        self.script.arg_lists.push(list);
        index
    }

    /// Removes a trailing `GetVar`, returning its variable. Used to turn a
    /// read into the target of an assignment.
    pub(crate) fn take_last_get_var(&mut self) -> Option<u32> {
        match self.script.instructions.last() {
            Some(&Instruction::GetVar(var)) => {
                self.script.instructions.pop();
                Some(var)
            }
            _ => None,
        }
    }

    /// Points the jump at `at` to the current position.
    pub(crate) fn patch_here(&mut self, at: u32) {
        let target = self.position();
        if let Some(instr) = self.script.instructions.get_mut(at as usize) {
            match instr {
                Instruction::Jump(t) | Instruction::JumpIfNot(t) | Instruction::Loop(t) => {
                    *t = target;
                }
                _ => {}
            }
        }
    }

    pub(crate) fn finish(mut self) -> Script {
        self.emit(Instruction::Ret);
        self.script
    }
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
