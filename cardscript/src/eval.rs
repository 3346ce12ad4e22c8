// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The interpreter loop, shared by evaluation and dependency analysis.
//!
//! Both modes run the same instructions over the same stack and scopes. They
//! differ only in the [`ExecMode`] hooks: how variables and members are read,
//! how jumps are taken and what operators compute. Analysis follows both arms
//! of every conditional "in parallel": a conditional jump leaves a
//! [`JumpRecord`] behind and falls through, and when execution reaches the
//! record's target the two paths are joined by unifying their stacks and
//! bindings.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::rc::Rc;

use cardscript_dirty::{Dependency, DependencySink};

use crate::color::Color;
use crate::context::Context;
use crate::error::{ScriptError, ScriptResult};
use crate::function::Function;
use crate::object::{Collection, RangeIterator};
use crate::script::{BinaryOp, Instruction, Script, TernaryOp, UnaryOp};
use crate::value::{ScriptType, ScriptValue, compare, equal, unified};

/// Where a running script's stack and bindings begin.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Frame {
    base: usize,
    mark: usize,
}

/// The operations that differ between evaluation and analysis.
pub(crate) trait ExecMode {
    /// Whether instructions count against the context's limit.
    const LIMITED: bool;

    /// Called before every instruction.
    fn before(&mut self, ctx: &mut Context, pc: usize, frame: Frame) -> ScriptResult<()>;

    fn get_var(&mut self, ctx: &Context, name: &Rc<str>) -> ScriptResult<ScriptValue>;

    fn member(&mut self, container: &ScriptValue, name: &ScriptValue) -> ScriptResult<ScriptValue>;

    /// Returns the next instruction position.
    fn jump(&mut self, ctx: &mut Context, frame: Frame, target: usize, next: usize) -> usize;

    /// Returns the next instruction position.
    fn jump_if_not(
        &mut self,
        ctx: &mut Context,
        frame: Frame,
        condition: &ScriptValue,
        target: usize,
        next: usize,
    ) -> ScriptResult<usize>;

    fn loop_next(&mut self, iterator: &mut ScriptValue) -> ScriptResult<Option<ScriptValue>>;

    fn call(&mut self, ctx: &mut Context, function: &ScriptValue) -> ScriptResult<ScriptValue>;

    fn unary(&mut self, op: UnaryOp, a: &ScriptValue) -> ScriptResult<ScriptValue>;

    fn binary(&mut self, op: BinaryOp, a: ScriptValue, b: ScriptValue) -> ScriptResult<ScriptValue>;

    fn ternary(
        &mut self,
        op: TernaryOp,
        a: &ScriptValue,
        b: &ScriptValue,
        c: &ScriptValue,
    ) -> ScriptResult<ScriptValue>;
}

/// Runs `script` to completion, restoring the stack and scope afterwards.
pub(crate) fn run<M: ExecMode>(
    ctx: &mut Context,
    script: &Script,
    mode: &mut M,
    open_scope: bool,
) -> ScriptResult<ScriptValue> {
    let base = ctx.stack.len();
    let scope = open_scope.then(|| ctx.open_scope());
    let frame = Frame {
        base,
        mark: scope.unwrap_or_else(|| ctx.shadow_mark()),
    };
    let result = execute(ctx, script, mode, frame);
    ctx.stack.truncate(base);
    if let Some(mark) = scope {
        ctx.close_scope(mark);
    }
    result
}

fn execute<M: ExecMode>(
    ctx: &mut Context,
    script: &Script,
    mode: &mut M,
    frame: Frame,
) -> ScriptResult<ScriptValue> {
    let mut pc = 0;
    loop {
        if M::LIMITED {
            ctx.tick()?;
        }
        mode.before(ctx, pc, frame)?;
        let instr = script.instruction(pc)?;
        pc += 1;
        match instr {
            Instruction::PushConst(i) => {
                let c = script.constant(i)?.clone();
                ctx.stack.push(c);
            }
            Instruction::Pop => {
                ctx.pop()?;
            }
            Instruction::Jump(target) => {
                pc = mode.jump(ctx, frame, target as usize, pc);
            }
            Instruction::JumpIfNot(target) => {
                let condition = ctx.pop()?;
                pc = mode.jump_if_not(ctx, frame, &condition, target as usize, pc)?;
            }
            Instruction::GetVar(n) => {
                let value = mode.get_var(ctx, script.name(n)?)?;
                ctx.stack.push(value);
            }
            Instruction::SetVar(n) => {
                let value = ctx.top()?.clone();
                ctx.set_variable(script.name(n)?.clone(), value);
            }
            Instruction::MemberConst(i) => {
                let container = ctx.pop()?;
                let value = mode.member(&container, script.constant(i)?)?;
                ctx.stack.push(value);
            }
            Instruction::Loop(target) => {
                let at = ctx
                    .stack
                    .len()
                    .checked_sub(2)
                    .filter(|&at| at >= frame.base)
                    .ok_or_else(|| ScriptError::Internal("loop without iterator".into()))?;
                match mode.loop_next(&mut ctx.stack[at])? {
                    Some(item) => ctx.stack.push(item),
                    None => {
                        ctx.stack.remove(at);
                        pc = target as usize;
                    }
                }
            }
            Instruction::Call(args) => {
                let value = call(ctx, script, mode, args)?;
                ctx.stack.push(value);
            }
            Instruction::Ret => {
                let value = ctx.pop()?;
                if ctx.stack.len() != frame.base {
                    return Err(ScriptError::Internal("unbalanced value stack".into()));
                }
                return Ok(value);
            }
            Instruction::Unary(op) => {
                let a = ctx.pop()?;
                let value = mode.unary(op, &a)?;
                ctx.stack.push(value);
            }
            Instruction::Binary(op) => {
                let b = ctx.pop()?;
                let a = ctx.pop()?;
                let value = if op == BinaryOp::Member {
                    mode.member(&a, &b)?
                } else {
                    mode.binary(op, a, b)?
                };
                ctx.stack.push(value);
            }
            Instruction::Ternary(op) => {
                let c = ctx.pop()?;
                let b = ctx.pop()?;
                let a = ctx.pop()?;
                let value = mode.ternary(op, &a, &b, &c)?;
                ctx.stack.push(value);
            }
            Instruction::MakeList(n) => {
                let items = ctx.pop_n(n as usize)?;
                ctx.stack.push(items.into_iter().collect::<Collection>().into());
            }
            Instruction::MakeMap(keys) => {
                let keys = script.arg_list(keys)?;
                let items = ctx.pop_n(keys.len())?;
                let mut map = Collection::new();
                for (&key, value) in keys.iter().zip(items) {
                    map.push_keyed(script.name(key)?.clone(), value);
                }
                ctx.stack.push(map.into());
            }
            Instruction::Closure(args) => {
                let names = script.arg_list(args)?;
                let values = ctx.pop_n(names.len())?;
                let function = ctx.pop()?;
                let bindings = names
                    .iter()
                    .zip(values)
                    .map(|(&n, v)| Ok((script.name(n)?.clone(), v)))
                    .collect::<ScriptResult<Vec<_>>>()?;
                ctx.stack
                    .push(Function::Closure { function, bindings }.into());
            }
        }
    }
}

fn call<M: ExecMode>(
    ctx: &mut Context,
    script: &Script,
    mode: &mut M,
    args: u32,
) -> ScriptResult<ScriptValue> {
    let names = script.arg_list(args)?;
    let values = ctx.pop_n(names.len())?;
    let function = ctx.pop()?;
    let mut scope = ctx.local_scope();
    for (&name, value) in names.iter().zip(values) {
        scope.set_variable(script.name(name)?.clone(), value);
    }
    mode.call(&mut scope, &function)
}

/// Normal evaluation.
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct Evaluate;

impl ExecMode for Evaluate {
    const LIMITED: bool = true;

    fn before(&mut self, _ctx: &mut Context, _pc: usize, _frame: Frame) -> ScriptResult<()> {
        Ok(())
    }

    fn get_var(&mut self, ctx: &Context, name: &Rc<str>) -> ScriptResult<ScriptValue> {
        ctx.get_variable(name)
    }

    fn member(&mut self, container: &ScriptValue, name: &ScriptValue) -> ScriptResult<ScriptValue> {
        Ok(container.get_member(&name.to_string_value()?))
    }

    fn jump(&mut self, _ctx: &mut Context, _frame: Frame, target: usize, _next: usize) -> usize {
        target
    }

    fn jump_if_not(
        &mut self,
        _ctx: &mut Context,
        _frame: Frame,
        condition: &ScriptValue,
        target: usize,
        next: usize,
    ) -> ScriptResult<usize> {
        Ok(if condition.to_bool()? { next } else { target })
    }

    fn loop_next(&mut self, iterator: &mut ScriptValue) -> ScriptResult<Option<ScriptValue>> {
        iterator.next_value()
    }

    fn call(&mut self, ctx: &mut Context, function: &ScriptValue) -> ScriptResult<ScriptValue> {
        ctx.call_value(function)
    }

    fn unary(&mut self, op: UnaryOp, a: &ScriptValue) -> ScriptResult<ScriptValue> {
        Ok(match op {
            UnaryOp::MakeIterator => a.make_iterator(),
            UnaryOp::Negate => match a {
                ScriptValue::Int(i) => ScriptValue::Int(i.wrapping_neg()),
                ScriptValue::Double(d) => ScriptValue::Double(-d),
                v => ScriptValue::Int(v.to_int()?.wrapping_neg()),
            },
            UnaryOp::Not => ScriptValue::Bool(!a.to_bool()?),
        })
    }

    fn binary(&mut self, op: BinaryOp, a: ScriptValue, b: ScriptValue) -> ScriptResult<ScriptValue> {
        binary_op(op, a, b)
    }

    fn ternary(
        &mut self,
        op: TernaryOp,
        a: &ScriptValue,
        b: &ScriptValue,
        c: &ScriptValue,
    ) -> ScriptResult<ScriptValue> {
        match op {
            TernaryOp::Rgb => Ok(Color::from_channels(a.to_int()?, b.to_int()?, c.to_int()?).into()),
        }
    }
}

fn is_number(t: ScriptType) -> bool {
    matches!(t, ScriptType::Int | ScriptType::Double)
}

/// Applies a binary operator to two concrete values.
pub(crate) fn binary_op(op: BinaryOp, a: ScriptValue, b: ScriptValue) -> ScriptResult<ScriptValue> {
    use ScriptValue as V;
    let (at, bt) = (a.script_type(), b.script_type());
    let either = |t: ScriptType| at == t || bt == t;
    let doubles = either(ScriptType::Double);
    Ok(match op {
        BinaryOp::OrElse => match a {
            V::Error(_) => b,
            a => a,
        },
        BinaryOp::RangeIterator => V::iterator(RangeIterator::new(a.to_int()?, b.to_int()?)),
        BinaryOp::Member => a.get_member(&b.to_string_value()?),
        BinaryOp::Add => match (a, b) {
            (V::Error(e), _) | (_, V::Error(e)) => return Err((*e).clone()),
            (V::Nil, b) => b,
            (a, V::Nil) => a,
            (a @ V::Function(_), b @ V::Function(_)) => Function::Compose(a, b).into(),
            (V::Collection(x), V::Collection(y)) => {
                x.iter().chain(y.iter()).cloned().collect::<Collection>().into()
            }
            (a, b) if either(ScriptType::String) || !is_number(at) || !is_number(bt) => {
                V::from(a.to_string_value()? + &b.to_string_value()?)
            }
            (a, b) if doubles => V::Double(a.to_double()? + b.to_double()?),
            (a, b) => V::Int(a.to_int()?.wrapping_add(b.to_int()?)),
        },
        BinaryOp::Concat => V::from(a.to_string_value()? + &b.to_string_value()?),
        BinaryOp::Sub if doubles => V::Double(a.to_double()? - b.to_double()?),
        BinaryOp::Sub => V::Int(a.to_int()?.wrapping_sub(b.to_int()?)),
        BinaryOp::Mul if doubles => V::Double(a.to_double()? * b.to_double()?),
        BinaryOp::Mul => V::Int(a.to_int()?.wrapping_mul(b.to_int()?)),
        BinaryOp::Div if doubles => V::Double(a.to_double()? / b.to_double()?),
        BinaryOp::Div => {
            let (x, y) = (a.to_int()?, b.to_int()?);
            if y == 0 {
                return Err(ScriptError::DivisionByZero);
            }
            match (x.checked_rem(y), x.checked_div(y)) {
                (Some(0), Some(q)) => V::Int(q),
                // Inexact, or `i64::MIN / -1`.
                _ => V::Double(a.to_double()? / b.to_double()?),
            }
        }
        BinaryOp::Mod if doubles => V::Double(a.to_double()? % b.to_double()?),
        BinaryOp::Mod => {
            let y = b.to_int()?;
            if y == 0 {
                return Err(ScriptError::DivisionByZero);
            }
            V::Int(a.to_int()?.wrapping_rem(y))
        }
        BinaryOp::And => V::Bool(a.to_bool()? && b.to_bool()?),
        BinaryOp::Or => V::Bool(a.to_bool()? || b.to_bool()?),
        BinaryOp::Eq => V::Bool(equal(&a, &b)?),
        BinaryOp::Neq => V::Bool(!equal(&a, &b)?),
        BinaryOp::Lt => V::Bool(compare(&a, &b)? == Ordering::Less),
        BinaryOp::Gt => V::Bool(compare(&a, &b)? == Ordering::Greater),
        BinaryOp::Le => V::Bool(compare(&a, &b)? != Ordering::Greater),
        BinaryOp::Ge => V::Bool(compare(&a, &b)? != Ordering::Less),
    })
}

/// A path of execution postponed until control reaches `target`.
#[derive(Debug)]
struct JumpRecord {
    target: usize,
    seq: usize,
    stack_top: Vec<ScriptValue>,
    bindings: Vec<(Rc<str>, ScriptValue)>,
}

impl PartialEq for JumpRecord {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for JumpRecord {}

impl PartialOrd for JumpRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for JumpRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.target, self.seq).cmp(&(other.target, other.seq))
    }
}

/// Dependency analysis: external reads are reported to a sink instead of
/// producing real data.
pub(crate) struct Analyse<'s> {
    dep: Dependency,
    sink: &'s mut dyn DependencySink,
    jumps: BinaryHeap<Reverse<JumpRecord>>,
    seq: usize,
}

impl std::fmt::Debug for Analyse<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyse")
            .field("dep", &self.dep)
            .field("pending_jumps", &self.jumps.len())
            .finish_non_exhaustive()
    }
}

impl<'s> Analyse<'s> {
    pub(crate) fn new(dep: Dependency, sink: &'s mut dyn DependencySink) -> Self {
        Self {
            dep,
            sink,
            jumps: BinaryHeap::new(),
            seq: 0,
        }
    }

    fn record(&mut self, ctx: &Context, frame: Frame, target: usize, stack_top: Vec<ScriptValue>) {
        self.seq += 1;
        self.jumps.push(Reverse(JumpRecord {
            target,
            seq: self.seq,
            stack_top,
            bindings: ctx.bindings_since(frame.mark),
        }));
    }
}

impl ExecMode for Analyse<'_> {
    const LIMITED: bool = false;

    fn before(&mut self, ctx: &mut Context, pc: usize, frame: Frame) -> ScriptResult<()> {
        while self.jumps.peek().is_some_and(|j| j.0.target == pc) {
            let Some(Reverse(record)) = self.jumps.pop() else {
                break;
            };
            if ctx.stack.len() != frame.base + record.stack_top.len() {
                return Err(ScriptError::Internal(
                    "stack depth differs at a control-flow join".into(),
                ));
            }
            for (slot, other) in ctx.stack[frame.base..].iter_mut().zip(&record.stack_top) {
                *slot = unified(slot, other);
            }
            for (name, value) in record.bindings {
                ctx.unify_variable(name, &value);
            }
        }
        Ok(())
    }

    fn get_var(&mut self, ctx: &Context, name: &Rc<str>) -> ScriptResult<ScriptValue> {
        Ok(ctx
            .get_variable_opt(name)
            .unwrap_or_else(|| ScriptValue::missing_variable(name)))
    }

    fn member(&mut self, container: &ScriptValue, name: &ScriptValue) -> ScriptResult<ScriptValue> {
        let name = if name.is_abstract() {
            None
        } else {
            name.to_string_value().ok()
        };
        Ok(container.dependency_member(name.as_deref(), self.dep, &mut *self.sink))
    }

    fn jump(&mut self, ctx: &mut Context, frame: Frame, target: usize, next: usize) -> usize {
        if target < next {
            // Backward jumps close loops, which run their body only once.
            return target;
        }
        let stack_top = ctx.stack.split_off(frame.base);
        self.record(ctx, frame, target, stack_top);
        ctx.reset_bindings(frame.mark);

        // Resume the postponed path with the lowest target.
        let Some(Reverse(resume)) = self.jumps.pop() else {
            return target;
        };
        ctx.stack.extend(resume.stack_top);
        for (name, value) in resume.bindings {
            ctx.set_variable(name, value);
        }
        resume.target
    }

    fn jump_if_not(
        &mut self,
        ctx: &mut Context,
        frame: Frame,
        _condition: &ScriptValue,
        target: usize,
        next: usize,
    ) -> ScriptResult<usize> {
        let stack_top = ctx.stack[frame.base..].to_vec();
        self.record(ctx, frame, target, stack_top);
        Ok(next)
    }

    fn loop_next(&mut self, iterator: &mut ScriptValue) -> ScriptResult<Option<ScriptValue>> {
        let item = iterator.next_value().unwrap_or(None);
        if item.is_some() {
            *iterator = ScriptValue::dummy();
        }
        Ok(item)
    }

    fn call(&mut self, ctx: &mut Context, function: &ScriptValue) -> ScriptResult<ScriptValue> {
        Ok(ctx.call_dependencies(function, self.dep, &mut *self.sink))
    }

    fn unary(&mut self, op: UnaryOp, a: &ScriptValue) -> ScriptResult<ScriptValue> {
        Ok(match op {
            UnaryOp::MakeIterator => a.dependency_iterator(self.dep, &mut *self.sink),
            UnaryOp::Negate | UnaryOp::Not => ScriptValue::dummy(),
        })
    }

    fn binary(&mut self, op: BinaryOp, a: ScriptValue, b: ScriptValue) -> ScriptResult<ScriptValue> {
        Ok(match op {
            BinaryOp::RangeIterator => ScriptValue::iterator(RangeIterator::new(0, 0)),
            // Either operand may flow through: function composition, or the
            // fallback of `or else`.
            BinaryOp::Add | BinaryOp::OrElse => unified(&a, &b),
            _ => ScriptValue::dummy(),
        })
    }

    fn ternary(
        &mut self,
        _op: TernaryOp,
        _a: &ScriptValue,
        _b: &ScriptValue,
        _c: &ScriptValue,
    ) -> ScriptResult<ScriptValue> {
        Ok(ScriptValue::dummy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(op: BinaryOp, a: impl Into<ScriptValue>, b: impl Into<ScriptValue>) -> ScriptValue {
        binary_op(op, a.into(), b.into()).unwrap()
    }

    #[test]
    fn add_is_overloaded() {
        assert!(matches!(bin(BinaryOp::Add, 1, 2), ScriptValue::Int(3)));
        assert!(matches!(bin(BinaryOp::Add, 1, 0.5), ScriptValue::Double(d) if d == 1.5));
        assert_eq!(bin(BinaryOp::Add, "a", 1).to_string_value().unwrap(), "a1");
        assert!(matches!(
            binary_op(BinaryOp::Add, ScriptValue::Nil, ScriptValue::Int(4)),
            Ok(ScriptValue::Int(4))
        ));
    }

    #[test]
    fn division_keeps_integers_when_exact() {
        assert!(matches!(bin(BinaryOp::Div, 6, 3), ScriptValue::Int(2)));
        assert!(matches!(bin(BinaryOp::Div, 7, 2), ScriptValue::Double(d) if d == 3.5));
        assert!(matches!(
            bin(BinaryOp::Div, i64::MIN, -1),
            ScriptValue::Double(d) if d == 9_223_372_036_854_775_808.0
        ));
        assert!(matches!(bin(BinaryOp::Div, i64::MIN, 1), ScriptValue::Int(i64::MIN)));
        assert_eq!(
            binary_op(BinaryOp::Div, 1.into(), 0.into()).unwrap_err(),
            ScriptError::DivisionByZero
        );
        assert_eq!(
            binary_op(BinaryOp::Mod, 1.into(), 0.into()).unwrap_err(),
            ScriptError::DivisionByZero
        );
    }

    #[test]
    fn or_else_catches_delayed_errors_only() {
        let err = ScriptValue::error(ScriptError::custom("x"));
        assert!(matches!(
            binary_op(BinaryOp::OrElse, err, 1.into()),
            Ok(ScriptValue::Int(1))
        ));
        assert!(matches!(bin(BinaryOp::OrElse, 2, 1), ScriptValue::Int(2)));
    }

    #[test]
    fn errors_reraise_in_arithmetic() {
        let err = ScriptValue::error(ScriptError::custom("x"));
        assert!(binary_op(BinaryOp::Add, err.clone(), 1.into()).is_err());
        assert!(binary_op(BinaryOp::Lt, err, 1.into()).is_err());
    }

    #[test]
    fn comparisons() {
        assert!(matches!(bin(BinaryOp::Lt, 2, 10), ScriptValue::Bool(true)));
        assert!(matches!(bin(BinaryOp::Eq, "1", 1), ScriptValue::Bool(true)));
        assert!(matches!(bin(BinaryOp::Ge, "b", "a"), ScriptValue::Bool(true)));
    }

    #[test]
    fn jump_records_order_by_target() {
        let mut heap = BinaryHeap::new();
        for (target, seq) in [(9, 1), (4, 2), (4, 3)] {
            heap.push(Reverse(JumpRecord {
                target,
                seq,
                stack_top: Vec::new(),
                bindings: Vec::new(),
            }));
        }
        let order: Vec<_> = std::iter::from_fn(|| heap.pop().map(|r| (r.0.target, r.0.seq))).collect();
        assert_eq!(order, [(4, 2), (4, 3), (9, 1)]);
    }
}
