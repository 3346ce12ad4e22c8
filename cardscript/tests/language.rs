// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Evaluation tests for the `cardscript` crate.
//!
//! These run whole scripts through the parser and the interpreter, covering
//! scoping, functions, closures, delayed errors and the instruction limit.

use cardscript::{
    Context, MAX_CALL_DEPTH, OptionalScript, Parser, ScriptError, ScriptValue, StringScript,
};

fn context() -> Context {
    let mut ctx = Context::new();
    cardscript::builtins::register(&mut ctx);
    ctx
}

fn eval(ctx: &mut Context, src: &str) -> Result<ScriptValue, ScriptError> {
    let script = Parser::new(src).parse().expect("script should parse");
    ctx.eval(&script, true)
}

fn text(src: &str) -> String {
    eval(&mut context(), src)
        .and_then(|v| v.to_string_value())
        .expect("script should evaluate")
}

#[test]
fn field_concatenation() {
    let mut ctx = context();
    ctx.set_variable("F1", ScriptValue::from("hello"));
    let v = eval(&mut ctx, "F1 & \" world\"").unwrap();
    assert_eq!(v.to_string_value().unwrap(), "hello world");
}

#[test]
fn scope_bindings_are_undone() {
    let mut ctx = context();
    eval(&mut ctx, "temp := 1").unwrap();
    assert!(ctx.get_variable("temp").is_err());

    // Without a scope the binding is global.
    let script = Parser::new("kept := 2").parse().unwrap();
    ctx.eval(&script, false).unwrap();
    assert_eq!(ctx.get_variable("kept").unwrap().to_int().unwrap(), 2);
}

#[test]
fn scope_is_closed_after_errors() {
    let mut ctx = context();
    let level = ctx.level();
    assert!(eval(&mut ctx, "x := 1; y := 1 / 0").is_err());
    assert_eq!(ctx.level(), level);
    assert!(ctx.get_variable("x").is_err());
}

#[test]
fn functions_see_their_callers_variables() {
    assert_eq!(text("greet := { \"hi \" & who }; who := \"bob\"; greet()"), "hi bob");
}

#[test]
fn call_arguments_shadow_and_restore() {
    assert_eq!(text("x := \"outer\"; f := { x }; f(x: \"inner\") & \"/\" & x"), "inner/outer");
}

#[test]
fn closures_bind_defaults() {
    assert_eq!(
        text("sep := join@(separator: \", \"); sep([\"a\", \"b\"])"),
        "a, b"
    );
    assert_eq!(
        text("sep := join@(separator: \", \"); sep([\"a\", \"b\"], separator: \"+\")"),
        "a+b"
    );
}

#[test]
fn composition_pipes_input() {
    assert_eq!(text("f := trim + to_upper; f(\"  quiet  \")"), "QUIET");
    assert_eq!(text("(nil + to_lower)(\"ABC\")"), "abc");
}

#[test]
fn calling_nil_returns_input() {
    assert_eq!(text("nothing := nil; nothing(\"same\")"), "same");
}

#[test]
fn smart_strings_nest() {
    assert_eq!(
        text("cards := [\"a\", \"b\"]; \"{length(cards)} cards: {join(cards, separator: \"{\",\"} \")}\""),
        "2 cards: a, b"
    );
}

#[test]
fn loops_over_collections() {
    assert_eq!(
        text("for each c in [\"x\", \"y\", \"z\"] do to_upper(c)"),
        "XYZ"
    );
    assert_eq!(
        eval(&mut context(), "total := 0; for i from 1 to 10 do total := total + i; total")
            .unwrap()
            .to_int()
            .unwrap(),
        55
    );
}

#[test]
fn delayed_errors() {
    let mut ctx = context();
    let v = eval(&mut ctx, "[1, 2].9").unwrap();
    assert!(matches!(v, ScriptValue::Error(_)));
    assert!(matches!(
        v.to_int(),
        Err(ScriptError::IndexOutOfRange { index: 9, len: 2 })
    ));
    assert_eq!(text("[1, 2].9 or else \"none\""), "none");
    assert_eq!(text("\"abc\".missing or else \"none\""), "none");
}

#[test]
fn runaway_recursion_is_an_error() {
    let mut ctx = context();
    assert_eq!(
        eval(&mut ctx, "f := { f() }\nf()").unwrap_err(),
        ScriptError::RecursionLimit(MAX_CALL_DEPTH)
    );
    // Through a library function as well.
    assert_eq!(
        eval(
            &mut ctx,
            "g := { filter_list([1], filter: { g() }) }\ng()"
        )
        .unwrap_err(),
        ScriptError::RecursionLimit(MAX_CALL_DEPTH)
    );
    // The depth is restored afterwards.
    let v = eval(&mut ctx, "h := { input + 1 }\nh(h(h(1)))").unwrap();
    assert_eq!(v.to_int().unwrap(), 4);
}

#[test]
fn undefined_variables_are_errors() {
    assert_eq!(
        eval(&mut context(), "unknown_thing").unwrap_err(),
        ScriptError::UndefinedVariable("unknown_thing".into())
    );
}

#[test]
fn instruction_limit() {
    let mut ctx = context();
    ctx.set_instruction_limit(Some(1_000));
    assert_eq!(
        eval(&mut ctx, "for i from 1 to 100000 do i").unwrap_err(),
        ScriptError::InstructionLimit { limit: 1_000 }
    );
    // The budget is per evaluation.
    assert!(eval(&mut ctx, "1 + 1").is_ok());
    assert!(eval(&mut ctx, "1 + 1").is_ok());
}

#[test]
fn broken_scripts_behave_as_scriptless() {
    let mut ctx = context();
    let mut script = OptionalScript::new("if then");
    let err = script.parse(false).unwrap_err();
    assert_eq!(err.line, 1);
    for _ in 0..3 {
        assert!(script.invoke(&mut ctx, true).unwrap().is_nil());
    }
}

#[test]
fn string_scripts() {
    let mut ctx = context();
    ctx.set_variable("name", ScriptValue::from("ogre"));
    let s = StringScript::new("A {to_title(name)} appears").unwrap();
    assert_eq!(
        s.invoke(&mut ctx).unwrap().to_string_value().unwrap(),
        "A Ogre appears"
    );
}

#[test]
fn colors() {
    assert_eq!(text("rgb(300, 128, -4)"), "rgb(255,128,0)");
    assert_eq!(text("to_color(\"rgb(1,2,3)\")"), "rgb(1,2,3)");
}

#[test]
fn comparison_and_equality() {
    assert_eq!(text("if 2 = 2.0 then \"same\" else \"different\""), "same");
    assert_eq!(text("if \"b\" > \"a\" then \"yes\" else \"no\""), "yes");
    assert_eq!(text("if [1, 2] == [1, 2] then \"yes\" else \"no\""), "yes");
    assert_eq!(text("if nil == \"\" then \"yes\" else \"no\""), "no");
}
