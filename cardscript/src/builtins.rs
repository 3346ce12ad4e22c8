// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The standard function library.
//!
//! Every function takes its main argument as `input`, so that
//! `to_upper(name)` and `to_upper(input: name)` are the same call, and so
//! that library functions compose with `+`:
//!
//! ```
//! use cardscript::{Context, Parser};
//!
//! let mut ctx = Context::new();
//! cardscript::builtins::register(&mut ctx);
//! let script = Parser::new("shout := to_upper + { input & \"!\" }; shout(\"hi\")")
//!     .parse()
//!     .unwrap();
//! assert_eq!(ctx.eval(&script, true).unwrap().to_string_value().unwrap(), "HI!");
//! ```

use cardscript_dirty::{Dependency, DependencySink};

use crate::color::Color;
use crate::context::Context;
use crate::error::{ScriptError, ScriptResult};
use crate::function::{Function, NativeCall, NativeDependencies, NativeFunction};
use crate::object::Collection;
use crate::value::{ScriptType, ScriptValue, equal};

const FUNCTIONS: &[(&str, NativeCall, Option<NativeDependencies>)] = &[
    ("to_upper", to_upper, None),
    ("to_lower", to_lower, None),
    ("to_title", to_title, None),
    ("trim", trim, None),
    ("substring", substring, None),
    ("contains", contains, None),
    ("length", length, None),
    ("number_of_items", number_of_items, None),
    ("to_string", to_string, None),
    ("to_code", to_code, None),
    ("type_name", type_name, None),
    ("to_int", to_int, None),
    ("to_number", to_number, None),
    ("to_boolean", to_boolean, None),
    ("to_color", to_color, None),
    ("rgb", rgb, None),
    ("join", join, None),
    ("sort_list", sort_list, Some(sort_list_dependencies)),
    ("filter_list", filter_list, Some(filter_list_dependencies)),
    ("position", position, None),
    ("error", error, None),
];

/// Binds every library function as a variable of `ctx`.
pub fn register(ctx: &mut Context) {
    for &(name, call, dependencies) in FUNCTIONS {
        let mut f = NativeFunction::new(name, call);
        if let Some(dependencies) = dependencies {
            f = f.with_dependencies(dependencies);
        }
        ctx.set_variable(name, Function::builtin(f).into());
    }
}

/// A required argument.
fn param(ctx: &Context, name: &str) -> ScriptResult<ScriptValue> {
    ctx.get_variable(name)
}

/// An argument given at this call, if it is not nil.
fn optional(ctx: &Context, name: &str) -> Option<ScriptValue> {
    if !ctx.is_bound_in_current_scope(name) {
        return None;
    }
    ctx.get_variable_opt(name).filter(|v| !v.is_nil())
}

fn input_string(ctx: &Context) -> ScriptResult<String> {
    param(ctx, "input")?.to_string_value()
}

/// Collects the items of a collection-like value.
fn items(value: &ScriptValue) -> ScriptResult<Vec<ScriptValue>> {
    let it = value.make_iterator().check()?;
    let mut out = Vec::new();
    while let Some(v) = it.next_value()? {
        out.push(v);
    }
    Ok(out)
}

fn to_upper(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    Ok(input_string(ctx)?.to_uppercase().into())
}

fn to_lower(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    Ok(input_string(ctx)?.to_lowercase().into())
}

// Capitalises the first letter of every word.
fn to_title(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    let input = input_string(ctx)?;
    let mut out = String::with_capacity(input.len());
    let mut word_start = true;
    for c in input.chars() {
        if word_start && c.is_alphabetic() {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        word_start = !c.is_alphanumeric();
    }
    Ok(out.into())
}

fn trim(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    Ok(input_string(ctx)?.trim().into())
}

// substring(input, begin: 0, end: length), in characters; out of range
// bounds are clamped.
fn substring(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    let input = input_string(ctx)?;
    let begin = optional(ctx, "begin").map_or(Ok(0), |v| v.to_int())?.max(0);
    let end = optional(ctx, "end").map_or(Ok(i64::MAX), |v| v.to_int())?.max(0);
    let begin = usize::try_from(begin).unwrap_or(usize::MAX);
    let end = usize::try_from(end).unwrap_or(usize::MAX);
    if begin >= end {
        return Ok(ScriptValue::from(""));
    }
    let s: String = input.chars().skip(begin).take(end - begin).collect();
    Ok(s.into())
}

fn contains(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    let input = input_string(ctx)?;
    let needle = param(ctx, "match")?.to_string_value()?;
    Ok(input.contains(&needle).into())
}

fn count(value: &ScriptValue) -> ScriptResult<ScriptValue> {
    let n = value.item_count()?;
    Ok(i64::try_from(n).unwrap_or(i64::MAX).into())
}

fn length(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    count(&param(ctx, "input")?)
}

fn number_of_items(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    count(&param(ctx, "in")?)
}

fn to_string(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    Ok(input_string(ctx)?.into())
}

fn to_code(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    Ok(param(ctx, "input")?.to_code()?.into())
}

fn type_name(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    Ok(param(ctx, "input")?.type_name().into())
}

fn to_int(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    Ok(param(ctx, "input")?.to_int()?.into())
}

// Keeps integers integral, everything else becomes a double.
fn to_number(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    let input = param(ctx, "input")?;
    Ok(match &input {
        ScriptValue::Int(_) | ScriptValue::Double(_) => input,
        ScriptValue::Nil => ScriptValue::Int(0),
        ScriptValue::Bool(b) => ScriptValue::Int(i64::from(*b)),
        ScriptValue::String(s) => match s.trim().parse::<i64>() {
            Ok(i) => ScriptValue::Int(i),
            Err(_) => ScriptValue::Double(input.to_double()?),
        },
        v => ScriptValue::Double(v.to_double()?),
    })
}

fn to_boolean(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    Ok(param(ctx, "input")?.to_bool()?.into())
}

fn to_color(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    Ok(param(ctx, "input")?.to_color()?.into())
}

// rgb(r:, g:, b:) with channels clamped to 0..=255.
fn rgb(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    let channel = |name: &str| -> ScriptResult<u8> {
        let v = param(ctx, name)?.to_int()?;
        Ok(u8::try_from(v.clamp(0, 255)).unwrap_or(u8::MAX))
    };
    Ok(Color::rgb(channel("r")?, channel("g")?, channel("b")?).into())
}

fn join(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    let separator = match optional(ctx, "separator") {
        Some(s) => s.to_string_value()?,
        None => String::new(),
    };
    let parts = items(&param(ctx, "input")?)?
        .iter()
        .map(ScriptValue::to_string_value)
        .collect::<ScriptResult<Vec<_>>>()?;
    Ok(parts.join(&separator).into())
}

// sort_list(input, order_by: f, remove_duplicates: false). Items are ordered
// by the text of `order_by(input: item)`, or their own text.
fn sort_list(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    let input = param(ctx, "input")?;
    let order_by = optional(ctx, "order_by");
    let remove_duplicates = optional(ctx, "remove_duplicates")
        .map_or(Ok(false), |v| v.to_bool())?;

    if input.script_type() == ScriptType::String {
        let mut chars: Vec<char> = input.to_string_value()?.chars().collect();
        chars.sort_unstable();
        if remove_duplicates {
            chars.dedup();
        }
        return Ok(chars.into_iter().collect::<String>().into());
    }

    let mut keyed = Vec::new();
    for item in items(&input)? {
        let key = match &order_by {
            Some(f) => ctx.call_with(f, &[("input", item.clone())])?,
            None => item.clone(),
        };
        keyed.push((key.to_string_value()?, item));
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    if remove_duplicates {
        keyed.dedup_by(|a, b| a.0 == b.0);
    }
    Ok(keyed.into_iter().map(|(_, v)| v).collect::<Collection>().into())
}

fn filter_list(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    let input = param(ctx, "input")?;
    let filter = param(ctx, "filter")?;
    let mut kept = Collection::new();
    for item in items(&input)? {
        if ctx.call_with(&filter, &[("input", item.clone())])?.to_bool()? {
            kept.push(item);
        }
    }
    Ok(kept.into())
}

// position(of, in): index of the first equal item, or of a substring, or -1.
fn position(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    let of = param(ctx, "of")?;
    let within = param(ctx, "in")?;
    let found = if within.script_type() == ScriptType::String {
        let haystack = within.to_string_value()?;
        let needle = of.to_string_value()?;
        haystack
            .find(&needle)
            .map(|byte| haystack[..byte].chars().count())
    } else {
        let mut found = None;
        for (i, item) in items(&within)?.iter().enumerate() {
            if equal(&of, item)? {
                found = Some(i);
                break;
            }
        }
        found
    };
    Ok(found.map_or(-1, |i| i64::try_from(i).unwrap_or(i64::MAX)).into())
}

// A delayed error: raised when used, caught by `or else`.
fn error(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    Ok(ScriptValue::error(ScriptError::Custom(input_string(ctx)?)))
}

/// The item a function argument sees during analysis: the first item of the
/// analysed collection, or a dummy.
fn analysis_item(list: &ScriptValue, dep: Dependency, sink: &mut dyn DependencySink) -> ScriptValue {
    list.dependency_iterator(dep, sink)
        .next_value()
        .ok()
        .flatten()
        .unwrap_or_else(ScriptValue::dummy)
}

fn analyse_callback(
    ctx: &mut Context,
    callback: &str,
    dep: Dependency,
    sink: &mut dyn DependencySink,
) -> ScriptValue {
    let input = ctx
        .get_variable_opt("input")
        .unwrap_or_else(ScriptValue::dummy);
    if let Some(f) = ctx.get_variable_opt(callback) {
        let item = analysis_item(&input, dep, sink);
        ctx.call_dependencies_with(&f, &[("input", item)], dep, sink);
    }
    input
}

fn sort_list_dependencies(ctx: &mut Context, dep: Dependency, sink: &mut dyn DependencySink) -> ScriptValue {
    analyse_callback(ctx, "order_by", dep, sink)
}

fn filter_list_dependencies(
    ctx: &mut Context,
    dep: Dependency,
    sink: &mut dyn DependencySink,
) -> ScriptValue {
    analyse_callback(ctx, "filter", dep, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn run(src: &str) -> ScriptValue {
        let mut ctx = Context::new();
        register(&mut ctx);
        let script = Parser::new(src).parse().unwrap();
        ctx.eval(&script, true).unwrap()
    }

    fn text(src: &str) -> String {
        run(src).to_string_value().unwrap()
    }

    #[test]
    fn case_conversion() {
        assert_eq!(text("to_upper(\"abc\")"), "ABC");
        assert_eq!(text("to_lower(\"ABC\")"), "abc");
        assert_eq!(text("to_title(\"the GREAT wall\")"), "The Great Wall");
    }

    #[test]
    fn rgb_clamps_channels() {
        assert_eq!(text("rgb(r: 300, g: 128, b: -4)"), "rgb(255,128,0)");
    }

    #[test]
    fn substring_clamps() {
        assert_eq!(text("substring(\"abcdef\", begin: 1, end: 3)"), "bc");
        assert_eq!(text("substring(\"abcdef\", begin: 4)"), "ef");
        assert_eq!(text("substring(\"abc\", begin: 5)"), "");
        assert_eq!(text("substring(\"abc\", begin: -2, end: 1)"), "a");
    }

    #[test]
    fn optional_arguments_do_not_leak_from_callers() {
        assert_eq!(text("begin := 2; substring(\"abcdef\")"), "abcdef");
    }

    #[test]
    fn conversions() {
        assert!(matches!(run("to_number(\"12\")"), ScriptValue::Int(12)));
        assert!(matches!(run("to_number(\"1.5\")"), ScriptValue::Double(d) if d == 1.5));
        assert!(matches!(run("to_int(\"7\")"), ScriptValue::Int(7)));
        assert!(matches!(run("to_boolean(\"yes\")"), ScriptValue::Bool(true)));
        assert_eq!(text("type_name(1.5)"), "double");
        assert_eq!(text("to_code(\"a\")"), "\"a\"");
    }

    #[test]
    fn lists() {
        assert_eq!(text("join([1, 2, 3], separator: \"-\")"), "1-2-3");
        assert_eq!(text("join(sort_list([\"b\", \"c\", \"a\"]))"), "abc");
        assert_eq!(
            text("join(sort_list([\"xb\", \"ya\", \"zc\"], order_by: { substring(input, begin: 1) }))"),
            "yaxbzc"
        );
        assert_eq!(text("join(filter_list([1, 2, 3, 4], filter: { input mod 2 = 0 }))"), "24");
        assert_eq!(text("sort_list(\"banana\", remove_duplicates: true)"), "abn");
        assert_eq!(run("number_of_items(in: [1, 2])").to_int().unwrap(), 2);
        assert_eq!(run("length(\"four\")").to_int().unwrap(), 4);
    }

    #[test]
    fn positions() {
        assert_eq!(run("position(of: 3, in: [1, 2, 3])").to_int().unwrap(), 2);
        assert_eq!(run("position(of: 9, in: [1, 2, 3])").to_int().unwrap(), -1);
        assert_eq!(run("position(of: \"c\", in: \"abc\")").to_int().unwrap(), 2);
        assert!(matches!(run("contains(\"abc\", match: \"bc\")"), ScriptValue::Bool(true)));
    }

    #[test]
    fn errors_are_delayed() {
        assert_eq!(text("error(\"boom\") or else \"caught\""), "caught");
        let mut ctx = Context::new();
        register(&mut ctx);
        let script = Parser::new("error(\"boom\") + 1").parse().unwrap();
        assert_eq!(
            ctx.eval(&script, true).unwrap_err(),
            ScriptError::Custom("boom".into())
        );
    }
}
