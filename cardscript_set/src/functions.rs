// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Script functions that know about sets.

use cardscript::{Context, Function, NativeFunction, ScriptError, ScriptResult, ScriptValue};
use cardscript_dirty::{Dependency, DependencySink, DependencySource, DependencyType};

/// Binds `combined_editor` and `expand_keywords` in `ctx`.
pub(crate) fn register(ctx: &mut Context) {
    let combined = NativeFunction::new("combined_editor", combined_editor)
        .with_dependencies(combined_editor_dependencies);
    let expand = NativeFunction::new("expand_keywords", expand_keywords)
        .with_dependencies(expand_keywords_dependencies);
    ctx.set_variable("combined_editor", Function::builtin(combined).into());
    ctx.set_variable("expand_keywords", Function::builtin(expand).into());
}

fn optional(ctx: &Context, name: &str) -> Option<ScriptValue> {
    if !ctx.is_bound_in_current_scope(name) {
        return None;
    }
    ctx.get_variable_opt(name).filter(|v| !v.is_nil())
}

/// Arguments `base`, `base1`, `base2`, ... up to the first gap after `base1`.
fn numbered(ctx: &Context, base: &str) -> Vec<ScriptValue> {
    let mut out = Vec::new();
    for i in 0.. {
        let name = if i == 0 {
            base.to_owned()
        } else {
            format!("{base}{i}")
        };
        match optional(ctx, &name) {
            Some(v) => out.push(v),
            None if i > 0 => break,
            None => {}
        }
    }
    out
}

// combined_editor(field: a, field1: b, separator: " - ", hide_when_empty: true)
// joins fields with separators.
fn combined_editor(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    let parts = numbered(ctx, "field")
        .iter()
        .map(ScriptValue::to_string_value)
        .collect::<ScriptResult<Vec<_>>>()?;
    let separators = numbered(ctx, "separator")
        .iter()
        .map(ScriptValue::to_string_value)
        .collect::<ScriptResult<Vec<_>>>()?;
    let Some((first, rest)) = parts.split_first() else {
        return Err(ScriptError::custom("no fields specified for combined_editor"));
    };
    if separators.len() < rest.len() {
        return Err(ScriptError::custom(format!(
            "not enough separators for combined_editor, expected {}",
            rest.len()
        )));
    }
    let hide_when_empty = match optional(ctx, "hide_when_empty") {
        Some(v) => v.to_bool()?,
        None => false,
    };
    let mut out = first.clone();
    for (part, separator) in rest.iter().zip(&separators) {
        if part.is_empty() && hide_when_empty {
            continue;
        }
        out.push_str(separator);
        out.push_str(part);
    }
    Ok(out.into())
}

// The field being computed gets a copy dependency on every combined field,
// so that its changes also reach their dependents.
fn combined_editor_dependencies(
    ctx: &mut Context,
    dep: Dependency,
    sink: &mut dyn DependencySink,
) -> ScriptValue {
    let target = match dep.kind() {
        DependencyType::CardField => DependencySource::CardField(dep.index()),
        DependencyType::SetField => DependencySource::SetField(dep.index()),
        _ => return ScriptValue::dummy(),
    };
    for field in numbered(ctx, "field") {
        let ScriptValue::Object(o) = &field else {
            continue;
        };
        let copy = match o.dependency_source() {
            Some(DependencySource::CardField(i)) => {
                Dependency::new(DependencyType::CardCopyDep, i)
            }
            Some(DependencySource::SetField(i)) => Dependency::new(DependencyType::SetCopyDep, i),
            _ => continue,
        };
        sink.mark(target, copy);
    }
    ScriptValue::dummy()
}

fn keywords(ctx: &Context) -> ScriptResult<Vec<(String, String)>> {
    let keywords = ctx.get_variable("set")?.get_member("keywords").check()?;
    let ScriptValue::Collection(keywords) = keywords else {
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(keywords.len());
    for (i, reminder) in keywords.iter().enumerate() {
        if let Some(k) = keywords.key(i).filter(|k| !k.is_empty()) {
            out.push((k.to_owned(), reminder.to_string_value()?));
        }
    }
    Ok(out)
}

// expand_keywords(input, combine: { keyword & " (" & reminder & ")" })
// expands every keyword of the set occurring in the input.
fn expand_keywords(ctx: &mut Context) -> ScriptResult<ScriptValue> {
    let mut text = ctx.get_variable("input")?.to_string_value()?;
    let combine = optional(ctx, "combine");
    for (keyword, reminder) in keywords(ctx)? {
        if !text.contains(&keyword) {
            continue;
        }
        let expanded = match &combine {
            Some(f) => ctx
                .call_with(
                    f,
                    &[
                        ("keyword", keyword.as_str().into()),
                        ("reminder", reminder.into()),
                    ],
                )?
                .to_string_value()?,
            None => format!("{keyword} ({reminder})"),
        };
        text = text.replace(&keyword, &expanded);
    }
    Ok(text.into())
}

fn expand_keywords_dependencies(
    ctx: &mut Context,
    dep: Dependency,
    sink: &mut dyn DependencySink,
) -> ScriptValue {
    sink.mark(DependencySource::Keywords, dep);
    if let Some(f) = optional(ctx, "combine") {
        let any = ScriptValue::dummy();
        ctx.call_dependencies_with(&f, &[("keyword", any.clone()), ("reminder", any)], dep, sink);
    }
    ctx.get_variable_opt("input")
        .unwrap_or_else(ScriptValue::dummy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardscript::{Collection, Parser, ScriptObject};
    use cardscript_dirty::DependencyRegistry;

    fn keyword_collection(pairs: &[(&str, &str)]) -> ScriptValue {
        let mut c = Collection::new();
        for (k, r) in pairs {
            c.push_keyed(*k, (*r).into());
        }
        c.into()
    }

    #[derive(Debug)]
    struct FakeSet(ScriptValue);

    impl ScriptObject for FakeSet {
        fn type_name(&self) -> &str {
            "set"
        }

        fn get_member(&self, name: &str) -> ScriptResult<ScriptValue> {
            match name {
                "keywords" => Ok(self.0.clone()),
                _ => Ok(ScriptValue::Nil),
            }
        }
    }

    fn context() -> Context {
        let mut ctx = Context::new();
        cardscript::builtins::register(&mut ctx);
        register(&mut ctx);
        ctx.set_variable(
            "set",
            ScriptValue::object(FakeSet(keyword_collection(&[
                ("flying", "can't be blocked except by flyers"),
                ("haste", "can attack at once"),
            ]))),
        );
        ctx
    }

    fn text(ctx: &mut Context, src: &str) -> ScriptResult<String> {
        let script = Parser::new(src).parse().unwrap();
        ctx.eval(&script, true)?.to_string_value()
    }

    #[test]
    fn combined_editor_joins_with_separators() {
        let mut ctx = context();
        assert_eq!(
            text(&mut ctx, "combined_editor(field: \"a\", field1: \"b\", field2: \"c\", separator: \"-\", separator1: \"+\")").unwrap(),
            "a-b+c"
        );
        assert_eq!(
            text(&mut ctx, "combined_editor(field: \"a\", field1: \"\", separator: \" - \", hide_when_empty: true)").unwrap(),
            "a"
        );
        assert!(text(&mut ctx, "combined_editor(field: \"a\", field1: \"b\")").is_err());
        assert!(text(&mut ctx, "combined_editor(separator: \",\")").is_err());
    }

    #[test]
    fn keywords_expand() {
        let mut ctx = context();
        assert_eq!(
            text(&mut ctx, "expand_keywords(\"haste\")").unwrap(),
            "haste (can attack at once)"
        );
        assert_eq!(
            text(&mut ctx, "expand_keywords(\"flying\", combine: { to_upper(keyword) })").unwrap(),
            "FLYING"
        );
        assert_eq!(text(&mut ctx, "expand_keywords(\"vanilla\")").unwrap(), "vanilla");
    }

    #[test]
    fn expand_keywords_reads_the_keyword_list() {
        let mut ctx = context();
        let script = Parser::new("expand_keywords(\"x\")").parse().unwrap();
        let dep = Dependency::new(DependencyType::CardField, 3);
        let mut registry = DependencyRegistry::new();
        ctx.dependencies(&script, dep, &mut registry);
        assert_eq!(registry.dependents(DependencySource::Keywords), &[dep]);
    }
}
