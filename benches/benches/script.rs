// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use cardscript::{Context, Parser, ScriptValue, builtins};
use cardscript_dirty::{Dependency, DependencyRegistry, DependencyType};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

const SOURCES: &[(&str, &str)] = &[
    ("arithmetic", "x := 3\ny := x * 4 + 2\nif y > 10 then y - 10 else y"),
    (
        "strings",
        r#"name := "  grey ogre  "
to_title(trim(name)) & " (" + to_upper(substring(name, begin: 2, end: 6)) + ")""#,
    ),
    (
        "loop",
        "total := 0\nfor each i in [1,2,3,4,5,6,7,8,9,10] do total := total + i * i\ntotal",
    ),
    (
        "functions",
        r#"twice := { input + input }
join(for each w in ["a","b","c","d"] do [twice(w)], separator: ",")"#,
    ),
];

fn context() -> Context {
    let mut ctx = Context::new();
    builtins::register(&mut ctx);
    ctx
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("cardscript/parse");
    for &(name, source) in SOURCES {
        group.bench_function(name, |b| {
            b.iter(|| black_box(Parser::new(black_box(source)).parse()));
        });
    }
    group.finish();
}

fn bench_eval(c: &mut Criterion) {
    let mut group = c.benchmark_group("cardscript/eval");
    for &(name, source) in SOURCES {
        let Ok(script) = Parser::new(source).parse() else {
            continue;
        };
        let mut ctx = context();
        group.bench_function(name, |b| {
            b.iter(|| black_box(ctx.eval(&script, true)));
        });
    }
    group.finish();
}

fn bench_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("cardscript/dependencies");
    let dep = Dependency::new(DependencyType::CardField, 0);
    for &(name, source) in SOURCES {
        let Ok(script) = Parser::new(source).parse() else {
            continue;
        };
        let mut ctx = context();
        ctx.set_variable("card", ScriptValue::dummy());
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut registry = DependencyRegistry::new();
                black_box(ctx.dependencies(&script, dep, &mut registry));
                black_box(registry);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_eval, bench_analysis);
criterion_main!(benches);
