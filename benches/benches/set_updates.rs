// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::rc::Rc;

use cardscript_set::{
    Action, ActionStack, CardId, Field, FieldKind, Game, ScriptConfig, Set, SetScriptManager,
    StyleSheet, ValueTarget,
};
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

/// A game whose card fields form a chain of `depth` derived fields after
/// `name`, plus a set field counting matching cards.
fn game(depth: usize) -> Rc<Game> {
    let mut builder = Game::builder("bench").card_field(Field::new("name", FieldKind::Text));
    let mut previous = String::from("name");
    for i in 0..depth {
        let field = format!("d{i}");
        builder = builder.card_field(
            Field::new(&field, FieldKind::Text)
                .script(&format!("to_upper(card.{previous}) & \"!\"")),
        );
        previous = field;
    }
    builder
        .set_field(Field::new("count", FieldKind::Text).script(&format!(
            "number_of_items(filter_list(for each c in set.cards do [c.{previous}], \
             filter: {{ contains(input, match: \"A\") }}))"
        )))
        .build()
}

struct Loaded {
    manager: SetScriptManager,
    stack: ActionStack,
    ids: Vec<CardId>,
}

fn load(depth: usize, cards: usize) -> Loaded {
    let set = Set::new(game(depth), StyleSheet::builder("plain").build())
        .expect("stylesheet registers");
    let mut manager =
        SetScriptManager::new(Rc::clone(&set), ScriptConfig::default()).expect("context");
    let mut stack = ActionStack::new(Rc::clone(&set));
    let new_cards: Vec<_> = (0..cards).map(|_| set.new_card()).collect();
    let ids = new_cards.iter().map(|c| c.id()).collect();
    stack
        .perform(Action::add_cards(new_cards), &mut manager)
        .expect("cards are added");
    Loaded {
        manager,
        stack,
        ids,
    }
}

fn bench_edits(c: &mut Criterion) {
    let mut group = c.benchmark_group("cardscript_set/edit");
    group.sample_size(30);

    for &(depth, cards) in &[(4_usize, 16_usize), (4, 256), (16, 256)] {
        group.bench_function(format!("edit_name(depth={depth},cards={cards})"), |b| {
            b.iter_batched(
                || load(depth, cards),
                |mut loaded| {
                    let target = ValueTarget::Card {
                        card: loaded.ids[0],
                        field: 0,
                    };
                    loaded
                        .stack
                        .perform(Action::set_value(target, "ann"), &mut loaded.manager)
                        .expect("edit applies");
                    black_box(loaded.manager.stats());
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("cardscript_set/load");
    group.sample_size(20);

    for &(depth, cards) in &[(4_usize, 64_usize), (16, 64)] {
        group.bench_function(format!("update_all(depth={depth},cards={cards})"), |b| {
            b.iter_batched(
                || load(depth, cards),
                |mut loaded| {
                    loaded.manager.update_all();
                    black_box(loaded.manager.stats());
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_edits, bench_load);
criterion_main!(benches);
