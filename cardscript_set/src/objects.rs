// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The data model as scripts see it.
//!
//! Each object answers member reads twice: with real content when a script
//! is evaluated, and with dependency marks when it is analysed.

use std::rc::Rc;

use cardscript::{
    Collection, ScriptError, ScriptObject, ScriptResult, ScriptValue, ValuesIterator,
};
use cardscript_dirty::{Dependency, DependencySink, DependencySource};

use crate::card::Card;
use crate::game::Game;
use crate::set::Set;
use crate::stylesheet::StyleSheet;

fn no_member(type_name: &str, name: &str) -> ScriptError {
    ScriptError::NoMember {
        type_name: type_name.into(),
        name: name.into(),
    }
}

/// What analysis returns for a read of exactly one field.
#[derive(Debug)]
struct FieldReference(DependencySource);

impl ScriptObject for FieldReference {
    fn type_name(&self) -> &str {
        "field"
    }

    fn get_member(&self, _name: &str) -> ScriptResult<ScriptValue> {
        Ok(ScriptValue::dummy())
    }

    fn dependency_source(&self) -> Option<DependencySource> {
        Some(self.0)
    }
}

fn read(source: DependencySource, dep: Dependency, sink: &mut dyn DependencySink) -> ScriptValue {
    sink.mark(source, dep);
    ScriptValue::object(FieldReference(source))
}

/// Marks a read of card member `name`; `None` reads every field.
fn mark_card_member(
    game: &Game,
    stylesheet: Option<&StyleSheet>,
    name: Option<&str>,
    dep: Dependency,
    sink: &mut dyn DependencySink,
) -> ScriptValue {
    let Some(name) = name else {
        for f in game.card_fields() {
            sink.mark(DependencySource::CardField(f.index()), dep);
        }
        for f in stylesheet.map(|s| s.extra_card_fields()).unwrap_or_default() {
            sink.mark(DependencySource::ExtraCardField(f.index()), dep);
        }
        return ScriptValue::dummy();
    };
    if let Some(i) = game.card_field_index(name) {
        return read(DependencySource::CardField(i), dep, sink);
    }
    match stylesheet.and_then(|s| s.extra_field_index(name)) {
        Some(i) => read(DependencySource::ExtraCardField(i), dep, sink),
        None => ScriptValue::dummy(),
    }
}

/// `set`.
#[derive(Debug)]
pub(crate) struct SetObject {
    set: Rc<Set>,
}

impl SetObject {
    pub(crate) fn value(set: Rc<Set>) -> ScriptValue {
        ScriptValue::object(Self { set })
    }
}

impl ScriptObject for SetObject {
    fn type_name(&self) -> &str {
        "set"
    }

    fn get_member(&self, name: &str) -> ScriptResult<ScriptValue> {
        match name {
            "cards" => Ok(ScriptValue::object(CardList {
                set: self.set.clone(),
            })),
            "keywords" => {
                let mut keywords = Collection::new();
                for k in self.set.keywords() {
                    keywords.push_keyed(k.keyword.as_str(), k.reminder.into());
                }
                Ok(keywords.into())
            }
            "stylesheet" => self
                .set
                .stylesheet(self.set.stylesheet_of_set())
                .map(StyleSheetObject::value)
                .map_err(|e| ScriptError::Internal(e.to_string())),
            _ => self
                .set
                .value_by_name(name)
                .map(|v| v.content().to_script_value())
                .map_err(|_| no_member("set", name)),
        }
    }

    fn dependency_member(
        &self,
        name: Option<&str>,
        dep: Dependency,
        sink: &mut dyn DependencySink,
    ) -> ScriptValue {
        let game = self.set.game();
        match name {
            Some("cards") => {
                sink.mark(DependencySource::Cards, dep);
                ScriptValue::object(CardList {
                    set: self.set.clone(),
                })
            }
            Some("keywords") => {
                sink.mark(DependencySource::Keywords, dep);
                ScriptValue::dummy()
            }
            Some("stylesheet") => {
                sink.mark(DependencySource::StyleSheet, dep);
                ScriptValue::dummy()
            }
            Some(name) => match game.set_field_index(name) {
                Some(i) => read(DependencySource::SetField(i), dep, sink),
                None => ScriptValue::dummy(),
            },
            None => {
                for f in game.set_fields() {
                    sink.mark(DependencySource::SetField(f.index()), dep);
                }
                sink.mark(DependencySource::Cards, dep);
                sink.mark(DependencySource::Keywords, dep);
                ScriptValue::dummy()
            }
        }
    }
}

/// `set.cards`.
#[derive(Debug)]
struct CardList {
    set: Rc<Set>,
}

impl CardList {
    /// Stands for every card at once: reads through it concern all cards.
    fn any_card(&self) -> ScriptValue {
        let stylesheet = self.set.stylesheet(self.set.stylesheet_of_set()).ok();
        AbstractCard::value(self.set.game().clone(), stylesheet, true)
    }
}

impl ScriptObject for CardList {
    fn type_name(&self) -> &str {
        "card list"
    }

    fn get_member(&self, name: &str) -> ScriptResult<ScriptValue> {
        let cards = self.set.cards();
        let index = name
            .trim()
            .parse::<i64>()
            .map_err(|_| no_member("card list", name))?;
        usize::try_from(index)
            .ok()
            .and_then(|i| cards.get(i))
            .map(|c| CardObject::value(self.set.clone(), c.clone()))
            .ok_or(ScriptError::IndexOutOfRange {
                index,
                len: cards.len(),
            })
    }

    fn dependency_member(
        &self,
        _name: Option<&str>,
        dep: Dependency,
        sink: &mut dyn DependencySink,
    ) -> ScriptValue {
        sink.mark(DependencySource::Cards, dep);
        self.any_card()
    }

    fn make_iterator(&self) -> ScriptResult<ScriptValue> {
        let cards = self
            .set
            .cards()
            .into_iter()
            .map(|c| CardObject::value(self.set.clone(), c))
            .collect();
        Ok(ValuesIterator::value(cards))
    }

    fn dependency_iterator(&self, dep: Dependency, sink: &mut dyn DependencySink) -> ScriptValue {
        sink.mark(DependencySource::Cards, dep);
        ValuesIterator::value(vec![self.any_card()])
    }

    fn item_count(&self) -> Option<usize> {
        Some(self.set.card_count())
    }
}

/// A concrete card.
#[derive(Debug)]
pub(crate) struct CardObject {
    set: Rc<Set>,
    card: Rc<Card>,
}

impl CardObject {
    pub(crate) fn value(set: Rc<Set>, card: Rc<Card>) -> ScriptValue {
        ScriptValue::object(Self { set, card })
    }

    fn stylesheet(&self) -> Option<Rc<StyleSheet>> {
        self.set.stylesheet(self.set.stylesheet_for(&self.card)).ok()
    }
}

impl ScriptObject for CardObject {
    fn type_name(&self) -> &str {
        "card"
    }

    fn get_member(&self, name: &str) -> ScriptResult<ScriptValue> {
        if let Ok(v) = self.card.value_by_name(name) {
            return Ok(v.content().to_script_value());
        }
        let id = self.set.stylesheet_for(&self.card);
        let stylesheet = self.stylesheet();
        stylesheet
            .as_deref()
            .and_then(|s| {
                let i = usize::try_from(s.extra_field_index(name)?).ok()?;
                self.card.extra_values(id, s).get(i).cloned()
            })
            .map(|v| v.content().to_script_value())
            .ok_or_else(|| no_member("card", name))
    }

    fn dependency_member(
        &self,
        name: Option<&str>,
        dep: Dependency,
        sink: &mut dyn DependencySink,
    ) -> ScriptValue {
        mark_card_member(self.set.game(), self.stylesheet().as_deref(), name, dep, sink)
    }
}

/// The card a script is analysed for: any card of the game.
///
/// An independent abstract card stands for every card at once, as seen when
/// iterating `set.cards`; reads through it are registered for all cards.
#[derive(Debug)]
pub(crate) struct AbstractCard {
    game: Rc<Game>,
    stylesheet: Option<Rc<StyleSheet>>,
    independent: bool,
}

impl AbstractCard {
    pub(crate) fn value(
        game: Rc<Game>,
        stylesheet: Option<Rc<StyleSheet>>,
        independent: bool,
    ) -> ScriptValue {
        ScriptValue::object(Self {
            game,
            stylesheet,
            independent,
        })
    }
}

impl ScriptObject for AbstractCard {
    fn type_name(&self) -> &str {
        "card"
    }

    fn get_member(&self, _name: &str) -> ScriptResult<ScriptValue> {
        Ok(ScriptValue::dummy())
    }

    fn dependency_member(
        &self,
        name: Option<&str>,
        dep: Dependency,
        sink: &mut dyn DependencySink,
    ) -> ScriptValue {
        let dep = if self.independent {
            dep.make_card_independent()
        } else {
            dep
        };
        mark_card_member(&self.game, self.stylesheet.as_deref(), name, dep, sink)
    }
}

/// `stylesheet`.
#[derive(Debug)]
pub(crate) struct StyleSheetObject {
    stylesheet: Rc<StyleSheet>,
}

impl StyleSheetObject {
    pub(crate) fn value(stylesheet: Rc<StyleSheet>) -> ScriptValue {
        ScriptValue::object(Self { stylesheet })
    }
}

impl ScriptObject for StyleSheetObject {
    fn type_name(&self) -> &str {
        "stylesheet"
    }

    fn get_member(&self, name: &str) -> ScriptResult<ScriptValue> {
        match name {
            "name" => Ok(self.stylesheet.name().into()),
            _ => Err(no_member("stylesheet", name)),
        }
    }

    fn dependency_member(
        &self,
        _name: Option<&str>,
        dep: Dependency,
        sink: &mut dyn DependencySink,
    ) -> ScriptValue {
        sink.mark(DependencySource::StyleSheet, dep);
        ScriptValue::dummy()
    }
}

/// `game`. Games do not change while a set is open, so reads are not
/// tracked.
#[derive(Debug)]
pub(crate) struct GameObject {
    game: Rc<Game>,
}

impl GameObject {
    pub(crate) fn value(game: Rc<Game>) -> ScriptValue {
        ScriptValue::object(Self { game })
    }
}

impl ScriptObject for GameObject {
    fn type_name(&self) -> &str {
        "game"
    }

    fn get_member(&self, name: &str) -> ScriptResult<ScriptValue> {
        match name {
            "name" => Ok(self.game.name().into()),
            _ => Err(no_member("game", name)),
        }
    }
}
