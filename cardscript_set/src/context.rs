// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One script context per stylesheet in use.

use std::rc::Rc;

use cardscript::{Context, ScriptValue, builtins};
use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use tracing::{debug, warn};

use cardscript_dirty::InternId;

use crate::card::Card;
use crate::diagnostics::Diagnostics;
use crate::error::SetError;
use crate::functions;
use crate::objects::{AbstractCard, CardObject, GameObject, SetObject, StyleSheetObject};
use crate::set::Set;

/// The script contexts of a set, keyed by stylesheet.
///
/// A card is evaluated in the context of the stylesheet it is shown with.
/// Each context is set up once when first asked for: parse warnings of the
/// game and stylesheet are queued, then come built-in functions, the `set`,
/// `game` and `stylesheet` variables, and the game's and the stylesheet's
/// init scripts. The first context of a game (and of each
/// stylesheet) also analyses every field script to build the dependency
/// registries.
#[derive(Debug)]
pub struct SetScriptContext {
    set: Rc<Set>,
    instruction_limit: Option<u64>,
    contexts: HashMap<InternId, Context>,
}

impl SetScriptContext {
    /// No contexts yet. Contexts are created with `instruction_limit`.
    #[must_use]
    pub fn new(set: Rc<Set>, instruction_limit: Option<u64>) -> Self {
        Self {
            set,
            instruction_limit,
            contexts: HashMap::new(),
        }
    }

    /// The set.
    #[must_use]
    pub fn set(&self) -> &Rc<Set> {
        &self.set
    }

    /// Number of contexts created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Returns `true` if no context was created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// The context for `stylesheet`, created if needed. Errors of the init
    /// scripts go to `diagnostics`.
    pub fn context(
        &mut self,
        stylesheet: InternId,
        diagnostics: &mut Diagnostics,
    ) -> Result<&mut Context, SetError> {
        match self.contexts.entry(stylesheet) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let ctx = create(&self.set, self.instruction_limit, stylesheet, diagnostics)?;
                Ok(e.insert(ctx))
            }
        }
    }

    /// The context for evaluating scripts of `card`, with `card` bound to
    /// it. Without a card, the set's stylesheet is used and `card` is nil.
    pub fn context_for(
        &mut self,
        card: Option<&Rc<Card>>,
        diagnostics: &mut Diagnostics,
    ) -> Result<&mut Context, SetError> {
        let set = self.set.clone();
        let (stylesheet, bound) = match card {
            Some(card) => (
                set.stylesheet_for(card),
                CardObject::value(set.clone(), card.clone()),
            ),
            None => (set.stylesheet_of_set(), ScriptValue::Nil),
        };
        let ctx = self.context(stylesheet, diagnostics)?;
        ctx.set_variable("card", bound);
        Ok(ctx)
    }
}

fn create(
    set: &Rc<Set>,
    instruction_limit: Option<u64>,
    id: InternId,
    diagnostics: &mut Diagnostics,
) -> Result<Context, SetError> {
    let sheet = set.stylesheet(id)?;
    let game = set.game();
    for w in game.warnings().iter().chain(sheet.warnings()) {
        if diagnostics.warning(w.to_string()) {
            warn!(error = %w, "script does not parse");
        }
    }
    let mut ctx = Context::new();
    ctx.set_instruction_limit(instruction_limit);
    builtins::register(&mut ctx);
    functions::register(&mut ctx);
    ctx.set_variable("set", SetObject::value(set.clone()));
    ctx.set_variable("game", GameObject::value(game.clone()));
    ctx.set_variable("stylesheet", StyleSheetObject::value(sheet.clone()));
    ctx.set_variable("card", ScriptValue::Nil);

    for (owner, script) in [
        (game.name(), game.init_script()),
        (sheet.name(), sheet.init_script()),
    ] {
        if let Err(e) = script.invoke(&mut ctx, false) {
            warn!(owner, error = %e, "init script failed");
            diagnostics.error(format!("In the init script of {owner}: {e}"));
        }
    }

    {
        let mut scope = ctx.local_scope();
        scope.set_variable(
            "card",
            AbstractCard::value(game.clone(), Some(sheet.clone()), false),
        );
        scope.set_variable("value", ScriptValue::dummy());
        game.init_dependencies(&mut scope, &mut *sheet.registry_mut());
        sheet.init_dependencies(&mut scope, id, &mut game.registry_mut());
    }
    debug!(
        game = game.name(),
        stylesheet = sheet.name(),
        "created script context"
    );
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardscript_dirty::{Dependency, DependencySource, DependencyType};

    use crate::field::{Field, FieldKind};
    use crate::game::Game;
    use crate::stylesheet::StyleSheet;

    fn set() -> Rc<Set> {
        let game = Game::builder("g")
            .card_field(Field::new("name", FieldKind::Text))
            .card_field(Field::new("title", FieldKind::Text).script("prefix & card.name"))
            .init_script("prefix := \"the \"")
            .build();
        let sheet = StyleSheet::builder("s")
            .extra_card_field(Field::new("caption", FieldKind::Text).script("card.title"))
            .init_script("prefix := prefix & \"great \"")
            .build();
        Set::new(game, sheet).unwrap()
    }

    #[test]
    fn init_scripts_run_once_in_order() {
        let set = set();
        let mut contexts = SetScriptContext::new(set.clone(), None);
        let mut diagnostics = Diagnostics::default();
        let id = set.stylesheet_of_set();
        let ctx = contexts.context(id, &mut diagnostics).unwrap();
        assert_eq!(
            ctx.get_variable("prefix").unwrap().to_string_value().unwrap(),
            "the great "
        );
        contexts.context(id, &mut diagnostics).unwrap();
        assert_eq!(contexts.len(), 1);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn the_first_context_builds_the_registries() {
        let set = set();
        let mut contexts = SetScriptContext::new(set.clone(), None);
        let mut diagnostics = Diagnostics::default();
        contexts.context_for(None, &mut diagnostics).unwrap();
        let game = set.game();
        assert!(game.dependencies_initialized());
        assert_eq!(
            game.registry().dependents(DependencySource::CardField(0)),
            &[Dependency::new(DependencyType::CardField, 1)]
        );
        let id = set.stylesheet_of_set();
        assert_eq!(
            game.registry().dependents(DependencySource::CardField(1)),
            &[Dependency::with_data(DependencyType::ExtraCardField, 0, id)]
        );
    }

    #[test]
    fn cards_are_bound() {
        let set = set();
        let card = set.new_card();
        card.value(0).unwrap().replace("ogre".into());
        set.insert_card(0, card.clone());
        let mut contexts = SetScriptContext::new(set.clone(), None);
        let mut diagnostics = Diagnostics::default();
        let ctx = contexts.context_for(Some(&card), &mut diagnostics).unwrap();
        let name = ctx.get_variable("card").unwrap().get_member("name");
        assert_eq!(name.to_string_value().unwrap(), "ogre");
        let ctx = contexts.context_for(None, &mut diagnostics).unwrap();
        assert!(ctx.get_variable("card").unwrap().is_nil());
    }

    #[test]
    fn failing_init_scripts_are_reported() {
        let game = Game::builder("g").init_script("1 / 0").build();
        let set = Set::new(game, StyleSheet::builder("s").build()).unwrap();
        let mut contexts = SetScriptContext::new(set, None);
        let mut diagnostics = Diagnostics::default();
        contexts.context_for(None, &mut diagnostics).unwrap();
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn parse_warnings_are_queued_once() {
        let game = Game::builder("g")
            .card_field(Field::new("broken", FieldKind::Text).script("1 +"))
            .build();
        let set = Set::new(game, StyleSheet::builder("s").build()).unwrap();
        let other = set
            .add_stylesheet(StyleSheet::builder("t").build())
            .unwrap();
        let mut contexts = SetScriptContext::new(set.clone(), None);
        let mut diagnostics = Diagnostics::default();
        contexts.context_for(None, &mut diagnostics).unwrap();
        contexts.context(other, &mut diagnostics).unwrap();
        let drained = diagnostics.drain();
        assert_eq!(drained.len(), 1);
        assert!(drained[0].message.starts_with("broken, line 1"));
    }
}
