// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Games: the field schema shared by every set of a game.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

use cardscript::{Context, OptionalScript, ParseError};
use cardscript_dirty::{
    Dependency, DependencyRegistry, DependencySink, DependencySource, DependencyType,
};
use tracing::debug;

use crate::field::{Field, prepare_all};

/// A game: card fields, set fields and an init script.
///
/// The game also owns the dependency registry of its fields, built on the
/// first context created for one of its sets.
#[derive(Debug)]
pub struct Game {
    name: String,
    card_fields: Vec<Rc<Field>>,
    set_fields: Vec<Rc<Field>>,
    init_script: OptionalScript,
    registry: RefCell<DependencyRegistry>,
    dependencies_initialized: Cell<bool>,
    warnings: Vec<ParseError>,
}

impl Game {
    /// Starts describing a game.
    #[must_use]
    pub fn builder(name: &str) -> GameBuilder {
        GameBuilder {
            name: name.into(),
            card_fields: Vec::new(),
            set_fields: Vec::new(),
            init_script: String::new(),
        }
    }

    /// The game's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The card fields, in order.
    #[must_use]
    pub fn card_fields(&self) -> &[Rc<Field>] {
        &self.card_fields
    }

    /// The set fields, in order.
    #[must_use]
    pub fn set_fields(&self) -> &[Rc<Field>] {
        &self.set_fields
    }

    /// Index of the card field called `name`.
    #[must_use]
    pub fn card_field_index(&self, name: &str) -> Option<u32> {
        self.card_fields
            .iter()
            .find(|f| f.name() == name)
            .map(|f| f.index())
    }

    /// Index of the set field called `name`.
    #[must_use]
    pub fn set_field_index(&self, name: &str) -> Option<u32> {
        self.set_fields
            .iter()
            .find(|f| f.name() == name)
            .map(|f| f.index())
    }

    /// The init script.
    #[must_use]
    pub fn init_script(&self) -> &OptionalScript {
        &self.init_script
    }

    /// Parse errors found while building the game.
    #[must_use]
    pub fn warnings(&self) -> &[ParseError] {
        &self.warnings
    }

    /// Who depends on what, once dependencies are initialised.
    #[must_use]
    pub fn registry(&self) -> Ref<'_, DependencyRegistry> {
        self.registry.borrow()
    }

    pub(crate) fn registry_mut(&self) -> RefMut<'_, DependencyRegistry> {
        self.registry.borrow_mut()
    }

    /// Returns `true` once the registry has been built.
    #[must_use]
    pub fn dependencies_initialized(&self) -> bool {
        self.dependencies_initialized.get()
    }

    /// Analyses every field script, once. `ctx` must have `card` bound to
    /// something that marks card fields.
    pub(crate) fn init_dependencies(&self, ctx: &mut Context, extra: &mut dyn DependencySink) {
        if self.dependencies_initialized.replace(true) {
            return;
        }
        let mut registry = self.registry.borrow_mut();
        let mut sink = RoutingSink {
            game: &mut *registry,
            extra,
        };
        for f in &self.card_fields {
            let dep = Dependency::new(DependencyType::CardField, f.index());
            f.value_script().init_dependencies(ctx, dep, &mut sink);
        }
        for f in &self.set_fields {
            let dep = Dependency::new(DependencyType::SetField, f.index());
            f.value_script().init_dependencies(ctx, dep, &mut sink);
        }
        debug!(game = %self.name, sources = registry.len(), "initialised game dependencies");
    }
}

/// Sends reads of stylesheet-specific inputs to the stylesheet's registry and
/// everything else to the game's.
pub(crate) struct RoutingSink<'a> {
    pub(crate) game: &'a mut DependencyRegistry,
    pub(crate) extra: &'a mut dyn DependencySink,
}

impl DependencySink for RoutingSink<'_> {
    fn mark(&mut self, source: DependencySource, dep: Dependency) {
        match source {
            DependencySource::ExtraCardField(_) => self.extra.mark(source, dep),
            _ => self.game.mark(source, dep),
        }
    }
}

/// Builder for [`Game`].
///
/// ```
/// use cardscript_set::{Field, FieldKind, Game};
///
/// let game = Game::builder("magic")
///     .card_field(Field::new("name", FieldKind::Text))
///     .card_field(Field::new("shout", FieldKind::Text).script("to_upper(card.name)"))
///     .set_field(Field::new("title", FieldKind::Text))
///     .build();
/// assert_eq!(game.card_field_index("shout"), Some(1));
/// assert!(game.warnings().is_empty());
/// ```
#[derive(Debug)]
pub struct GameBuilder {
    name: String,
    card_fields: Vec<Field>,
    set_fields: Vec<Field>,
    init_script: String,
}

impl GameBuilder {
    /// Appends a card field.
    #[must_use]
    pub fn card_field(mut self, field: Field) -> Self {
        self.card_fields.push(field);
        self
    }

    /// Appends a set field.
    #[must_use]
    pub fn set_field(mut self, field: Field) -> Self {
        self.set_fields.push(field);
        self
    }

    /// Sets the init script, run once in every new context.
    #[must_use]
    pub fn init_script(mut self, source: &str) -> Self {
        self.init_script = source.into();
        self
    }

    /// Parses every script. Parse errors do not fail the build; they are
    /// kept as [`Game::warnings`].
    #[must_use]
    pub fn build(self) -> Rc<Game> {
        let mut warnings = Vec::new();
        let card_fields = prepare_all(self.card_fields, &mut warnings);
        let set_fields = prepare_all(self.set_fields, &mut warnings);
        let mut init_script = OptionalScript::new(self.init_script);
        if let Err(e) = init_script.parse_named(false, Some(&self.name)) {
            warnings.push(e);
        }
        Rc::new(Game {
            name: self.name,
            card_fields,
            set_fields,
            init_script,
            registry: RefCell::new(DependencyRegistry::new()),
            dependencies_initialized: Cell::new(false),
            warnings,
        })
    }
}
