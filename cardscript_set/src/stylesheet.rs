// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stylesheets: presentation of cards, with their own extra fields.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

use cardscript::{Context, OptionalScript, ParseError};
use cardscript_dirty::{Dependency, DependencyRegistry, DependencyType, InternId};
use tracing::debug;

use crate::field::{Field, prepare_all};
use crate::game::RoutingSink;
use crate::style::Style;

/// A stylesheet: one [`Style`] per styled field, extra card fields that only
/// exist for cards using this stylesheet, and an init script.
///
/// Sets refer to stylesheets by an [`InternId`] handed out by
/// [`Set::add_stylesheet`](crate::Set::add_stylesheet).
#[derive(Debug)]
pub struct StyleSheet {
    name: Rc<str>,
    card_styles: Vec<Style>,
    extra_card_fields: Vec<Rc<Field>>,
    init_script: OptionalScript,
    registry: RefCell<DependencyRegistry>,
    dependencies_initialized: Cell<bool>,
    warnings: Vec<ParseError>,
}

impl StyleSheet {
    /// Starts describing a stylesheet.
    #[must_use]
    pub fn builder(name: &str) -> StyleSheetBuilder {
        StyleSheetBuilder {
            name: name.into(),
            card_styles: Vec::new(),
            extra_card_fields: Vec::new(),
            init_script: String::new(),
        }
    }

    /// The stylesheet's name, unique within a set.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_rc(&self) -> Rc<str> {
        self.name.clone()
    }

    /// The styles, in order.
    #[must_use]
    pub fn card_styles(&self) -> &[Style] {
        &self.card_styles
    }

    /// The style of the field called `name`.
    #[must_use]
    pub fn style(&self, name: &str) -> Option<&Style> {
        self.card_styles.iter().find(|s| s.name() == name)
    }

    /// Fields that cards only have under this stylesheet.
    #[must_use]
    pub fn extra_card_fields(&self) -> &[Rc<Field>] {
        &self.extra_card_fields
    }

    /// Index of the extra card field called `name`.
    #[must_use]
    pub fn extra_field_index(&self, name: &str) -> Option<u32> {
        self.extra_card_fields
            .iter()
            .find(|f| f.name() == name)
            .map(|f| f.index())
    }

    /// The init script, run after the game's.
    #[must_use]
    pub fn init_script(&self) -> &OptionalScript {
        &self.init_script
    }

    /// Parse errors found while building the stylesheet.
    #[must_use]
    pub fn warnings(&self) -> &[ParseError] {
        &self.warnings
    }

    /// Who depends on the extra fields, once dependencies are initialised.
    #[must_use]
    pub fn registry(&self) -> Ref<'_, DependencyRegistry> {
        self.registry.borrow()
    }

    pub(crate) fn registry_mut(&self) -> RefMut<'_, DependencyRegistry> {
        self.registry.borrow_mut()
    }

    /// Returns `true` once the stylesheet's scripts have been analysed.
    #[must_use]
    pub fn dependencies_initialized(&self) -> bool {
        self.dependencies_initialized.get()
    }

    /// Analyses extra fields and styles, once. Reads of game inputs go to
    /// `game`, reads of extra fields to this stylesheet's registry.
    pub(crate) fn init_dependencies(
        &self,
        ctx: &mut Context,
        id: InternId,
        game: &mut DependencyRegistry,
    ) {
        if self.dependencies_initialized.replace(true) {
            return;
        }
        let mut registry = self.registry.borrow_mut();
        let mut sink = RoutingSink {
            game,
            extra: &mut *registry,
        };
        for f in &self.extra_card_fields {
            let dep = Dependency::with_data(DependencyType::ExtraCardField, f.index(), id);
            f.value_script().init_dependencies(ctx, dep, &mut sink);
        }
        for (i, style) in (0_u32..).zip(&self.card_styles) {
            let dep = Dependency::with_data(DependencyType::Style, i, id);
            style.init_dependencies(ctx, dep, &mut sink);
        }
        debug!(
            stylesheet = %self.name,
            content_dependent_styles = self.card_styles.iter().filter(|s| s.is_content_dependent()).count(),
            "initialised stylesheet dependencies"
        );
    }
}

/// Builder for [`StyleSheet`].
///
/// ```
/// use cardscript_set::{Field, FieldKind, Style, StyleSheet};
///
/// let sheet = StyleSheet::builder("classic")
///     .extra_card_field(Field::new("watermark", FieldKind::Choice))
///     .style(Style::new("name").property("font", "\"serif\""))
///     .build();
/// assert_eq!(sheet.extra_field_index("watermark"), Some(0));
/// assert!(sheet.style("name").is_some());
/// ```
#[derive(Debug)]
pub struct StyleSheetBuilder {
    name: String,
    card_styles: Vec<Style>,
    extra_card_fields: Vec<Field>,
    init_script: String,
}

impl StyleSheetBuilder {
    /// Appends a style.
    #[must_use]
    pub fn style(mut self, style: Style) -> Self {
        self.card_styles.push(style);
        self
    }

    /// Appends an extra card field.
    #[must_use]
    pub fn extra_card_field(mut self, field: Field) -> Self {
        self.extra_card_fields.push(field);
        self
    }

    /// Sets the init script.
    #[must_use]
    pub fn init_script(mut self, source: &str) -> Self {
        self.init_script = source.into();
        self
    }

    /// Parses every script, keeping parse errors as
    /// [`StyleSheet::warnings`].
    #[must_use]
    pub fn build(self) -> Rc<StyleSheet> {
        let mut warnings = Vec::new();
        let extra_card_fields = prepare_all(self.extra_card_fields, &mut warnings);
        let card_styles = self
            .card_styles
            .into_iter()
            .map(|s| s.prepare(&mut warnings))
            .collect();
        let mut init_script = OptionalScript::new(self.init_script);
        if let Err(e) = init_script.parse_named(false, Some(&self.name)) {
            warnings.push(e);
        }
        Rc::new(StyleSheet {
            name: self.name.as_str().into(),
            card_styles,
            extra_card_fields,
            init_script,
            registry: RefCell::new(DependencyRegistry::new()),
            dependencies_initialized: Cell::new(false),
            warnings,
        })
    }
}
