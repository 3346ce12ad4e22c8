// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Styles: scripted presentation properties of a card field.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use cardscript::{Context, ParseError, ScriptError, Scriptable};
use cardscript_dirty::{Dependency, DependencySink, ProbeSink};

#[derive(Debug)]
struct StyleProperty {
    name: Rc<str>,
    source: String,
    value: Scriptable<String>,
}

/// How one card field is presented by a stylesheet.
///
/// Every property is either fixed or computed by a script. Properties are
/// re-run by [`SetScriptManager::update_styles`], for the card being shown.
///
/// [`SetScriptManager::update_styles`]: crate::SetScriptManager::update_styles
#[derive(Debug)]
pub struct Style {
    name: Rc<str>,
    properties: RefCell<Vec<StyleProperty>>,
    content_dependent: Cell<bool>,
    stale: Cell<bool>,
    updates: Cell<u32>,
}

impl Style {
    /// A style without properties.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            properties: RefCell::new(Vec::new()),
            content_dependent: Cell::new(false),
            stale: Cell::new(true),
            updates: Cell::new(0),
        }
    }

    /// Adds a property computed by `source`.
    #[must_use]
    pub fn property(self, name: &str, source: &str) -> Self {
        self.properties.borrow_mut().push(StyleProperty {
            name: name.into(),
            source: source.into(),
            value: Scriptable::fixed(String::new()),
        });
        self
    }

    /// The name of the styled field.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current value of the property `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        self.properties
            .borrow()
            .iter()
            .find(|p| &*p.name == name)
            .map(|p| p.value.get().clone())
    }

    /// Returns `true` if some property reads card content.
    #[must_use]
    pub fn is_content_dependent(&self) -> bool {
        self.content_dependent.get()
    }

    /// Returns `true` if an input changed since the last update.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale.get()
    }

    /// How often the properties were re-run.
    #[must_use]
    pub fn updates(&self) -> u32 {
        self.updates.get()
    }

    /// Marks the style for re-running.
    pub fn invalidate(&self) {
        self.stale.set(true);
    }

    pub(crate) fn prepare(self, warnings: &mut Vec<ParseError>) -> Self {
        for p in self.properties.borrow_mut().iter_mut() {
            match Scriptable::scripted(String::new(), p.source.as_str()) {
                Ok(value) => p.value = value,
                Err(mut e) => {
                    e.filename = Some(format!("{}.{}", self.name, p.name));
                    warnings.push(e);
                }
            }
        }
        self
    }

    /// Registers the reads of every property, then probes them to decide
    /// whether the style depends on card content.
    pub(crate) fn init_dependencies(
        &self,
        ctx: &mut Context,
        dep: Dependency,
        sink: &mut dyn DependencySink,
    ) {
        let mut probe = ProbeSink::new();
        for p in self.properties.borrow().iter() {
            p.value.script().init_dependencies(ctx, dep, sink);
            p.value
                .script()
                .init_dependencies(ctx, Dependency::dummy(), &mut probe);
        }
        self.content_dependent.set(probe.reads_card_content());
    }

    /// Re-runs every scripted property. Returns whether any of them changed.
    ///
    /// A failing property keeps its value; the other properties are still
    /// updated and the first error is returned.
    pub fn update(&self, ctx: &mut Context) -> Result<bool, ScriptError> {
        self.stale.set(false);
        self.updates.set(self.updates.get() + 1);
        let mut changed = false;
        let mut first_error = None;
        for p in self.properties.borrow_mut().iter_mut() {
            match p.value.update(ctx) {
                Ok(c) => changed |= c,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(changed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardscript::ScriptValue;
    use cardscript_dirty::{DependencyRegistry, DependencySource, DependencyType};

    #[test]
    fn broken_properties_are_warnings() {
        let mut warnings = Vec::new();
        let style = Style::new("name")
            .property("font", "\"serif\"")
            .property("size", "(")
            .prepare(&mut warnings);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].filename.as_deref(), Some("name.size"));
        let mut ctx = Context::new();
        assert!(style.update(&mut ctx).unwrap());
        assert_eq!(style.get("font").as_deref(), Some("serif"));
        assert_eq!(style.get("size").as_deref(), Some(""));
        assert!(!style.is_stale());
    }

    #[derive(Debug)]
    struct Reader;

    impl cardscript::ScriptObject for Reader {
        fn type_name(&self) -> &str {
            "card"
        }

        fn get_member(&self, _name: &str) -> cardscript::ScriptResult<ScriptValue> {
            Ok(ScriptValue::Nil)
        }

        fn dependency_member(
            &self,
            _name: Option<&str>,
            dep: Dependency,
            sink: &mut dyn DependencySink,
        ) -> ScriptValue {
            sink.mark(DependencySource::CardField(0), dep);
            ScriptValue::dummy()
        }
    }

    #[test]
    fn probing_finds_content_reads() {
        let mut warnings = Vec::new();
        let plain = Style::new("a").property("font", "\"serif\"").prepare(&mut warnings);
        let reading = Style::new("b")
            .property("visible", "card.text != \"\"")
            .prepare(&mut warnings);
        let mut ctx = Context::new();
        ctx.set_variable("card", ScriptValue::object(Reader));
        let mut registry = DependencyRegistry::new();
        let dep = Dependency::new(DependencyType::Style, 1);
        plain.init_dependencies(&mut ctx, dep, &mut registry);
        reading.init_dependencies(&mut ctx, dep, &mut registry);
        assert!(!plain.is_content_dependent());
        assert!(reading.is_content_dependent());
        assert_eq!(registry.dependents(DependencySource::CardField(0)), &[dep]);
    }
}
