// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The update scheduler.
//!
//! After every action the manager works out which scripted values may have
//! changed and re-runs them in one breadth-first [`Sweep`]:
//!
//! 1. Pop a value. If it was refreshed since the sweep started, skip it.
//! 2. Otherwise run its script, stamping it with a new age.
//! 3. If its rendered form changed, queue everything registered as depending
//!    on its field, for the same card or for every card as registered.
//!
//! The age check makes every value run at most once per sweep, which keeps
//! diamonds from evaluating their apex twice and cycles from looping.

use std::rc::Rc;

use cardscript::Context;
use cardscript_dirty::{
    AgeClock, Dependency, DependencySource, DependencyType, OneParentRecorder, Sweep,
    SweepStats, SweepTrace,
};
use hashbrown::HashSet;
use tracing::{debug, debug_span, error, trace, warn};

use crate::action::{Action, ActionListener, ValueTarget};
use crate::card::{Card, CardId};
use crate::config::{DelayFlags, ScriptConfig};
use crate::context::SetScriptContext;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::SetError;
use crate::set::Set;
use crate::value::Value;

/// One value waiting in a sweep.
#[derive(Debug)]
struct ToUpdate {
    value: Rc<Value>,
    card: Option<Rc<Card>>,
    target: ValueTarget,
}

/// Counters over the lifetime of a [`SetScriptManager`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ManagerStats {
    /// Sweeps run.
    pub sweeps: usize,
    /// Sum of the counters of every sweep.
    pub sweep: SweepStats,
    /// Times the dependents of the keyword list were queued.
    pub keyword_passes: usize,
    /// Times the dependents of the card list were queued.
    pub card_list_passes: usize,
    /// Style re-runs by [`SetScriptManager::update_styles`].
    pub style_updates: usize,
    /// Styles marked stale by a sweep.
    pub styles_invalidated: usize,
}

/// Keeps the scripted values of a set up to date.
///
/// The manager owns the script contexts of the set. Register it as the
/// [`ActionListener`] of the set's [`ActionStack`](crate::ActionStack) so that
/// every change is followed by a sweep:
///
/// ```
/// use cardscript_set::{
///     Action, ActionStack, Field, FieldKind, Game, ScriptConfig, Set, SetScriptManager,
///     StyleSheet, ValueTarget,
/// };
///
/// let game = Game::builder("g")
///     .set_field(Field::new("title", FieldKind::Text))
///     .set_field(Field::new("shout", FieldKind::Text).script("to_upper(set.title)"))
///     .build();
/// let set = Set::new(game, StyleSheet::builder("s").build()).unwrap();
/// let mut manager = SetScriptManager::new(set.clone(), ScriptConfig::default()).unwrap();
/// let mut stack = ActionStack::new(set.clone());
///
/// let title = ValueTarget::Set { field: 0 };
/// stack.perform(Action::set_value(title, "hello"), &mut manager).unwrap();
/// assert_eq!(set.value(1).unwrap().rendered(), "HELLO");
/// ```
#[derive(Debug)]
pub struct SetScriptManager {
    set: Rc<Set>,
    contexts: SetScriptContext,
    config: ScriptConfig,
    clock: AgeClock,
    pending: DelayFlags,
    diagnostics: Diagnostics,
    stats: ManagerStats,
    trace: Option<OneParentRecorder<ValueTarget>>,
}

impl SetScriptManager {
    /// Creates the manager and the context of the set's stylesheet, which
    /// also analyses every script of the game.
    pub fn new(set: Rc<Set>, config: ScriptConfig) -> Result<Self, SetError> {
        let mut manager = Self {
            contexts: SetScriptContext::new(set.clone(), config.instruction_limit()),
            set,
            config,
            clock: AgeClock::new(),
            pending: DelayFlags::empty(),
            diagnostics: Diagnostics::default(),
            stats: ManagerStats::default(),
            trace: None,
        };
        manager
            .contexts
            .context(manager.set.stylesheet_of_set(), &mut manager.diagnostics)?;
        Ok(manager)
    }

    /// The set.
    #[must_use]
    pub fn set(&self) -> &Rc<Set> {
        &self.set
    }

    /// The settings.
    #[must_use]
    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    /// The clock ages are taken from.
    #[must_use]
    pub fn clock(&self) -> &AgeClock {
        &self.clock
    }

    /// Messages waiting to be shown.
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Takes the messages waiting to be shown, errors first.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.drain()
    }

    /// Counters since creation or the last [`reset_stats`](Self::reset_stats).
    #[must_use]
    pub fn stats(&self) -> ManagerStats {
        self.stats
    }

    /// Zeroes the counters.
    pub fn reset_stats(&mut self) {
        self.stats = ManagerStats::default();
    }

    /// Update classes deferred until [`update_delayed`](Self::update_delayed).
    #[must_use]
    pub fn pending(&self) -> DelayFlags {
        self.pending
    }

    /// Starts or stops recording why values were refreshed.
    pub fn set_tracing(&mut self, enabled: bool) {
        self.trace = enabled.then(OneParentRecorder::new);
    }

    /// Why each value of the last sweep was refreshed, if tracing is on.
    #[must_use]
    pub fn trace(&self) -> Option<&OneParentRecorder<ValueTarget>> {
        self.trace.as_ref()
    }

    /// The context scripts of `card` run in, or that of set fields. For
    /// evaluating ad-hoc scripts, such as those of a text export.
    pub fn context_for(&mut self, card: Option<&Rc<Card>>) -> Result<&mut Context, SetError> {
        self.contexts.context_for(card, &mut self.diagnostics)
    }

    /// The value at `target` was edited: re-run its script if it has one,
    /// then everything depending on it.
    pub fn update_value(&mut self, target: ValueTarget) -> Result<(), SetError> {
        let (value, card) = target.resolve(&self.set)?;
        let mut sweep = self.begin_sweep();
        let item = ToUpdate {
            value,
            card,
            target,
        };
        if let Some(trace) = &mut self.trace {
            trace.root(target);
        }
        if item.value.is_scripted() {
            let changed = self.evaluate(&item);
            sweep.record_evaluated(changed);
        }
        self.also_update(&mut sweep, &item);
        if matches!(target, ValueTarget::Card { .. }) && item.value.field().is_identifying() {
            self.card_list_membership_changed(&mut sweep);
        }
        self.update_recursive(sweep);
        Ok(())
    }

    /// Re-runs the styles of `card`'s stylesheet, returning the indices of
    /// the styles whose properties changed.
    ///
    /// With `only_content_dependent`, styles that read no card content are
    /// skipped unless a sweep marked them stale.
    pub fn update_styles(
        &mut self,
        card: &Rc<Card>,
        only_content_dependent: bool,
    ) -> Result<Vec<usize>, SetError> {
        let sheet = self.set.stylesheet(self.set.stylesheet_for(card))?;
        let ctx = self
            .contexts
            .context_for(Some(card), &mut self.diagnostics)?;
        let mut changed = Vec::new();
        for (i, style) in sheet.card_styles().iter().enumerate() {
            if only_content_dependent && !style.is_content_dependent() && !style.is_stale() {
                continue;
            }
            self.stats.style_updates += 1;
            match style.update(ctx) {
                Ok(true) => changed.push(i),
                Ok(false) => {}
                Err(e) => {
                    warn!(style = style.name(), error = %e, "style script failed");
                    self.diagnostics
                        .error(format!("In the style of {}: {e}", style.name()));
                }
            }
        }
        Ok(changed)
    }

    /// Runs the updates that were deferred, once each.
    pub fn update_delayed(&mut self) {
        let pending = std::mem::replace(&mut self.pending, DelayFlags::empty());
        if pending.is_empty() {
            return;
        }
        debug!(?pending, "running delayed updates");
        let mut sweep = self.begin_sweep();
        if pending.contains(DelayFlags::KEYWORDS) {
            self.keyword_list_changed(&mut sweep);
        }
        if pending.contains(DelayFlags::CARDS) {
            self.card_list_changed(&mut sweep);
        }
        self.update_recursive(sweep);
    }

    /// Re-runs every scripted value of the set, then everything depending
    /// on a value that changed, on the card list or on the keywords.
    ///
    /// For use after loading a set, when nothing can be assumed to be up to
    /// date.
    pub fn update_all(&mut self) {
        self.pending = DelayFlags::empty();
        let mut sweep = self.begin_sweep();
        let mut everything = Vec::new();
        for (field, value) in (0_u32..).zip(self.set.data()) {
            everything.push(ToUpdate {
                value: value.clone(),
                card: None,
                target: ValueTarget::Set { field },
            });
        }
        for card in self.set.cards() {
            everything.extend(self.card_values(&card));
        }
        let mut changed = Vec::new();
        for item in everything {
            if !item.value.is_scripted() {
                continue;
            }
            if let Some(trace) = &mut self.trace {
                trace.root(item.target);
            }
            let c = self.evaluate(&item);
            sweep.record_evaluated(c);
            if c {
                changed.push(item);
            }
        }
        self.finish_sweep(&sweep);
        debug!(changed = changed.len(), "re-ran every value");

        let mut sweep = Sweep::new(self.clock.now());
        for item in &changed {
            self.also_update(&mut sweep, item);
        }
        self.card_list_changed(&mut sweep);
        self.keyword_list_changed(&mut sweep);
        self.update_recursive(sweep);
    }

    fn begin_sweep(&mut self) -> Sweep<ToUpdate> {
        if let Some(trace) = &mut self.trace {
            trace.clear();
        }
        Sweep::new(self.clock.now())
    }

    fn finish_sweep(&mut self, sweep: &Sweep<ToUpdate>) {
        self.stats.sweeps += 1;
        self.stats.sweep.accumulate(&sweep.stats());
    }

    fn update_recursive(&mut self, mut sweep: Sweep<ToUpdate>) {
        let span = debug_span!("update_recursive", queued = sweep.len());
        let _guard = span.enter();
        while let Some(item) = sweep.pop() {
            if sweep.is_fresh(item.value.last_script_update()) {
                trace!(key = ?item.target, "already fresh");
                sweep.record_skipped();
                continue;
            }
            let changed = self.evaluate(&item);
            trace!(key = ?item.target, changed, "evaluated");
            sweep.record_evaluated(changed);
            if changed {
                self.also_update(&mut sweep, &item);
            }
        }
        self.finish_sweep(&sweep);
        debug!(stats = ?sweep.stats(), "sweep done");
    }

    /// Runs the script of one value. Errors are reported and count as no
    /// change.
    fn evaluate(&mut self, item: &ToUpdate) -> bool {
        let ctx = match self
            .contexts
            .context_for(item.card.as_ref(), &mut self.diagnostics)
        {
            Ok(ctx) => ctx,
            Err(e) => {
                error!(key = ?item.target, error = %e, "no context for value");
                self.diagnostics.error(e.to_string());
                return false;
            }
        };
        match item
            .value
            .update(ctx, &self.clock, self.config.change_detection())
        {
            Ok(changed) => changed,
            Err(e) => {
                let field = item.value.field().name();
                warn!(field, error = %e, "script failed");
                self.diagnostics
                    .error(format!("In the script of {field}: {e}"));
                false
            }
        }
    }

    /// Queues the dependents of the field of `item`.
    fn also_update(&mut self, sweep: &mut Sweep<ToUpdate>, item: &ToUpdate) {
        let deps = match item.target {
            ValueTarget::Set { field } => self.game_dependents(DependencySource::SetField(field)),
            ValueTarget::Card { field, .. } => {
                self.game_dependents(DependencySource::CardField(field))
            }
            ValueTarget::Extra {
                stylesheet, field, ..
            } => match self.set.stylesheet(stylesheet) {
                Ok(sheet) => sheet
                    .registry()
                    .dependents(DependencySource::ExtraCardField(field))
                    .to_vec(),
                Err(_) => Vec::new(),
            },
        };
        let card = match item.target {
            ValueTarget::Set { .. } => None,
            _ => item.card.clone(),
        };
        self.enqueue_all(sweep, &deps, card.as_ref(), Some(item.target), &mut HashSet::new());
    }

    fn game_dependents(&self, source: DependencySource) -> Vec<Dependency> {
        self.set.game().registry().dependents(source).to_vec()
    }

    /// Queues `deps`, following copy dependencies once each.
    fn enqueue_all(
        &mut self,
        sweep: &mut Sweep<ToUpdate>,
        deps: &[Dependency],
        card: Option<&Rc<Card>>,
        because: Option<ValueTarget>,
        copied: &mut HashSet<Dependency>,
    ) {
        for &dep in deps {
            let (source, card) = match dep.kind() {
                DependencyType::CardCopyDep => (DependencySource::CardField(dep.index()), card),
                DependencyType::SetCopyDep => (DependencySource::SetField(dep.index()), None),
                _ => {
                    self.enqueue(sweep, dep, card, because);
                    continue;
                }
            };
            if copied.insert(dep) {
                let more = self.game_dependents(source);
                self.enqueue_all(sweep, &more, card, because, copied);
            }
        }
    }

    /// Queues the values addressed by `dep`. A per-card dependency without a
    /// card addresses every card.
    fn enqueue(
        &mut self,
        sweep: &mut Sweep<ToUpdate>,
        dep: Dependency,
        card: Option<&Rc<Card>>,
        because: Option<ValueTarget>,
    ) {
        match dep.kind() {
            DependencyType::CardField | DependencyType::CardsField => {
                let card = card.filter(|_| dep.kind() == DependencyType::CardField);
                for card in self.cards_or_all(card) {
                    let Ok(value) = card.value(dep.index()) else {
                        continue;
                    };
                    let target = ValueTarget::Card {
                        card: card.id(),
                        field: dep.index(),
                    };
                    let value = value.clone();
                    self.push(sweep, value, Some(card), target, because, dep);
                }
            }
            DependencyType::SetField => {
                if let Ok(value) = self.set.value(dep.index()) {
                    let target = ValueTarget::Set { field: dep.index() };
                    let value = value.clone();
                    self.push(sweep, value, None, target, because, dep);
                }
            }
            DependencyType::ExtraCardField => {
                let Some(id) = dep.data() else { return };
                let Ok(sheet) = self.set.stylesheet(id) else {
                    return;
                };
                let field = dep.index();
                for card in self.cards_or_all(card) {
                    if self.set.stylesheet_for(&card) != id {
                        continue;
                    }
                    let value = usize::try_from(field)
                        .ok()
                        .and_then(|i| card.extra_values(id, &sheet).get(i).cloned());
                    if let Some(value) = value {
                        let target = ValueTarget::Extra {
                            card: card.id(),
                            stylesheet: id,
                            field,
                        };
                        self.push(sweep, value, Some(card), target, because, dep);
                    }
                }
            }
            DependencyType::Style => {
                let Some(id) = dep.data() else { return };
                let Ok(sheet) = self.set.stylesheet(id) else {
                    return;
                };
                if let Some(style) = usize::try_from(dep.index())
                    .ok()
                    .and_then(|i| sheet.card_styles().get(i))
                {
                    style.invalidate();
                    self.stats.styles_invalidated += 1;
                }
            }
            DependencyType::CardCopyDep | DependencyType::SetCopyDep | DependencyType::Dummy => {}
        }
    }

    fn cards_or_all(&self, card: Option<&Rc<Card>>) -> Vec<Rc<Card>> {
        match card {
            Some(card) => vec![card.clone()],
            None => self.set.cards(),
        }
    }

    /// Queues one value. Values without a script never enter a sweep.
    fn push(
        &mut self,
        sweep: &mut Sweep<ToUpdate>,
        value: Rc<Value>,
        card: Option<Rc<Card>>,
        target: ValueTarget,
        because: Option<ValueTarget>,
        via: Dependency,
    ) {
        if !value.is_scripted() {
            return;
        }
        if let Some(trace) = &mut self.trace {
            match because {
                Some(because) => trace.caused_by(target, because, via),
                None => trace.root(target),
            }
        }
        sweep.push(ToUpdate {
            value,
            card,
            target,
        });
    }

    fn card_list_changed(&mut self, sweep: &mut Sweep<ToUpdate>) {
        self.stats.card_list_passes += 1;
        let deps = self.game_dependents(DependencySource::Cards);
        self.enqueue_all(sweep, &deps, None, None, &mut HashSet::new());
    }

    fn keyword_list_changed(&mut self, sweep: &mut Sweep<ToUpdate>) {
        self.stats.keyword_passes += 1;
        let deps = self.game_dependents(DependencySource::Keywords);
        self.enqueue_all(sweep, &deps, None, None, &mut HashSet::new());
    }

    /// Every value of `card`, including the extra fields of its stylesheet.
    fn card_values(&self, card: &Rc<Card>) -> Vec<ToUpdate> {
        let mut out = Vec::new();
        for (field, value) in (0_u32..).zip(card.values()) {
            out.push(ToUpdate {
                value: value.clone(),
                card: Some(card.clone()),
                target: ValueTarget::Card {
                    card: card.id(),
                    field,
                },
            });
        }
        let id = self.set.stylesheet_for(card);
        if let Ok(sheet) = self.set.stylesheet(id) {
            for (field, value) in (0_u32..).zip(card.extra_values(id, &sheet)) {
                out.push(ToUpdate {
                    value,
                    card: Some(card.clone()),
                    target: ValueTarget::Extra {
                        card: card.id(),
                        stylesheet: id,
                        field,
                    },
                });
            }
        }
        out
    }

    /// Cards entered the set: run their default scripts, then compute all
    /// their values and whatever reads the card list.
    fn cards_inserted(&mut self, cards: &[Rc<Card>]) {
        let mut sweep = self.begin_sweep();
        for card in cards {
            match self.contexts.context_for(Some(card), &mut self.diagnostics) {
                Ok(ctx) => {
                    for value in card.values() {
                        if let Err(e) = value.apply_default(ctx) {
                            let field = value.field().name();
                            warn!(field, error = %e, "default script failed");
                            self.diagnostics
                                .error(format!("In the default script of {field}: {e}"));
                        }
                    }
                }
                Err(e) => {
                    error!(card = %card.id(), error = %e, "no context for new card");
                    self.diagnostics.error(e.to_string());
                }
            }
            for item in self.card_values(card) {
                self.push(
                    &mut sweep,
                    item.value,
                    item.card,
                    item.target,
                    None,
                    Dependency::dummy(),
                );
            }
        }
        self.card_list_membership_changed(&mut sweep);
        self.update_recursive(sweep);
    }

    fn card_list_membership_changed(&mut self, sweep: &mut Sweep<ToUpdate>) {
        if self.config.delay().contains(DelayFlags::CARDS) {
            self.pending |= DelayFlags::CARDS;
        } else {
            self.card_list_changed(sweep);
        }
    }

    fn keywords_edited(&mut self) {
        if self.config.delay().contains(DelayFlags::KEYWORDS) {
            self.pending |= DelayFlags::KEYWORDS;
            return;
        }
        let mut sweep = self.begin_sweep();
        self.keyword_list_changed(&mut sweep);
        self.update_recursive(sweep);
    }

    /// The set's stylesheet changed (`card` is `None`) or one card's.
    fn stylesheet_changed(&mut self, card: Option<CardId>) {
        let cards = match card {
            Some(id) => match self.set.card(id) {
                Ok(card) => vec![card],
                Err(e) => {
                    error!(error = %e, "stylesheet changed on a missing card");
                    return;
                }
            },
            None => self
                .set
                .cards()
                .into_iter()
                .filter(|c| c.stylesheet().is_none())
                .collect(),
        };
        let id = match &card {
            Some(_) => cards.first().map(|c| self.set.stylesheet_for(c)),
            None => Some(self.set.stylesheet_of_set()),
        };
        if let Some(id) = id {
            match self.contexts.context(id, &mut self.diagnostics) {
                Ok(_) => {
                    if let Ok(sheet) = self.set.stylesheet(id) {
                        for style in sheet.card_styles() {
                            style.invalidate();
                            self.stats.styles_invalidated += 1;
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "stylesheet without context");
                    self.diagnostics.error(e.to_string());
                }
            }
        }

        let mut sweep = self.begin_sweep();
        for card in &cards {
            for item in self.card_values(card) {
                if matches!(item.target, ValueTarget::Extra { .. }) {
                    self.push(
                        &mut sweep,
                        item.value,
                        item.card,
                        item.target,
                        None,
                        Dependency::dummy(),
                    );
                }
            }
        }
        let deps = self.game_dependents(DependencySource::StyleSheet);
        let scope = if card.is_some() { cards.first() } else { None };
        self.enqueue_all(&mut sweep, &deps, scope, None, &mut HashSet::new());
        self.update_recursive(sweep);
    }
}

impl ActionListener for SetScriptManager {
    fn on_action(&mut self, action: &Action, undone: bool) {
        debug!(action = action.name(), undone, "action");
        match action {
            Action::SetValue { target, .. } => {
                if let Err(e) = self.update_value(*target) {
                    error!(error = %e, "changed value not found");
                    self.diagnostics.error(e.to_string());
                }
            }
            Action::AddCards { .. } | Action::RemoveCards { .. } => {
                let inserted = action.inserted_cards(undone);
                if inserted.is_empty() {
                    let mut sweep = self.begin_sweep();
                    self.card_list_membership_changed(&mut sweep);
                    self.update_recursive(sweep);
                } else {
                    self.cards_inserted(&inserted);
                }
            }
            Action::AddKeyword { .. } | Action::RemoveKeyword { .. } | Action::ChangeKeyword { .. } => {
                self.keywords_edited();
            }
            Action::ChangeSetStyleSheet { .. } => self.stylesheet_changed(None),
            Action::ChangeCardStyleSheet { card, .. } => self.stylesheet_changed(Some(*card)),
        }
    }
}
