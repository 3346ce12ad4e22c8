// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Undoable mutations of a set.
//!
//! Every change to a [`Set`] that scripts may observe goes through an
//! [`Action`] performed on an [`ActionStack`]. The stack tells an
//! [`ActionListener`] (normally the
//! [`SetScriptManager`](crate::SetScriptManager)) after each perform, undo or
//! redo, so that derived values can be refreshed.

use std::rc::Rc;

use cardscript_dirty::InternId;

use crate::card::{Card, CardId};
use crate::error::SetError;
use crate::keyword::Keyword;
use crate::set::Set;
use crate::value::{Value, ValueContent};

/// Which value a [`Action::SetValue`] changes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueTarget {
    /// A card field of a card.
    Card {
        /// The card.
        card: CardId,
        /// Index of the card field.
        field: u32,
    },
    /// An extra field a card has under one stylesheet.
    Extra {
        /// The card.
        card: CardId,
        /// The stylesheet defining the field.
        stylesheet: InternId,
        /// Index of the extra field.
        field: u32,
    },
    /// A set field.
    Set {
        /// Index of the set field.
        field: u32,
    },
}

impl ValueTarget {
    /// Finds the value, and the card holding it if any.
    pub fn resolve(self, set: &Set) -> Result<(Rc<Value>, Option<Rc<Card>>), SetError> {
        match self {
            Self::Card { card, field } => {
                let card = set.card(card)?;
                let value = card.value(field)?.clone();
                Ok((value, Some(card)))
            }
            Self::Extra {
                card,
                stylesheet,
                field,
            } => {
                let card = set.card(card)?;
                let sheet = set.stylesheet(stylesheet)?;
                let value = usize::try_from(field)
                    .ok()
                    .and_then(|i| card.extra_values(stylesheet, &sheet).get(i).cloned())
                    .ok_or(SetError::FieldIndexOutOfRange(field))?;
                Ok((value, Some(card)))
            }
            Self::Set { field } => Ok((set.value(field)?.clone(), None)),
        }
    }
}

/// A mutation of a set that can be undone.
///
/// Actions hold whatever they need to revert themselves; applying an action
/// swaps its payload with the state it replaces, so applying it again
/// reverts it.
#[derive(Clone, Debug)]
pub enum Action {
    /// Replaces the content of one value.
    SetValue {
        /// The value.
        target: ValueTarget,
        /// The content to store; after applying, the content it replaced.
        content: ValueContent,
    },
    /// Appends cards made by [`Set::new_card`].
    AddCards {
        /// The cards.
        cards: Vec<Rc<Card>>,
    },
    /// Removes cards.
    RemoveCards {
        /// The cards to remove.
        ids: Vec<CardId>,
        /// Where each removed card was, filled in when applied.
        removed: Vec<(usize, Rc<Card>)>,
    },
    /// Inserts a keyword.
    AddKeyword {
        /// The keyword.
        keyword: Keyword,
        /// Where it goes; `None` appends. Filled in when applied.
        position: Option<usize>,
    },
    /// Removes a keyword.
    RemoveKeyword {
        /// Which keyword.
        position: usize,
        /// The removed keyword, filled in when applied.
        removed: Option<Keyword>,
    },
    /// Replaces a keyword.
    ChangeKeyword {
        /// Which keyword.
        position: usize,
        /// The new keyword; after applying, the one it replaced.
        keyword: Keyword,
    },
    /// Switches the stylesheet of the set.
    ChangeSetStyleSheet {
        /// The new stylesheet; after applying, the one it replaced.
        stylesheet: InternId,
    },
    /// Gives a card its own stylesheet, or makes it use the set's again.
    ChangeCardStyleSheet {
        /// The card.
        card: CardId,
        /// The new override; after applying, the one it replaced.
        stylesheet: Option<InternId>,
    },
}

impl Action {
    /// Sets the content of a value.
    #[must_use]
    pub fn set_value(target: ValueTarget, content: impl Into<ValueContent>) -> Self {
        Self::SetValue {
            target,
            content: content.into(),
        }
    }

    /// Adds cards.
    #[must_use]
    pub fn add_cards(cards: Vec<Rc<Card>>) -> Self {
        Self::AddCards { cards }
    }

    /// Removes cards.
    #[must_use]
    pub fn remove_cards(ids: Vec<CardId>) -> Self {
        Self::RemoveCards {
            ids,
            removed: Vec::new(),
        }
    }

    /// Appends a keyword.
    #[must_use]
    pub fn add_keyword(keyword: Keyword) -> Self {
        Self::AddKeyword {
            keyword,
            position: None,
        }
    }

    /// Removes the keyword at `position`.
    #[must_use]
    pub fn remove_keyword(position: usize) -> Self {
        Self::RemoveKeyword {
            position,
            removed: None,
        }
    }

    /// Replaces the keyword at `position`.
    #[must_use]
    pub fn change_keyword(position: usize, keyword: Keyword) -> Self {
        Self::ChangeKeyword { position, keyword }
    }

    /// Switches the set's stylesheet.
    #[must_use]
    pub fn change_set_stylesheet(stylesheet: InternId) -> Self {
        Self::ChangeSetStyleSheet { stylesheet }
    }

    /// Sets or clears a card's own stylesheet.
    #[must_use]
    pub fn change_card_stylesheet(card: CardId, stylesheet: Option<InternId>) -> Self {
        Self::ChangeCardStyleSheet { card, stylesheet }
    }

    /// A short description, for logs and undo menus.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetValue { .. } => "change value",
            Self::AddCards { .. } => "add cards",
            Self::RemoveCards { .. } => "remove cards",
            Self::AddKeyword { .. } => "add keyword",
            Self::RemoveKeyword { .. } => "remove keyword",
            Self::ChangeKeyword { .. } => "change keyword",
            Self::ChangeSetStyleSheet { .. } => "change stylesheet",
            Self::ChangeCardStyleSheet { .. } => "change card stylesheet",
        }
    }

    /// Returns `true` if the action changes the keyword list.
    #[must_use]
    pub fn touches_keywords(&self) -> bool {
        matches!(
            self,
            Self::AddKeyword { .. } | Self::RemoveKeyword { .. } | Self::ChangeKeyword { .. }
        )
    }

    /// The cards this action puts into the set, when performed (`undone`
    /// false) or undone.
    #[must_use]
    pub fn inserted_cards(&self, undone: bool) -> Vec<Rc<Card>> {
        match (self, undone) {
            (Self::AddCards { cards }, false) => cards.clone(),
            (Self::RemoveCards { removed, .. }, true) => {
                removed.iter().map(|(_, c)| c.clone()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Applies the action to `set`, or reverts it when `undo` is set.
    ///
    /// On error the set is left as it was, except for multi-card actions,
    /// which stop at the first card that is not found.
    pub fn apply(&mut self, set: &Set, undo: bool) -> Result<(), SetError> {
        match self {
            Self::SetValue { target, content } => {
                let (value, _) = target.resolve(set)?;
                *content = value.replace(content.clone());
            }
            Self::AddCards { cards } => {
                if undo {
                    let ids: Vec<_> = cards.iter().rev().map(|c| c.id()).collect();
                    remove_all(set, &ids)?;
                } else {
                    for card in cards.iter() {
                        set.insert_card(set.card_count(), card.clone());
                    }
                }
            }
            Self::RemoveCards { ids, removed } => {
                if undo {
                    restore(set, removed);
                } else {
                    *removed = remove_all(set, ids)?;
                }
            }
            Self::AddKeyword { keyword, position } => {
                if undo {
                    let at = position.unwrap_or(set.keyword_count());
                    set.remove_keyword(at)?;
                } else {
                    let at = position.unwrap_or(set.keyword_count());
                    set.insert_keyword(at, keyword.clone());
                    *position = Some(at.min(set.keyword_count() - 1));
                }
            }
            Self::RemoveKeyword { position, removed } => {
                if undo {
                    let keyword = removed
                        .take()
                        .ok_or(SetError::KeywordNotFound(*position))?;
                    set.insert_keyword(*position, keyword);
                } else {
                    *removed = Some(set.remove_keyword(*position)?);
                }
            }
            Self::ChangeKeyword { position, keyword } => {
                *keyword = set.replace_keyword(*position, keyword.clone())?;
            }
            Self::ChangeSetStyleSheet { stylesheet } => {
                set.stylesheet(*stylesheet)?;
                *stylesheet = set.replace_stylesheet(*stylesheet);
            }
            Self::ChangeCardStyleSheet { card, stylesheet } => {
                if let Some(id) = stylesheet {
                    set.stylesheet(*id)?;
                }
                *stylesheet = set.card(*card)?.replace_stylesheet(*stylesheet);
            }
        }
        Ok(())
    }
}

/// Removes the cards in order. Either all of them go, or none: on a missing
/// id the cards already taken out are put back.
fn remove_all(set: &Set, ids: &[CardId]) -> Result<Vec<(usize, Rc<Card>)>, SetError> {
    let mut removed = Vec::with_capacity(ids.len());
    for id in ids {
        match set.remove_card(*id) {
            Ok(entry) => removed.push(entry),
            Err(e) => {
                restore(set, &removed);
                return Err(e);
            }
        }
    }
    Ok(removed)
}

fn restore(set: &Set, removed: &[(usize, Rc<Card>)]) {
    for (position, card) in removed.iter().rev() {
        set.insert_card(*position, card.clone());
    }
}

/// Hears about every performed, undone or redone action, after the set has
/// been changed.
pub trait ActionListener {
    /// `undone` is `true` when the action was just reverted.
    fn on_action(&mut self, action: &Action, undone: bool);
}

/// Ignores every action.
impl ActionListener for () {
    fn on_action(&mut self, _action: &Action, _undone: bool) {}
}

/// Undo and redo history of a set.
///
/// ```
/// use cardscript_set::{
///     Action, ActionStack, Field, FieldKind, Game, Set, StyleSheet, ValueTarget,
/// };
///
/// let game = Game::builder("g")
///     .set_field(Field::new("title", FieldKind::Text))
///     .build();
/// let set = Set::new(game, StyleSheet::builder("s").build()).unwrap();
/// let mut stack = ActionStack::new(set.clone());
/// let title = ValueTarget::Set { field: 0 };
/// stack.perform(Action::set_value(title, "Alpha"), &mut ()).unwrap();
/// assert_eq!(set.value(0).unwrap().rendered(), "Alpha");
/// stack.undo(&mut ()).unwrap();
/// assert_eq!(set.value(0).unwrap().rendered(), "");
/// stack.redo(&mut ()).unwrap();
/// assert_eq!(set.value(0).unwrap().rendered(), "Alpha");
/// ```
#[derive(Debug)]
pub struct ActionStack {
    set: Rc<Set>,
    undo: Vec<Action>,
    redo: Vec<Action>,
}

impl ActionStack {
    /// An empty history for `set`.
    #[must_use]
    pub fn new(set: Rc<Set>) -> Self {
        Self {
            set,
            undo: Vec::new(),
            redo: Vec::new(),
        }
    }

    /// The set.
    #[must_use]
    pub fn set(&self) -> &Rc<Set> {
        &self.set
    }

    /// Applies `action`, tells `listener`, and makes the action undoable.
    /// Clears the redo history.
    pub fn perform(
        &mut self,
        mut action: Action,
        listener: &mut dyn ActionListener,
    ) -> Result<(), SetError> {
        action.apply(&self.set, false)?;
        listener.on_action(&action, false);
        self.undo.push(action);
        self.redo.clear();
        Ok(())
    }

    /// Reverts the last action.
    pub fn undo(&mut self, listener: &mut dyn ActionListener) -> Result<(), SetError> {
        let mut action = self.undo.pop().ok_or(SetError::NothingToUndo)?;
        if let Err(e) = action.apply(&self.set, true) {
            self.undo.push(action);
            return Err(e);
        }
        listener.on_action(&action, true);
        self.redo.push(action);
        Ok(())
    }

    /// Applies the last undone action again.
    pub fn redo(&mut self, listener: &mut dyn ActionListener) -> Result<(), SetError> {
        let mut action = self.redo.pop().ok_or(SetError::NothingToRedo)?;
        if let Err(e) = action.apply(&self.set, false) {
            self.redo.push(action);
            return Err(e);
        }
        listener.on_action(&action, false);
        self.undo.push(action);
        Ok(())
    }

    /// Returns `true` if there is something to undo.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Returns `true` if there is something to redo.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Name of the action [`undo`](Self::undo) would revert.
    #[must_use]
    pub fn undo_name(&self) -> Option<&'static str> {
        self.undo.last().map(Action::name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Field, FieldKind};
    use crate::game::Game;
    use crate::stylesheet::StyleSheet;

    fn set() -> Rc<Set> {
        let game = Game::builder("g")
            .card_field(Field::new("name", FieldKind::Text))
            .build();
        let set = Set::new(game, StyleSheet::builder("plain").build()).unwrap();
        set.add_stylesheet(StyleSheet::builder("fancy").build())
            .unwrap();
        set
    }

    #[derive(Default)]
    struct Log(Vec<(&'static str, bool)>);

    impl ActionListener for Log {
        fn on_action(&mut self, action: &Action, undone: bool) {
            self.0.push((action.name(), undone));
        }
    }

    #[test]
    fn removing_and_restoring_cards_keeps_order() {
        let set = set();
        let mut stack = ActionStack::new(set.clone());
        let cards: Vec<_> = (0..4).map(|_| set.new_card()).collect();
        let ids: Vec<_> = cards.iter().map(|c| c.id()).collect();
        let mut log = Log::default();
        stack.perform(Action::add_cards(cards), &mut log).unwrap();
        stack
            .perform(Action::remove_cards(vec![ids[1], ids[3]]), &mut log)
            .unwrap();
        assert_eq!(
            set.cards().iter().map(|c| c.id()).collect::<Vec<_>>(),
            [ids[0], ids[2]]
        );
        stack.undo(&mut log).unwrap();
        assert_eq!(
            set.cards().iter().map(|c| c.id()).collect::<Vec<_>>(),
            ids
        );
        assert_eq!(
            log.0,
            [
                ("add cards", false),
                ("remove cards", false),
                ("remove cards", true)
            ]
        );
        assert!(stack.can_redo());
    }

    #[test]
    fn failed_removal_leaves_the_set_alone() {
        let set = set();
        let mut stack = ActionStack::new(set.clone());
        let cards: Vec<_> = (0..3).map(|_| set.new_card()).collect();
        let ids: Vec<_> = cards.iter().map(|c| c.id()).collect();
        let ghost = set.new_card().id();
        let mut log = Log::default();
        stack.perform(Action::add_cards(cards), &mut log).unwrap();

        assert_eq!(
            stack
                .perform(Action::remove_cards(vec![ids[0], ids[2], ghost]), &mut log)
                .unwrap_err(),
            SetError::CardNotFound(ghost)
        );
        assert_eq!(
            set.cards().iter().map(|c| c.id()).collect::<Vec<_>>(),
            ids
        );
        assert_eq!(log.0, [("add cards", false)]);
        assert_eq!(stack.undo_name(), Some("add cards"));

        // Removing a card twice fails the same way.
        assert!(
            stack
                .perform(Action::remove_cards(vec![ids[1], ids[1]]), &mut log)
                .is_err()
        );
        assert_eq!(set.card_count(), 3);
        stack.undo(&mut log).unwrap();
        assert_eq!(set.card_count(), 0);
    }

    #[test]
    fn keyword_edits_swap() {
        let set = set();
        let mut stack = ActionStack::new(set.clone());
        stack
            .perform(Action::add_keyword(Keyword::new("haste", "fast")), &mut ())
            .unwrap();
        stack
            .perform(
                Action::change_keyword(0, Keyword::new("haste", "very fast")),
                &mut (),
            )
            .unwrap();
        assert_eq!(set.keywords()[0].reminder, "very fast");
        stack.undo(&mut ()).unwrap();
        assert_eq!(set.keywords()[0].reminder, "fast");
        stack.undo(&mut ()).unwrap();
        assert_eq!(set.keyword_count(), 0);
        assert_eq!(stack.undo(&mut ()), Err(SetError::NothingToUndo));
        stack.redo(&mut ()).unwrap();
        assert_eq!(set.keyword_count(), 1);
    }

    #[test]
    fn stylesheets_must_be_registered() {
        let set = set();
        let plain = set.stylesheet_of_set();
        let fancy = set.stylesheet_id("fancy").unwrap();
        let mut stack = ActionStack::new(set.clone());
        stack
            .perform(Action::change_set_stylesheet(fancy), &mut ())
            .unwrap();
        assert_eq!(set.stylesheet_of_set(), fancy);
        stack.undo(&mut ()).unwrap();
        assert_eq!(set.stylesheet_of_set(), plain);

        let other = Set::new(set.game().clone(), StyleSheet::builder("x").build()).unwrap();
        other.add_stylesheet(StyleSheet::builder("a").build()).unwrap();
        let b = other.add_stylesheet(StyleSheet::builder("b").build()).unwrap();
        assert!(stack
            .perform(Action::change_set_stylesheet(b), &mut ())
            .is_err());
        assert_eq!(stack.undo_name(), None);
    }

    #[test]
    fn failed_undo_stays_undoable() {
        let set = set();
        let card = set.new_card();
        let id = card.id();
        let mut stack = ActionStack::new(set.clone());
        stack.perform(Action::add_cards(vec![card]), &mut ()).unwrap();
        set.remove_card(id).unwrap();
        assert_eq!(stack.undo(&mut ()), Err(SetError::CardNotFound(id)));
        assert!(stack.can_undo());
    }
}
