// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sets: the cards, keywords and set-wide values being edited.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use cardscript_dirty::InternId;
use cardscript_dirty::intern::Interner;

use crate::card::{Card, CardId};
use crate::error::SetError;
use crate::game::Game;
use crate::keyword::Keyword;
use crate::stylesheet::StyleSheet;
use crate::value::Value;

/// A set of cards for one game.
///
/// The set is shared (`Rc`) between the scheduler, the action stack and the
/// objects scripts use to read it. Mutation goes through interior cells and
/// normally through [`Action`](crate::Action)s, so that the scheduler hears
/// about it.
#[derive(Debug)]
pub struct Set {
    game: Rc<Game>,
    stylesheet_ids: RefCell<Interner<Rc<str>>>,
    stylesheets: RefCell<Vec<Rc<StyleSheet>>>,
    stylesheet: Cell<InternId>,
    data: Vec<Rc<Value>>,
    cards: RefCell<Vec<Rc<Card>>>,
    keywords: RefCell<Vec<Keyword>>,
    next_card: Cell<u32>,
}

impl Set {
    /// Creates an empty set using `stylesheet`.
    pub fn new(game: Rc<Game>, stylesheet: Rc<StyleSheet>) -> Result<Rc<Self>, SetError> {
        let mut ids = Interner::new();
        let id = ids.intern(stylesheet.name_rc())?;
        let data = game
            .set_fields()
            .iter()
            .map(|f| Rc::new(Value::new(f.clone())))
            .collect();
        Ok(Rc::new(Self {
            game,
            stylesheet_ids: RefCell::new(ids),
            stylesheets: RefCell::new(vec![stylesheet]),
            stylesheet: Cell::new(id),
            data,
            cards: RefCell::new(Vec::new()),
            keywords: RefCell::new(Vec::new()),
            next_card: Cell::new(0),
        }))
    }

    /// The game.
    #[must_use]
    pub fn game(&self) -> &Rc<Game> {
        &self.game
    }

    /// The set-wide values, in set field order.
    #[must_use]
    pub fn data(&self) -> &[Rc<Value>] {
        &self.data
    }

    /// The value of set field `index`.
    pub fn value(&self, index: u32) -> Result<&Rc<Value>, SetError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.data.get(i))
            .ok_or(SetError::FieldIndexOutOfRange(index))
    }

    /// The value of the set field called `name`.
    pub fn value_by_name(&self, name: &str) -> Result<&Rc<Value>, SetError> {
        self.data
            .iter()
            .find(|v| v.field().name() == name)
            .ok_or_else(|| SetError::FieldNotFound(name.into()))
    }

    /// Makes `stylesheet` available to cards of this set. Registering the
    /// same name twice returns the first id.
    pub fn add_stylesheet(&self, stylesheet: Rc<StyleSheet>) -> Result<InternId, SetError> {
        let mut ids = self.stylesheet_ids.borrow_mut();
        let known = ids.len();
        let id = ids.intern(stylesheet.name_rc())?;
        if ids.len() > known {
            self.stylesheets.borrow_mut().push(stylesheet);
        }
        Ok(id)
    }

    /// Looks up a registered stylesheet.
    pub fn stylesheet(&self, id: InternId) -> Result<Rc<StyleSheet>, SetError> {
        self.stylesheets
            .borrow()
            .get(id.as_usize())
            .cloned()
            .ok_or_else(|| SetError::StyleSheetNotRegistered(format!("{id:?}")))
    }

    /// The id of a registered stylesheet, by name.
    #[must_use]
    pub fn stylesheet_id(&self, name: &str) -> Option<InternId> {
        self.stylesheet_ids.borrow().lookup(name)
    }

    /// The set's own stylesheet.
    #[must_use]
    pub fn stylesheet_of_set(&self) -> InternId {
        self.stylesheet.get()
    }

    pub(crate) fn replace_stylesheet(&self, id: InternId) -> InternId {
        self.stylesheet.replace(id)
    }

    /// The stylesheet `card` is shown with: its own, or else the set's.
    #[must_use]
    pub fn stylesheet_for(&self, card: &Card) -> InternId {
        card.stylesheet().unwrap_or_else(|| self.stylesheet.get())
    }

    /// Creates a card with default content. The card is not part of the set
    /// until an [`Action::AddCards`](crate::Action::AddCards) adds it.
    #[must_use]
    pub fn new_card(&self) -> Rc<Card> {
        let id = self.next_card.get();
        self.next_card.set(id + 1);
        Rc::new(Card::new(CardId::new(id), &self.game))
    }

    /// The cards, in order.
    #[must_use]
    pub fn cards(&self) -> Vec<Rc<Card>> {
        self.cards.borrow().clone()
    }

    /// Number of cards.
    #[must_use]
    pub fn card_count(&self) -> usize {
        self.cards.borrow().len()
    }

    /// The card with the given id.
    pub fn card(&self, id: CardId) -> Result<Rc<Card>, SetError> {
        self.cards
            .borrow()
            .iter()
            .find(|c| c.id() == id)
            .cloned()
            .ok_or(SetError::CardNotFound(id))
    }

    /// The keywords, in order.
    #[must_use]
    pub fn keywords(&self) -> Vec<Keyword> {
        self.keywords.borrow().clone()
    }

    /// Number of keywords.
    #[must_use]
    pub fn keyword_count(&self) -> usize {
        self.keywords.borrow().len()
    }

    pub(crate) fn insert_card(&self, position: usize, card: Rc<Card>) {
        let mut cards = self.cards.borrow_mut();
        let position = position.min(cards.len());
        cards.insert(position, card);
    }

    pub(crate) fn remove_card(&self, id: CardId) -> Result<(usize, Rc<Card>), SetError> {
        let mut cards = self.cards.borrow_mut();
        let position = cards
            .iter()
            .position(|c| c.id() == id)
            .ok_or(SetError::CardNotFound(id))?;
        Ok((position, cards.remove(position)))
    }

    pub(crate) fn insert_keyword(&self, position: usize, keyword: Keyword) {
        let mut keywords = self.keywords.borrow_mut();
        let position = position.min(keywords.len());
        keywords.insert(position, keyword);
    }

    pub(crate) fn remove_keyword(&self, position: usize) -> Result<Keyword, SetError> {
        let mut keywords = self.keywords.borrow_mut();
        if position >= keywords.len() {
            return Err(SetError::KeywordNotFound(position));
        }
        Ok(keywords.remove(position))
    }

    pub(crate) fn replace_keyword(&self, position: usize, keyword: Keyword) -> Result<Keyword, SetError> {
        let mut keywords = self.keywords.borrow_mut();
        let slot = keywords
            .get_mut(position)
            .ok_or(SetError::KeywordNotFound(position))?;
        Ok(std::mem::replace(slot, keyword))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Field, FieldKind};

    fn set() -> Rc<Set> {
        let game = Game::builder("g")
            .card_field(Field::new("name", FieldKind::Text))
            .set_field(Field::new("title", FieldKind::Text))
            .build();
        Set::new(game, StyleSheet::builder("plain").build()).unwrap()
    }

    #[test]
    fn stylesheets_are_interned_by_name() {
        let set = set();
        let plain = set.stylesheet_of_set();
        let fancy = set.add_stylesheet(StyleSheet::builder("fancy").build()).unwrap();
        assert_ne!(plain, fancy);
        assert_eq!(
            set.add_stylesheet(StyleSheet::builder("fancy").build()).unwrap(),
            fancy
        );
        assert_eq!(set.stylesheet_id("plain"), Some(plain));
        assert_eq!(set.stylesheet(fancy).unwrap().name(), "fancy");
    }

    #[test]
    fn cards_get_fresh_ids() {
        let set = set();
        let a = set.new_card();
        let b = set.new_card();
        assert_ne!(a.id(), b.id());
        assert_eq!(set.card_count(), 0);
        set.insert_card(0, a.clone());
        assert_eq!(set.card(a.id()).unwrap().id(), a.id());
        assert_eq!(set.card(b.id()).unwrap_err(), SetError::CardNotFound(b.id()));
        assert_eq!(set.remove_card(a.id()).unwrap().0, 0);
    }

    #[test]
    fn values_by_name() {
        let set = set();
        assert_eq!(set.value_by_name("title").unwrap().field().index(), 0);
        assert_eq!(
            set.value_by_name("subtitle").unwrap_err(),
            SetError::FieldNotFound("subtitle".into())
        );
    }
}
