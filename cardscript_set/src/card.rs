// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cards.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use cardscript_dirty::InternId;
use hashbrown::HashMap;

use crate::error::SetError;
use crate::game::Game;
use crate::stylesheet::StyleSheet;
use crate::value::Value;

/// Identifies a card within its set. Ids are never reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CardId(u32);

impl CardId {
    pub(crate) const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw id.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A card: one value per card field of the game, plus the values of
/// stylesheet-specific extra fields.
#[derive(Debug)]
pub struct Card {
    id: CardId,
    values: Vec<Rc<Value>>,
    extra: RefCell<HashMap<InternId, Vec<Rc<Value>>>>,
    stylesheet: Cell<Option<InternId>>,
}

impl Card {
    pub(crate) fn new(id: CardId, game: &Game) -> Self {
        Self {
            id,
            values: game
                .card_fields()
                .iter()
                .map(|f| Rc::new(Value::new(f.clone())))
                .collect(),
            extra: RefCell::new(HashMap::new()),
            stylesheet: Cell::new(None),
        }
    }

    /// The card's id.
    #[must_use]
    pub fn id(&self) -> CardId {
        self.id
    }

    /// The values, in card field order.
    #[must_use]
    pub fn values(&self) -> &[Rc<Value>] {
        &self.values
    }

    /// The value of card field `index`.
    pub fn value(&self, index: u32) -> Result<&Rc<Value>, SetError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.values.get(i))
            .ok_or(SetError::FieldIndexOutOfRange(index))
    }

    /// The value of the card field called `name`.
    pub fn value_by_name(&self, name: &str) -> Result<&Rc<Value>, SetError> {
        self.values
            .iter()
            .find(|v| v.field().name() == name)
            .ok_or_else(|| SetError::FieldNotFound(name.into()))
    }

    /// The values of the extra fields of `stylesheet`, created on first use.
    pub fn extra_values(&self, id: InternId, stylesheet: &StyleSheet) -> Vec<Rc<Value>> {
        self.extra
            .borrow_mut()
            .entry(id)
            .or_insert_with(|| {
                stylesheet
                    .extra_card_fields()
                    .iter()
                    .map(|f| Rc::new(Value::new(f.clone())))
                    .collect()
            })
            .clone()
    }

    /// The stylesheet override, if the card does not use the set's.
    #[must_use]
    pub fn stylesheet(&self) -> Option<InternId> {
        self.stylesheet.get()
    }

    pub(crate) fn replace_stylesheet(&self, stylesheet: Option<InternId>) -> Option<InternId> {
        self.stylesheet.replace(stylesheet)
    }
}
