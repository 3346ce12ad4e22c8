// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors raised by the data model.

use cardscript_dirty::intern::InternerFull;

use crate::card::CardId;

/// An internal invariant of the data model was violated.
///
/// These indicate a programming error in whoever drives the model, such as
/// naming a field that does not exist. They abort the one operation that hit
/// them and are never caused by scripts.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SetError {
    /// No field has the given name.
    #[error("no field named `{0}`")]
    FieldNotFound(String),
    /// A field index is out of range.
    #[error("no field with index {0}")]
    FieldIndexOutOfRange(u32),
    /// The card is not part of the set.
    #[error("card {0} is not part of the set")]
    CardNotFound(CardId),
    /// No keyword at the given position.
    #[error("no keyword at index {0}")]
    KeywordNotFound(usize),
    /// The stylesheet was never registered with the set.
    #[error("stylesheet `{0}` is not registered with the set")]
    StyleSheetNotRegistered(String),
    /// The set ran out of stylesheet ids.
    #[error("too many stylesheets")]
    TooManyStyleSheets(#[from] InternerFull),
    /// The undo stack is empty.
    #[error("nothing to undo")]
    NothingToUndo,
    /// The redo stack is empty.
    #[error("nothing to redo")]
    NothingToRedo,
}
