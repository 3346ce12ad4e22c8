// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cardscript Set: card sets whose fields are computed by scripts, kept up to
//! date incrementally.
//!
//! A [`Game`] declares card fields and set fields; any field may carry a
//! cardscript computing its value from other fields, the card list, the
//! keywords or the active stylesheet. A [`Set`] holds the cards and set-wide
//! values of one game. Changes go through [`Action`]s on an [`ActionStack`],
//! and the [`SetScriptManager`] listening to that stack re-runs exactly the
//! scripts that read what changed.
//!
//! Which script reads what is learned once per game and stylesheet, by
//! running every script in cardscript's dependency-analysis mode. The result
//! lives in the game's and the stylesheet's
//! [`DependencyRegistry`](cardscript_dirty::DependencyRegistry).
//!
//! ## Quick Start
//!
//! ```rust
//! use cardscript_set::{
//!     Action, ActionStack, Field, FieldKind, Game, ScriptConfig, Set, SetScriptManager,
//!     StyleSheet, ValueTarget,
//! };
//!
//! let game = Game::builder("fantasy")
//!     .card_field(Field::new("name", FieldKind::Text))
//!     .card_field(Field::new("title", FieldKind::Text).script(r#"card.name & " the Bold""#))
//!     .set_field(
//!         Field::new("roster", FieldKind::Text)
//!             .script(r#"join(for each c in set.cards do [c.name], separator: ", ")"#),
//!     )
//!     .build();
//! let set = Set::new(game, StyleSheet::builder("plain").build()).unwrap();
//! let mut manager = SetScriptManager::new(set.clone(), ScriptConfig::default()).unwrap();
//! let mut stack = ActionStack::new(set.clone());
//!
//! let card = set.new_card();
//! let id = card.id();
//! stack.perform(Action::add_cards(vec![card]), &mut manager).unwrap();
//! let name = ValueTarget::Card { card: id, field: 0 };
//! stack.perform(Action::set_value(name, "Ann"), &mut manager).unwrap();
//!
//! let card = set.card(id).unwrap();
//! assert_eq!(card.value(1).unwrap().rendered(), "Ann the Bold");
//! assert_eq!(set.value(0).unwrap().rendered(), "Ann");
//! ```
//!
//! ## Errors
//!
//! Scripts never fail an action. Parse errors and runtime errors are queued
//! as [`Diagnostics`], each message once, and the affected value keeps its
//! previous content. [`SetError`] is reserved for misuse of the data model,
//! such as naming a card that is not in the set.
//!
//! ## Features
//!
//! This crate currently has no optional features.

mod action;
mod card;
mod config;
mod context;
mod diagnostics;
mod error;
mod field;
mod functions;
mod game;
mod keyword;
mod manager;
mod objects;
mod set;
mod style;
mod stylesheet;
mod value;

pub use action::{Action, ActionListener, ActionStack, ValueTarget};
pub use card::{Card, CardId};
pub use config::{ChangeDetection, DelayFlags, ScriptConfig, ScriptConfigBuilder};
pub use context::SetScriptContext;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::SetError;
pub use field::{Field, FieldKind};
pub use game::{Game, GameBuilder};
pub use keyword::Keyword;
pub use manager::{ManagerStats, SetScriptManager};
pub use set::Set;
pub use style::Style;
pub use stylesheet::{StyleSheet, StyleSheetBuilder};
pub use value::{Value, ValueContent};
