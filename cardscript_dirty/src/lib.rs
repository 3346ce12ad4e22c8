// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cardscript Dirty: invalidation primitives for incremental script
//! re-evaluation.
//!
//! Scripts attached to card and set fields read other fields, the card list,
//! the keyword list and the active stylesheet. After a mutation only the
//! scripts that read the mutated input need to run again. This crate holds the
//! bookkeeping that decides which ones, independent of the language itself:
//!
//! - **Ages** ([`Age`], [`AgeClock`]): monotonic logical timestamps. A value
//!   remembers the age of its last refresh; anything older than the start of a
//!   sweep is stale.
//! - **Dependencies** ([`Dependency`], [`DependencyType`], [`Dependencies`]):
//!   the address of a dependent script and a de-duplicating list of them.
//! - **Registries** ([`DependencySource`], [`DependencyRegistry`],
//!   [`DependencySink`]): maps from "a kind of mutation" to the scripts it
//!   makes stale, filled in by analysing each script once.
//! - **Sweeps** ([`Sweep`], [`SweepStats`]): the breadth-first work queue of a
//!   single update pass, with the age check that makes every value run at most
//!   once per pass.
//! - **Tracing** ([`SweepTrace`], [`OneParentRecorder`]): optional provenance
//!   for "why was this refreshed?".
//!
//! ## Quick Start
//!
//! ```rust
//! use cardscript_dirty::{
//!     Age, AgeClock, Dependency, DependencyRegistry, DependencySink, DependencySource,
//!     DependencyType, Sweep,
//! };
//!
//! let clock = AgeClock::new();
//!
//! // Card field 1 reads card field 0; card field 2 reads card field 1.
//! let mut registry = DependencyRegistry::new();
//! registry.mark(
//!     DependencySource::CardField(0),
//!     Dependency::new(DependencyType::CardField, 1),
//! );
//! registry.mark(
//!     DependencySource::CardField(1),
//!     Dependency::new(DependencyType::CardField, 2),
//! );
//!
//! // Field 0 was edited: refresh everything downstream.
//! let mut ages = [Age::BEFORE_TIME; 3];
//! let mut sweep = Sweep::new(clock.now());
//! sweep.extend(registry.dependents(DependencySource::CardField(0)).iter().copied());
//! let mut order = Vec::new();
//! while let Some(dep) = sweep.pop() {
//!     let i = dep.index() as usize;
//!     if sweep.is_fresh(ages[i]) {
//!         continue;
//!     }
//!     ages[i] = clock.now();
//!     order.push(dep.index());
//!     let source = DependencySource::CardField(dep.index());
//!     sweep.extend(registry.dependents(source).iter().copied());
//! }
//! assert_eq!(order, [1, 2]);
//! ```
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. It does not depend on `std`.
//!
//! ## Features
//!
//! This crate currently has no optional features.

#![no_std]

extern crate alloc;

mod age;
mod dependency;
pub mod intern;
mod registry;
mod sweep;
mod trace;

pub use age::{Age, AgeClock};
pub use dependency::{Dependencies, Dependency, DependencyType};
pub use intern::InternId;
pub use registry::{DependencyRegistry, DependencySink, DependencySource, ProbeSink};
pub use sweep::{Sweep, SweepStats};
pub use trace::{NoTrace, OneParentRecorder, SweepTrace, UpdateCause};
