//! `adselect_core` picks the single best-eligible advertisement for a customer and
//! marketplace out of a catalog of candidate contents.
//!
//! # Overview
//!
//! The crate is organized as a set of building blocks around two cores: deciding
//! whether an advertisement's targeting rules are satisfied for a request, and picking
//! a winner among the advertisements that qualify.
//!
//! [`TargetingPredicate`](targeting::TargetingPredicate)s are the individual
//! eligibility rules. Each evaluates against an immutable [`RequestContext`] to a
//! three-valued [`TargetingPredicateResult`](targeting::TargetingPredicateResult) —
//! a predicate that cannot decide reports indeterminate rather than rejecting.
//! Externally-implemented rules plug in through the
//! [`EvaluatePredicate`](targeting::EvaluatePredicate) trait.
//!
//! [`TargetingEvaluator`](targeting::TargetingEvaluator) decides whether *all*
//! predicates of a [`TargetingGroup`] hold. Predicates are fanned out to a bounded
//! worker pool that is reused across calls; the first false short-circuits the group
//! and outstanding work is cancelled best-effort. A group that does not settle within
//! the configured deadline resolves as not eligible, distinguishably from an ordinary
//! rejection (see [`GroupDisposition`](targeting::GroupDisposition)).
//!
//! [`AdvertisementSelector`](selection::AdvertisementSelector) orchestrates a
//! selection request: it reads candidate contents and targeting groups from the
//! [`stores`] collaborators, drives the evaluator over every candidate group, ranks
//! the eligible ones by click-through rate, and returns a [`GeneratedAdvertisement`] —
//! either a populated advertisement or the explicit empty sentinel; "no advertisement"
//! is always a normal return value, never an error or a panic.
//!
//! [`stores`] defines the read-only collaborator contracts
//! ([`ContentStore`](stores::ContentStore),
//! [`TargetingGroupStore`](stores::TargetingGroupStore)) together with thread-safe
//! in-memory implementations for tests and single-process embedders.
//!
//! [`events`] contains the [`SelectionEvent`](events::SelectionEvent) describing a
//! successful selection. Events are returned to the caller rather than logged by the
//! core, so embedders control their analytics pipeline.

#![warn(rustdoc::missing_crate_level_docs)]

pub mod events;
pub mod selection;
pub mod stores;
pub mod targeting;

mod error;
mod models;
mod str;

pub use crate::str::Str;
pub use error::{Error, Result, StoreError};
pub use models::{
    AdvertisementContent, GeneratedAdvertisement, RequestContext, TargetingGroup, Timestamp,
};
