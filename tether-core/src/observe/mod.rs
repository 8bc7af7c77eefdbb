//! Observation
//!
//! This module is the seam between a bridge and the model that owns it.
//!
//! A bridge reports two things to its owner:
//!
//! - "about to read": [`ObservationHook::will_access`], called once per
//!   `get`/`results` call, before the value is returned.
//! - "changed": [`ObservationHook::did_mutate`], wrapped around the cache
//!   invalidation so the owner can record that this specific property
//!   changed.
//!
//! # Ownership
//!
//! The owner holds its bridges by value; each bridge holds an
//! [`ObservationBinding`] with a `Weak` handle back to the owner. The
//! binding is registered after construction (`within_observation`), which
//! is the usual two-phase wiring for back-references without cycles.
//!
//! [`Registrar`] is a complete hook implementation owners can embed or
//! use directly.

mod context;
mod hook;
mod registrar;

pub use hook::{ObservationBinding, ObservationHook, PropertyId};
pub use registrar::Registrar;

pub(crate) use hook::MutationRelay;
