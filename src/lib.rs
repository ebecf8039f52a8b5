//! Vaultguard: the core of a facility-access controller.
//!
//! A four-factor authentication sequence gates entry. Once access is
//! granted, a vault lock state machine and a threat-escalation policy govern
//! the protected resource, and every transition lands in an append-only
//! access ledger.
//!
//! Presentation reads [`controller::SecuritySnapshot`]s and dispatches
//! [`controller::Intent`]s through a [`controller::ControllerHandle`]; it
//! never mutates state directly.
//!
//! See `DESIGN.md` for architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod logging;
pub mod types;

pub mod auth;
pub mod ledger;
pub mod scheduler;
pub mod threat;
pub mod vault;

pub mod store;

pub mod console;
pub mod controller;
