//! Couple registration.
//!
//! A couple is registered into a tournament as an [`Entrant`]. The
//! [`RegistrationGuard`] enforces that a player holds at most one active entry
//! per tournament; the storage layer backs that rule with uniqueness
//! constraints so concurrent submissions cannot both succeed.

pub mod guard;
pub mod models;

pub use guard::RegistrationGuard;
pub use models::{Couple, CoupleId, Entrant, EntrantId, Player, PlayerId, normalize_pair};
