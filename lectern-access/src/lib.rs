//! Access control gate for Lectern.
//!
//! Evaluates the access predicates declared on entities and fields against
//! a request. Entity checks yield an [`AccessDecision`]; a filtered allow
//! carries a [`Where`](lectern_types::Where) clause the caller combines
//! with its own query instead of evaluating in memory.
//!
//! Single-document reads distinguish the two kinds of refusal: a plain
//! deny hides the document (not found) while a filter the document fails
//! discloses it exists (forbidden). See [`AccessDecision::admit`].

mod error;
mod gate;

pub use error::{AccessError, AccessGateResult};
pub use gate::{AccessDecision, AccessGate, Admission};
