//! SAIJ client: the concrete [`SourceClient`] for the Argentine legal
//! norms service.
//!
//! [`SourceClient`]: crate::source::SourceClient

mod client;
mod convert;

pub use client::{DEFAULT_BASE_URL, SaijClient};
