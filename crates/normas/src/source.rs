//! Source-agnostic types for paginated document corpora.
//!
//! This module defines the [`SourceClient`] trait that decouples the sync
//! engine from the concrete SAIJ client, plus the document model shared by
//! discovery, persistence and reporting.

mod errors;
mod types;

pub use errors::{Result, SourceError, short_error_message};
pub use types::{
    ContentType, Document, DocumentSummary, ID_POINTER, Jurisdiccion, Kind, ParseValueError,
    Provincia, Publication, Search, SearchPage, SourceClient, TIMESTAMP_POINTER, TipoNorma,
    WEB_BASE_URL,
};

pub(crate) use types::value_as_i64;
