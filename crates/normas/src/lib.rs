//! Incremental mirror of the SAIJ legal norms corpus.
//!
//! The library discovers documents through the paginated SAIJ search,
//! loads each one, and persists it into a file-based store as a canonical
//! JSON payload plus a rendered Markdown page. Re-runs only rewrite
//! documents whose source timestamp moved, and updates whose only changes
//! are timestamp noise are kept out of the changelog.

pub mod diff;
pub mod repository;
pub mod saij;
pub mod source;
pub mod sync;
