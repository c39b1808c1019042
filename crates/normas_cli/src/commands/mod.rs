pub mod fetch;
pub mod sync;
