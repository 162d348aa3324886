//! Concrete collaborators for `folio_core`.

pub mod http;
