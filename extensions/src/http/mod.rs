//! HTTP implementation of [`RemoteSource`](folio_core::storage::RemoteSource) for the Folio
//! backend.
//!
//! | operation      | route                           |
//! |----------------|---------------------------------|
//! | list           | `GET /api/files`                |
//! | create         | `POST /api/files` (JSON body)   |
//! | delete         | `DELETE /api/files/{filename}`  |
//! | categories     | `GET /api/categories`           |
//! | content        | `GET /uploads/{filename}`       |
//! | health probe   | `GET /api/health`               |
//!
//! `POST /api/files` is a Folio extension. A backend that only accepts multipart uploads on
//! `/api/upload` answers it with `405 Method Not Allowed`; the failure surfaces as
//! [`SyncError::Status`](folio_core::storage::SyncError) and the record is kept locally.

mod error;
mod remote;
mod shared;

pub use error::HttpRemoteError;
pub use remote::{HealthStatus, HttpRemote};
pub use shared::HttpRemoteConfig;
