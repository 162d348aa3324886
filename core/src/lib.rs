//! Document metadata store and versioning engine.
//!
//! [`storage`] owns the document and category collections and their cache, [`index`] and
//! [`search`] derive views from the document collection, and [`history`] keeps per-document
//! version snapshots together with an undo/redo edit session. Components report changes
//! through the listener lists in [`event`].

pub mod event;
pub mod history;
pub mod index;
pub mod search;
pub mod storage;
