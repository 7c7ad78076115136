//! Collaborators that receive each downloaded photo
//!
//! The orchestrator hands every transferred photo to up to three sinks, in
//! this order:
//!
//! - a [`MetadataWriter`] that annotates the file
//! - a [`DescriptionLog`] that appends a human-readable entry
//! - an optional [`CatalogSink`] that indexes the photo
//!
//! All three are best-effort. A failing sink is logged and never keeps a
//! photo from being recorded as downloaded.
//!
//! Provided implementations:
//!
//! - [`NoOpMetadataWriter`]: leaves files untouched (the default)
//! - [`SidecarMetadataWriter`]: writes the photo record as `<file-stem>.json`
//! - [`FileDescriptionLog`]: appends to `descriptions.txt`

mod description_log;
mod noop;
mod sidecar;
mod traits;

pub use description_log::{DESCRIPTIONS_FILE_NAME, FileDescriptionLog, format_entry};
pub use noop::NoOpMetadataWriter;
pub use sidecar::SidecarMetadataWriter;
pub use traits::{CatalogSink, DescriptionLog, MetadataWriter};
