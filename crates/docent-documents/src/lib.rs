//! Turns uploaded files into provenance-tagged text units and tracks which
//! documents have been ingested.

pub mod error;
pub mod loader;
pub mod registry;

pub use error::{DocumentError, Result};
pub use loader::{DEFAULT_MAX_FILE_SIZE, DocumentLoader, DocumentParser, ParsedUnit, parse_file};
pub use registry::{DocumentRegistry, RegistryEntry};
