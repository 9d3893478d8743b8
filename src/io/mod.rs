pub mod export;
pub mod legacy;

pub use export::{Exporter, Statement};
pub use legacy::{ImportError, ImportOptions, ImportResult, LegacyImporter};
