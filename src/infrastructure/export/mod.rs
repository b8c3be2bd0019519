//! Export adapters

mod file;

pub use file::FileExporter;
