//! Sawmill Library
//!
//! Signature-based file carving: find header and footer signatures in a raw
//! image, pair them per file type and extract every pair verbatim.
//!
//! # Features
//!
//! - **Commentz-Walter automaton**: every signature of a file type found in
//!   one streaming pass with Boyer-Moore style skips
//! - **Boyer-Moore**: single-signature matcher over overlapping chunks
//! - **Parallel per-type workers**: rayon pool, results merged over a channel
//! - **Blake3 digests**: every carved file hashed on extraction
//! - **Read-only source**: the image is only ever opened for reading
//!
//! # Example
//!
//! ```no_run
//! use sawmill::{CarveOptions, Carver, Catalog};
//! use std::path::PathBuf;
//!
//! fn main() -> anyhow::Result<()> {
//!     let options = CarveOptions {
//!         source: PathBuf::from("disk.dd"),
//!         output_dir: PathBuf::from("carved"),
//!         ..Default::default()
//!     };
//!     let report = Carver::new(&Catalog::builtin()?, options)?.carve()?;
//!
//!     println!("Carved {} files", report.files_carved());
//!     Ok(())
//! }
//! ```

pub mod carve;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;

// Re-export commonly used types
pub use carve::{
    CarveOptions, CarveProgress, CarveReport, CarvedFile, Carver, Pairing, ScanReport, TypeReport,
    TypeStatus,
};
pub use catalog::{Catalog, FileTypeGroup, Signature};
pub use config::Config;
pub use engine::{
    build_matchers, Automaton, BoyerMoore, CommentzWalter, EngineKind, Match, Matcher, Pattern,
    Tag,
};
pub use error::{Result, SawmillError};
