//! Native reader for the subset of the ROOT container format the DQM
//! histogram files use: file header, top-level key directory, compressed
//! key payloads, and TH1/TH2 histogram objects.

pub mod buffer;
pub mod decompress;
pub mod error;
pub mod file;
pub mod histogram;
pub mod objects;

#[cfg(test)]
pub mod testfile;

pub use error::{Result, RootError};
pub use file::RootFile;
pub use histogram::{Hist1, Hist2};
