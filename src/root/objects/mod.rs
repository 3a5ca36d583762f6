//! Deserializers for the histogram classes the DQM files contain.

pub mod th1;
pub mod th2;

use crate::root::error::{Result, RootError};
use crate::root::histogram::{Hist1, Hist2};

/// Decode a 1-D histogram payload according to its key class.
pub fn read_hist1(payload: &[u8], class_name: &str) -> Result<Hist1> {
    match class_name {
        "TH1D" => th1::read_th1d(payload),
        "TH1F" => th1::read_th1f(payload),
        other => Err(RootError::Deserialization(format!(
            "unsupported 1-D histogram class: {}",
            other
        ))),
    }
}

/// Decode a 2-D histogram payload according to its key class.
pub fn read_hist2(payload: &[u8], class_name: &str) -> Result<Hist2> {
    match class_name {
        "TH2D" => th2::read_th2d(payload),
        "TH2F" => th2::read_th2f(payload),
        other => Err(RootError::Deserialization(format!(
            "unsupported 2-D histogram class: {}",
            other
        ))),
    }
}
