//! TH1F/TH1D deserialization.
//!
//! Serialized layout (simplified):
//! ```text
//! TH1D (or TH1F)
//!   TH1 (base)
//!     TNamed (name, title)
//!     TAttLine / TAttFill / TAttMarker (skipped via byte counts)
//!     fNcells (i32)
//!     fXaxis, fYaxis, fZaxis (TAxis)
//!     scalar stats (fBarOffset, fEntries, fTsumw, ...)
//!     fContour, fSumw2 (TArrayD)
//!     fOption (TString), fFunctions (TList, skipped)
//!     trailing version-dependent fields (skipped via byte count)
//!   TArrayD / TArrayF (bin contents including under/overflow)
//! ```

use crate::root::buffer::Reader;
use crate::root::error::{Result, RootError};
use crate::root::histogram::Hist1;

/// Axis description extracted from a TAxis.
pub(crate) struct AxisInfo {
    pub n_bins: i32,
    pub min: f64,
    pub max: f64,
    /// Variable-width bin edges; empty for uniform binning.
    pub edges: Vec<f64>,
}

impl AxisInfo {
    /// Explicit edges, synthesized for uniform binning.
    pub fn bin_edges(&self) -> Vec<f64> {
        if !self.edges.is_empty() {
            return self.edges.clone();
        }
        let n = self.n_bins.max(0) as usize;
        let width = (self.max - self.min) / n.max(1) as f64;
        (0..=n).map(|i| self.min + i as f64 * width).collect()
    }
}

/// Fields shared by every TH1-derived class.
pub(crate) struct Th1Base {
    pub name: String,
    pub title: String,
    pub n_cells: i32,
    pub x: AxisInfo,
    pub y: AxisInfo,
}

pub fn read_th1d(payload: &[u8]) -> Result<Hist1> {
    let mut r = Reader::new(payload);
    let (ver, _end) = r.read_version()?;
    if ver < 1 {
        return Err(RootError::Deserialization(format!(
            "unsupported TH1D version: {}",
            ver
        )));
    }
    let base = read_th1_base(&mut r)?;
    let content = read_cell_array_f64(&mut r, base.n_cells)?;
    build(base, content)
}

pub fn read_th1f(payload: &[u8]) -> Result<Hist1> {
    let mut r = Reader::new(payload);
    let (ver, _end) = r.read_version()?;
    if ver < 1 {
        return Err(RootError::Deserialization(format!(
            "unsupported TH1F version: {}",
            ver
        )));
    }
    let base = read_th1_base(&mut r)?;
    let n = expect_cells(&mut r, base.n_cells)?;
    let content: Vec<f64> = r.read_f32_array(n)?.into_iter().map(f64::from).collect();
    build(base, content)
}

pub(crate) fn read_cell_array_f64(r: &mut Reader, n_cells: i32) -> Result<Vec<f64>> {
    let n = expect_cells(r, n_cells)?;
    r.read_f64_array(n)
}

pub(crate) fn expect_cells(r: &mut Reader, n_cells: i32) -> Result<usize> {
    let n = r.read_u32()? as usize;
    if n != n_cells as usize {
        return Err(RootError::Deserialization(format!(
            "cell array size {} != fNcells {}",
            n, n_cells
        )));
    }
    Ok(n)
}

/// Read the TH1 base class, keeping the x and y axes.
pub(crate) fn read_th1_base(r: &mut Reader) -> Result<Th1Base> {
    let (ver, end) = r.read_version()?;

    let (name, title) = r.read_tnamed()?;

    // TAttLine, TAttFill, TAttMarker
    skip_streamed(r)?;
    skip_streamed(r)?;
    skip_streamed(r)?;

    let n_cells = r.read_i32()?;

    let x = read_taxis(r)?;
    let y = read_taxis(r)?;
    skip_taxis(r)?; // fZaxis

    let _bar_offset = r.read_i16()?;
    let _bar_width = r.read_i16()?;
    let _entries = r.read_f64()?;
    let _tsumw = r.read_f64()?;
    let _tsumw2 = r.read_f64()?;
    let _tsumwx = r.read_f64()?;
    let _tsumwx2 = r.read_f64()?;
    if ver >= 2 {
        let _max = r.read_f64()?;
        let _min = r.read_f64()?;
    }
    if ver >= 3 {
        let _norm = r.read_f64()?;
    }

    // fContour
    let contour_n = r.read_u32()? as usize;
    if contour_n > 0 {
        r.skip(contour_n * 8)?;
    }
    // fSumw2
    let sumw2_n = r.read_u32()? as usize;
    if sumw2_n > 0 {
        r.skip(sumw2_n * 8)?;
    }
    let _option = r.read_string()?;
    // fFunctions (TList)
    skip_streamed(r)?;

    if ver >= 4 {
        let buf_size = r.read_i32()?;
        if buf_size > 0 {
            r.skip(buf_size as usize * 8)?;
        }
    }
    if ver >= 7 {
        let _err_opt = r.read_i32()?;
    }
    if ver >= 8 {
        let _stat_overflows = r.read_i32()?;
    }

    // Skip any trailing fields added in later streamer versions.
    if let Some(end) = end
        && end > r.pos()
    {
        r.seek(end);
    }

    Ok(Th1Base {
        name,
        title,
        n_cells,
        x,
        y,
    })
}

fn read_taxis(r: &mut Reader) -> Result<AxisInfo> {
    let (_ver, end) = r.read_version()?;

    let (_name, _title) = r.read_tnamed()?;
    // TAttAxis
    skip_streamed(r)?;

    let n_bins = r.read_i32()?;
    let min = r.read_f64()?;
    let max = r.read_f64()?;

    // fXbins
    let edges_n = r.read_u32()? as usize;
    let edges = if edges_n > 0 {
        r.read_f64_array(edges_n)?
    } else {
        Vec::new()
    };

    // Remaining axis fields (fFirst, fLast, labels, ...) are skipped.
    if let Some(end) = end
        && end > r.pos()
    {
        r.seek(end);
    }

    Ok(AxisInfo {
        n_bins,
        min,
        max,
        edges,
    })
}

fn skip_taxis(r: &mut Reader) -> Result<()> {
    let (_ver, end) = r.read_version()?;
    match end {
        Some(end) => {
            r.seek(end);
            Ok(())
        }
        None => {
            // Old files without byte counts: decode field by field instead.
            r.read_tnamed()?;
            skip_streamed(r)?;
            let _n_bins = r.read_i32()?;
            let _min = r.read_f64()?;
            let _max = r.read_f64()?;
            let edges_n = r.read_u32()? as usize;
            if edges_n > 0 {
                r.skip(edges_n * 8)?;
            }
            Ok(())
        }
    }
}

/// Skip a streamed object via its byte-count header.
pub(crate) fn skip_streamed(r: &mut Reader) -> Result<()> {
    let (_ver, end) = r.read_version()?;
    if let Some(end) = end {
        r.seek(end);
    }
    Ok(())
}

fn build(base: Th1Base, raw: Vec<f64>) -> Result<Hist1> {
    let n_bins = base.x.n_bins.max(0) as usize;
    if raw.len() != n_bins + 2 {
        return Err(RootError::Deserialization(format!(
            "bin content length {} != n_bins + 2 ({})",
            raw.len(),
            n_bins + 2
        )));
    }

    let content: Vec<f64> = raw[1..=n_bins].to_vec();
    let entries: f64 = content.iter().sum();

    Ok(Hist1 {
        name: base.name,
        title: base.title,
        n_bins,
        x_min: base.x.min,
        x_max: base.x.max,
        edges: base.x.bin_edges(),
        content,
        underflow: raw[0],
        overflow: raw[n_bins + 1],
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::root::testfile;

    #[test]
    fn decodes_synthetic_th1d() {
        // [underflow, 5 bins, overflow]
        let raw = [2.0, 1.0, 4.0, 9.0, 16.0, 25.0, 3.0];
        let payload = testfile::th1d_payload("hist_FERS_Board0_Cer_00_04", 5, 0.0, 1000.0, &raw);

        let h = read_th1d(&payload).unwrap();
        assert_eq!(h.name, "hist_FERS_Board0_Cer_00_04");
        assert_eq!(h.n_bins, 5);
        assert_eq!(h.content, vec![1.0, 4.0, 9.0, 16.0, 25.0]);
        assert_eq!(h.underflow, 2.0);
        assert_eq!(h.overflow, 3.0);
        assert_eq!(h.edges.len(), 6);
        assert!((h.x_max - 1000.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_truncated_cell_array() {
        let raw = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 0.0];
        let mut payload = testfile::th1d_payload("bad", 5, 0.0, 1.0, &raw);
        payload.truncate(payload.len() - 8);
        assert!(read_th1d(&payload).is_err());
    }
}
