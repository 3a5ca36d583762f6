//! TH2F/TH2D deserialization.
//!
//! A TH2-derived object nests the shared TH1 base, then adds four scalar
//! stats of its own (fScalefactor, fTsumwy, fTsumwy2, fTsumwxy) before the
//! cell array. Cells are stored x-fastest over `(nx + 2) * (ny + 2)`
//! entries including under/overflow rows and columns.

use crate::root::buffer::Reader;
use crate::root::error::{Result, RootError};
use crate::root::histogram::Hist2;
use crate::root::objects::th1::{Th1Base, expect_cells, read_th1_base};

pub fn read_th2d(payload: &[u8]) -> Result<Hist2> {
    let mut r = Reader::new(payload);
    let (ver, _end) = r.read_version()?;
    if ver < 1 {
        return Err(RootError::Deserialization(format!(
            "unsupported TH2D version: {}",
            ver
        )));
    }
    let base = read_th2_base(&mut r)?;
    let n = expect_cells(&mut r, base.n_cells)?;
    let raw = r.read_f64_array(n)?;
    build(base, raw)
}

pub fn read_th2f(payload: &[u8]) -> Result<Hist2> {
    let mut r = Reader::new(payload);
    let (ver, _end) = r.read_version()?;
    if ver < 1 {
        return Err(RootError::Deserialization(format!(
            "unsupported TH2F version: {}",
            ver
        )));
    }
    let base = read_th2_base(&mut r)?;
    let n = expect_cells(&mut r, base.n_cells)?;
    let raw: Vec<f64> = r.read_f32_array(n)?.into_iter().map(f64::from).collect();
    build(base, raw)
}

fn read_th2_base(r: &mut Reader) -> Result<Th1Base> {
    let (_ver, end) = r.read_version()?;
    let base = read_th1_base(r)?;

    let _scale_factor = r.read_f64()?;
    let _tsumwy = r.read_f64()?;
    let _tsumwy2 = r.read_f64()?;
    let _tsumwxy = r.read_f64()?;

    if let Some(end) = end
        && end > r.pos()
    {
        r.seek(end);
    }
    Ok(base)
}

fn build(base: Th1Base, raw: Vec<f64>) -> Result<Hist2> {
    let nx = base.x.n_bins.max(0) as usize;
    let ny = base.y.n_bins.max(0) as usize;
    if raw.len() != (nx + 2) * (ny + 2) {
        return Err(RootError::Deserialization(format!(
            "cell count {} != (nx + 2) * (ny + 2) for nx={} ny={}",
            raw.len(),
            nx,
            ny
        )));
    }

    // Drop the under/overflow frame.
    let mut cells = Vec::with_capacity(nx * ny);
    for iy in 0..ny {
        let row = (iy + 1) * (nx + 2) + 1;
        cells.extend_from_slice(&raw[row..row + nx]);
    }
    let entries: f64 = cells.iter().sum();

    Ok(Hist2 {
        name: base.name,
        title: base.title,
        nx,
        ny,
        x_min: base.x.min,
        x_max: base.x.max,
        y_min: base.y.min,
        y_max: base.y.max,
        cells,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::root::testfile;

    #[test]
    fn decodes_synthetic_th2d() {
        // 2 x 2 interior cells inside a 4 x 4 frame.
        let interior = [1.0, 2.0, 3.0, 4.0];
        let payload = testfile::th2d_payload(
            "hist_DRS_Board0_Cer_vs_TS_00_00",
            2,
            0.0,
            1024.0,
            2,
            1400.0,
            2500.0,
            &interior,
        );

        let h = read_th2d(&payload).unwrap();
        assert_eq!(h.name, "hist_DRS_Board0_Cer_vs_TS_00_00");
        assert_eq!((h.nx, h.ny), (2, 2));
        assert_eq!(h.cells, interior);
        assert_eq!(h.value(1, 0), 2.0);
        assert_eq!(h.value(0, 1), 3.0);
        assert!((h.y_min - 1400.0).abs() < 1e-12);
    }
}
