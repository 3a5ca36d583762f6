//! Test-only writer producing minimal, uncompressed ROOT files that the
//! reader in this module tree can open. Layouts mirror the streamer
//! documentation in `objects/th1.rs` and `objects/th2.rs`.

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_i16(out: &mut Vec<u8>, v: i16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_f64(out: &mut Vec<u8>, v: f64) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_str(out: &mut Vec<u8>, s: &str) {
    assert!(s.len() < 255);
    out.push(s.len() as u8);
    out.extend_from_slice(s.as_bytes());
}

/// Wrap a streamed body in a version header with byte count.
fn versioned(version: u16, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 6);
    put_u32(&mut out, 0x4000_0000 | (body.len() as u32 + 2));
    put_u16(&mut out, version);
    out.extend_from_slice(body);
    out
}

fn tobject() -> Vec<u8> {
    let mut out = Vec::new();
    put_u16(&mut out, 1); // version
    put_u32(&mut out, 0); // fUniqueID
    put_u32(&mut out, 0); // fBits, not referenced
    out
}

fn tnamed(name: &str, title: &str) -> Vec<u8> {
    let mut body = tobject();
    put_str(&mut body, name);
    put_str(&mut body, title);
    versioned(1, &body)
}

/// Attribute classes are skipped by byte count, so the body is filler.
fn attributes(len: usize) -> Vec<u8> {
    versioned(2, &vec![0u8; len])
}

fn taxis(n_bins: i32, min: f64, max: f64) -> Vec<u8> {
    let mut body = tnamed("", "");
    body.extend_from_slice(&attributes(24)); // TAttAxis
    put_i32(&mut body, n_bins);
    put_f64(&mut body, min);
    put_f64(&mut body, max);
    put_u32(&mut body, 0); // fXbins: uniform binning
    versioned(10, &body)
}

fn th1_base(name: &str, n_cells: i32, x: &[u8], y: &[u8]) -> Vec<u8> {
    let mut body = tnamed(name, "");
    body.extend_from_slice(&attributes(6)); // TAttLine
    body.extend_from_slice(&attributes(4)); // TAttFill
    body.extend_from_slice(&attributes(8)); // TAttMarker
    put_i32(&mut body, n_cells);
    body.extend_from_slice(x);
    body.extend_from_slice(y);
    body.extend_from_slice(&taxis(1, 0.0, 1.0)); // fZaxis
    put_i16(&mut body, 0); // fBarOffset
    put_i16(&mut body, 0); // fBarWidth
    for _ in 0..5 {
        put_f64(&mut body, 0.0); // fEntries, fTsumw, fTsumw2, fTsumwx, fTsumwx2
    }
    put_f64(&mut body, -1111.0); // fMaximum
    put_f64(&mut body, -1111.0); // fMinimum
    put_f64(&mut body, 1.0); // fNormFactor
    put_u32(&mut body, 0); // fContour
    put_u32(&mut body, 0); // fSumw2
    put_str(&mut body, ""); // fOption
    body.extend_from_slice(&versioned(5, &[0u8; 6])); // fFunctions
    put_i32(&mut body, 0); // fBufferSize
    put_i32(&mut body, 0); // fBinStatErrOpt
    put_i32(&mut body, 0); // fStatOverflows
    versioned(8, &body)
}

/// TH1D object bytes; `raw` includes under/overflow, length `n_bins + 2`.
pub fn th1d_payload(name: &str, n_bins: i32, x_min: f64, x_max: f64, raw: &[f64]) -> Vec<u8> {
    assert_eq!(raw.len(), n_bins as usize + 2);
    let mut body = th1_base(
        name,
        raw.len() as i32,
        &taxis(n_bins, x_min, x_max),
        &taxis(1, 0.0, 1.0),
    );
    put_u32(&mut body, raw.len() as u32);
    for &v in raw {
        put_f64(&mut body, v);
    }
    versioned(3, &body)
}

/// TH2D object bytes; `interior` is the `nx * ny` cell grid without flows.
#[allow(clippy::too_many_arguments)]
pub fn th2d_payload(
    name: &str,
    nx: i32,
    x_min: f64,
    x_max: f64,
    ny: i32,
    y_min: f64,
    y_max: f64,
    interior: &[f64],
) -> Vec<u8> {
    assert_eq!(interior.len(), (nx * ny) as usize);
    let n_cells = (nx + 2) * (ny + 2);

    let mut th2_body = th1_base(
        name,
        n_cells,
        &taxis(nx, x_min, x_max),
        &taxis(ny, y_min, y_max),
    );
    for _ in 0..4 {
        put_f64(&mut th2_body, 0.0); // fScalefactor, fTsumwy, fTsumwy2, fTsumwxy
    }

    let mut body = versioned(5, &th2_body);
    put_u32(&mut body, n_cells as u32);
    for iy in 0..(ny + 2) {
        for ix in 0..(nx + 2) {
            let inside = ix >= 1 && ix <= nx && iy >= 1 && iy <= ny;
            let v = if inside {
                interior[((iy - 1) * nx + (ix - 1)) as usize]
            } else {
                0.0
            };
            put_f64(&mut body, v);
        }
    }
    versioned(4, &body)
}

const BEGIN: u32 = 100;
const DIR_STREAMER_LEN: u32 = 30;

fn key_header_len(class: &str, name: &str) -> u16 {
    (26 + 1 + class.len() + 1 + name.len() + 1) as u16
}

fn key_header(
    n_bytes: u32,
    obj_len: u32,
    key_len: u16,
    seek_key: u32,
    class: &str,
    name: &str,
) -> Vec<u8> {
    let mut out = Vec::new();
    put_u32(&mut out, n_bytes);
    put_u16(&mut out, 4); // key version
    put_u32(&mut out, obj_len);
    put_u32(&mut out, 0); // datime
    put_u16(&mut out, key_len);
    put_u16(&mut out, 1); // cycle
    put_u32(&mut out, seek_key);
    put_u32(&mut out, 0); // seek_pdir
    put_str(&mut out, class);
    put_str(&mut out, name);
    put_str(&mut out, ""); // title
    out
}

struct Object {
    class: &'static str,
    name: String,
    payload: Vec<u8>,
}

/// Assembles a flat, uncompressed ROOT file from histogram objects.
pub struct FileBuilder {
    objects: Vec<Object>,
}

impl FileBuilder {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
        }
    }

    pub fn add_th1d(&mut self, name: &str, n_bins: i32, x_min: f64, x_max: f64, raw: &[f64]) {
        self.objects.push(Object {
            class: "TH1D",
            name: name.to_string(),
            payload: th1d_payload(name, n_bins, x_min, x_max, raw),
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_th2d(
        &mut self,
        name: &str,
        nx: i32,
        x_min: f64,
        x_max: f64,
        ny: i32,
        y_min: f64,
        y_max: f64,
        interior: &[f64],
    ) {
        self.objects.push(Object {
            class: "TH2D",
            name: name.to_string(),
            payload: th2d_payload(name, nx, x_min, x_max, ny, y_min, y_max, interior),
        });
    }

    pub fn build(&self, file_name: &str) -> Vec<u8> {
        // Object records follow the TDirectory streamer; the key list comes
        // last.
        let mut seeks = Vec::with_capacity(self.objects.len());
        let mut offset = BEGIN + DIR_STREAMER_LEN;
        for obj in &self.objects {
            let key_len = key_header_len(obj.class, &obj.name);
            let n_bytes = key_len as u32 + obj.payload.len() as u32;
            seeks.push((offset, key_len, n_bytes));
            offset += n_bytes;
        }
        let seek_keys = offset;

        let mut records = Vec::new();
        for (obj, &(seek, key_len, n_bytes)) in self.objects.iter().zip(&seeks) {
            records.extend_from_slice(&key_header(
                n_bytes,
                obj.payload.len() as u32,
                key_len,
                seek,
                obj.class,
                &obj.name,
            ));
        }
        let mut list_payload = Vec::new();
        put_u32(&mut list_payload, self.objects.len() as u32);
        list_payload.extend_from_slice(&records);

        let list_key_len = key_header_len("TFile", file_name);
        let list_n_bytes = list_key_len as u32 + list_payload.len() as u32;
        let total = seek_keys + list_n_bytes;

        let mut out = Vec::with_capacity(total as usize);
        out.extend_from_slice(b"root");
        put_u32(&mut out, 63200); // fVersion
        put_u32(&mut out, BEGIN);
        put_u32(&mut out, total); // fEND
        put_u32(&mut out, 0); // fSeekFree
        put_u32(&mut out, 0); // fNbytesFree
        put_u32(&mut out, 0); // nfree
        put_u32(&mut out, 0); // fNbytesName
        out.push(4); // fUnits
        put_u32(&mut out, 0); // fCompress
        put_u32(&mut out, 0); // fSeekInfo
        put_u32(&mut out, 0); // fNbytesInfo
        out.extend_from_slice(&[0u8; 18]); // fUUID
        out.resize(BEGIN as usize, 0);

        // TDirectory streamer.
        put_u16(&mut out, 5); // version
        put_u32(&mut out, 0); // datime created
        put_u32(&mut out, 0); // datime modified
        put_u32(&mut out, list_n_bytes); // fNbytesKeys
        put_u32(&mut out, 0); // fNbytesName
        put_u32(&mut out, 0); // fSeekDir
        put_u32(&mut out, 0); // fSeekParent
        put_u32(&mut out, seek_keys);
        debug_assert_eq!(out.len() as u32, BEGIN + DIR_STREAMER_LEN);

        for (obj, &(seek, key_len, n_bytes)) in self.objects.iter().zip(&seeks) {
            debug_assert_eq!(out.len() as u32, seek);
            out.extend_from_slice(&key_header(
                n_bytes,
                obj.payload.len() as u32,
                key_len,
                seek,
                obj.class,
                &obj.name,
            ));
            out.extend_from_slice(&obj.payload);
        }

        debug_assert_eq!(out.len() as u32, seek_keys);
        out.extend_from_slice(&key_header(
            list_n_bytes,
            list_payload.len() as u32,
            list_key_len,
            seek_keys,
            "TFile",
            file_name,
        ));
        out.extend_from_slice(&list_payload);
        debug_assert_eq!(out.len() as u32, total);
        out
    }
}
