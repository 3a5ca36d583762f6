//! Optional bundling of a run's plots and galleries into one archive.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Bundle each `(directory, archive prefix)` pair into `zip_path`. The
/// archive is written to a temp file first and renamed on success.
pub fn write_bundle(zip_path: &Path, roots: &[(&Path, String)]) -> Result<()> {
    let tmp_path = zip_path.with_extension("zip.tmp");
    let file = File::create(&tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;
    let mut zip = ZipWriter::new(file);

    let result = write_entries(&mut zip, roots)
        .and_then(|_| zip.finish().map(|_| ()).with_context(|| "failed to finalize zip"));

    match result {
        Ok(()) => {
            fs::rename(&tmp_path, zip_path)
                .with_context(|| format!("failed to move zip to {}", zip_path.display()))?;
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            Err(e)
        }
    }
}

fn write_entries(zip: &mut ZipWriter<File>, roots: &[(&Path, String)]) -> Result<()> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::from_date_and_time(1980, 1, 1, 0, 0, 0).unwrap());
    for (dir, prefix) in roots {
        add_dir(zip, dir, prefix, options)
            .with_context(|| format!("failed to add {} to zip", dir.display()))?;
    }
    Ok(())
}

fn add_dir(
    zip: &mut ZipWriter<File>,
    dir: &Path,
    prefix: &str,
    options: SimpleFileOptions,
) -> Result<()> {
    zip.add_directory(format!("{}/", prefix), options)?;

    let mut entries: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("failed to read {}", dir.display()))?
        .collect::<std::io::Result<_>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let child = format!("{}/{}", prefix, entry.file_name().to_string_lossy());
        if path.is_dir() {
            add_dir(zip, &path, &child, options)?;
        } else {
            let mut file = File::open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            zip.start_file(child, options)?;
            let mut buf = [0u8; 8192];
            loop {
                let n = file.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                zip.write_all(&buf[..n])?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundles_nested_trees() {
        let dir = tempfile::tempdir().unwrap();
        let plots = dir.path().join("plots/Run5/FERS_1D");
        fs::create_dir_all(&plots).unwrap();
        fs::write(plots.join("a.png"), b"img").unwrap();
        let html = dir.path().join("html/Run5");
        fs::create_dir_all(&html).unwrap();
        fs::write(html.join("index.html"), b"<html></html>").unwrap();

        let zip_path = dir.path().join("Run5_dqm.zip");
        let plots_root = dir.path().join("plots/Run5");
        write_bundle(
            &zip_path,
            &[
                (plots_root.as_path(), "plots/Run5".to_string()),
                (html.as_path(), "html/Run5".to_string()),
            ],
        )
        .unwrap();

        assert!(zip_path.is_file());
        assert!(!zip_path.with_extension("zip.tmp").exists());
    }
}
