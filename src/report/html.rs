//! Static HTML galleries: one image-grid page per subsystem, plus a
//! top-level index for the run.

use anyhow::{Context, Result};
use std::fmt::Write as FmtWrite;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Write a gallery page listing `images` (file names inside `plots_dir`) in
/// their given order, `per_row` columns wide. Returns the page path.
pub fn write_gallery(
    images: &[String],
    plots_dir: &Path,
    html_path: &Path,
    per_row: usize,
    title: &str,
) -> Result<PathBuf> {
    let html_dir = html_path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(html_dir)
        .with_context(|| format!("failed to create {}", html_dir.display()))?;
    let prefix = rel_path(html_dir, plots_dir);

    let mut html = String::with_capacity(16 * 1024);
    writeln!(html, "<!DOCTYPE html>")?;
    writeln!(html, "<html lang=\"en\">")?;
    writeln!(html, "<head>")?;
    writeln!(html, "<meta charset=\"utf-8\"/>")?;
    writeln!(html, "<title>{}</title>", html_escape(title))?;
    writeln!(html, "<style>")?;
    writeln!(
        html,
        "body{{font-family:Arial,Helvetica,sans-serif;margin:16px;color:#222;background:#fff;}}"
    )?;
    writeln!(html, "h1{{margin:0 0 4px 0;font-size:20px;}}")?;
    writeln!(html, ".meta{{color:#555;font-size:12px;margin-bottom:14px;}}")?;
    writeln!(
        html,
        ".grid{{display:grid;grid-template-columns:repeat({},1fr);gap:10px;}}",
        per_row.max(1)
    )?;
    writeln!(
        html,
        ".cell{{background:#fafafa;border:1px solid #e5e5e5;padding:4px;}}"
    )?;
    writeln!(html, ".cell img{{width:100%;display:block;}}")?;
    writeln!(
        html,
        ".cap{{font-size:11px;color:#555;margin-top:3px;word-break:break-all;}}"
    )?;
    writeln!(html, "</style>")?;
    writeln!(html, "</head>")?;
    writeln!(html, "<body>")?;
    writeln!(html, "<h1>{}</h1>", html_escape(title))?;
    writeln!(html, "<div class=\"meta\">{} plots</div>", images.len())?;
    writeln!(html, "<div class=\"grid\">")?;
    for image in images {
        let src = format!("{}/{}", prefix.display(), image);
        writeln!(
            html,
            "<div class=\"cell\"><a href=\"{src}\"><img src=\"{src}\" loading=\"lazy\"/></a><div class=\"cap\">{}</div></div>",
            html_escape(image)
        )?;
    }
    writeln!(html, "</div>")?;
    writeln!(html, "</body></html>")?;

    let mut w = BufWriter::new(
        File::create(html_path)
            .with_context(|| format!("failed to create {}", html_path.display()))?,
    );
    w.write_all(html.as_bytes())?;
    Ok(html_path.to_path_buf())
}

/// Write the top-level page for a run, linking every subsystem gallery.
pub fn write_run_index(pages: &[(String, PathBuf)], html_dir: &Path, run: u32) -> Result<PathBuf> {
    fs::create_dir_all(html_dir)
        .with_context(|| format!("failed to create {}", html_dir.display()))?;
    let index_path = html_dir.join("index.html");

    let mut html = String::with_capacity(4 * 1024);
    writeln!(html, "<!DOCTYPE html>")?;
    writeln!(html, "<html lang=\"en\">")?;
    writeln!(html, "<head>")?;
    writeln!(html, "<meta charset=\"utf-8\"/>")?;
    writeln!(html, "<title>Run {run} DQM</title>")?;
    writeln!(html, "<style>")?;
    writeln!(
        html,
        "body{{font-family:Arial,Helvetica,sans-serif;margin:16px;color:#222;background:#fff;}}"
    )?;
    writeln!(html, "h1{{margin:0 0 10px 0;font-size:20px;}}")?;
    writeln!(html, "li{{margin:4px 0;}}")?;
    writeln!(html, "a{{color:#003366;}}")?;
    writeln!(html, "</style>")?;
    writeln!(html, "</head>")?;
    writeln!(html, "<body>")?;
    writeln!(html, "<h1>Run {run} DQM</h1>")?;
    writeln!(html, "<ul>")?;
    for (label, page) in pages {
        let href = rel_path(html_dir, page);
        writeln!(
            html,
            "<li><a href=\"{}\">{}</a></li>",
            href.display(),
            html_escape(label)
        )?;
    }
    writeln!(html, "</ul>")?;
    writeln!(html, "</body></html>")?;

    let mut w = BufWriter::new(
        File::create(&index_path)
            .with_context(|| format!("failed to create {}", index_path.display()))?,
    );
    w.write_all(html.as_bytes())?;
    Ok(index_path)
}

/// Relative path from `from_dir` to `to`, by stripping the longest common
/// prefix and climbing the remainder.
fn rel_path(from_dir: &Path, to: &Path) -> PathBuf {
    let from: Vec<_> = from_dir.components().collect();
    let to_parts: Vec<_> = to.components().collect();

    let mut common = 0;
    while common < from.len() && common < to_parts.len() && from[common] == to_parts[common] {
        common += 1;
    }

    let mut out = PathBuf::new();
    for _ in common..from.len() {
        out.push("..");
    }
    for part in &to_parts[common..] {
        out.push(part);
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
