//! Image file output: assembled SVG is written as-is, rasterized to PNG, or
//! converted to PDF.

use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::Path;

const PNG_DPI: f32 = 144.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Svg,
    Pdf,
}

impl ImageFormat {
    pub fn ext(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
            ImageFormat::Pdf => "pdf",
        }
    }
}

/// Write an SVG document to `path` in the requested format.
pub fn write(svg: &str, path: &Path, format: ImageFormat) -> Result<()> {
    match format {
        ImageFormat::Svg => fs::write(path, svg)
            .with_context(|| format!("failed to write {}", path.display()))?,
        ImageFormat::Png => {
            let png = rasterize(svg)?;
            fs::write(path, png)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        ImageFormat::Pdf => {
            let pdf = to_pdf(svg)?;
            fs::write(path, pdf)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
    }
    Ok(())
}

fn rasterize(svg: &str) -> Result<Vec<u8>> {
    let mut opt = usvg::Options::default();
    opt.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &opt)
        .map_err(|e| anyhow!("SVG parse failed: {e}"))?;

    let scale = PNG_DPI / 72.0;
    let size = tree.size();
    let w = (size.width() * scale).round() as u32;
    let h = (size.height() * scale).round() as u32;

    let mut pixmap =
        tiny_skia::Pixmap::new(w, h).ok_or_else(|| anyhow!("failed to allocate pixmap"))?;
    pixmap.fill(tiny_skia::Color::WHITE);
    resvg::render(
        &tree,
        tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );

    pixmap
        .encode_png()
        .map_err(|e| anyhow!("PNG encoding failed: {e}"))
}

fn to_pdf(svg: &str) -> Result<Vec<u8>> {
    use svg2pdf::usvg;
    use svg2pdf::{ConversionOptions, PageOptions};

    let opt = usvg::Options::default();
    let tree = usvg::Tree::from_str(svg, &opt)
        .map_err(|e| anyhow!("SVG parse failed: {e}"))?;
    svg2pdf::to_pdf(&tree, ConversionOptions::default(), PageOptions::default())
        .map_err(|e| anyhow!("PDF conversion failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_SVG: &str = "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"40\" height=\"30\" viewBox=\"0 0 40 30\"><rect x=\"5\" y=\"5\" width=\"30\" height=\"20\" fill=\"#cc0000\"/></svg>";

    #[test]
    fn writes_svg_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plot.svg");
        write(MINIMAL_SVG, &path, ImageFormat::Svg).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), MINIMAL_SVG);
    }

    #[test]
    fn rasterizes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plot.png");
        write(MINIMAL_SVG, &path, ImageFormat::Png).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
