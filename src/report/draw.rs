//! The drawing primitive: assemble one plot as SVG and save it in the
//! configured image format.
//!
//! Three plot shapes cover every DQM view: 1-D step overlays, 2-D heat maps
//! with a z colorbar, and the tower-map grids used to visualize the channel
//! mapping itself.

use crate::report::color::{self, Color};
use crate::report::image::{self, ImageFormat};
use crate::root::histogram::{Hist1, Hist2};
use anyhow::Result;
use std::fmt::Write as FmtWrite;
use std::path::Path;

const CANVAS_W: f64 = 600.0;
const CANVAS_H: f64 = 450.0;
const MARGIN_LEFT: f64 = 64.0;
const MARGIN_TOP: f64 = 36.0;
const MARGIN_BOTTOM: f64 = 48.0;
const MARGIN_RIGHT: f64 = 28.0;
const COLORBAR_GUTTER: f64 = 62.0;
const FONT: &str = "Helvetica, Arial, sans-serif";

#[derive(Clone, Copy)]
pub struct AxisSpec<'a> {
    pub min: f64,
    pub max: f64,
    pub label: &'a str,
    pub log: bool,
}

impl<'a> AxisSpec<'a> {
    pub fn linear(min: f64, max: f64, label: &'a str) -> Self {
        Self {
            min,
            max,
            label,
            log: false,
        }
    }

    pub fn log(min: f64, max: f64, label: &'a str) -> Self {
        Self {
            min,
            max,
            label,
            log: true,
        }
    }

    /// Fractional position of `v` along the axis, clamped to `[0, 1]`.
    fn frac(&self, v: f64) -> f64 {
        let t = if self.log {
            let lo = self.min.log10();
            let hi = self.max.log10();
            (v.max(self.min).log10() - lo) / (hi - lo)
        } else {
            (v - self.min) / (self.max - self.min)
        };
        t.clamp(0.0, 1.0)
    }

    fn ticks(&self) -> Vec<f64> {
        if self.log {
            let lo = self.min.log10().ceil() as i32;
            let hi = self.max.log10().floor() as i32;
            (lo..=hi).map(|k| 10f64.powi(k)).collect()
        } else {
            (0..=4)
                .map(|i| self.min + (self.max - self.min) * i as f64 / 4.0)
                .collect()
        }
    }
}

struct Frame {
    left: f64,
    top: f64,
    w: f64,
    h: f64,
}

impl Frame {
    fn new(right_gutter: f64) -> Self {
        Self {
            left: MARGIN_LEFT,
            top: MARGIN_TOP,
            w: CANVAS_W - MARGIN_LEFT - MARGIN_RIGHT - right_gutter,
            h: CANVAS_H - MARGIN_TOP - MARGIN_BOTTOM,
        }
    }

    fn x_px(&self, axis: &AxisSpec, v: f64) -> f64 {
        self.left + axis.frac(v) * self.w
    }

    fn y_px(&self, axis: &AxisSpec, v: f64) -> f64 {
        self.top + (1.0 - axis.frac(v)) * self.h
    }
}

pub struct OverlaySpec<'a> {
    pub x: AxisSpec<'a>,
    pub y: AxisSpec<'a>,
    pub legend: &'a [&'a str],
    pub colors: &'a [Color],
    /// Fold under/overflow into the edge bins before drawing.
    pub fold_flows: bool,
    pub annotation: &'a [String],
    pub run: u32,
}

pub struct HeatmapSpec<'a> {
    pub x: AxisSpec<'a>,
    pub y: AxisSpec<'a>,
    pub z_min: f64,
    pub z_max: f64,
    pub log_z: bool,
    pub annotation: &'a [String],
    /// Short tag drawn under the annotation block, e.g. the variable name.
    pub tag: Option<&'a str>,
    pub run: u32,
}

/// One labelled cell of a tower-map plot.
pub struct TowerCell {
    pub ix: i32,
    pub iy: i32,
    pub lines: Vec<String>,
}

/// Draw 1-D histograms as step outlines over a shared frame. Returns the
/// image file name.
pub fn overlay(
    hists: &[&Hist1],
    spec: &OverlaySpec,
    out_dir: &Path,
    name: &str,
    format: ImageFormat,
) -> Result<String> {
    let mut svg = String::with_capacity(16 * 1024);
    let frame = Frame::new(0.0);
    begin_svg(&mut svg)?;
    draw_frame(&mut svg, &frame)?;
    draw_x_axis(&mut svg, &frame, &spec.x)?;
    draw_y_axis(&mut svg, &frame, &spec.y)?;
    draw_header(&mut svg, &frame, spec.run)?;

    for (i, hist) in hists.iter().enumerate() {
        let color = spec
            .colors
            .get(i)
            .copied()
            .unwrap_or(Color::rgb(0x22, 0x22, 0x22));
        let values = if spec.fold_flows {
            hist.folded_content()
        } else {
            hist.content.clone()
        };
        draw_steps(&mut svg, &frame, &spec.x, &spec.y, &hist.edges, &values, color)?;
    }

    if !spec.legend.is_empty() {
        draw_legend(&mut svg, &frame, spec.legend, spec.colors)?;
    }
    draw_annotation(&mut svg, &frame, spec.annotation, None)?;
    end_svg(&mut svg)?;
    save(&svg, out_dir, name, format)
}

/// Draw a 2-D histogram as a colored cell grid with a z colorbar. Returns
/// the image file name.
pub fn heatmap(
    hist: &Hist2,
    spec: &HeatmapSpec,
    out_dir: &Path,
    name: &str,
    format: ImageFormat,
) -> Result<String> {
    let mut svg = String::with_capacity(64 * 1024);
    let frame = Frame::new(COLORBAR_GUTTER);
    begin_svg(&mut svg)?;

    let bin_w = (hist.x_max - hist.x_min) / hist.nx as f64;
    let bin_h = (hist.y_max - hist.y_min) / hist.ny as f64;
    for iy in 0..hist.ny {
        for ix in 0..hist.nx {
            let v = hist.value(ix, iy);
            if v <= 0.0 {
                continue;
            }
            let x0 = frame.x_px(&spec.x, hist.x_min + ix as f64 * bin_w);
            let x1 = frame.x_px(&spec.x, hist.x_min + (ix + 1) as f64 * bin_w);
            let y1 = frame.y_px(&spec.y, hist.y_min + iy as f64 * bin_h);
            let y0 = frame.y_px(&spec.y, hist.y_min + (iy + 1) as f64 * bin_h);
            if x1 - x0 < 0.01 || y1 - y0 < 0.01 {
                continue;
            }
            let fill = color::heat(z_frac(v, spec));
            writeln!(
                svg,
                "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\"/>",
                x0,
                y0,
                x1 - x0,
                y1 - y0,
                fill.to_svg()
            )?;
        }
    }

    draw_frame(&mut svg, &frame)?;
    draw_x_axis(&mut svg, &frame, &spec.x)?;
    draw_y_axis(&mut svg, &frame, &spec.y)?;
    draw_colorbar(&mut svg, &frame, spec)?;
    draw_header(&mut svg, &frame, spec.run)?;
    draw_annotation(&mut svg, &frame, spec.annotation, spec.tag)?;
    end_svg(&mut svg)?;
    save(&svg, out_dir, name, format)
}

/// Draw the channel mapping as a labelled tower grid. Returns the image
/// file name.
pub fn tower_map(
    cells: &[TowerCell],
    title: &str,
    run: u32,
    out_dir: &Path,
    name: &str,
    format: ImageFormat,
) -> Result<String> {
    let min_ix = cells.iter().map(|c| c.ix).min().unwrap_or(0);
    let max_ix = cells.iter().map(|c| c.ix).max().unwrap_or(0);
    let min_iy = cells.iter().map(|c| c.iy).min().unwrap_or(0);
    let max_iy = cells.iter().map(|c| c.iy).max().unwrap_or(0);
    let cols = (max_ix - min_ix + 1) as f64;
    let rows = (max_iy - min_iy + 1) as f64;

    let cell = 56.0;
    let left = 48.0;
    let top = 42.0;
    let w = left + cols * cell + 24.0;
    let h = top + rows * cell + 36.0;

    let mut svg = String::with_capacity(32 * 1024);
    writeln!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">"
    )?;
    writeln!(
        svg,
        "<rect x=\"0\" y=\"0\" width=\"{w}\" height=\"{h}\" fill=\"#ffffff\"/>"
    )?;
    writeln!(
        svg,
        "<text x=\"{left}\" y=\"24\" font-family=\"{FONT}\" font-size=\"14\" font-weight=\"bold\" fill=\"#222\">{}</text>",
        xml_escape(title)
    )?;
    writeln!(
        svg,
        "<text x=\"{:.1}\" y=\"24\" font-family=\"{FONT}\" font-size=\"12\" text-anchor=\"end\" fill=\"#222\">Run {run}</text>",
        w - 12.0
    )?;

    for c in cells {
        let x = left + (c.ix - min_ix) as f64 * cell;
        let y = top + (max_iy - c.iy) as f64 * cell;
        writeln!(
            svg,
            "<rect x=\"{x:.1}\" y=\"{y:.1}\" width=\"{cell}\" height=\"{cell}\" fill=\"#f4f6f8\" stroke=\"#999\"/>"
        )?;
        let n = c.lines.len() as f64;
        for (i, line) in c.lines.iter().enumerate() {
            let ty = y + cell / 2.0 + (i as f64 - (n - 1.0) / 2.0) * 11.0 + 3.0;
            writeln!(
                svg,
                "<text x=\"{:.1}\" y=\"{ty:.1}\" font-family=\"{FONT}\" font-size=\"9\" text-anchor=\"middle\" fill=\"#333\">{}</text>",
                x + cell / 2.0,
                xml_escape(line)
            )?;
        }
    }

    // Coordinate labels along the edges.
    for ix in min_ix..=max_ix {
        let x = left + (ix - min_ix) as f64 * cell + cell / 2.0;
        writeln!(
            svg,
            "<text x=\"{x:.1}\" y=\"{:.1}\" font-family=\"{FONT}\" font-size=\"10\" text-anchor=\"middle\" fill=\"#555\">{ix}</text>",
            top + rows * cell + 16.0
        )?;
    }
    for iy in min_iy..=max_iy {
        let y = top + (max_iy - iy) as f64 * cell + cell / 2.0 + 3.0;
        writeln!(
            svg,
            "<text x=\"{:.1}\" y=\"{y:.1}\" font-family=\"{FONT}\" font-size=\"10\" text-anchor=\"end\" fill=\"#555\">{iy}</text>",
            left - 8.0
        )?;
    }

    writeln!(svg, "</svg>")?;
    save(&svg, out_dir, name, format)
}

fn save(svg: &str, out_dir: &Path, name: &str, format: ImageFormat) -> Result<String> {
    let file_name = format!("{}.{}", name, format.ext());
    image::write(svg, &out_dir.join(&file_name), format)?;
    Ok(file_name)
}

fn z_frac(v: f64, spec: &HeatmapSpec) -> f64 {
    let t = if spec.log_z {
        let lo = spec.z_min.log10();
        let hi = spec.z_max.log10();
        (v.max(spec.z_min).log10() - lo) / (hi - lo)
    } else {
        (v - spec.z_min) / (spec.z_max - spec.z_min)
    };
    t.clamp(0.0, 1.0)
}

fn begin_svg(out: &mut String) -> Result<()> {
    writeln!(
        out,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{CANVAS_W}\" height=\"{CANVAS_H}\" viewBox=\"0 0 {CANVAS_W} {CANVAS_H}\">"
    )?;
    writeln!(
        out,
        "<rect x=\"0\" y=\"0\" width=\"{CANVAS_W}\" height=\"{CANVAS_H}\" fill=\"#ffffff\"/>"
    )?;
    Ok(())
}

fn end_svg(out: &mut String) -> Result<()> {
    writeln!(out, "</svg>")?;
    Ok(())
}

fn draw_frame(out: &mut String, frame: &Frame) -> Result<()> {
    writeln!(
        out,
        "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"none\" stroke=\"#444\"/>",
        frame.left, frame.top, frame.w, frame.h
    )?;
    Ok(())
}

fn draw_header(out: &mut String, frame: &Frame, run: u32) -> Result<()> {
    writeln!(
        out,
        "<text x=\"{:.1}\" y=\"{:.1}\" font-family=\"{FONT}\" font-size=\"13\" font-style=\"italic\" fill=\"#222\">Test Beam DQM</text>",
        frame.left,
        frame.top - 8.0
    )?;
    writeln!(
        out,
        "<text x=\"{:.1}\" y=\"{:.1}\" font-family=\"{FONT}\" font-size=\"13\" text-anchor=\"end\" fill=\"#222\">Run {run}</text>",
        frame.left + frame.w,
        frame.top - 8.0
    )?;
    Ok(())
}

fn draw_x_axis(out: &mut String, frame: &Frame, axis: &AxisSpec) -> Result<()> {
    let y0 = frame.top + frame.h;
    for v in axis.ticks() {
        let x = frame.x_px(axis, v);
        writeln!(
            out,
            "<line x1=\"{x:.1}\" y1=\"{y0:.1}\" x2=\"{x:.1}\" y2=\"{:.1}\" stroke=\"#444\"/>",
            y0 + 5.0
        )?;
        writeln!(
            out,
            "<text x=\"{x:.1}\" y=\"{:.1}\" font-family=\"{FONT}\" font-size=\"10\" text-anchor=\"middle\" fill=\"#333\">{}</text>",
            y0 + 17.0,
            fmt_tick(v)
        )?;
    }
    writeln!(
        out,
        "<text x=\"{:.1}\" y=\"{:.1}\" font-family=\"{FONT}\" font-size=\"12\" text-anchor=\"middle\" fill=\"#222\">{}</text>",
        frame.left + frame.w / 2.0,
        CANVAS_H - 12.0,
        xml_escape(axis.label)
    )?;
    Ok(())
}

fn draw_y_axis(out: &mut String, frame: &Frame, axis: &AxisSpec) -> Result<()> {
    for v in axis.ticks() {
        let y = frame.y_px(axis, v);
        writeln!(
            out,
            "<line x1=\"{:.1}\" y1=\"{y:.1}\" x2=\"{:.1}\" y2=\"{y:.1}\" stroke=\"#444\"/>",
            frame.left - 5.0,
            frame.left
        )?;
        writeln!(
            out,
            "<text x=\"{:.1}\" y=\"{:.1}\" font-family=\"{FONT}\" font-size=\"10\" text-anchor=\"end\" fill=\"#333\">{}</text>",
            frame.left - 8.0,
            y + 3.0,
            fmt_tick(v)
        )?;
    }
    writeln!(
        out,
        "<text x=\"16\" y=\"{:.1}\" font-family=\"{FONT}\" font-size=\"12\" text-anchor=\"middle\" fill=\"#222\" transform=\"rotate(-90 16 {:.1})\">{}</text>",
        frame.top + frame.h / 2.0,
        frame.top + frame.h / 2.0,
        xml_escape(axis.label)
    )?;
    Ok(())
}

fn draw_steps(
    out: &mut String,
    frame: &Frame,
    x: &AxisSpec,
    y: &AxisSpec,
    edges: &[f64],
    values: &[f64],
    color: Color,
) -> Result<()> {
    let mut d = String::new();
    let mut started = false;
    for (i, &v) in values.iter().enumerate() {
        let lo = edges[i];
        let hi = edges[i + 1];
        if hi < x.min || lo > x.max {
            continue;
        }
        let x0 = frame.x_px(x, lo.max(x.min));
        let x1 = frame.x_px(x, hi.min(x.max));
        let yv = frame.y_px(y, v);
        if !started {
            write!(d, "M{x0:.1} {yv:.1}")?;
            started = true;
        } else {
            write!(d, " L{x0:.1} {yv:.1}")?;
        }
        write!(d, " L{x1:.1} {yv:.1}")?;
    }
    if started {
        writeln!(
            out,
            "<path d=\"{d}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.4\"/>",
            color.to_svg()
        )?;
    }
    Ok(())
}

fn draw_legend(out: &mut String, frame: &Frame, labels: &[&str], colors: &[Color]) -> Result<()> {
    let x = frame.left + frame.w - 96.0;
    let mut y = frame.top + 14.0;
    for (i, label) in labels.iter().enumerate() {
        if label.is_empty() {
            continue;
        }
        let color = colors
            .get(i)
            .copied()
            .unwrap_or(Color::rgb(0x22, 0x22, 0x22));
        writeln!(
            out,
            "<line x1=\"{x:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"{}\" stroke-width=\"2\"/>",
            y - 4.0,
            x + 22.0,
            y - 4.0,
            color.to_svg()
        )?;
        writeln!(
            out,
            "<text x=\"{:.1}\" y=\"{y:.1}\" font-family=\"{FONT}\" font-size=\"11\" fill=\"#222\">{}</text>",
            x + 28.0,
            xml_escape(label)
        )?;
        y += 15.0;
    }
    Ok(())
}

fn draw_annotation(
    out: &mut String,
    frame: &Frame,
    lines: &[String],
    tag: Option<&str>,
) -> Result<()> {
    let x = frame.left + 10.0;
    let mut y = frame.top + 16.0;
    for line in lines {
        writeln!(
            out,
            "<text x=\"{x:.1}\" y=\"{y:.1}\" font-family=\"{FONT}\" font-size=\"11\" fill=\"#222\">{}</text>",
            xml_escape(line)
        )?;
        y += 14.0;
    }
    if let Some(tag) = tag {
        writeln!(
            out,
            "<text x=\"{x:.1}\" y=\"{y:.1}\" font-family=\"{FONT}\" font-size=\"11\" font-weight=\"bold\" fill=\"#222\">{}</text>",
            xml_escape(tag)
        )?;
    }
    Ok(())
}

fn draw_colorbar(out: &mut String, frame: &Frame, spec: &HeatmapSpec) -> Result<()> {
    let x = frame.left + frame.w + 10.0;
    let bar_w = 16.0;
    let steps = 48;
    let step_h = frame.h / steps as f64;
    for i in 0..steps {
        let t = (i as f64 + 0.5) / steps as f64;
        let y = frame.top + frame.h - (i + 1) as f64 * step_h;
        writeln!(
            out,
            "<rect x=\"{x:.1}\" y=\"{y:.2}\" width=\"{bar_w}\" height=\"{:.2}\" fill=\"{}\"/>",
            step_h + 0.3,
            color::heat(t).to_svg()
        )?;
    }
    writeln!(
        out,
        "<rect x=\"{x:.1}\" y=\"{:.1}\" width=\"{bar_w}\" height=\"{:.1}\" fill=\"none\" stroke=\"#444\"/>",
        frame.top, frame.h
    )?;
    writeln!(
        out,
        "<text x=\"{:.1}\" y=\"{:.1}\" font-family=\"{FONT}\" font-size=\"10\" fill=\"#333\">{}</text>",
        x + bar_w + 4.0,
        frame.top + 4.0,
        fmt_tick(spec.z_max)
    )?;
    writeln!(
        out,
        "<text x=\"{:.1}\" y=\"{:.1}\" font-family=\"{FONT}\" font-size=\"10\" fill=\"#333\">{}</text>",
        x + bar_w + 4.0,
        frame.top + frame.h,
        fmt_tick(spec.z_min)
    )?;
    Ok(())
}

fn fmt_tick(v: f64) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    let a = v.abs();
    if a >= 1e4 || a < 1e-3 {
        format!("{:e}", v)
    } else if (v - v.round()).abs() < 1e-6 {
        format!("{:.0}", v)
    } else {
        format!("{:.2}", v)
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
