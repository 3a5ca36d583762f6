//! The per-subsystem plot loops and the fixed-order driver.
//!
//! Every loop follows the same contract: iterate its mapping domain, build
//! histogram lookup keys, fetch from that subsystem's input file, warn and
//! skip when a histogram is missing, draw with a fixed style, and emit one
//! gallery page listing exactly the images that were produced, in iteration
//! order. A missing input file or any draw/IO failure aborts the run.

use crate::core::mapping::{
    self, ChannelKind, DrsBoard, FersBoard, coord_label,
};
use crate::report::color;
use crate::report::draw::{self, AxisSpec, HeatmapSpec, OverlaySpec, TowerCell};
use crate::report::html;
use crate::report::image::ImageFormat;
use crate::root::error::RootError;
use crate::root::{Hist1, Hist2, RootFile};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub struct RunConfig {
    pub run: u32,
    /// Per-run input directory holding the subsystem ROOT files.
    pub root_dir: PathBuf,
    /// Per-run image output directory.
    pub plots_dir: PathBuf,
    /// Per-run gallery output directory.
    pub html_dir: PathBuf,
    pub subtract_median: bool,
    pub format: ImageFormat,
}

impl RunConfig {
    fn input(&self, name: &str) -> PathBuf {
        self.root_dir.join(name)
    }

    fn plots(&self, subsystem: &str) -> Result<PathBuf> {
        let dir = self.plots_dir.join(subsystem);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        Ok(dir)
    }

    fn gallery_path(&self, subsystem: &str) -> PathBuf {
        self.html_dir.join(subsystem).join("index.html")
    }
}

pub struct RunOutput {
    /// `(label, gallery page)` per subsystem, in generation order.
    pub pages: Vec<(String, PathBuf)>,
    /// Top-level page linking every gallery.
    pub index: PathBuf,
}

pub fn run(cfg: &RunConfig) -> Result<RunOutput> {
    let stats = stats_enabled();

    let t_map = Instant::now();
    let fers_boards = mapping::build_fers_boards(cfg.run);
    let drs_boards = mapping::build_drs_boards(cfg.run);
    let time_ref = mapping::time_reference_channels(cfg.run);
    let trigger = mapping::hodo_trigger_channels(cfg.run);
    let hodo_pos: Vec<String> = mapping::hodo_pos_channels(cfg.run)
        .into_iter()
        .flat_map(|(_, channels)| channels)
        .collect();
    log_stage(stats, "engine.mapping", t_map);

    let mut pages: Vec<(String, PathBuf)> = Vec::new();
    let mut record = |label: &str, t: Instant, stage: &str, page: PathBuf| {
        pages.push((label.to_string(), page));
        log_stage(stats, stage, t);
    };

    let t = Instant::now();
    record("fers mapping", t, "engine.fers_map", fers_map(cfg, &fers_boards)?);
    let t = Instant::now();
    record("drs mapping", t, "engine.drs_map", drs_map(cfg, &drs_boards)?);
    let t = Instant::now();
    record("fers 1D", t, "engine.fers_1d", fers_1d(cfg, &fers_boards)?);
    let t = Instant::now();
    record("fers 2D", t, "engine.fers_2d", fers_2d(cfg, &fers_boards)?);
    let t = Instant::now();
    record(
        "fers vs event",
        t,
        "engine.fers_vs_event",
        fers_vs_event(cfg, &fers_boards)?,
    );
    let t = Instant::now();
    record("drs 1D", t, "engine.drs_1d", drs_1d(cfg, &drs_boards)?);
    let t = Instant::now();
    record("drs 2D", t, "engine.drs_vs_ts", drs_vs_ts(cfg, &drs_boards)?);
    let t = Instant::now();
    record(
        "drs vs event",
        t,
        "engine.drs_vs_event",
        drs_vs_event(cfg, &drs_boards)?,
    );
    let t = Instant::now();
    record(
        "time reference",
        t,
        "engine.time_reference",
        channel_view(cfg, "time_reference_channels.root", "TimeReference", &time_ref)?,
    );
    let t = Instant::now();
    record(
        "hodo trigger",
        t,
        "engine.hodo_trigger",
        channel_view(cfg, "hodo_trigger_channels.root", "HodoTrigger", &trigger)?,
    );
    let t = Instant::now();
    record(
        "hodo pos",
        t,
        "engine.hodo_pos",
        channel_view(cfg, "hodo_pos_channels.root", "HodoPos", &hodo_pos)?,
    );
    let index = html::write_run_index(&pages, &cfg.html_dir, cfg.run)?;
    Ok(RunOutput { pages, index })
}

fn open_input(path: &Path) -> Result<RootFile> {
    RootFile::open(path).with_context(|| format!("failed to open {}", path.display()))
}

/// A missing key is the one per-entry condition the loops tolerate; every
/// other reader error propagates.
fn lookup1(file: &RootFile, name: &str) -> Result<Option<Hist1>> {
    match file.hist1(name) {
        Ok(h) => Ok(Some(h)),
        Err(RootError::KeyNotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn lookup2(file: &RootFile, name: &str) -> Result<Option<Hist2>> {
    match file.hist2(name) {
        Ok(h) => Ok(Some(h)),
        Err(RootError::KeyNotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Gallery suffix and display window for the baseline-subtraction toggle on
/// the channel-list views.
fn channel_window(subtract_median: bool) -> (&'static str, f64, f64) {
    if subtract_median {
        ("_subtractMedian", -1500.0, 500.0)
    } else {
        ("", 500.0, 2500.0)
    }
}

fn fers_map(cfg: &RunConfig, boards: &[FersBoard]) -> Result<PathBuf> {
    let out_dir = cfg.plots("FERS_Boards")?;
    let cells: Vec<TowerCell> = boards
        .iter()
        .flat_map(|board| {
            board.towers().iter().map(|&tower| {
                let cer = board.channel(tower, ChannelKind::Cer);
                let sci = board.channel(tower, ChannelKind::Sci);
                TowerCell {
                    ix: tower.ix,
                    iy: tower.iy,
                    lines: vec![
                        format!("B{}", board.board_no),
                        format!("C{} S{}", cer.channel, sci.channel),
                    ],
                }
            })
        })
        .collect();
    let image = draw::tower_map(
        &cells,
        "FERS boards",
        cfg.run,
        &out_dir,
        "FERS_mapping",
        cfg.format,
    )?;
    html::write_gallery(
        &[image],
        &out_dir,
        &cfg.gallery_path("FERS_Boards"),
        1,
        &format!("Run {} FERS boards", cfg.run),
    )
}

fn drs_map(cfg: &RunConfig, boards: &[DrsBoard]) -> Result<PathBuf> {
    let out_dir = cfg.plots("DRS_Boards")?;
    let cells: Vec<TowerCell> = boards
        .iter()
        .flat_map(|board| {
            board.towers().iter().map(|&tower| {
                let cer = board.channel(tower, ChannelKind::Cer);
                let sci = board.channel(tower, ChannelKind::Sci);
                TowerCell {
                    ix: tower.ix,
                    iy: tower.iy,
                    lines: vec![
                        format!("B{}", board.board_no),
                        format!("C {}/{}", cer.group, cer.channel),
                        format!("S {}/{}", sci.group, sci.channel),
                    ],
                }
            })
        })
        .collect();
    let image = draw::tower_map(
        &cells,
        "DRS boards",
        cfg.run,
        &out_dir,
        "DRS_mapping",
        cfg.format,
    )?;
    html::write_gallery(
        &[image],
        &out_dir,
        &cfg.gallery_path("DRS_Boards"),
        1,
        &format!("Run {} DRS boards", cfg.run),
    )
}

fn fers_1d(cfg: &RunConfig, boards: &[FersBoard]) -> Result<PathBuf> {
    let infile = cfg.input("fers_all_channels_1D.root");
    let file = open_input(&infile)?;
    let out_dir = cfg.plots("FERS_1D")?;

    let mut plots = Vec::new();
    for board in boards {
        for &tower in board.towers() {
            let sx = coord_label(tower.ix);
            let sy = coord_label(tower.iy);
            let name_c = format!("hist_FERS_Board{}_Cer_{}_{}", board.board_no, sx, sy);
            let name_s = format!("hist_FERS_Board{}_Sci_{}_{}", board.board_no, sx, sy);
            let (Some(hist_c), Some(hist_s)) = (lookup1(&file, &name_c)?, lookup1(&file, &name_s)?)
            else {
                eprintln!(
                    "Warning: histograms {} or {} not found in {}",
                    name_c,
                    name_s,
                    infile.display()
                );
                continue;
            };

            let cer = board.channel(tower, ChannelKind::Cer);
            let sci = board.channel(tower, ChannelKind::Sci);
            let annotation = vec![
                format!("Board: {}", board.board_no),
                format!("Tower X: {}", tower.ix),
                format!("Tower Y: {}", tower.iy),
                format!("Cer Channel: {}", cer.channel),
                format!("Sci Channel: {}", sci.channel),
            ];
            let spec = OverlaySpec {
                x: AxisSpec::linear(0.0, 1000.0, "Energy HG"),
                y: AxisSpec::log(1.0, 1e5, "Counts"),
                legend: &["Cer", "Sci"],
                colors: &[color::CER, color::SCI],
                fold_flows: true,
                annotation: &annotation,
                run: cfg.run,
            };
            let out_name = format!(
                "Energy_Board{}_iTowerX{}_iTowerY{}",
                board.board_no, sx, sy
            );
            plots.push(draw::overlay(
                &[&hist_c, &hist_s],
                &spec,
                &out_dir,
                &out_name,
                cfg.format,
            )?);
        }
    }
    html::write_gallery(
        &plots,
        &out_dir,
        &cfg.gallery_path("FERS_1D"),
        3,
        &format!("Run {} FERS 1D", cfg.run),
    )
}

// High-gain vs low-gain response per channel.
fn fers_2d(cfg: &RunConfig, boards: &[FersBoard]) -> Result<PathBuf> {
    let infile = cfg.input("fers_all_channels_2D.root");
    let file = open_input(&infile)?;
    let out_dir = cfg.plots("FERS_2D")?;

    let mut plots = Vec::new();
    for board in boards {
        for &tower in board.towers() {
            let sx = coord_label(tower.ix);
            let sy = coord_label(tower.iy);
            for kind in ChannelKind::BOTH {
                let var = kind.label();
                let hist_name = format!(
                    "hist_FERS_Board{}_{}_{}_{}_hg_vs_lg",
                    board.board_no, var, sx, sy
                );
                let Some(hist) = lookup2(&file, &hist_name)? else {
                    eprintln!(
                        "Warning: histogram {} not found in {}",
                        hist_name,
                        infile.display()
                    );
                    continue;
                };

                let chan = board.channel(tower, kind);
                let annotation = vec![
                    format!("Board: {}", board.board_no),
                    format!("Tower X: {}", tower.ix),
                    format!("Tower Y: {}", tower.iy),
                    format!("{} Channel: {}", var, chan.channel),
                ];
                let spec = HeatmapSpec {
                    x: AxisSpec::linear(0.0, 9000.0, "HG"),
                    y: AxisSpec::linear(0.0, 1500.0, "LG"),
                    z_min: 1.0,
                    z_max: 1e4,
                    log_z: true,
                    annotation: &annotation,
                    tag: None,
                    run: cfg.run,
                };
                let out_name = format!(
                    "FERS_Board{}_{}_{}_{}_hg_vs_lg",
                    board.board_no, var, sx, sy
                );
                plots.push(draw::heatmap(&hist, &spec, &out_dir, &out_name, cfg.format)?);
            }
        }
    }
    html::write_gallery(
        &plots,
        &out_dir,
        &cfg.gallery_path("FERS_2D"),
        4,
        &format!("Run {} FERS 2D", cfg.run),
    )
}

// Channel output tracked against event number.
fn fers_vs_event(cfg: &RunConfig, boards: &[FersBoard]) -> Result<PathBuf> {
    let infile = cfg.input("fers_all_channels_2D_vs_event.root");
    let file = open_input(&infile)?;
    let out_dir = cfg.plots("FERS_vs_Event")?;

    let mut plots = Vec::new();
    for board in boards {
        for &tower in board.towers() {
            let sx = coord_label(tower.ix);
            let sy = coord_label(tower.iy);
            for kind in ChannelKind::BOTH {
                let var = kind.label();
                let hist_name = format!(
                    "hist_FERS_Board{}_{}_vs_Event_{}_{}",
                    board.board_no, var, sx, sy
                );
                let Some(hist) = lookup2(&file, &hist_name)? else {
                    eprintln!(
                        "Warning: histogram {} not found in {}",
                        hist_name,
                        infile.display()
                    );
                    continue;
                };

                let chan = board.channel(tower, kind);
                let annotation = vec![
                    format!("Board: {}", board.board_no),
                    format!("Tower X: {}", tower.ix),
                    format!("Tower Y: {}", tower.iy),
                    format!("{} Channel: {}", var, chan.channel),
                ];
                let y_label = format!("{} Energy HG", var);
                let spec = HeatmapSpec {
                    x: AxisSpec::linear(0.0, hist.x_max, "Event"),
                    y: AxisSpec::log(1.0, 1e5, &y_label),
                    z_min: 1.0,
                    z_max: 1e4,
                    log_z: true,
                    annotation: &annotation,
                    tag: None,
                    run: cfg.run,
                };
                let out_name = format!(
                    "FERS_Board{}_{}_{}_{}_vs_Event",
                    board.board_no, var, sx, sy
                );
                plots.push(draw::heatmap(&hist, &spec, &out_dir, &out_name, cfg.format)?);
            }
        }
    }
    html::write_gallery(
        &plots,
        &out_dir,
        &cfg.gallery_path("FERS_vs_Event"),
        4,
        &format!("Run {} FERS vs event", cfg.run),
    )
}

fn drs_1d(cfg: &RunConfig, boards: &[DrsBoard]) -> Result<PathBuf> {
    let infile = cfg.input("drs_all_channels_1D.root");
    let file = open_input(&infile)?;
    let out_dir = cfg.plots("DRS_1D")?;

    let mut plots = Vec::new();
    for board in boards {
        for &tower in board.towers() {
            let sx = coord_label(tower.ix);
            let sy = coord_label(tower.iy);
            let name_c = format!("hist_DRS_Board{}_Cer_{}_{}", board.board_no, sx, sy);
            let name_s = format!("hist_DRS_Board{}_Sci_{}_{}", board.board_no, sx, sy);
            let (Some(hist_c), Some(hist_s)) = (lookup1(&file, &name_c)?, lookup1(&file, &name_s)?)
            else {
                eprintln!(
                    "Warning: histograms {} or {} not found in {}",
                    name_c,
                    name_s,
                    infile.display()
                );
                continue;
            };

            let cer = board.channel(tower, ChannelKind::Cer);
            let sci = board.channel(tower, ChannelKind::Sci);
            let annotation = vec![
                format!("Board: {}", board.board_no),
                format!("iTowerX: {}", tower.ix),
                format!("iTowerY: {}", tower.iy),
                format!("Cer Channel: ({}, {})", cer.group, cer.channel),
                format!("Sci Channel: ({}, {})", sci.group, sci.channel),
            ];
            let spec = OverlaySpec {
                x: AxisSpec::linear(1400.0, 2500.0, "DRS Output"),
                y: AxisSpec::log(1.0, 1e12, "Counts"),
                legend: &["Cer", "Sci"],
                colors: &[color::CER, color::SCI],
                fold_flows: true,
                annotation: &annotation,
                run: cfg.run,
            };
            let out_name = format!(
                "DRS_Variable_Board{}_iTowerX{}_iTowerY{}",
                board.board_no, sx, sy
            );
            plots.push(draw::overlay(
                &[&hist_c, &hist_s],
                &spec,
                &out_dir,
                &out_name,
                cfg.format,
            )?);
        }
    }
    html::write_gallery(
        &plots,
        &out_dir,
        &cfg.gallery_path("DRS_1D"),
        3,
        &format!("Run {} DRS 1D", cfg.run),
    )
}

// Waveforms against time slice; the display window tracks each channel's
// mean output so both raw and baseline-subtracted views stay centred.
fn drs_vs_ts(cfg: &RunConfig, boards: &[DrsBoard]) -> Result<PathBuf> {
    let (suffix, y_lo, y_hi) = if cfg.subtract_median {
        ("_subtractMedian", -20.0, 40.0)
    } else {
        ("", -50.0, 50.0)
    };
    let infile = cfg.input("drs_all_channels_2D.root");
    let file = open_input(&infile)?;
    let out_dir = cfg.plots("DRS_vs_TS")?;

    let mut plots = Vec::new();
    for board in boards {
        for &tower in board.towers() {
            let sx = coord_label(tower.ix);
            let sy = coord_label(tower.iy);
            for kind in ChannelKind::BOTH {
                let var = kind.label();
                let hist_name = format!(
                    "hist_DRS_Board{}_{}_vs_TS_{}_{}{}",
                    board.board_no, var, sx, sy, suffix
                );
                let Some(hist) = lookup2(&file, &hist_name)? else {
                    eprintln!(
                        "Warning: histogram {} not found in {}",
                        hist_name,
                        infile.display()
                    );
                    continue;
                };

                let mean = hist.mean_y();
                let chan = board.channel(tower, kind);
                let annotation = vec![
                    format!(
                        "B: {}, G: {}, C: {}",
                        board.board_no, chan.group, chan.channel
                    ),
                    format!("iTowerX: {}", tower.ix),
                    format!("iTowerY: {}", tower.iy),
                ];
                let spec = HeatmapSpec {
                    x: AxisSpec::linear(0.0, 1024.0, "Time Slice"),
                    y: AxisSpec::linear(mean + y_lo, mean + y_hi, "DRS Output"),
                    z_min: 1.0,
                    z_max: 1e4,
                    log_z: true,
                    annotation: &annotation,
                    tag: Some(var),
                    run: cfg.run,
                };
                let out_name = format!("DRS_{}_vs_TS_{}_{}{}", var, sx, sy, suffix);
                plots.push(draw::heatmap(&hist, &spec, &out_dir, &out_name, cfg.format)?);
            }
        }
    }
    html::write_gallery(
        &plots,
        &out_dir,
        &cfg.gallery_path(&format!("DRS_vs_TS{}", suffix)),
        2,
        &format!("Run {} DRS vs TS", cfg.run),
    )
}

// Mean DRS output tracked against event number.
fn drs_vs_event(cfg: &RunConfig, boards: &[DrsBoard]) -> Result<PathBuf> {
    let infile = cfg.input("drs_all_channels_2D_vs_event.root");
    let file = open_input(&infile)?;
    let out_dir = cfg.plots("DRS_vs_Event")?;

    let mut plots = Vec::new();
    for board in boards {
        for &tower in board.towers() {
            let sx = coord_label(tower.ix);
            let sy = coord_label(tower.iy);
            for kind in ChannelKind::BOTH {
                let var = kind.label();
                let hist_name = format!(
                    "hist_DRS_Board{}_{}_vs_Event_{}_{}",
                    board.board_no, var, sx, sy
                );
                let Some(hist) = lookup2(&file, &hist_name)? else {
                    eprintln!(
                        "Warning: histogram {} not found in {}",
                        hist_name,
                        infile.display()
                    );
                    continue;
                };

                let chan = board.channel(tower, kind);
                let annotation = vec![
                    format!("Board: {}", board.board_no),
                    format!("iTowerX: {}", tower.ix),
                    format!("iTowerY: {}", tower.iy),
                    format!("{} Group: {}", var, chan.group),
                    format!("{} Channel: {}", var, chan.channel),
                ];
                let y_label = format!("{} Mean", var);
                let spec = HeatmapSpec {
                    x: AxisSpec::linear(0.0, hist.x_max, "Event"),
                    y: AxisSpec::linear(1400.0, 2300.0, &y_label),
                    z_min: 1.0,
                    z_max: 1e4,
                    log_z: true,
                    annotation: &annotation,
                    tag: None,
                    run: cfg.run,
                };
                let out_name = format!(
                    "DRS_Board{}_{}_{}_{}_vs_Event",
                    board.board_no, var, sx, sy
                );
                plots.push(draw::heatmap(&hist, &spec, &out_dir, &out_name, cfg.format)?);
            }
        }
    }
    html::write_gallery(
        &plots,
        &out_dir,
        &cfg.gallery_path("DRS_vs_Event"),
        4,
        &format!("Run {} DRS vs event", cfg.run),
    )
}

/// Shared loop for the flat channel-list subsystems (time reference,
/// hodoscope trigger, hodoscope position).
fn channel_view(
    cfg: &RunConfig,
    input_name: &str,
    subsystem: &str,
    channels: &[String],
) -> Result<PathBuf> {
    let (suffix, y_lo, y_hi) = channel_window(cfg.subtract_median);
    let infile = cfg.input(input_name);
    let file = open_input(&infile)?;
    let out_dir = cfg.plots(subsystem)?;

    let mut plots = Vec::new();
    for chan in channels {
        let hist_name = format!("hist_{}{}", chan, suffix);
        let Some(hist) = lookup2(&file, &hist_name)? else {
            eprintln!(
                "Warning: histogram {} not found in {}",
                hist_name,
                infile.display()
            );
            continue;
        };

        let annotation = vec![chan.clone()];
        let spec = HeatmapSpec {
            x: AxisSpec::linear(0.0, 1024.0, "Time Slice"),
            y: AxisSpec::linear(y_lo, y_hi, "Counts"),
            z_min: 1.0,
            z_max: 1e4,
            log_z: true,
            annotation: &annotation,
            tag: None,
            run: cfg.run,
        };
        let out_name = format!("{}_{}{}", subsystem, chan, suffix);
        plots.push(draw::heatmap(&hist, &spec, &out_dir, &out_name, cfg.format)?);
    }
    html::write_gallery(
        &plots,
        &out_dir,
        &cfg.gallery_path(&format!("{}{}", subsystem, suffix)),
        2,
        &format!("Run {} {}", cfg.run, subsystem),
    )
}

fn stats_enabled() -> bool {
    matches!(std::env::var("CALODQM_STATS").as_deref(), Ok("1"))
}

fn log_stage(stats: bool, name: &str, t: Instant) {
    if stats {
        eprintln!("CALODQM_STATS stage={} time={}", name, fmt_dur(t.elapsed()));
    }
}

fn fmt_dur(d: Duration) -> String {
    if d.as_secs_f64() < 1.0 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{:.3}s", d.as_secs_f64())
    }
}
