use crate::cli::args::{BaselineArg, Cli, Commands, FormatArg, RunArgs};
use crate::core::engine::{self, RunConfig};
use crate::report::image::ImageFormat;
use crate::report::zip;
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::env;
use std::time::{Duration, Instant};

pub fn entry() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let stats = stats_enabled();
    let t0 = Instant::now();

    let run_label = format!("Run{}", args.run);
    let root_dir = args.root_dir.join(&run_label);
    let plots_dir = args.plots_dir.join(&run_label);
    let html_dir = args.html_dir.join(&run_label);

    stage(stats, "preflight", || {
        if !root_dir.is_dir() {
            bail!("input directory not found: {}", root_dir.display());
        }
        Ok(())
    })?;

    let format = match args.image_format {
        FormatArg::Png => ImageFormat::Png,
        FormatArg::Svg => ImageFormat::Svg,
        FormatArg::Pdf => ImageFormat::Pdf,
    };
    let subtract_median = matches!(args.baseline, BaselineArg::SubtractMedian);

    let config = RunConfig {
        run: args.run,
        root_dir,
        plots_dir: plots_dir.clone(),
        html_dir: html_dir.clone(),
        subtract_median,
        format,
    };

    let t_engine = Instant::now();
    let output = engine::run(&config)?;
    stage_done(stats, "engine", t_engine);

    if args.zip {
        let t_zip = Instant::now();
        let zip_path = std::path::PathBuf::from(format!("{}_dqm.zip", run_label));
        zip::write_bundle(
            &zip_path,
            &[
                (plots_dir.as_path(), format!("plots/{}", run_label)),
                (html_dir.as_path(), format!("html/{}", run_label)),
            ],
        )
        .with_context(|| "failed to create zip output")?;
        stage_done(stats, "zip", t_zip);
    }

    for (label, page) in &output.pages {
        println!("{} plots can be viewed at: {}", label, page.display());
    }
    println!("run index: {}", output.index.display());
    println!("All plots generated successfully.");

    if stats {
        eprintln!("CALODQM_STATS total={}", fmt_dur(t0.elapsed()));
    }
    Ok(())
}

fn stats_enabled() -> bool {
    matches!(env::var("CALODQM_STATS").as_deref(), Ok("1"))
}

fn stage<F>(stats: bool, name: &str, f: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    let t = Instant::now();
    let res = f();
    if stats {
        eprintln!("CALODQM_STATS stage={} time={}", name, fmt_dur(t.elapsed()));
    }
    res
}

fn stage_done(stats: bool, name: &str, t: Instant) {
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
