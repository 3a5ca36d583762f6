use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "calo-dqm", version, about = "DQM plot galleries for test-beam calorimeter runs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    Run(RunArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Run number; inputs are read from <root-dir>/Run<N>.
    #[arg(long)]
    pub run: u32,

    #[arg(long, default_value = "root")]
    pub root_dir: PathBuf,

    #[arg(long, default_value = "plots")]
    pub plots_dir: PathBuf,

    #[arg(long, default_value = "html")]
    pub html_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = BaselineArg::SubtractMedian)]
    pub baseline: BaselineArg,

    #[arg(long, value_enum, default_value_t = FormatArg::Png)]
    pub image_format: FormatArg,

    /// Bundle the run's plots and galleries into Run<N>_dqm.zip.
    #[arg(long, default_value_t = false)]
    pub zip: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum BaselineArg {
    #[value(name = "raw")]
    Raw,
    #[value(name = "subtract-median")]
    SubtractMedian,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FormatArg {
    #[value(name = "png")]
    Png,
    #[value(name = "svg")]
    Svg,
    #[value(name = "pdf")]
    Pdf,
}
