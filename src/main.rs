mod cli;
mod core;
mod report;
mod root;

fn main() -> anyhow::Result<()> {
    cli::run::entry()
}
