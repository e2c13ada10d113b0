use access_arbiter::cli::{run_command, Cli};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    run_command(Cli::parse())
}
