use clap::CommandFactory;
use clap_mangen::Man;
use std::fs::File;
use std::path::PathBuf;

use buildnotify::cli::Cli;

fn main() -> anyhow::Result<()> {
    let out_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("buildnotify.1"));
    let mut file = File::create(&out_path)?;
    Man::new(Cli::command()).render(&mut file)?;
    eprintln!("Generated man page at {}", out_path.display());
    Ok(())
}
