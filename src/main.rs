#![allow(clippy::too_many_arguments)]

use std::process::ExitCode;

use clap::Parser;

use gb7studio::settings::EditorSettings;
use gb7studio::{cli, log_info, logger};

fn main() -> ExitCode {
    // Initialize session log (overwrites previous session log)
    logger::init();

    let args = cli::CliArgs::parse();
    logger::set_echo(args.verbose);

    let settings = EditorSettings::load();
    log_info!(
        "Settings: max_layers={} interpolation={} jpeg_quality={}",
        settings.max_layers,
        settings.interpolation.key(),
        settings.jpeg_quality
    );

    cli::run(args, &settings)
}
