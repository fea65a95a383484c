use std::process::ExitCode;

use appicon_config::config::{self, generate_default_config, get_config};
use appicon_core::Settings;
use appicon_utils::path::resolve_path;
use clap::Parser;
use cli::{Args, Commands};
use error::Result;
use extract::{batch_extract, extract_icon, make_thumbnail};
use inspect::inspect_appimage;
use logging::setup_logging;
use tracing::{debug, info};

mod cli;
mod error;
mod extract;
mod inflight;
mod inspect;
mod logging;
mod utils;

fn show_config(json: bool) -> Result<()> {
    let config = get_config();
    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        info!("# {}", config::config_path().display());
        info!("{}", toml::to_string_pretty(&config)?.trim_end());
    }
    Ok(())
}

fn handle_cli() -> Result<bool> {
    let args = Args::parse();

    setup_logging(&args);

    if args.no_color {
        utils::disable_color();
    }

    if let Some(ref c) = args.config {
        config::set_config_path(resolve_path(c)?);
    }

    if let Commands::Config {
        generate: true,
    } = args.command
    {
        generate_default_config()?;
        return Ok(true);
    }

    config::init()?;
    let settings = Settings::current()?;
    debug!(?settings, "effective settings");

    let produced = match args.command {
        Commands::Inspect {
            path,
        } => inspect_appimage(&path, &settings, args.json)?,
        Commands::Extract {
            path,
            output,
        } => extract_icon(&path, output.as_deref(), &settings, args.json)?,
        Commands::Thumbnail {
            path,
            output,
            size,
        } => {
            let mut settings = settings;
            if let Some(size) = size {
                settings.thumbnail_size = size;
            }
            make_thumbnail(&path, output.as_deref(), settings, args.json)?
        }
        Commands::Batch {
            paths,
            output_dir,
            jobs,
        } => batch_extract(&paths, output_dir.as_deref(), jobs, &settings, args.json)? > 0,
        Commands::Config {
            ..
        } => {
            show_config(args.json)?;
            true
        }
    };

    Ok(produced)
}

fn main() -> ExitCode {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    match handle_cli() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(err) => {
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::FAILURE
        }
    }
}
