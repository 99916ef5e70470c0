use timemap::cli::Args;
use timemap::config::{self, TimelineSettings};
use timemap::providers::Catalog;
use timemap::shell::{Shell, format_ticks};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::time::Instant;

fn main() -> Result<()> {
    // Parse command-line arguments first (needed for log setup)
    let args = Args::parse();

    // Create path configuration from CLI args and environment
    let path_config = config::PathConfig::from_env_and_cli(args.config_dir.clone());

    if let Err(e) = config::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }

    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .as_ref()
            .cloned()
            .unwrap_or_else(|| config::data_file(config::LOG_FILE, &path_config));

        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }

    info!("Timemap starting...");
    debug!("Command-line args: {:?}", args);
    info!(
        "Config path: {}",
        config::config_file(config::SETTINGS_FILE, &path_config).display()
    );

    let settings = TimelineSettings::load_or_default(&path_config)?;
    let catalog = match &args.catalog {
        Some(path) => Catalog::from_json(path)?,
        None => {
            info!("No catalog given, using the built-in demo");
            Catalog::demo()
        }
    };

    let mut shell = Shell::new(settings, catalog);
    if let Some(name) = &args.context {
        shell.select_context(name)?;
    }
    if let Some(year) = args.year {
        shell.timeline.set_year(year);
    }
    for _ in 0..args.zoom_in {
        if !shell.timeline.zoom_in() {
            break;
        }
    }
    shell.wait_for_loads(std::time::Duration::from_secs(5));

    println!(
        "context {} | year {} | zoom x{} {}",
        shell.timeline.context().name,
        shell.timeline.year(),
        shell.timeline.zoom_level(),
        shell.timeline.zoom_range()
    );
    println!("{}", format_ticks(shell.timeline.ticks()));

    if args.play {
        let start = Instant::now();
        match shell.timeline.play(start) {
            Ok(mode) => {
                println!("playing ({}) from {}", mode, shell.timeline.year());
                let years = shell.run_playback(start, args.ticks);
                let years: Vec<String> = years.iter().map(|y| y.to_string()).collect();
                println!("visited {}", years.join(" "));
                shell.timeline.pause();
            }
            Err(e) => println!("no play: {}", e),
        }
    }

    for line in shell.process_events() {
        debug!("{}", line);
    }
    if let Some(msg) = &shell.error_msg {
        println!("notice: {}", msg);
    }
    Ok(())
}
