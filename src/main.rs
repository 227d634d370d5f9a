use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use upswatch::cli::{Cli, Command};
use upswatch::config::UpsConfig;
use upswatch::error::Error;
use upswatch::status::StatusReport;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = upswatch::config::load(cli.config.as_ref())?;

    match cli.command {
        Command::Status => cmd_status(&config, cli.json)?,
        Command::Runtime => cmd_runtime(&config, cli.json)?,
        Command::Prompt { runtime } => cmd_prompt(&config, runtime),
        Command::Monitor => cmd_monitor(&config)?,
        Command::Completions { shell } => upswatch::cli::print_completions(shell),
    }

    Ok(())
}

/// One reading for `status` and `runtime`, with a hint when the bus is unreachable.
fn take_reading(config: &UpsConfig) -> Result<StatusReport> {
    match upswatch::monitor::snapshot(config, true) {
        Ok(report) => Ok(report),
        Err(e @ Error::I2c { .. }) => {
            eprintln!(
                "{} is I2C enabled and is this user in the i2c group? (bus {}, address 0x{:02x})",
                "Hint:".yellow(),
                config.device.bus,
                config.device.address
            );
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_status(config: &UpsConfig, json: bool) -> Result<()> {
    let report = take_reading(config)?;

    if json {
        upswatch::output::print_json(&report)?;
    } else {
        upswatch::output::print_status(&report);
    }
    Ok(())
}

fn cmd_runtime(config: &UpsConfig, json: bool) -> Result<()> {
    let report = take_reading(config)?;

    if json {
        upswatch::output::print_json(&report)?;
        return Ok(());
    }
    if !report.cycle.reading.corrected.has_battery {
        anyhow::bail!("No battery detected; running on external power only.");
    }
    upswatch::output::print_runtime(&report);
    Ok(())
}

/// Never fails: a prompt must always print something.
fn cmd_prompt(config: &UpsConfig, with_runtime: bool) {
    match upswatch::monitor::snapshot(config, false) {
        Ok(report) if with_runtime => println!(
            "{} {}",
            report.prompt(),
            upswatch::estimate::format_runtime_compact(report.cycle.runtime.hours)
        ),
        Ok(report) => println!("{}", report.prompt()),
        Err(e) => {
            log::debug!("prompt reading failed: {}", e);
            println!("{}", upswatch::status::prompt_segment(None));
        }
    }
}

fn cmd_monitor(config: &UpsConfig) -> Result<()> {
    upswatch::monitor::run(config)?;
    Ok(())
}
