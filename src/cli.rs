use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "upswatch",
    about = "Battery monitoring and runtime estimation for Raspberry Pi UPS HATs",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output as JSON instead of formatted tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Read configuration from this file only, skipping the system and user files
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log debug details to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Take one reading and show battery, power and charging status
    Status,

    /// Show the fused runtime estimate with a per-method breakdown
    Runtime,

    /// Print a one-line segment for shell prompts (starship, tmux, ...)
    Prompt {
        /// Append the compact runtime estimate
        #[arg(long)]
        runtime: bool,
    },

    /// Poll continuously, print readings and report power events
    Monitor,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for (auto-detected if omitted)
        shell: Option<Shell>,
    },
}

/// Print shell completions to stdout.
pub fn print_completions(shell: Option<Shell>) {
    let shell = shell.or_else(Shell::from_env).unwrap_or_else(|| {
        eprintln!(
            "Could not detect shell. Specify one: upswatch completions bash|zsh|fish|elvish|powershell"
        );
        std::process::exit(1);
    });
    clap_complete::generate(
        shell,
        &mut Cli::command(),
        "upswatch",
        &mut std::io::stdout(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["upswatch", "runtime", "--json", "--config", "/tmp/ups.toml"]);
        assert!(matches!(cli.command, Command::Runtime));
        assert!(cli.json);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/ups.toml")));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_prompt_runtime_flag() {
        let cli = Cli::parse_from(["upswatch", "-v", "prompt", "--runtime"]);
        assert!(matches!(cli.command, Command::Prompt { runtime: true }));
        assert!(cli.verbose);
    }
}
