//! CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use crowdchain_dao::{run_walkthrough, DaoConfig, WalkthroughParams};
use crowdchain_types::ManualClock;
use tracing::info;

use crate::output::{print_info, print_success, print_walkthrough};
use crate::telemetry::init_telemetry;

#[derive(Parser, Debug)]
#[command(name = "crowdchain")]
#[command(about = "Governance-gated milestone disbursement for crowdfunded campaigns")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file (TOML); defaults apply when omitted
    #[arg(short, long, global = true, env = "CROWDCHAIN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level or filter directive, overrides the config file
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy in memory and drive one milestone through governance
    Walkthrough(WalkthroughArgs),

    /// Configuration file management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(clap::Args, Debug)]
pub struct WalkthroughArgs {
    /// Voting tokens minted to each of the two voters
    #[arg(long, default_value = "100")]
    pub tokens: u128,

    /// Amount deposited into the treasury
    #[arg(long, default_value = "50")]
    pub deposit: u128,

    #[arg(long, default_value = "1")]
    pub milestone_id: u64,

    #[arg(long, default_value = "10")]
    pub milestone_amount: u128,

    #[arg(long, default_value = "Purchase school supplies")]
    pub milestone_description: String,

    /// Start time of the simulated clock (seconds)
    #[arg(long, default_value = "1000")]
    pub start: u64,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl WalkthroughArgs {
    fn params(&self) -> WalkthroughParams {
        WalkthroughParams {
            voting_tokens: self.tokens,
            treasury_deposit: self.deposit,
            milestone_id: self.milestone_id,
            milestone_amount: self.milestone_amount,
            milestone_description: self.milestone_description.clone(),
            ..WalkthroughParams::default()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a default configuration file
    Init {
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

/// Load `path` or fall back to defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<DaoConfig> {
    match path {
        Some(path) => DaoConfig::from_file(path).with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(DaoConfig::default()),
    }
}

/// Execute a parsed command line.
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Config(ConfigCommands::Init { path, force }) => init_config(&path, force),
        Commands::Config(ConfigCommands::Show) => {
            let config = load_config(cli.config.as_deref())?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Commands::Walkthrough(args) => {
            let config = load_config(cli.config.as_deref())?;
            let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
            init_telemetry(level, cli.json_logs || config.logging.json)?;
            walkthrough(&config, &args).await
        }
    }
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    DaoConfig::default().to_file(path)?;
    print_success(&format!("Wrote default configuration to {}", path.display()));
    Ok(())
}

async fn walkthrough(config: &DaoConfig, args: &WalkthroughArgs) -> anyhow::Result<()> {
    let clock = Arc::new(ManualClock::new(args.start));
    info!(start = args.start, deposit = args.deposit, milestone = args.milestone_id, "walkthrough starting");
    if !args.json {
        print_info("Deploying governor, scheduler and funding contracts in memory...");
    }

    let report = run_walkthrough(config, clock, &args.params()).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_walkthrough(&report);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_walkthrough_defaults() {
        let cli = Cli::try_parse_from(["crowdchain", "walkthrough"]).unwrap();
        match cli.command {
            Commands::Walkthrough(args) => {
                let params = args.params();
                assert_eq!(params.voting_tokens, 100);
                assert_eq!(params.treasury_deposit, 50);
                assert_eq!(params.milestone_amount, 10);
                assert_eq!(params.milestone_description, "Purchase school supplies");
                assert!(!args.json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["crowdchain", "config", "show", "--config", "dao.toml", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("dao.toml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Commands::Config(ConfigCommands::Show)));
    }

    #[test]
    fn test_config_init_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dao.toml");

        init_config(&path, false).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), DaoConfig::default());

        assert!(init_config(&path, false).is_err());
        init_config(&path, true).unwrap();
    }

    #[test]
    fn test_missing_config_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).is_err());
        assert_eq!(load_config(None).unwrap(), DaoConfig::default());
    }

    #[tokio::test]
    async fn test_walkthrough_json_report() {
        let cli = Cli::try_parse_from(["crowdchain", "walkthrough", "--json", "--deposit", "30"]).unwrap();
        let Commands::Walkthrough(args) = cli.command else {
            panic!("expected walkthrough");
        };
        walkthrough(&DaoConfig::default(), &args).await.unwrap();
    }
}
