//! CLI for heilkreis.
//!
//! Deploys the service, probes it for liveness and latency, and remediates
//! detected issues with actions chosen by a learned ε-greedy policy. Also
//! offers one-shot commands for scripting and for inspecting what was learned.

mod control;
mod deploy;
mod executor;
mod journal;
mod prober;
mod profile;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use heilkreis_bandits::{LearningConfig, PolicyStore, RemediationAgent};
use heilkreis_feedback::{OutcomeAnalyzer, RemediationOutcome};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use control::ControlLoop;
use deploy::CommandDeployer;
use executor::{Deployment, Executor};
use journal::{Journal, DEPLOYMENT_LOG, HEALING_LOG};
use prober::{ProbeConfig, Prober};
use profile::{EnvProfile, DEFAULT_PROFILES};

const DEFAULT_URL: &str = "http://127.0.0.1:5000";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    policy: PolicyArgs,

    #[command(flatten)]
    env: EnvArgs,

    /// Directory for the issue, monitor, healing and deployment journals
    #[arg(long, env = "HEILKREIS_LOG_DIR", default_value = "logs", global = true)]
    log_dir: PathBuf,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PolicyArgs {
    /// Path to the state → actions catalog (created with defaults if missing)
    #[arg(
        long,
        env = "HEILKREIS_CATALOG",
        default_value = "config/states_actions.json",
        global = true
    )]
    catalog: PathBuf,

    /// Path to the persisted action-value table
    #[arg(
        long,
        env = "HEILKREIS_POLICY_TABLE",
        default_value = "data/policy_table.json",
        global = true
    )]
    policy_table: PathBuf,

    /// Learning rate α in (0, 1]
    #[arg(long, default_value = "0.6", global = true)]
    alpha: f64,

    /// Discount factor γ in [0, 1]
    #[arg(long, default_value = "0.0", global = true)]
    gamma: f64,

    /// Exploration rate ε in [0, 1]
    #[arg(long, default_value = "0.2", global = true)]
    epsilon: f64,

    /// Seed for reproducible exploration
    #[arg(long, global = true)]
    seed: Option<u64>,
}

impl PolicyArgs {
    fn learning(&self) -> LearningConfig {
        LearningConfig {
            alpha: self.alpha,
            gamma: self.gamma,
            epsilon: self.epsilon,
        }
    }

    fn open_agent(&self) -> Result<RemediationAgent> {
        RemediationAgent::open(&self.catalog, &self.policy_table, &self.learning(), self.seed)
            .context("Failed to load policy")
    }
}

#[derive(Args)]
struct EnvArgs {
    /// Environment profile supplying the probe URL and deploy command
    #[arg(long = "env", env = "HEILKREIS_ENV", global = true)]
    environment: Option<String>,

    /// Path to the environment profiles
    #[arg(long, env = "HEILKREIS_PROFILES", default_value = DEFAULT_PROFILES, global = true)]
    profiles: PathBuf,
}

impl EnvArgs {
    fn profile(&self) -> Result<Option<EnvProfile>> {
        self.environment
            .as_deref()
            .map(|name| EnvProfile::load(&self.profiles, name))
            .transpose()
    }
}

#[derive(Args)]
struct ProbeArgs {
    /// URL of the service to probe [default: profile URL, else http://127.0.0.1:5000]
    #[arg(long, env = "HEILKREIS_URL")]
    url: Option<String>,

    /// Seconds between probes
    #[arg(long, env = "MONITOR_INTERVAL", default_value = "30")]
    monitor_interval: u64,

    /// Seconds after which a response counts as slow
    #[arg(long, env = "SLOW_THRESHOLD", default_value = "5")]
    slow_threshold: f64,

    /// Seconds before a probe is abandoned
    #[arg(long, default_value = "10")]
    probe_timeout: u64,
}

impl ProbeArgs {
    /// An explicit URL wins over the profile.
    fn config(&self, profile: Option<&EnvProfile>) -> Result<ProbeConfig> {
        let slow_threshold = Duration::try_from_secs_f64(self.slow_threshold)
            .with_context(|| format!("Invalid slow threshold: {}", self.slow_threshold))?;
        let url = self
            .url
            .clone()
            .or_else(|| profile.and_then(EnvProfile::url))
            .unwrap_or_else(|| DEFAULT_URL.to_string());
        Ok(ProbeConfig {
            url,
            timeout: Duration::from_secs(self.probe_timeout),
            slow_threshold,
            interval: Duration::from_secs(self.monitor_interval),
        })
    }
}

#[derive(Args)]
struct DeployArgs {
    /// Shell command performing a (re)deployment [default: profile deploy_cmd]
    #[arg(long, env = "HEILKREIS_DEPLOY_CMD")]
    deploy_cmd: Option<String>,
}

impl DeployArgs {
    /// An explicit command wins over the profile.
    fn deployer(&self, log_dir: &Path, profile: Option<&EnvProfile>) -> CommandDeployer {
        let command = self
            .deploy_cmd
            .clone()
            .or_else(|| profile.and_then(EnvProfile::deploy_cmd).map(str::to_string));
        let deployer = CommandDeployer::new(command, Journal::in_dir(log_dir, DEPLOYMENT_LOG));
        match profile {
            Some(profile) => deployer.with_env(&profile.name),
            None => deployer,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy, then monitor and remediate until Ctrl-C
    Run {
        #[command(flatten)]
        probe: ProbeArgs,

        #[command(flatten)]
        deploy: DeployArgs,

        /// Seconds between remediation cycles
        #[arg(long, env = "AUTOFIX_INTERVAL", default_value = "60")]
        autofix_interval: u64,
    },
    /// Run a single remediation cycle (exit 0 success, 1 failed, 2 skipped)
    Check {
        #[command(flatten)]
        deploy: DeployArgs,
    },
    /// Probe the service once (exit 1 when down or slow)
    Probe {
        #[command(flatten)]
        probe: ProbeArgs,
    },
    /// Deploy once
    Deploy {
        #[command(flatten)]
        deploy: DeployArgs,
    },
    /// Apply human feedback to a (state, action) pair
    Feedback {
        #[arg(long)]
        state: String,

        #[arg(long)]
        action: String,

        /// Feedback value, e.g. 1 or -1
        #[arg(long, allow_hyphen_values = true)]
        value: f64,
    },
    /// Print the learned action values
    Policy {
        #[arg(long)]
        json: bool,
    },
    /// Summarize the healing log
    Report {
        #[arg(long)]
        json: bool,

        /// Minimum outcomes before system-wide patterns are reported
        #[arg(long, default_value = "10")]
        min_outcomes: usize,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "heilkreis=debug,heilkreis_bandits=debug"
    } else {
        "heilkreis=info,heilkreis_bandits=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

async fn run(
    agent: RemediationAgent,
    probe: ProbeConfig,
    deployer: CommandDeployer,
    autofix_interval: Duration,
    log_dir: &Path,
) -> Result<()> {
    tracing::info!(
        monitor = ?probe.interval,
        threshold = ?probe.slow_threshold,
        autofix = ?autofix_interval,
        "Starting heilkreis"
    );

    if let Err(e) = tokio::task::block_in_place(|| deployer.redeploy()) {
        tracing::warn!(error = %e, "Initial deployment failed");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let prober = Prober::new(probe, log_dir)?;
    let prober_rx = shutdown_rx.clone();
    let prober_task = tokio::spawn(async move { prober.run(prober_rx).await });

    let control = ControlLoop::new(agent, Executor::new(deployer), log_dir, autofix_interval);
    let control_task = tokio::spawn(control.run(shutdown_rx));

    tracing::info!("System running: deploy -> monitor -> remediate");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutdown requested, waiting for in-flight work");
    let _ = shutdown_tx.send(true);

    let (prober_res, control_res) = tokio::join!(prober_task, control_task);
    prober_res.context("Prober task failed")?;
    control_res.context("Control loop task failed")?;
    tracing::info!("System stopped");
    Ok(())
}

fn print_policy(store: &PolicyStore, json: bool) -> Result<()> {
    let entries = store.entries();
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("Policy table is empty.");
    }
    for entry in entries {
        println!("{}\t{}\t{:.4}", entry.state, entry.action, entry.value);
    }
    Ok(())
}

fn print_report(log_dir: &Path, json: bool, min_outcomes: usize) -> Result<()> {
    let healing: Journal<RemediationOutcome> = Journal::in_dir(log_dir, HEALING_LOG);
    let outcomes = healing.read_all()?;
    let report = OutcomeAnalyzer::new(min_outcomes).report(&outcomes);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!(
        "{} remediations, {:.1}% successful, average reward {:.2}",
        report.overall.total,
        report.overall.success_rate() * 100.0,
        report.overall.average_reward()
    );
    for pair in &report.pairs {
        println!(
            "{}\t{}\t{} attempts\t{:.1}% ok\tavg {:.2}",
            pair.state,
            pair.action,
            pair.stats.total,
            pair.success_rate * 100.0,
            pair.average_reward
        );
    }
    for pattern in &report.patterns {
        println!("! {pattern}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let profile = cli.env.profile()?;
    let profile = profile.as_ref();

    match cli.command {
        Commands::Run {
            probe,
            deploy,
            autofix_interval,
        } => {
            let agent = cli.policy.open_agent()?;
            run(
                agent,
                probe.config(profile)?,
                deploy.deployer(&cli.log_dir, profile),
                Duration::from_secs(autofix_interval),
                &cli.log_dir,
            )
            .await?;
        }
        Commands::Check { deploy } => {
            let agent = cli.policy.open_agent()?;
            let mut control = ControlLoop::new(
                agent,
                Executor::new(deploy.deployer(&cli.log_dir, profile)),
                &cli.log_dir,
                Duration::ZERO,
            );
            let report = tokio::task::block_in_place(|| control.run_cycle());
            match &report {
                control::CycleReport::Completed {
                    state,
                    action,
                    success,
                    value,
                } => println!(
                    "{state} -> {action}: {} (value {value:.4})",
                    if *success { "Success" } else { "Failed" }
                ),
                control::CycleReport::Skipped { state } => {
                    println!("{state}: no policy, skipped");
                }
            }
            return Ok(ExitCode::from(report.exit_code()));
        }
        Commands::Probe { probe } => {
            let prober = Prober::new(probe.config(profile)?, &cli.log_dir)?;
            let outcome = prober.probe_once().await;
            println!("{outcome:?}");
            if !outcome.is_healthy() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Deploy { deploy } => {
            let deployer = deploy.deployer(&cli.log_dir, profile);
            if let Err(e) = tokio::task::block_in_place(|| deployer.redeploy()) {
                eprintln!("Deployment failed: {e}");
                return Ok(ExitCode::FAILURE);
            }
            println!("Deployment completed");
        }
        Commands::Feedback {
            state,
            action,
            value,
        } => {
            if !value.is_finite() {
                anyhow::bail!("Feedback value must be finite, got {value}");
            }
            let mut agent = cli.policy.open_agent()?;
            let updated = agent.human_feedback(&state, &action, value);
            println!("{state} -> {action}: {updated:.4}");
        }
        Commands::Policy { json } => {
            let agent = cli.policy.open_agent()?;
            print_policy(agent.store(), json)?;
        }
        Commands::Report { json, min_outcomes } => {
            print_report(&cli.log_dir, json, min_outcomes)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
