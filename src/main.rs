use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rakevisor::{Config, LogWriter, SimulatedDriver, Subscribe, Supervisor, deploy, shutdown};

#[derive(Debug, Parser)]
#[command(name = "rakevisor", version, about = "Sensor rake acquisition supervisor")]
struct Cli {
    /// Watched configuration directory.
    #[arg(long, global = true, default_value = "/trake/configuration")]
    watch_dir: PathBuf,

    /// Verbose logging, including rejected markers.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Supervise the station until voltage drops or a signal arrives.
    Run {
        /// Default output directory for data files.
        #[arg(long, default_value = "/trake/data")]
        data_folder: PathBuf,
        /// Control loop period in milliseconds.
        #[arg(long, default_value_t = 100)]
        poll_ms: u64,
        /// Seconds between checks while a run is active.
        #[arg(long, default_value_t = 10)]
        wait_secs: u64,
        /// Sysfs GPIO root of the power-low input.
        #[arg(long, default_value = "/sys/class/gpio")]
        gpio_root: PathBuf,
        /// BCM number of the power-low input.
        #[arg(long, default_value_t = 27)]
        power_low_pin: u32,
    },
    /// Write the deploy marker naming a configuration.
    Deploy { configuration: String },
    /// Remove the deploy marker.
    Undeploy,
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.command {
        Command::Run {
            data_folder,
            poll_ms,
            wait_secs,
            gpio_root,
            power_low_pin,
        } => {
            let cfg = Config {
                watch_dir: cli.watch_dir,
                data_folder,
                poll_interval: Duration::from_millis(poll_ms),
                wait_interval: Duration::from_secs(wait_secs),
                gpio_root,
                power_low_pin,
                diagnostics: cli.debug,
                ..Config::default()
            };
            let subs: Vec<Arc<dyn Subscribe>> =
                vec![Arc::new(LogWriter::new().with_diagnostics(cfg.diagnostics))];

            // No hardware driver ships with this binary; the simulated converter stands in.
            let sup = Supervisor::builder(cfg, Arc::new(SimulatedDriver::new()))
                .with_subscribers(subs)
                .build();
            let termination = sup
                .run(shutdown::cancel_on_signal())
                .await
                .context("supervisor failed to start")?;
            tracing::info!(termination = termination.as_label(), "exiting");
        }
        Command::Deploy { configuration } => {
            let marker = deploy::write_deploy_marker(&cli.watch_dir, &configuration)
                .with_context(|| format!("writing deploy marker in {}", cli.watch_dir.display()))?;
            println!("{}", marker.display());
        }
        Command::Undeploy => {
            let removed = deploy::remove_deploy_marker(&cli.watch_dir)
                .with_context(|| format!("removing deploy marker in {}", cli.watch_dir.display()))?;
            if !removed {
                println!("no deploy marker present");
            }
        }
    }
    Ok(())
}
