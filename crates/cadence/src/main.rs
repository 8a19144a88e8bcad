use anyhow::Context;
use cadence_engine::config::{CadenceConfig, ConfigLoader, Credentials};
use cadence_engine::workflow::TracingObserver;
use cadence_engine::{RunError, RunPlan, execute_until};
use cadence_h::ChromiumDriver;
use clap::Parser;
use std::error::Error as _;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "cadence",
    version,
    about = "Reschedule a portal report to start today and flip its interval"
)]
struct Args {
    /// Config file (default: ./cadence.yaml, then ~/.cadence/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tenant selector profile, overriding the config's
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Portal sign-in URL
    #[arg(long)]
    url: Option<String>,

    /// Exact name of the report to reschedule
    #[arg(long)]
    report: Option<String>,

    /// Show the browser window
    #[arg(long, conflicts_with = "headless")]
    visible: bool,

    /// Run the browser without a window
    #[arg(long)]
    headless: bool,
}

impl Args {
    fn apply(&self, config: &mut CadenceConfig) {
        if let Some(url) = &self.url {
            config.portal.url = url.clone();
        }
        if let Some(report) = &self.report {
            config.portal.report_name = report.clone();
        }
        if let Some(profile) = &self.profile {
            config.portal.profile = Some(profile.clone());
        }
        if self.visible {
            config.browser.visible = true;
        }
        if self.headless {
            config.browser.visible = false;
        }
    }
}

async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    tracing::warn!("Interrupted, closing browser");
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ConfigLoader::load_default().await?,
    };
    args.apply(&mut config);

    let credentials = Credentials::from_env()?;
    let table = ConfigLoader::load_profile(config.portal.profile.as_deref()).await?;
    tracing::info!(profile = table.name(), report = %config.portal.report_name, "Starting run");
    let plan = RunPlan::for_today(&config, credentials, table)?;

    let driver = ChromiumDriver::new(config.browser.clone());
    let report = execute_until(driver, &plan, &TracingObserver, interrupted()).await;

    if let Err(e) = &report.released {
        tracing::warn!("Browser did not close cleanly: {}", e);
    }

    match report.outcome {
        Ok(update) => {
            println!(
                "Saved '{}' (row {}): start date {}, interval {} -> {} in {:.1}s",
                update.report_name,
                update.report_row,
                update.start_date,
                if update.previous_interval.is_empty() {
                    "?"
                } else {
                    update.previous_interval.as_str()
                },
                update.interval,
                update.elapsed.as_secs_f64()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(RunError::Workflow(e)) => {
            match e.target() {
                Some(target) => eprintln!("Failed at step '{}' locating '{}'", e.step, target),
                None => eprintln!("Failed at step '{}'", e.step),
            }
            let mut cause: Option<&dyn std::error::Error> = Some(&e.source);
            while let Some(err) = cause {
                eprintln!("  caused by: {}", err);
                cause = err.source();
            }
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            eprintln!("{}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
