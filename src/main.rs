use cpn_e2e::canvas::CanvasClient;
use cpn_e2e::config::{Credentials, Settings};
use cpn_e2e::runner::{self, RunOptions};
use cpn_e2e::suites::{self, SuiteSelection};

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "cpn-e2e",
    version,
    about = "End-to-end checks for the canvas-where-am-I script against a Canvas tenant"
)]
struct Cli {
    /// Path to the settings file (defaults to ./cpn-e2e.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Provision fixtures, run the suites and tear the fixtures down
    Run {
        /// Which suites to run
        #[arg(long, value_enum, default_value = "all")]
        suite: SuiteSelection,
        /// Only run cases whose name contains this text
        #[arg(long)]
        filter: Option<String>,
        /// Show the browser window
        #[arg(long)]
        headed: bool,
        /// Run suites concurrently
        #[arg(long)]
        parallel: bool,
        /// Write a JSON report here
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Print the cases of the selected suites
    List {
        #[arg(long, value_enum, default_value = "all")]
        suite: SuiteSelection,
    },
    /// Validate environment and settings without touching the network
    CheckConfig {
        #[arg(long, value_enum, default_value = "all")]
        suite: SuiteSelection,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the variables may come from the environment.
    let dotenv_path = dotenvy::dotenv().ok();

    // Initialize tracing with layered subscriber (fmt + per-case capture)
    {
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;

        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

        let logs_tx = cpn_e2e::logs::init_capture();
        let capture_layer = cpn_e2e::logs::CaptureLayer::new(logs_tx);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(capture_layer)
            .init();
    }

    if let Some(path) = dotenv_path {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref()).await?;

    match cli.command {
        Command::List { suite } => {
            // Listing needs no credentials; use placeholders.
            let creds = Credentials {
                oauth_token: String::new(),
                canvas_host: String::new(),
                account_id: String::new(),
                s3_bucket_url: Some(String::new()),
            };
            for s in suites::build_suites(suite, &creds, &settings)? {
                println!("{}", s.name());
                for case in s.cases() {
                    println!("  {case}");
                }
            }
            Ok(())
        }
        Command::CheckConfig { suite } => {
            let creds = Credentials::from_env()?;
            let built = suites::build_suites(suite, &creds, &settings)?;
            if built.iter().any(|s| s.needs_assets()) {
                for path in [&settings.script_path, &settings.style_path] {
                    anyhow::ensure!(path.is_file(), "CPN asset not found: {}", path.display());
                }
            }
            println!("host:      {}", creds.canvas_host);
            println!("account:   {}", creds.account_id);
            println!(
                "suites:    {}",
                built.iter().map(|s| s.name()).collect::<Vec<_>>().join(", ")
            );
            println!("headless:  {}", settings.headless);
            println!("timeouts:  page {}s, case {}s", settings.page_timeout_secs, settings.case_timeout_secs);
            println!("configuration OK");
            Ok(())
        }
        Command::Run {
            suite,
            filter,
            headed,
            parallel,
            report,
        } => {
            if headed {
                settings.headless = false;
            }
            let creds = Credentials::from_env()?;
            let mut selected = suites::build_suites(suite, &creds, &settings)?;
            let canvas = CanvasClient::new(
                &creds.canvas_host,
                &creds.oauth_token,
                settings.http_timeout(),
            )?;

            let opts = RunOptions {
                filter,
                parallel,
                ..RunOptions::from_settings(&settings)
            };

            info!(host = %creds.canvas_host, suites = selected.len(), "starting run");
            let run = runner::execute(&mut selected, &canvas, &settings, &opts).await?;
            run.print_summary();

            if let Some(path) = report {
                run.write_json(&path).await?;
                info!(path = %path.display(), "report written");
            }

            if run.is_success() {
                Ok(())
            } else {
                anyhow::bail!("{} problem(s) in this run", run.problem_count())
            }
        }
    }
}
