use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use simwatch::config::{find_case, load_cases};
use simwatch::data::duration::parse_duration;
use simwatch::{App, CancelSignal};

#[derive(Parser, Debug)]
#[command(name = "simwatch")]
#[command(about = "Monitor a remote simulation and render its status dashboard")]
struct Args {
    /// Case name as listed in the configuration file
    case: String,

    /// Directory for the status image and the scene cache
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Path to the case configuration file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Override the remote host from the configuration
    #[arg(long)]
    host: Option<String>,

    /// Poll interval (e.g., "30s", "2m"); overrides the configuration
    #[arg(short, long)]
    interval: Option<String>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let cases = load_cases(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    let (case_name, mut case) = find_case(&cases, &args.case)?;
    if let Some(host) = args.host {
        case.host = Some(host);
    }

    let mut settings = case
        .settings(&case_name, &args.output_dir)
        .with_context(|| format!("invalid configuration for case '{}'", case_name))?;
    if let Some(ref raw) = args.interval {
        settings.interval =
            parse_duration(raw).with_context(|| format!("invalid --interval '{}'", raw))?;
    }
    let connector = case.connector()?;

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("cannot create {}", args.output_dir.display()))?;

    let mut app = App::new(settings, connector);

    if args.once {
        let report = app.run_once();
        app.stop();
        if report.is_none() {
            anyhow::bail!(
                "cycle failed: {}",
                app.last_error().unwrap_or("unknown error")
            );
        }
        return Ok(());
    }

    // The poll loop is blocking; the runtime only listens for Ctrl-C.
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()?;

    let cancel = CancelSignal::new();
    let handle = cancel.clone();
    rt.spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, stopping after the current cycle");
                handle.cancel();
            }
            Err(err) => warn!(error = %err, "cannot listen for Ctrl-C"),
        }
    });

    app.run(&cancel);
    rt.shutdown_background();
    Ok(())
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "simwatch=info",
            1 => "simwatch=debug",
            _ => "simwatch=trace",
        })
    });

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}
