use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use hostkit::{ensure_host_pages, HostPagePlan, StaticServer};
use hostkit_bootstrap::{AppConfig, CliArgs};

/// Web-module test harness: host page generation and an embedded static
/// file server for browser-driven test runs.
#[derive(Parser)]
#[command(name = "webharness")]
#[command(about = "Test harness for browser-loaded web modules")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port override for the embedded server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate host pages for the configured modules
    Generate,
    /// Generate host pages, then serve the document root until interrupted
    Serve,
    /// Validate configuration and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: cli.port,
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // Layered config: defaults -> YAML (if provided) -> env (WEBHARNESS__*)
    // -> CLI overrides.
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    // Relative paths (log files included) resolve against the config file's
    // directory, or the working directory when running on defaults.
    let base_dir = cli
        .config
        .as_deref()
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    match &config.logging {
        Some(logging) => hostkit_bootstrap::init_logging(logging, &base_dir),
        None => hostkit_bootstrap::init_minimal(),
    }

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Generate => generate(&config).map(|_| ()),
        Commands::Serve => serve(&config).await,
        Commands::Check => check_config(&config),
    }
}

/// Run the materializer over the configured module list, with the dev-mode
/// overlay applied.
fn generate(config: &AppConfig) -> Result<usize> {
    let plan = host_page_plan(config);
    if plan.modules.is_empty() {
        tracing::warn!("no modules configured; nothing to generate");
        return Ok(0);
    }

    let pages = ensure_host_pages(&plan).context("host page generation failed")?;
    let created = pages.iter().filter(|p| p.created).count();
    tracing::info!(
        total = pages.len(),
        created,
        "host page generation complete"
    );
    Ok(created)
}

/// Generate host pages, start the embedded server, and keep serving until
/// Ctrl+C / SIGTERM. The server is closed on the way out.
async fn serve(config: &AppConfig) -> Result<()> {
    generate(config)?;

    let server = StaticServer::new(config.server.port, &config.server.doc_root);
    server
        .start(config.server.startup_timeout)
        .await
        .context("embedded web server failed to start")?;
    if let Some(addr) = server.local_addr() {
        tracing::info!(%addr, root = %config.server.doc_root.display(), "serving");
    }

    let result = hostkit_bootstrap::wait_for_shutdown().await;
    server.close();
    result
}

fn check_config(config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration…");
    println!("Configuration is valid");
    println!("{}", config.to_yaml()?);
    Ok(())
}

/// Assemble the materializer inputs from the configuration, resolving the
/// dev-mode overlay into a plain plan.
fn host_page_plan(config: &AppConfig) -> HostPagePlan {
    HostPagePlan {
        modules: config.effective_modules(),
        search_roots: config.pages.search_roots.clone(),
        out_dir: config.effective_out_dir(),
        template: config.pages.template.clone(),
        title_suffix: config.pages.title_suffix.clone(),
    }
}
