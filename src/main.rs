use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use extension_host::api::ApiServer;
use extension_host::{Aggregator, BundleOutputs, Config, ConfigKind, HostContext, Loader, ProcessModules};

/// Extension host - discover, register and initialize extensions
#[derive(Parser)]
#[command(name = "exthost", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover and register extensions, listing them by weight
    Scan {
        /// Extension root directories (defaults to the configured ones)
        dirs: Vec<PathBuf>,
    },
    /// Aggregate configuration UI fragments into script and style bundles
    Bundle {
        /// Extension root directories (defaults to the configured ones)
        dirs: Vec<PathBuf>,
        /// Which block to bundle: config, user-config or status
        #[arg(short, long, default_value = "config")]
        kind: ConfigKind,
        /// Write the script bundle here instead of stdout
        #[arg(long)]
        js: Option<PathBuf>,
        /// Write the style bundle here instead of stdout
        #[arg(long)]
        css: Option<PathBuf>,
    },
    /// List templates declared by extensions
    Templates {
        /// Extension root directories (defaults to the configured ones)
        dirs: Vec<PathBuf>,
    },
    /// Initialize every extension and serve the resulting routes
    ///
    /// On-disk entries run as subprocesses. `basic` webapp entries and `runner`
    /// worker entries are executed; `job` and `provider` scripts can't register
    /// routes from a subprocess and are only logged.
    Serve {
        /// Extension root directories (defaults to the configured ones)
        dirs: Vec<PathBuf>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,extension_host=info",
        1 => "info,extension_host=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Command::Scan { dirs } => {
            let loader = collect(&config, dirs).await?;
            cmd_scan(&loader);
            Ok(())
        }
        Command::Bundle { dirs, kind, js, css } => {
            let loader = collect(&config, dirs).await?;
            cmd_bundle(&loader, &config, kind, js, css).await
        }
        Command::Templates { dirs } => {
            let loader = collect(&config, dirs).await?;
            for (name, text) in loader.init_templates().await? {
                println!("{name:<32} {} bytes", text.len());
            }
            Ok(())
        }
        Command::Serve { dirs, port } => {
            let loader = collect(&config, dirs).await?;
            let port = port.unwrap_or(config.server.port);
            cmd_serve(loader, config, port).await
        }
    }
}

/// Discover and register extensions from `dirs`, or the configured roots
async fn collect(config: &Config, dirs: Vec<PathBuf>) -> anyhow::Result<Loader> {
    let dirs = if dirs.is_empty() {
        config.extension_dirs.clone()
    } else {
        dirs
    };

    let mut loader = Loader::new(Arc::new(ProcessModules::new(config.process.timeout)));
    loader.collect_extensions(&dirs).await?;
    Ok(loader)
}

fn cmd_scan(loader: &Loader) {
    let extensions = loader.registry().by_weight();
    if extensions.is_empty() {
        println!("No extensions found.");
        return;
    }

    println!("{:>6}  {:<9} {:<24} DIR", "WEIGHT", "TYPE", "ID");
    for ext in extensions {
        println!(
            "{:>6}  {:<9} {:<24} {}",
            ext.weight,
            ext.category,
            ext.id,
            ext.dir.display()
        );
    }
}

async fn cmd_bundle(
    loader: &Loader,
    config: &Config,
    kind: ConfigKind,
    js: Option<PathBuf>,
    css: Option<PathBuf>,
) -> anyhow::Result<()> {
    let outputs = BundleOutputs {
        script: js.or_else(|| config.assets.script_out.clone()),
        style: css.or_else(|| config.assets.style_out.clone()),
    };

    let aggregator = Aggregator::new(config.assets.framework_root.clone());
    let bundle = loader.init_config(&aggregator, kind, &outputs).await?;

    if outputs.script.is_none() {
        println!("{}", bundle.script);
    }
    if outputs.style.is_none() {
        println!("{}", bundle.style);
    }
    tracing::info!(
        configs = %serde_json::to_string(&bundle.configs)?,
        "config metadata"
    );
    Ok(())
}

async fn cmd_serve(loader: Loader, config: Config, port: u16) -> anyhow::Result<()> {
    let host = HostContext::new(config);

    let webapp = loader.init_webapp_extensions(&host).await?;
    let workers = loader.init_worker_extensions(&host).await?;
    let statics = loader.init_static_dirs(&host.routes).await?;

    tracing::info!(
        webapp = webapp.values().map(|m| m.len()).sum::<usize>(),
        workers = workers.values().map(|m| m.len()).sum::<usize>(),
        static_dirs = statics.len(),
        routes = host.routes.records().len(),
        "extensions initialized"
    );

    ApiServer::new(loader.registry(), &host, port).run().await?;
    Ok(())
}
