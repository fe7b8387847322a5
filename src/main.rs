//! CLI entry point for devfolio

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use devfolio::{commands, server, Devfolio};

#[derive(Parser)]
#[command(name = "devfolio")]
#[command(version)]
#[command(about = "Developer portfolio and markdown blog server", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new site
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        folder: PathBuf,
    },

    /// Create a new markdown post
    New {
        /// Title of the new post
        title: String,

        /// File name for the new post, without extension
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Start the server
    #[command(alias = "s")]
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// IP address to bind to
        #[arg(short, long, default_value = "localhost")]
        ip: String,

        /// Do not watch markdown posts for changes
        #[arg(long)]
        r#static: bool,
    },

    /// List site content
    List {
        /// Type of content to list (post, tag, category)
        #[arg(default_value = "post")]
        r#type: String,
    },

    /// Write public/data/posts-list.json
    Manifest,

    /// Copy markdown posts into the local store
    Import,

    /// Delete staged images older than the retention window
    Cleanup,

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "devfolio=debug,info"
    } else {
        "devfolio=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine base directory
    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("Cannot determine current directory")?,
    };

    match cli.command {
        Commands::Init { folder } => {
            let target_dir = if folder.is_absolute() {
                folder
            } else {
                base_dir.join(folder)
            };
            tracing::info!("Initializing site in {:?}", target_dir);
            commands::init::init_site(&target_dir)?;
            println!("Initialized site in {:?}", target_dir);
        }

        Commands::New { title, path } => {
            let site = Devfolio::new(&base_dir)?;
            commands::new::create_post(&site, &title, path.as_deref())?;
        }

        Commands::Serve { port, ip, r#static } => {
            let site = Devfolio::new(&base_dir)?;
            tracing::info!("Serving {:?} with {:?} backend", base_dir, site.config.backend);
            server::start(&site, &ip, port, !r#static).await?;
        }

        Commands::List { r#type } => {
            let site = Devfolio::new(&base_dir)?;
            commands::list::run(&site, &r#type)?;
        }

        Commands::Manifest => {
            let site = Devfolio::new(&base_dir)?;
            commands::manifest::run(&site)?;
        }

        Commands::Import => {
            let site = Devfolio::new(&base_dir)?;
            commands::import::run(&site)?;
        }

        Commands::Cleanup => {
            let site = Devfolio::new(&base_dir)?;
            commands::cleanup::run(&site)?;
        }

        Commands::Version => {
            println!("devfolio version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
