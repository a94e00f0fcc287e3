//! Command-line interface: the offline generator and the spec-first echo
//! server.

use crate::echo::echo_router;
use crate::generator::generate_artifacts;
use crate::server::Server;
use crate::spec::load_spec;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `katana` command line.
#[derive(Parser)]
#[command(name = "katana")]
#[command(version, about = "OpenAPI-driven HTTP/1.1 serving framework", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Generate typed artifacts (DTOs, parsers, validators, route table,
    /// handler trait, dispatch stubs) from an OpenAPI spec.
    Generate {
        /// Path to the OpenAPI document (JSON or YAML).
        #[arg(short, long)]
        spec: PathBuf,

        /// Output directory for the generated module.
        #[arg(short, long)]
        out: PathBuf,

        /// Overwrite existing files.
        #[arg(short, long, default_value_t = false)]
        force: bool,
    },
    /// Serve a spec with echo handlers (no generated code required).
    Serve {
        /// Path to the OpenAPI document (JSON or YAML).
        #[arg(short, long)]
        spec: PathBuf,

        /// Port to listen on.
        #[arg(long, default_value_t = 8080)]
        port: u16,

        /// Reactor worker count; defaults to one per hardware thread.
        #[arg(long)]
        workers: Option<usize>,

        /// Disable the per-reactor SO_REUSEPORT listeners.
        #[arg(long, default_value_t = false)]
        no_reuseport: bool,
    },
}

/// Parse arguments and run the selected command.
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Generate { spec, out, force } => {
            let doc = load_spec(&spec)?;
            generate_artifacts(&doc, &out, force)?;
            println!(
                "✅ Generated {} operation(s) from \"{}\" into {out:?}",
                doc.routes.len(),
                doc.title
            );
            Ok(())
        }
        Commands::Serve {
            spec,
            port,
            workers,
            no_reuseport,
        } => {
            let doc = load_spec(&spec)?;
            let router = echo_router(&doc);
            println!(
                "Serving \"{}\" with echo handlers on port {port} ({} route(s))",
                doc.title,
                doc.routes.len()
            );
            let mut server = Server::new(router).listen(port).reuseport(!no_reuseport);
            if let Some(workers) = workers {
                server = server.workers(workers);
            }
            server.run()?;
            Ok(())
        }
    }
}
