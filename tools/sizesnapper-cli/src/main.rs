//! SizeSnapper CLI: command-line interface for canvas projects.
//!
//! Usage:
//!   sizesnapper new <NAME> --width W --height H   Create a project
//!   sizesnapper list                              List projects
//!   sizesnapper info <PROJECT>                    Show a project and its layers
//!   sizesnapper rename <PROJECT> <NAME>           Rename a project
//!   sizesnapper resize <PROJECT> -W W -H H        Change canvas dimensions
//!   sizesnapper delete <PROJECT>                  Delete a project and its images
//!   sizesnapper add <PROJECT> <FILES>...          Upload images as new layers
//!   sizesnapper remove <PROJECT> <IMAGE>          Delete a layer
//!   sizesnapper transform <PROJECT> <IMAGE> ...   Move, scale, nudge, or drag a layer
//!   sizesnapper preview <PROJECT>                 Render the interactive view to PNG
//!   sizesnapper export <PROJECT>                  Export canvas-sized PNGs

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use sizesnapper_common::config::AppConfig;
use sizesnapper_common::error::SnapperError;

mod commands;

#[derive(Parser)]
#[command(
    name = "sizesnapper",
    about = "Arrange images on a fixed-size canvas and export them at exact dimensions",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Store directory (overrides the configured one)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new empty project
    New {
        /// Project name
        name: String,

        /// Canvas width in pixels
        #[arg(short = 'W', long, default_value = "1080")]
        width: u32,

        /// Canvas height in pixels
        #[arg(short = 'H', long, default_value = "1080")]
        height: u32,
    },

    /// List projects, most recently changed first
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show project information
    Info {
        /// Project id, id prefix, or exact name
        project: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Rename a project
    Rename {
        project: String,
        name: String,
    },

    /// Change a project's canvas dimensions
    Resize {
        project: String,

        #[arg(short = 'W', long)]
        width: u32,

        #[arg(short = 'H', long)]
        height: u32,
    },

    /// Delete a project and all of its images
    Delete {
        project: String,
    },

    /// Upload image files as new layers
    Add {
        project: String,

        /// Image files, stacked in the given order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Delete a layer
    Remove {
        project: String,

        /// Image id, id prefix, or file name
        image: String,
    },

    /// Change a layer's placement
    Transform {
        project: String,

        /// Image id, id prefix, or file name
        image: String,

        /// Absolute x offset in canvas pixels
        #[arg(long, allow_negative_numbers = true)]
        x: Option<f64>,

        /// Absolute y offset in canvas pixels
        #[arg(long, allow_negative_numbers = true)]
        y: Option<f64>,

        /// Scale as a factor (1.5) or percentage (150%), clamped to 1%..500%
        #[arg(long)]
        scale: Option<String>,

        /// Drag by DX DY canvas pixels, as a pointer would
        #[arg(long, num_args = 2, value_names = ["DX", "DY"], allow_negative_numbers = true)]
        drag: Option<Vec<f64>>,

        /// Arrow-key nudges: left, right, up, down (repeatable)
        #[arg(long)]
        nudge: Vec<String>,
    },

    /// Render the interactive view (padding, overflow, selection) to PNG
    Preview {
        project: String,

        /// Output PNG path
        #[arg(short, long, default_value = "preview.png")]
        output: PathBuf,

        /// Layer to show as selected
        #[arg(long)]
        select: Option<String>,

        /// Fit into a container of this size, e.g. 1280x800
        #[arg(long)]
        container: Option<String>,
    },

    /// Export canvas-sized PNGs
    Export {
        project: String,

        /// Output directory (defaults to the configured one)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export one image of all layers instead of one per image
        #[arg(long)]
        composite: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    sizesnapper_common::logging::init_logging(&config.logging);
    if let Some(store) = cli.store {
        config.store_dir = store;
    }

    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}

async fn run(command: Commands, config: &AppConfig) -> anyhow::Result<()> {
    let store = commands::open_store(config).await?;

    let result = match command {
        Commands::New {
            name,
            width,
            height,
        } => commands::new::run(&store, name, width, height).await,
        Commands::List { json } => commands::list::run(&store, json).await,
        Commands::Info { project, json } => {
            commands::info::run(&store, config, &project, json).await
        }
        Commands::Rename { project, name } => commands::rename::run(&store, &project, name).await,
        Commands::Resize {
            project,
            width,
            height,
        } => commands::rename::resize(&store, &project, width, height).await,
        Commands::Delete { project } => commands::delete::run(&store, &project).await,
        Commands::Add { project, files } => {
            commands::add::run(&store, config, &project, files).await
        }
        Commands::Remove { project, image } => {
            commands::remove::run(&store, config, &project, &image).await
        }
        Commands::Transform {
            project,
            image,
            x,
            y,
            scale,
            drag,
            nudge,
        } => {
            let edits = commands::transform::Edits {
                x,
                y,
                scale,
                drag: drag.map(|d| (d[0], d[1])),
                nudge,
            };
            commands::transform::run(&store, config, &project, &image, edits).await
        }
        Commands::Preview {
            project,
            output,
            select,
            container,
        } => commands::preview::run(&store, config, &project, output, select, container).await,
        Commands::Export {
            project,
            output,
            composite,
        } => {
            let output = output.unwrap_or_else(|| config.export.output_dir.clone());
            commands::export::run(&store, config, &project, output, composite).await
        }
    };

    if let Err(e) = commands::close_store(&store).await {
        tracing::warn!(error = %e, "Failed to close store");
    }
    result
}

fn report(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<SnapperError>() {
        Some(SnapperError::NotFound { kind, id }) => {
            eprintln!("No {kind} matches '{id}'.");
            eprintln!("Run `sizesnapper list` or `sizesnapper info <project>` to see what exists.");
            ExitCode::from(2)
        }
        Some(SnapperError::Validation { message }) => {
            eprintln!("Invalid input: {message}");
            ExitCode::from(2)
        }
        _ => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
