//! Export canvas-sized PNGs.

use std::path::PathBuf;

use sizesnapper_common::config::AppConfig;
use sizesnapper_render_engine::{
    DirectorySink, ExportOutcome, ExportProgress, ExportScope, ExportStage,
};

use super::{open_session, Store};

pub async fn run(
    store: &Store,
    config: &AppConfig,
    needle: &str,
    output: PathBuf,
    composite: bool,
) -> anyhow::Result<()> {
    let session = open_session(store, config, needle).await?;
    let scope = if composite {
        ExportScope::Composite
    } else {
        ExportScope::EachImage
    };
    let sink = DirectorySink::new(&output);

    let progress = |p: ExportProgress| {
        if p.stage == ExportStage::Rendering {
            eprintln!("  rendered {}/{}", p.completed, p.total);
        }
    };

    println!(
        "Exporting '{}' at {}x{}...",
        session.project().name,
        session.project().canvas_width,
        session.project().canvas_height
    );
    let outcome = session.export(scope, &sink, Some(&progress)).await?;

    match outcome {
        ExportOutcome::Nothing => {
            println!("Nothing to export: the project has no images.");
        }
        ExportOutcome::Single { file_name } => {
            println!("Export complete: {}", sink.file_path(&file_name).display());
        }
        ExportOutcome::Bundle { bundle_name, files } => {
            println!(
                "Export complete: {} files in {}",
                files,
                sink.bundle_path(&bundle_name).display()
            );
        }
    }

    session.close();
    Ok(())
}
