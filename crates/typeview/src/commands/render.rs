//! Render command - compile once and write the composited SVG

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use typeview_core::{Commit, CompileStatus};

use super::{EngineArgs, default_svg_path, open_session, report_diagnostics};

pub struct RenderArgs {
    pub dir: PathBuf,
    pub output: Option<PathBuf>,
    pub engine: EngineArgs,
}

pub fn execute(args: RenderArgs) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(render(args))
}

async fn render(args: RenderArgs) -> Result<()> {
    let session = open_session(&args.dir, &args.engine)?;
    let source = session.start().await?;

    let commit = session.compile(&source).await;
    let state = session.compile_state();
    if commit != Commit::Applied(CompileStatus::Succeeded) {
        report_diagnostics(&state, &source, &session.config().main_file);
        bail!("Compilation failed");
    }
    if !state.warnings.is_empty() {
        report_diagnostics(&state, &source, &session.config().main_file);
    }

    let Some(layout) = state.output else {
        bail!("Compilation produced no output");
    };
    let output = args.output.unwrap_or_else(|| default_svg_path(&session));
    std::fs::write(&output, &layout.markup)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    tracing::info!(
        path = %output.display(),
        pages = layout.pages.len(),
        width = layout.total_width,
        height = layout.total_height,
        "Wrote preview"
    );
    Ok(())
}
