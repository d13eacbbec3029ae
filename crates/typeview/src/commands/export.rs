//! Export command - compile a template to PDF

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use typeview_core::DirectoryTarget;

use super::{EngineArgs, open_session};

pub struct ExportArgs {
    pub dir: PathBuf,
    pub output: Option<PathBuf>,
    pub engine: EngineArgs,
}

pub fn execute(args: ExportArgs) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(export(args))
}

async fn export(args: ExportArgs) -> Result<()> {
    let session = open_session(&args.dir, &args.engine)?;
    let source = session.start().await?;

    let (dir, filename) = split_output(args.output.as_deref(), session.root());
    let target = DirectoryTarget::new(dir);
    let path = session
        .export_document(&source, filename.as_deref(), &target)
        .await
        .context("PDF export failed")?;

    println!("{}", path.display());
    Ok(())
}

/// Split `-o` into the target directory and the file name within it.
fn split_output(output: Option<&Path>, root: &Path) -> (PathBuf, Option<String>) {
    let Some(output) = output else {
        return (root.to_path_buf(), None);
    };
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let filename = output
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    (dir, filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_output_defaults_to_root() {
        let (dir, filename) = split_output(None, Path::new("/tmp/template"));
        assert_eq!(dir, PathBuf::from("/tmp/template"));
        assert_eq!(filename, None);
    }

    #[test]
    fn test_split_output_with_directory() {
        let (dir, filename) = split_output(Some(Path::new("out/report.pdf")), Path::new("/t"));
        assert_eq!(dir, PathBuf::from("out"));
        assert_eq!(filename.as_deref(), Some("report.pdf"));
    }

    #[test]
    fn test_split_output_bare_file_name() {
        let (dir, filename) = split_output(Some(Path::new("report.pdf")), Path::new("/t"));
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(filename.as_deref(), Some("report.pdf"));
    }
}
