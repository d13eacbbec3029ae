/*
 * engine/typst_cli.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * TypesetEngine backed by the typst command-line compiler.
 */

//! [`TypesetEngine`] that drives the `typst` binary.
//!
//! The resource namespace is a private scratch directory: mapping `/x.typ`
//! writes `<workspace>/x.typ`. A compile runs
//! `typst compile --format svg` with one output file per page and merges the
//! pages into a single document whose pages are `<g class="typst-page">`
//! groups carrying their declared size.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use typeview_error_reporting::{DiagnosticSource, parse_line};
use typeview_system_runtime::{SystemRuntime, TempDir, join_relative};
use typeview_xml::{XmlElement, XmlNode};

use super::error::EngineError;
use super::traits::{CompileOutcome, TypesetEngine, VectorDocument};
use crate::layout::{self, PAGE_CLASS};

const FONT_DIR: &str = ".fonts";
const OUTPUT_DIR: &str = ".out";

struct CliSession {
    binary: PathBuf,
    workspace: TempDir,
    version: String,
}

/// Engine that shells out to `typst`.
pub struct TypstCliEngine {
    runtime: Arc<dyn SystemRuntime>,
    configured_binary: Option<PathBuf>,
    session: OnceLock<CliSession>,
    package_path: Mutex<Option<PathBuf>>,
    has_fonts: AtomicBool,
}

impl TypstCliEngine {
    /// Create an engine. `binary` overrides discovery via `TYPST_BIN` and
    /// `PATH`.
    pub fn new(runtime: Arc<dyn SystemRuntime>, binary: Option<PathBuf>) -> Self {
        Self {
            runtime,
            configured_binary: binary,
            session: OnceLock::new(),
            package_path: Mutex::new(None),
            has_fonts: AtomicBool::new(false),
        }
    }

    /// Version reported by the binary, once bootstrapped.
    pub fn version(&self) -> Option<&str> {
        self.session.get().map(|session| session.version.as_str())
    }

    fn session(&self) -> Result<&CliSession, EngineError> {
        self.session.get().ok_or(EngineError::NotReady)
    }

    fn workspace_path(&self, path: &str) -> Result<PathBuf, EngineError> {
        let session = self.session()?;
        Ok(join_relative(
            session.workspace.path(),
            path.trim_start_matches('/'),
        )?)
    }

    fn write_file(&self, path: &str, contents: &[u8]) -> Result<(), EngineError> {
        let target = self.workspace_path(path)?;
        if let Some(parent) = target.parent() {
            self.runtime.dir_create(parent, true)?;
        }
        self.runtime.file_write(&target, contents)?;
        Ok(())
    }

    fn locate_binary(&self) -> Result<PathBuf, EngineError> {
        if let Some(binary) = &self.configured_binary {
            if self.runtime.is_file(binary).unwrap_or(false) {
                return Ok(binary.clone());
            }
            return Err(EngineError::bootstrap(format!(
                "typst binary not found at {}",
                binary.display()
            )));
        }
        self.runtime
            .find_binary("typst", "TYPST_BIN")
            .ok_or_else(|| EngineError::bootstrap("typst binary not found (set TYPST_BIN or add typst to PATH)"))
    }

    /// Arguments shared by every `typst compile` invocation.
    fn compile_args(&self, session: &CliSession, main_path: &str) -> Result<Vec<String>, EngineError> {
        let workspace = session.workspace.path();
        let mut args = vec![
            "compile".to_string(),
            "--root".to_string(),
            workspace.display().to_string(),
            "--diagnostic-format".to_string(),
            "short".to_string(),
        ];
        if self.has_fonts.load(Ordering::Acquire) {
            args.push("--font-path".to_string());
            args.push(workspace.join(FONT_DIR).display().to_string());
        }
        if let Ok(package_path) = self.package_path.lock() {
            if let Some(path) = package_path.as_ref() {
                args.push("--package-path".to_string());
                args.push(path.display().to_string());
            }
        }
        args.push(self.workspace_path(main_path)?.display().to_string());
        Ok(args)
    }

    fn reset_output_dir(&self, session: &CliSession) -> Result<PathBuf, EngineError> {
        let out = session.workspace.path().join(OUTPUT_DIR);
        if self.runtime.is_dir(&out).unwrap_or(false) {
            self.runtime.dir_remove(&out, true)?;
        }
        self.runtime.dir_create(&out, true)?;
        Ok(out)
    }
}

#[async_trait]
impl TypesetEngine for TypstCliEngine {
    fn name(&self) -> &str {
        "typst-cli"
    }

    async fn bootstrap(&self) -> Result<(), EngineError> {
        if self.session.get().is_some() {
            return Ok(());
        }

        let binary = self.locate_binary()?;
        let output = self
            .runtime
            .exec_command(&binary, &["--version".to_string()], None)
            .await?;
        if !output.success() {
            return Err(EngineError::bootstrap(format!(
                "{} --version failed: {}",
                binary.display(),
                output.stderr_string().trim()
            )));
        }
        let version = output.stdout_string().trim().to_string();

        let workspace = self.runtime.temp_dir("typeview")?;
        tracing::debug!(
            binary = %binary.display(),
            version = %version,
            workspace = %workspace.path().display(),
            "typst CLI bootstrapped"
        );

        // A concurrent bootstrap that won the race keeps its session.
        let _ = self.session.set(CliSession {
            binary,
            workspace,
            version,
        });
        Ok(())
    }

    async fn load_font(&self, name: &str, bytes: Vec<u8>) -> Result<(), EngineError> {
        let file_name = Path::new(name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| EngineError::other(format!("Invalid font name: {}", name)))?;
        self.write_file(&format!("{}/{}", FONT_DIR, file_name), &bytes)?;
        self.has_fonts.store(true, Ordering::Release);
        Ok(())
    }

    async fn load_package_registry(&self, path: &Path) -> Result<(), EngineError> {
        if !self.runtime.is_dir(path).unwrap_or(false) {
            return Err(EngineError::other(format!(
                "Package registry not found: {}",
                path.display()
            )));
        }
        if let Ok(mut package_path) = self.package_path.lock() {
            *package_path = Some(path.to_path_buf());
        }
        Ok(())
    }

    async fn map_text(&self, path: &str, content: &str) -> Result<(), EngineError> {
        self.write_file(path, content.as_bytes())
    }

    async fn map_binary(&self, path: &str, bytes: &[u8]) -> Result<(), EngineError> {
        self.write_file(path, bytes)
    }

    async fn unmap(&self, path: &str) -> Result<(), EngineError> {
        let target = self.workspace_path(path)?;
        match self.runtime.file_remove(&target) {
            Err(e) if !e.is_not_found() => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn compile(&self, main_path: &str) -> Result<CompileOutcome, EngineError> {
        let session = self.session()?;
        let out = self.reset_output_dir(session)?;

        let mut args = self.compile_args(session, main_path)?;
        args.push("--format".to_string());
        args.push("svg".to_string());
        args.push(out.join("page-{0p}.svg").display().to_string());

        let output = self
            .runtime
            .exec_command(&session.binary, &args, Some(session.workspace.path()))
            .await?;
        let stderr = output.stderr_string();

        if !output.success() {
            let report = if stderr.trim().is_empty() {
                format!("typst exited with code {}", output.code)
            } else {
                stderr
            };
            return Ok(CompileOutcome::failure(DiagnosticSource::Text(report)));
        }

        let mut pages = Vec::new();
        for entry in self.runtime.dir_list(&out)? {
            let is_svg = entry.extension().is_some_and(|ext| ext == "svg");
            if is_svg {
                pages.push(self.runtime.file_read_string(&entry)?);
            }
        }
        if pages.is_empty() {
            return Ok(CompileOutcome::failure(DiagnosticSource::from(
                "typst produced no pages",
            )));
        }

        let markup = merge_pages(&pages)?;
        let outcome = CompileOutcome::success(VectorDocument::from_markup(markup));

        // Successful compiles may still report warnings. Hint lines that
        // follow a warning are not diagnostics of their own.
        let warnings: Vec<&str> = stderr
            .lines()
            .filter(|line| parse_line(line).is_some())
            .collect();
        if warnings.is_empty() {
            Ok(outcome)
        } else {
            Ok(outcome.with_diagnostics(DiagnosticSource::Text(warnings.join("\n"))))
        }
    }

    async fn render_svg(&self, document: &VectorDocument) -> Result<String, EngineError> {
        if document.payload.trim().is_empty() {
            return Err(EngineError::render("empty document"));
        }
        Ok(document.payload.clone())
    }

    async fn render_pdf(&self, main_path: &str) -> Result<Vec<u8>, EngineError> {
        let session = self.session()?;
        let out = self.reset_output_dir(session)?;
        let target = out.join("document.pdf");

        let mut args = self.compile_args(session, main_path)?;
        args.push("--format".to_string());
        args.push("pdf".to_string());
        args.push(target.display().to_string());

        let output = self
            .runtime
            .exec_command(&session.binary, &args, Some(session.workspace.path()))
            .await?;
        if !output.success() {
            return Err(EngineError::process(output.code, &output.stderr_string()));
        }
        Ok(self.runtime.file_read(&target)?)
    }
}

/// Merge per-page SVG files into one document of stacked page groups.
fn merge_pages(pages: &[String]) -> Result<String, EngineError> {
    let mut root = XmlElement::new("svg").with_attribute("class", "typst-doc");
    let mut offset = 0.0;
    let mut max_width: f64 = 0.0;

    for (index, page) in pages.iter().enumerate() {
        let doc = typeview_xml::parse(page)
            .map_err(|e| EngineError::render(format!("page {}: {}", index + 1, e)))?;
        let (width, height) = layout::declared_size(&doc.root);

        if index == 0 {
            for attribute in &doc.root.attributes {
                let name = attribute.qualified_name();
                if name == "xmlns" || name.starts_with("xmlns:") {
                    root.set_attribute(&name, attribute.value.clone());
                }
            }
        }

        let mut group = XmlElement::new("g")
            .with_attribute("class", PAGE_CLASS)
            .with_attribute("transform", format!("translate(0, {})", offset))
            .with_attribute("data-page-width", width.to_string())
            .with_attribute("data-page-height", height.to_string());
        group.children = doc.root.children;
        root.push_child(XmlNode::Element(group));

        offset += height;
        max_width = max_width.max(width);
    }

    root.set_attribute("viewBox", format!("0 0 {} {}", max_width, offset));
    root.set_attribute("width", max_width.to_string());
    root.set_attribute("height", offset.to_string());
    Ok(root.to_xml_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use typeview_system_runtime::NativeRuntime;

    const PAGE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" viewBox="0 0 595.28 841.89" width="595.28pt" height="841.89pt"><path d="M 0 0"/></svg>"#;

    #[test]
    fn test_merge_pages_stacks_groups() {
        let merged = merge_pages(&[PAGE.to_string(), PAGE.to_string()]).unwrap();
        let doc = typeview_xml::parse(&merged).unwrap();

        assert_eq!(doc.root.get_attribute("xmlns"), Some("http://www.w3.org/2000/svg"));
        assert!(doc.root.get_attribute("xmlns:xlink").is_some());

        let pages = doc.root.descendants_with_class(PAGE_CLASS);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].get_attribute("transform"), Some("translate(0, 0)"));
        assert_eq!(pages[1].get_attribute("transform"), Some("translate(0, 841.89)"));
        assert_eq!(pages[1].get_attribute("data-page-width"), Some("595.28"));
        assert_eq!(pages[0].get_children("path").len(), 1);

        let meta = layout::page_meta(&merged);
        assert_eq!(meta.len(), 2);
        assert_eq!(meta[0].height, 841.89);
    }

    #[test]
    fn test_merge_pages_rejects_malformed_page() {
        let err = merge_pages(&["<svg><g></svg>".to_string()]).unwrap_err();
        assert!(matches!(err, EngineError::Render(_)));
    }

    #[tokio::test]
    async fn test_mapping_before_bootstrap_is_not_ready() {
        let engine = TypstCliEngine::new(Arc::new(NativeRuntime::new()), None);
        let err = engine.map_text("/main.typ", "= Hi").await.unwrap_err();
        assert!(err.is_not_ready());
        assert!(engine.version().is_none());
    }

    #[tokio::test]
    async fn test_missing_configured_binary_fails_bootstrap() {
        let engine = TypstCliEngine::new(
            Arc::new(NativeRuntime::new()),
            Some(PathBuf::from("/definitely/not/typst")),
        );
        let err = engine.bootstrap().await.unwrap_err();
        assert!(matches!(err, EngineError::Bootstrap(_)));
        assert!(err.to_string().contains("/definitely/not/typst"));
    }

    #[tokio::test]
    async fn test_render_svg_returns_payload() {
        let engine = TypstCliEngine::new(Arc::new(NativeRuntime::new()), None);
        let doc = VectorDocument::from_markup("<svg/>");
        assert_eq!(engine.render_svg(&doc).await.unwrap(), "<svg/>");
        assert!(engine.render_svg(&VectorDocument::from_markup("")).await.is_err());
    }
}
