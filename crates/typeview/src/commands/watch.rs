//! Watch command - recompile whenever the template changes
//!
//! Filesystem events are coalesced by notify-debouncer-mini and classified
//! against the template layout. Edits to the primary document feed the
//! compile debouncer directly; edits to auxiliary documents or assets
//! re-register resources first, then recompile the current source.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::RecursiveMode;
use notify_debouncer_mini::{DebouncedEvent, Debouncer, new_debouncer};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use typeview_core::{CompileStatus, PreviewConfig};

use super::{EngineArgs, default_svg_path, open_session_with};

/// Coalescing window for raw filesystem events. Compile debouncing happens
/// downstream, so this only needs to absorb editor save bursts.
const FS_DEBOUNCE_MS: u64 = 100;

pub struct WatchArgs {
    pub dir: PathBuf,
    pub output: Option<PathBuf>,
    pub debounce: Option<u64>,
    pub engine: EngineArgs,
}

pub fn execute(args: WatchArgs) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(watch(args))
}

/// What a changed path means for the preview.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplateChange {
    /// The primary document was edited.
    Primary,
    /// An auxiliary document or asset was added, edited, or removed.
    Resource(PathBuf),
}

/// Watches a template directory and reports classified changes.
struct TemplateWatcher {
    _debouncer: Debouncer<notify::RecommendedWatcher>,
    event_rx: mpsc::UnboundedReceiver<TemplateChange>,
}

impl TemplateWatcher {
    fn new(root: &Path, config: &PreviewConfig, ignore: Option<PathBuf>) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let classifier = Classifier::new(root, config, ignore);

        let mut debouncer = new_debouncer(
            Duration::from_millis(FS_DEBOUNCE_MS),
            move |res: std::result::Result<Vec<DebouncedEvent>, notify::Error>| match res {
                Ok(events) => {
                    for event in events {
                        let Some(change) = classifier.classify(&event.path) else {
                            continue;
                        };
                        debug!(path = %event.path.display(), ?change, "Template change detected");
                        if event_tx.send(change).is_err() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Filesystem watch error");
                }
            },
        )
        .context("Failed to create filesystem watcher")?;

        debouncer
            .watcher()
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", root.display()))?;

        Ok(Self {
            _debouncer: debouncer,
            event_rx,
        })
    }

    async fn recv(&mut self) -> Option<TemplateChange> {
        self.event_rx.recv().await
    }
}

/// Maps paths under the template root to [`TemplateChange`]s.
#[derive(Debug, Clone)]
struct Classifier {
    primary: PathBuf,
    assets: PathBuf,
    root: PathBuf,
    config: PreviewConfig,
    ignore: Option<PathBuf>,
}

impl Classifier {
    fn new(root: &Path, config: &PreviewConfig, ignore: Option<PathBuf>) -> Self {
        Self {
            primary: root.join(&config.main_file),
            assets: root.join(&config.assets_dir),
            root: root.to_path_buf(),
            config: config.clone(),
            ignore,
        }
    }

    fn classify(&self, path: &Path) -> Option<TemplateChange> {
        if self.ignore.as_deref() == Some(path) {
            return None;
        }
        if path == self.primary {
            return Some(TemplateChange::Primary);
        }

        let name = path.file_name()?.to_str()?;
        if path.parent() == Some(self.root.as_path()) {
            let is_document = path
                .extension()
                .is_some_and(|ext| ext == self.config.document_extension());
            return is_document.then(|| TemplateChange::Resource(path.to_path_buf()));
        }
        if path.parent() == Some(self.assets.as_path()) && self.config.is_asset(name) {
            return Some(TemplateChange::Resource(path.to_path_buf()));
        }
        None
    }
}

async fn watch(args: WatchArgs) -> Result<()> {
    let debounce = args.debounce;
    let session = open_session_with(&args.dir, &args.engine, |config| {
        if let Some(ms) = debounce {
            config.debounce_ms = ms;
        }
    })?;
    let source = session.start().await?;
    let output = args.output.unwrap_or_else(|| default_svg_path(&session));

    let mut watcher = TemplateWatcher::new(session.root(), session.config(), Some(output.clone()))?;
    let writer = tokio::spawn(write_previews(session.subscribe(), output.clone()));

    let debouncer = session.spawn_debouncer();
    debouncer.notify(source);

    info!(
        root = %session.root().display(),
        output = %output.display(),
        debounce_ms = session.config().debounce_ms,
        "Watching template (Ctrl-C to stop)"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            change = watcher.recv() => {
                let Some(change) = change else { break };
                if let TemplateChange::Resource(path) = &change {
                    debug!(path = %path.display(), "Re-registering resources");
                    if let Err(e) = session.register_resources().await {
                        warn!(error = %e, "Failed to register resources");
                        continue;
                    }
                }
                if !debouncer.notify(session.loader().load_primary_document()) {
                    break;
                }
            }
        }
    }

    info!("Stopping");
    debouncer.close().await;
    writer.abort();
    Ok(())
}

/// Write the composited SVG after every successful commit and report
/// failures.
async fn write_previews(
    mut states: tokio::sync::watch::Receiver<typeview_core::CompileState>,
    output: PathBuf,
) {
    while states.changed().await.is_ok() {
        let state = states.borrow_and_update().clone();
        match state.status {
            CompileStatus::Succeeded => {
                let Some(layout) = state.output else { continue };
                match tokio::fs::write(&output, &layout.markup).await {
                    Ok(()) => info!(
                        path = %output.display(),
                        pages = layout.pages.len(),
                        warnings = state.warnings.len(),
                        "Updated preview"
                    ),
                    Err(e) => warn!(path = %output.display(), error = %e, "Failed to write preview"),
                }
            }
            CompileStatus::Failed => {
                if let Some(message) = state.error() {
                    error!(diagnostics = state.diagnostics.len(), "Compile failed:\n{}", message);
                }
            }
            CompileStatus::Idle | CompileStatus::Compiling => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new(
            Path::new("/tpl"),
            &PreviewConfig::default(),
            Some(PathBuf::from("/tpl/main.svg")),
        )
    }

    #[test]
    fn test_classify_primary_document() {
        assert_eq!(
            classifier().classify(Path::new("/tpl/main.typ")),
            Some(TemplateChange::Primary)
        );
    }

    #[test]
    fn test_classify_auxiliary_documents_and_assets() {
        let classifier = classifier();
        assert_eq!(
            classifier.classify(Path::new("/tpl/lib.typ")),
            Some(TemplateChange::Resource(PathBuf::from("/tpl/lib.typ")))
        );
        assert_eq!(
            classifier.classify(Path::new("/tpl/assets/logo.PNG")),
            Some(TemplateChange::Resource(PathBuf::from("/tpl/assets/logo.PNG")))
        );
    }

    #[test]
    fn test_classify_ignores_unrelated_paths() {
        let classifier = classifier();
        assert_eq!(classifier.classify(Path::new("/tpl/main.svg")), None);
        assert_eq!(classifier.classify(Path::new("/tpl/notes.txt")), None);
        assert_eq!(classifier.classify(Path::new("/tpl/assets/notes.txt")), None);
        assert_eq!(classifier.classify(Path::new("/tpl/nested/lib.typ")), None);
        // Matches the loader, which only lists exact-case documents
        assert_eq!(classifier.classify(Path::new("/tpl/LIB.TYP")), None);
        assert_eq!(classifier.classify(Path::new("/tpl/assets/deep/logo.png")), None);
    }

    #[derive(Clone, Default)]
    struct CapturedLog(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLog {
        type Writer = CapturedLog;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_failed_compile_is_logged_as_error() {
        let log = CapturedLog::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(log.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let temp = tempfile::tempdir().unwrap();
        let output = temp.path().join("main.svg");
        let (tx, rx) = tokio::sync::watch::channel(typeview_core::CompileState::default());
        tx.send_replace(typeview_core::CompileState {
            status: CompileStatus::Failed,
            diagnostics: vec![typeview_error_reporting::Diagnostic::new(
                typeview_error_reporting::Severity::Error,
                3,
                5,
                "unknown variable: titel",
            )],
            ..Default::default()
        });
        drop(tx);

        write_previews(rx, output.clone()).await;

        let logged = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("ERROR"));
        assert!(logged.contains("unknown variable: titel"));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_watcher_reports_primary_edit() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        let main = root.join("main.typ");
        std::fs::write(&main, "= A").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut watcher = TemplateWatcher::new(&root, &PreviewConfig::default(), None).unwrap();
        std::fs::write(root.join("notes.txt"), "ignored").unwrap();
        std::fs::write(&main, "= B").unwrap();

        let change = tokio::time::timeout(Duration::from_secs(2), watcher.recv()).await;
        match change {
            Ok(Some(change)) => assert_eq!(change, TemplateChange::Primary),
            Ok(None) => panic!("Watcher stopped unexpectedly"),
            Err(_) => panic!("Timeout waiting for change"),
        }
    }
}
