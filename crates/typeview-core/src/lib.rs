//! Live preview pipeline for Typst documents
//!
//! This crate turns a template directory (a primary document, auxiliary
//! documents, and image assets) into display-ready, paginated SVG, and
//! exports it as PDF.
//!
//! # Architecture
//!
//! - [`ResourceLoader`] - Reads the primary document and auxiliary resources
//! - [`EngineAdapter`] - Owns a [`TypesetEngine`] for a session
//! - [`CompileOrchestrator`] - Compile state machine; [`Debouncer`] feeds it
//! - [`layout::composite`] - Page backgrounds, shadows, and vertical stacking
//! - [`Viewport`] - Zoom levels and jump-to-location scrolling
//! - [`ExportPackager`] - PDF export
//! - [`PreviewSession`] - All of the above wired together
//!
//! # Example
//!
//! ```ignore
//! use typeview_core::{PreviewConfig, PreviewSession, TypstCliEngine};
//! use typeview_system_runtime::NativeRuntime;
//!
//! let runtime = Arc::new(NativeRuntime::new());
//! let config = PreviewConfig::load(runtime.as_ref(), root)?;
//! let engine = Arc::new(TypstCliEngine::new(runtime.clone(), config.typst_binary.clone()));
//! let session = PreviewSession::new(engine, runtime, root, config);
//!
//! let source = session.start().await?;
//! session.compile(&source).await;
//! let preview = session.preview_state();
//! ```

pub mod compile;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod layout;
pub mod resources;
pub mod session;
pub mod viewport;

// Re-export commonly used types
pub use compile::{
    Commit, CompileObserver, CompileOrchestrator, CompileState, CompileStatus, Debouncer,
    NoopObserver, PreviewState, TracingObserver,
};
pub use config::{BUILTIN_FONTS, CONFIG_FILE_NAME, ConfigError, PreviewConfig};
pub use engine::{
    EngineAdapter, EngineError, EngineState, InitFailure, TypesetEngine, TypstCliEngine,
    VectorDocument,
};
pub use error::{Result, TypeviewError};
pub use export::{DirectoryTarget, DownloadTarget, ExportError, ExportPackager, ExportState};
pub use layout::{LayoutResult, PagePlacement};
pub use resources::{FALLBACK_CONTENT, ResourceLoader, ResourceSet};
pub use session::PreviewSession;
pub use viewport::{LocationLink, ScrollBehavior, ScrollSurface, Viewport, ZoomState};
