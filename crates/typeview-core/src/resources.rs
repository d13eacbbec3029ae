/*
 * resources.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Template resource loading: primary document and auxiliary files.
 */

//! Resource loading for a template directory.
//!
//! A template directory holds the primary document (`main.typ`), auxiliary
//! documents next to it that the primary may `#import`, and image assets in an
//! `assets/` subdirectory. Loading never fails outright: a missing primary
//! document is replaced by [`FALLBACK_CONTENT`], and auxiliary files that
//! cannot be read are skipped with a warning.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use typeview_system_runtime::{RuntimeResult, SystemRuntime, join_relative};

use crate::config::PreviewConfig;

/// Document used when the primary document cannot be read.
pub const FALLBACK_CONTENT: &str = "#set page(paper: \"a4\", margin: 2cm)
#set text(size: 11pt)

= Document

Start typing your Typst content here.
";

/// Resources to register with the engine, keyed by absolute path (`/x.typ`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceSet {
    pub text_files: BTreeMap<String, String>,
    pub binary_files: BTreeMap<String, Vec<u8>>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a text file. The path is made absolute if it is not already.
    pub fn insert_text(&mut self, path: &str, content: impl Into<String>) {
        self.text_files.insert(absolute(path), content.into());
    }

    /// Insert a binary file. The path is made absolute if it is not already.
    pub fn insert_binary(&mut self, path: &str, bytes: Vec<u8>) {
        self.binary_files.insert(absolute(path), bytes);
    }

    pub fn is_empty(&self) -> bool {
        self.text_files.is_empty() && self.binary_files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.text_files.len() + self.binary_files.len()
    }
}

fn absolute(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

/// What a template directory offers, as paths relative to its root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceListing {
    /// Auxiliary documents, excluding the primary document.
    pub files: Vec<String>,
    /// Assets, as `<assets_dir>/<name>`.
    pub assets: Vec<String>,
}

/// Loads template resources through a [`SystemRuntime`].
pub struct ResourceLoader {
    runtime: Arc<dyn SystemRuntime>,
    root: PathBuf,
    config: PreviewConfig,
}

impl ResourceLoader {
    pub fn new(runtime: Arc<dyn SystemRuntime>, root: impl Into<PathBuf>, config: &PreviewConfig) -> Self {
        Self {
            runtime,
            root: root.into(),
            config: config.clone(),
        }
    }

    /// The template root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the primary document on disk.
    pub fn primary_path(&self) -> PathBuf {
        self.root.join(&self.config.main_file)
    }

    /// Read the primary document, falling back to [`FALLBACK_CONTENT`].
    pub fn load_primary_document(&self) -> String {
        match self.fetch_text(&self.config.main_file) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(
                    path = %self.primary_path().display(),
                    error = %e,
                    "Failed to load primary document; using fallback content"
                );
                FALLBACK_CONTENT.to_string()
            }
        }
    }

    /// List auxiliary documents and assets. Missing directories yield empty
    /// lists.
    pub fn list_resources(&self) -> ResourceListing {
        let mut listing = ResourceListing::default();

        let entries = match self.runtime.dir_list(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    path = %self.root.display(),
                    error = %e,
                    "Template directory not readable; no auxiliary resources"
                );
                return listing;
            }
        };

        let extension = self.config.document_extension();
        for entry in entries {
            let Some(name) = file_name(&entry) else {
                continue;
            };
            let is_document = name
                .rsplit_once('.')
                .is_some_and(|(_, ext)| ext == extension);
            if is_document
                && name != self.config.main_file
                && self.runtime.is_file(&entry).unwrap_or(false)
            {
                listing.files.push(name);
            }
        }

        let assets_dir = self.root.join(&self.config.assets_dir);
        match self.runtime.dir_list(&assets_dir) {
            Ok(entries) => {
                for entry in entries {
                    let Some(name) = file_name(&entry) else {
                        continue;
                    };
                    if self.config.is_asset(&name) && self.runtime.is_file(&entry).unwrap_or(false)
                    {
                        listing
                            .assets
                            .push(format!("{}/{}", self.config.assets_dir, name));
                    }
                }
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                tracing::warn!(path = %assets_dir.display(), error = %e, "Failed to list assets");
            }
        }

        listing.files.sort();
        listing.assets.sort();
        listing
    }

    /// Read a text resource by path relative to the template root.
    pub fn fetch_text(&self, relative: &str) -> RuntimeResult<String> {
        let path = join_relative(&self.root, relative)?;
        self.runtime.file_read_string(&path)
    }

    /// Read a binary resource by path relative to the template root.
    pub fn fetch_binary(&self, relative: &str) -> RuntimeResult<Vec<u8>> {
        let path = join_relative(&self.root, relative)?;
        self.runtime.file_read(&path)
    }

    /// Fetch every listed auxiliary resource, skipping any that fail.
    pub fn load_auxiliary_resources(&self) -> ResourceSet {
        let listing = self.list_resources();
        let mut resources = ResourceSet::new();

        for file in &listing.files {
            match self.fetch_text(file) {
                Ok(content) => resources.insert_text(file, content),
                Err(e) => {
                    tracing::warn!(file = %file, error = %e, "Failed to load template file");
                }
            }
        }

        for asset in &listing.assets {
            match self.fetch_binary(asset) {
                Ok(bytes) => resources.insert_binary(asset, bytes),
                Err(e) => {
                    tracing::warn!(asset = %asset, error = %e, "Failed to load asset");
                }
            }
        }

        tracing::debug!(
            text_files = resources.text_files.len(),
            binary_files = resources.binary_files.len(),
            "Loaded auxiliary resources"
        );
        resources
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use typeview_system_runtime::{NativeRuntime, RuntimeError};

    fn loader(root: &Path) -> ResourceLoader {
        ResourceLoader::new(Arc::new(NativeRuntime::new()), root, &PreviewConfig::default())
    }

    fn template() -> tempfile::TempDir {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("main.typ"), "= Main").unwrap();
        std::fs::write(temp.path().join("chapter.typ"), "= Chapter").unwrap();
        std::fs::write(temp.path().join("appendix.typ"), "= Appendix").unwrap();
        std::fs::write(temp.path().join("notes.md"), "not typst").unwrap();
        std::fs::create_dir(temp.path().join("assets")).unwrap();
        std::fs::write(temp.path().join("assets/logo.PNG"), [0x89, 0x50]).unwrap();
        std::fs::write(temp.path().join("assets/readme.txt"), "skip").unwrap();
        temp
    }

    #[test]
    fn test_listing_rules() {
        let temp = template();
        let listing = loader(temp.path()).list_resources();
        assert_eq!(listing.files, vec!["appendix.typ", "chapter.typ"]);
        assert_eq!(listing.assets, vec!["assets/logo.PNG"]);
    }

    #[test]
    fn test_missing_directories_yield_empty_listing() {
        let temp = tempfile::tempdir().unwrap();
        let missing = loader(&temp.path().join("nope"));
        assert_eq!(missing.list_resources(), ResourceListing::default());

        std::fs::write(temp.path().join("main.typ"), "").unwrap();
        let listing = loader(temp.path()).list_resources();
        assert!(listing.files.is_empty());
        assert!(listing.assets.is_empty());
    }

    #[test]
    fn test_primary_document_fallback() {
        let temp = tempfile::tempdir().unwrap();
        assert_eq!(loader(temp.path()).load_primary_document(), FALLBACK_CONTENT);

        std::fs::write(temp.path().join("main.typ"), "= Real").unwrap();
        assert_eq!(loader(temp.path()).load_primary_document(), "= Real");
    }

    #[test]
    fn test_auxiliary_resources_use_absolute_paths() {
        let temp = template();
        let resources = loader(temp.path()).load_auxiliary_resources();

        assert_eq!(resources.text_files.get("/chapter.typ").map(String::as_str), Some("= Chapter"));
        assert!(resources.text_files.contains_key("/appendix.typ"));
        assert!(!resources.text_files.contains_key("/main.typ"));
        assert_eq!(
            resources.binary_files.get("/assets/logo.PNG"),
            Some(&vec![0x89, 0x50])
        );
        assert_eq!(resources.len(), 3);
    }

    #[test]
    fn test_document_extension_is_case_sensitive() {
        let temp = template();
        std::fs::write(temp.path().join("NOTES.TYP"), "= Shouty").unwrap();
        let resources = loader(temp.path()).load_auxiliary_resources();
        assert!(!resources.text_files.contains_key("/NOTES.TYP"));
        assert_eq!(resources.len(), 3);
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let temp = template();
        // Invalid UTF-8 in a document file fails the text fetch only
        std::fs::write(temp.path().join("broken.typ"), [0xff, 0xfe]).unwrap();
        let resources = loader(temp.path()).load_auxiliary_resources();
        assert!(!resources.text_files.contains_key("/broken.typ"));
        assert!(resources.text_files.contains_key("/chapter.typ"));
    }

    #[test]
    fn test_fetch_rejects_escaping_paths() {
        let temp = template();
        let err = loader(temp.path()).fetch_text("../secret.typ").unwrap_err();
        assert!(matches!(err, RuntimeError::PathViolation(_)));
    }

    #[test]
    fn test_resource_set_normalizes_paths() {
        let mut set = ResourceSet::new();
        set.insert_text("chapter.typ", "x");
        set.insert_binary("/assets/a.png", vec![1]);
        assert!(set.text_files.contains_key("/chapter.typ"));
        assert!(set.binary_files.contains_key("/assets/a.png"));
        assert!(!set.is_empty());
    }
}
