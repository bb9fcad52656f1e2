//! The lazy render pipeline.
//!
//! [`Generator::resolve`] turns a request path into a [`Resolution`]:
//!
//! 1. Decompose the path; anything that is not `.png`/`.svg`/`.pdf` passes through.
//! 2. Locate the source document (`name.md` and/or `name.mmd` per [`SourceMode`]).
//! 3. Without a source, fall back to an existing plain file or report it missing.
//! 4. If the artifact is stale, take the per-artifact lock, re-check, extract
//!    the diagram block for markdown sources, and run the renderer.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

pub use mmdgen_config::SourceMode;
use mmdgen_config::Config;

use crate::consts::{DIAGRAM_EXTENSION, MARKDOWN_EXTENSION};
use crate::error::RenderError;
use crate::extract::extract;
use crate::format::OutputFormat;
use crate::invoker::Renderer;
use crate::lock::RenderLocks;
use crate::staleness::{StalenessMode, artifact_is_stale};
use crate::url::{DecomposedPath, decompose};

/// Settings for [`Generator`], fixed at startup.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Directory holding sources and artifacts.
    pub root: PathBuf,
    /// Which source documents are considered.
    pub source: SourceMode,
    /// Artifact invalidation policy.
    pub staleness: StalenessMode,
    /// Fence tag of the diagram block in markdown sources.
    pub diagram_tag: String,
    /// Render the whole markdown document when it has no diagram block.
    pub fallback_to_document: bool,
    /// Width used when the request carries no size.
    pub default_width: u32,
    /// Height used when the request carries no size.
    pub default_height: u32,
}

impl GeneratorConfig {
    /// Take the content settings and default dimensions from a loaded config.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let content = &config.content_resolved;
        Self {
            root: content.root.clone(),
            source: content.source,
            staleness: content.staleness,
            diagram_tag: content.diagram_tag.clone(),
            fallback_to_document: content.fallback_to_document,
            default_width: config.renderer.width,
            default_height: config.renderer.height,
        }
    }
}

/// Outcome of resolving a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Not a diagram request.
    Passthrough,
    /// Diagram request with neither a source nor an existing file.
    Missing,
    /// No source, but the requested file exists and is served as-is.
    Static(PathBuf),
    /// The cached artifact is up to date.
    Fresh(PathBuf),
    /// The artifact was (re)rendered by this call.
    Rendered(PathBuf),
}

impl Resolution {
    /// Artifact to serve, if any.
    #[must_use]
    pub fn artifact(&self) -> Option<&Path> {
        match self {
            Self::Static(path) | Self::Fresh(path) | Self::Rendered(path) => Some(path),
            Self::Passthrough | Self::Missing => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    /// Pure diagram definition, fed to the renderer directly.
    Diagram,
    /// Markdown document with an embedded diagram block.
    Markdown,
}

#[derive(Debug)]
struct Source {
    path: PathBuf,
    kind: SourceKind,
    mtime: SystemTime,
}

/// Resolves request paths to artifacts, rendering them on demand.
pub struct Generator {
    config: GeneratorConfig,
    renderer: Renderer,
    locks: RenderLocks,
}

impl Generator {
    /// Create a generator over `config.root` using `renderer`.
    #[must_use]
    pub fn new(config: GeneratorConfig, renderer: Renderer) -> Self {
        Self {
            config,
            renderer,
            locks: RenderLocks::new(),
        }
    }

    /// Generator settings.
    #[must_use]
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Resolve `request_path` (relative to the root, leading `/` optional),
    /// rendering the artifact if it is missing or stale.
    ///
    /// Paths escaping the root resolve to [`Resolution::Missing`].
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] if the source cannot be inspected, the diagram
    /// block cannot be extracted, or the renderer fails. Errors never degrade
    /// into serving a stale artifact.
    pub async fn resolve(&self, request_path: &str) -> Result<Resolution, RenderError> {
        let rel = request_path.trim_start_matches('/');
        let parsed = decompose(rel);

        if OutputFormat::from_extension(parsed.extension).is_none() {
            return Ok(Resolution::Passthrough);
        }
        if !is_safe_relative(rel) {
            tracing::debug!(path = %request_path, "Rejected path outside content root");
            return Ok(Resolution::Missing);
        }

        let artifact = self.config.root.join(parsed.to_path());

        let Some(source) = self.find_source(parsed.base).await? else {
            return Ok(if is_file(&artifact).await {
                Resolution::Static(artifact)
            } else {
                Resolution::Missing
            });
        };

        if !self.is_stale(&source, &artifact).await? {
            tracing::debug!(artifact = %artifact.display(), "Artifact is fresh");
            return Ok(Resolution::Fresh(artifact));
        }

        let _guard = self.locks.acquire(&artifact).await;

        // Another request may have rendered it while we waited for the lock.
        if !self.is_stale(&source, &artifact).await? {
            tracing::debug!(artifact = %artifact.display(), "Artifact rendered by concurrent request");
            return Ok(Resolution::Fresh(artifact));
        }

        let input = self.prepare_input(&source, parsed.base).await?;
        let (width, height) = self.dimensions(&parsed);
        tracing::info!(
            path = %request_path,
            source = %source.path.display(),
            width = %width,
            height = %height,
            "Artifact stale, rendering"
        );
        self.renderer
            .render(&artifact, &input, &width, &height)
            .await?;

        Ok(Resolution::Rendered(artifact))
    }

    /// Find the first existing source document for `base`.
    async fn find_source(&self, base: &str) -> Result<Option<Source>, RenderError> {
        let candidates: &[SourceKind] = match self.config.source {
            SourceMode::Auto => &[SourceKind::Markdown, SourceKind::Diagram],
            SourceMode::Diagram => &[SourceKind::Diagram],
            SourceMode::Markdown => &[SourceKind::Markdown],
        };

        for &kind in candidates {
            let extension = match kind {
                SourceKind::Diagram => DIAGRAM_EXTENSION,
                SourceKind::Markdown => MARKDOWN_EXTENSION,
            };
            let path = self.config.root.join(format!("{base}.{extension}"));
            if let Some(mtime) = stat_source(&path).await? {
                return Ok(Some(Source { path, kind, mtime }));
            }
        }

        Ok(None)
    }

    async fn is_stale(&self, source: &Source, artifact: &Path) -> Result<bool, RenderError> {
        artifact_is_stale(self.config.staleness, source.mtime, artifact)
            .await
            .map_err(|e| RenderError::io(artifact, e))
    }

    /// Path of the file handed to the renderer as `-i`.
    async fn prepare_input(&self, source: &Source, base: &str) -> Result<PathBuf, RenderError> {
        if source.kind == SourceKind::Diagram {
            return Ok(source.path.clone());
        }

        let extracted = self
            .config
            .root
            .join(format!("{base}.{DIAGRAM_EXTENSION}"));
        match extract(&extracted, &source.path, &self.config.diagram_tag).await {
            Ok(()) => Ok(extracted),
            Err(RenderError::NoDiagramBlock { path, tag }) if self.config.fallback_to_document => {
                tracing::warn!(
                    source = %path.display(),
                    tag = %tag,
                    "No diagram block found, rendering the whole document"
                );
                Ok(source.path.clone())
            }
            Err(e) => Err(e),
        }
    }

    fn dimensions(&self, parsed: &DecomposedPath<'_>) -> (String, String) {
        match parsed.size {
            Some(size) => (size.width.to_owned(), size.height.to_owned()),
            None => (
                self.config.default_width.to_string(),
                self.config.default_height.to_string(),
            ),
        }
    }
}

/// Stat a candidate source; `None` if it does not exist as a file.
async fn stat_source(path: &Path) -> Result<Option<SystemTime>, RenderError> {
    let stat_error = |source| RenderError::SourceStat {
        path: path.to_path_buf(),
        source,
    };

    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => meta.modified().map(Some).map_err(stat_error),
        Ok(_) => Ok(None),
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
            Ok(None)
        }
        Err(e) => Err(stat_error(e)),
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file())
}

/// Whether `rel` stays inside the directory it is joined onto.
fn is_safe_relative(rel: &str) -> bool {
    Path::new(rel)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
