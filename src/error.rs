//! Error types for the edgequake-mindmap library.
//!
//! Errors are split by how far they are allowed to travel:
//!
//! * [`MindmapError`] is **fatal**: the run cannot produce a result at all
//!   (missing file, zero pages, nothing to segment, provider not configured).
//!   Returned as `Err(MindmapError)` from the `run_pipeline*` entry points.
//!
//! * [`PageError`] is **unit-level**: one page failed to render or summarise.
//!   Converted into a placeholder summary by Stage 1; never propagated.
//!
//! * [`GenerationError`]: a single generation call failed. Each stage decides
//!   what that means (placeholder, fallback topic, skipped graph step).
//!
//! * [`ParseError`]: model output was not the JSON we asked for. Carries the
//!   raw text so logs show exactly what the model returned.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-mindmap library.
#[derive(Debug, Error)]
pub enum MindmapError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but has zero bytes.
    #[error("PDF file is empty: '{path}'")]
    EmptyFile { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Document errors ───────────────────────────────────────────────────
    /// The rasterizer reported zero pages.
    #[error("Document '{path}' has no pages")]
    EmptyDocument { path: PathBuf },

    /// The rasterizer could not open the document to count its pages.
    #[error("Document '{path}' could not be read: {detail}")]
    UnreadableDocument { path: PathBuf, detail: String },

    /// Segmentation was reached with no page summaries to work from.
    #[error("No page summaries available for topic segmentation")]
    NoInputData,

    // ── Generation errors ─────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the export artifact.
    #[error("Failed to write export file '{path}': {source}")]
    ExportWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not read or decode a previously exported artifact.
    #[error("Failed to load export file '{path}': {detail}")]
    ExportLoadFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MindmapError {
    /// Whether a Stage 1 failure must abort the run.
    ///
    /// Only document-level problems are fatal. Anything else raised while
    /// collecting page summaries leaves the summaries empty and lets the
    /// driver carry on.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, MindmapError::Internal(_))
    }
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// Generation call failed after retries.
    #[error("Page {page}: generation failed after {retries} retries: {detail}")]
    GenerationFailed {
        page: usize,
        retries: u32,
        detail: String,
    },

    /// Generation call timed out.
    #[error("Page {page}: generation timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },

    /// The page's task panicked or was cancelled before it settled.
    #[error("Page {page}: task failed: {detail}")]
    TaskFailed { page: usize, detail: String },
}

impl PageError {
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. }
            | PageError::GenerationFailed { page, .. }
            | PageError::Timeout { page, .. }
            | PageError::TaskFailed { page, .. } => *page,
        }
    }
}

/// A failed call to a [`crate::pipeline::llm::Generator`].
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// The backend returned an error.
    #[error("{0}")]
    Backend(String),

    /// The call did not finish within the configured timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Every attempt failed; carries the last backend error.
    #[error("failed after {retries} retries: {last}")]
    RetriesExhausted { retries: u32, last: String },
}

/// Generation output could not be decoded as the requested JSON.
#[derive(Debug, Clone, Error)]
#[error("Could not parse structured response: {reason}")]
pub struct ParseError {
    pub reason: String,
    /// The complete, untrimmed text the model returned.
    pub raw: String,
}
