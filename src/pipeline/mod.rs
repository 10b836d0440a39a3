//! Pipeline stages and the collaborators they talk to.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ summarize ──▶ segment ──▶ accumulate ──▶ (export)
//! (path)    (fan-out)     (reduce)    (fold)
//! ```
//!
//! 1. [`input`] validates the document path
//! 2. [`summarize`] (Stage 1) runs one concurrent task per page, joined and sorted
//! 3. [`segment`] (Stage 2) groups all summaries into topics with one call
//! 4. [`accumulate`] (Stage 3) folds the topics into one graph, in order
//!
//! Supporting modules: [`render`] (rasterizer seam + pdfium), [`encode`]
//! (base64 image attachments), [`llm`] (generator seam + call policy) and
//! [`postprocess`] (summary cleanup).

pub mod accumulate;
pub mod encode;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod render;
pub mod segment;
pub mod summarize;
