//! Configuration for a slide-deck-to-mind-map run.
//!
//! Every knob lives in [`PipelineConfig`], built via [`PipelineConfigBuilder`].
//! Collaborators (generator, rasterizer, LLM provider) can be injected here as
//! trait objects; when they are absent the driver falls back to pdfium and an
//! edgequake-llm provider resolved from the environment.

use crate::error::MindmapError;
use crate::pipeline::llm::Generator;
use crate::pipeline::render::PageRasterizer;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Upper bound for [`PipelineConfig::max_retries`].
pub const MAX_RETRIES: u32 = 10;

/// Configuration for one pipeline run.
///
/// # Example
/// ```rust
/// use edgequake_mindmap::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .render_scale(1.5)
///     .api_timeout_secs(90)
///     .model("gpt-4o")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Zoom factor applied when rasterising a page (1.0 = 72 DPI). Range: 0.25–4.0. Default: 1.0.
    ///
    /// Slides are drawn for projection, so text is large and 1.0 is enough for
    /// a vision model to read them.
    pub render_scale: f32,

    /// Maximum rendered image dimension in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Upper bound on in-flight page summaries. Default: `None` (every page at once).
    pub concurrency: Option<usize>,

    /// Only summarise the first `max_pages` pages. Default: `None` (all pages).
    pub max_pages: Option<usize>,

    /// LLM model identifier, e.g. "gpt-4o". If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed generator. Takes precedence over every provider setting.
    pub generator: Option<Arc<dyn Generator>>,

    /// Pre-constructed rasterizer. Default: pdfium.
    pub rasterizer: Option<Arc<dyn PageRasterizer>>,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens per generation call. Default: 4095.
    ///
    /// The enrich step echoes the whole graph back, so this bounds how large the
    /// mind map can grow before responses are truncated.
    pub max_tokens: usize,

    /// Extra attempts per generation call on a backend error. Default: 0,
    /// at most [`MAX_RETRIES`].
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-generation-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Directory the exporter writes snapshots into. Default: `output`.
    pub output_dir: PathBuf,

    /// Write an export snapshot at the end of the run. Default: true.
    pub export: bool,

    /// Reconcile the model's topic assignment with the pages that exist. Default: true.
    pub repair_topics: bool,

    /// Re-insert nodes and edges the model dropped during an enrich step. Default: true.
    pub enforce_monotonic: bool,

    /// Optional per-stage progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            render_scale: 1.0,
            max_rendered_pixels: 2000,
            concurrency: None,
            max_pages: None,
            model: None,
            provider_name: None,
            provider: None,
            generator: None,
            rasterizer: None,
            temperature: 0.0,
            max_tokens: 4095,
            max_retries: 0,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            output_dir: PathBuf::from("output"),
            export: true,
            repair_topics: true,
            enforce_monotonic: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("render_scale", &self.render_scale)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("concurrency", &self.concurrency)
            .field("max_pages", &self.max_pages)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("generator", &self.generator.as_ref().map(|_| "<dyn Generator>"))
            .field("rasterizer", &self.rasterizer.as_ref().map(|_| "<dyn PageRasterizer>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("output_dir", &self.output_dir)
            .field("export", &self.export)
            .field("repair_topics", &self.repair_topics)
            .field("enforce_monotonic", &self.enforce_monotonic)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.25, 4.0);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = Some(n);
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = Some(n);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.config.generator = Some(generator);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(MAX_RETRIES);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn export(mut self, v: bool) -> Self {
        self.config.export = v;
        self
    }

    pub fn repair_topics(mut self, v: bool) -> Self {
        self.config.repair_topics = v;
        self
    }

    pub fn enforce_monotonic(mut self, v: bool) -> Self {
        self.config.enforce_monotonic = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, MindmapError> {
        let c = &self.config;
        if !(0.25..=4.0).contains(&c.render_scale) {
            return Err(MindmapError::InvalidConfig(format!(
                "render scale must be 0.25–4.0, got {}",
                c.render_scale
            )));
        }
        if c.concurrency == Some(0) {
            return Err(MindmapError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.max_pages == Some(0) {
            return Err(MindmapError::InvalidConfig("max_pages must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(MindmapError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
