//! Generation capability: the message type, the [`Generator`] seam, and the
//! edgequake-llm backed implementation.
//!
//! Every stage talks to the model through [`generate_with_policy`], which
//! applies the per-call timeout and the configured retry/backoff. Retries
//! are off by default (`max_retries = 0`); a timeout counts as a failed
//! attempt.

use crate::config::PipelineConfig;
use crate::error::GenerationError;
use crate::pipeline::encode;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Who a message is from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

/// One entry of the ordered message sequence sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub text: String,
    /// PNG bytes of an inline image, if any.
    pub image: Option<Vec<u8>>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            text: text.into(),
            image: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            image: None,
        }
    }

    pub fn user_image(png: Vec<u8>) -> Self {
        Self {
            role: Role::User,
            text: String::new(),
            image: Some(png),
        }
    }
}

/// Turns an ordered list of messages into generated text.
///
/// No guarantee is made that the text is valid JSON, or anything else.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, messages: &[Message]) -> Result<String, GenerationError>;
}

/// [`Generator`] backed by an edgequake-llm provider.
pub struct LlmGenerator {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(&self, messages: &[Message]) -> Result<String, GenerationError> {
        let chat = to_chat_messages(messages);
        let start = Instant::now();
        let response = self
            .provider
            .chat(&chat, Some(&self.options))
            .await
            .map_err(|e| GenerationError::Backend(e.to_string()))?;
        debug!(
            "{} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

/// Map our messages onto edgequake-llm chat messages.
///
/// Images ride on a user message; an image message with no text yields a
/// user turn whose only content is the picture.
fn to_chat_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|m| match (m.role, &m.image) {
            (Role::System, _) => ChatMessage::system(m.text.as_str()),
            (Role::User, Some(png)) => {
                ChatMessage::user_with_images(m.text.as_str(), vec![encode::encode_png(png)])
            }
            (Role::User, None) => ChatMessage::user(m.text.as_str()),
        })
        .collect()
}

/// Build `CompletionOptions` from the pipeline config.
fn build_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt - 1)`, saturating.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    if base == 0 {
        return 0;
    }
    2u64.checked_pow(attempt.saturating_sub(1))
        .and_then(|m| base.checked_mul(m))
        .unwrap_or(u64::MAX)
}

/// Run one generation call under the configured timeout and retry policy.
///
/// `label` identifies the call in logs ("page 3", "segmentation", "topic 2").
pub async fn generate_with_policy(
    generator: &dyn Generator,
    messages: &[Message],
    config: &PipelineConfig,
    label: &str,
) -> Result<String, GenerationError> {
    let limit = Duration::from_secs(config.api_timeout_secs);
    let mut last_err: Option<GenerationError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                label, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let err = match timeout(limit, generator.generate(messages)).await {
            Ok(Ok(text)) => return Ok(text),
            Ok(Err(e)) => e,
            Err(_) => GenerationError::Timeout {
                secs: config.api_timeout_secs,
            },
        };
        warn!("{}: attempt {} failed: {}", label, attempt + 1, err);
        last_err = Some(err);
    }

    match last_err {
        Some(err) if config.max_retries == 0 => Err(err),
        Some(err) => Err(GenerationError::RetriesExhausted {
            retries: config.max_retries,
            last: err.to_string(),
        }),
        None => Err(GenerationError::Backend("no attempt was made".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_RETRIES;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Generator for Flaky {
        async fn generate(&self, _messages: &[Message]) -> Result<String, GenerationError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(GenerationError::Backend(format!("HTTP 503 #{n}")))
            } else {
                Ok("ok".into())
            }
        }
    }

    struct Hangs;

    #[async_trait]
    impl Generator for Hangs {
        async fn generate(&self, _messages: &[Message]) -> Result<String, GenerationError> {
            sleep(Duration::from_secs(3600)).await;
            Ok("late".into())
        }
    }

    #[test]
    fn build_options_defaults() {
        let config = PipelineConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(4095));
    }

    #[test]
    fn message_constructors() {
        assert_eq!(Message::system("s").role, Role::System);
        let img = Message::user_image(vec![1, 2, 3]);
        assert_eq!(img.role, Role::User);
        assert_eq!(img.image.as_deref(), Some(&[1u8, 2, 3][..]));
    }

    #[tokio::test]
    async fn no_retry_by_default() {
        let g = Flaky {
            failures: 1,
            calls: AtomicUsize::new(0),
        };
        let err = generate_with_policy(&g, &[], &PipelineConfig::default(), "test")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Backend(_)));
        assert_eq!(g.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let g = Flaky {
            failures: 2,
            calls: AtomicUsize::new(0),
        };
        let config = PipelineConfig::builder()
            .max_retries(2)
            .retry_backoff_ms(1)
            .build()
            .unwrap();
        let text = generate_with_policy(&g, &[], &config, "test").await.unwrap();
        assert_eq!(text, "ok");
        assert_eq!(g.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_exhausted_reports_last_error() {
        let g = Flaky {
            failures: 10,
            calls: AtomicUsize::new(0),
        };
        let config = PipelineConfig::builder()
            .max_retries(1)
            .retry_backoff_ms(1)
            .build()
            .unwrap();
        let err = generate_with_policy(&g, &[], &config, "test").await.unwrap_err();
        match err {
            GenerationError::RetriesExhausted { retries, last } => {
                assert_eq!(retries, 1);
                assert!(last.contains("#1"), "got: {last}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(backoff_ms(500, 1), 500);
        assert_eq!(backoff_ms(500, 3), 2000);
        assert_eq!(backoff_ms(500, 63), u64::MAX);
        assert_eq!(backoff_ms(1, 200), u64::MAX);
        assert_eq!(backoff_ms(0, 200), 0);
    }

    #[tokio::test]
    async fn large_retry_count_exhausts_without_overflow() {
        let g = Flaky {
            failures: usize::MAX,
            calls: AtomicUsize::new(0),
        };
        let config = PipelineConfig::builder()
            .max_retries(70)
            .retry_backoff_ms(0)
            .build()
            .unwrap();
        let err = generate_with_policy(&g, &[], &config, "test").await.unwrap_err();
        match err {
            GenerationError::RetriesExhausted { retries, .. } => {
                assert_eq!(retries, MAX_RETRIES);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(g.calls.load(Ordering::SeqCst), MAX_RETRIES as usize + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_call_times_out() {
        let config = PipelineConfig::builder().api_timeout_secs(5).build().unwrap();
        let err = generate_with_policy(&Hangs, &[], &config, "test")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Timeout { secs: 5 }));
    }
}
