// Batch translation of subtitle segments
//
// Segments are sent in consecutive batches, each batch one chat request with
// the units framed by a separator. Batches run strictly in order and a failed
// batch falls back to its original text without stopping the rest.

pub mod client;
pub mod framing;

use std::ops::Range;
use std::time::Duration;

use tracing::{debug, info, warn};

pub use client::{ChatMessage, ChatRequest, ChatTransport, HttpChatTransport, HttpReply, RetryPolicy};

use crate::config::TranslateConfig;
use crate::error::Result;
use crate::progress::ProgressSink;
use crate::segment::Segment;

/// A batch whose request failed after all retries.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    /// Zero-based batch number
    pub batch: usize,
    /// Positions of the affected segments in the input
    pub segments: Range<usize>,
    pub error: String,
}

/// Result of [`TranslationManager::translate_segments`]. `segments` always
/// has one entry per input segment, in input order.
#[derive(Debug, Clone, Default)]
pub struct TranslationOutcome {
    pub segments: Vec<Segment>,
    pub failed_batches: Vec<BatchFailure>,
}

impl TranslationOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed_batches.is_empty()
    }
}

pub struct TranslationManager {
    transport: Option<Box<dyn ChatTransport>>,
    model: String,
    target_language: String,
    temperature: f32,
    batch_size: usize,
    timeout: Duration,
    policy: RetryPolicy,
}

impl TranslationManager {
    /// Builds an HTTP-backed manager. Without an API key the manager is
    /// unavailable and passes segments through untouched.
    pub fn new(config: &TranslateConfig) -> Result<Self> {
        let transport: Option<Box<dyn ChatTransport>> = match config.resolve_api_key() {
            Some(key) => Some(Box::new(HttpChatTransport::new(config.endpoint.clone(), key)?)),
            None => None,
        };
        Ok(Self::build(config, transport))
    }

    /// Uses the given transport regardless of any configured key.
    pub fn with_transport(config: &TranslateConfig, transport: Box<dyn ChatTransport>) -> Self {
        Self::build(config, Some(transport))
    }

    fn build(config: &TranslateConfig, transport: Option<Box<dyn ChatTransport>>) -> Self {
        Self {
            transport,
            model: config.model.clone(),
            target_language: config.target_language.clone(),
            temperature: config.temperature,
            batch_size: config.batch_size.max(1),
            timeout: Duration::from_secs(config.timeout_secs),
            policy: RetryPolicy::from_config(config),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn is_available(&self) -> bool {
        self.transport.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are a professional subtitle translator. The user message contains subtitle units \
             separated by the line '{marker}'. Translate every unit into {language}. Keep exactly \
             the same number of units in the same order, separated by the same '{marker}' lines. \
             Output ONLY the translated units, with no explanations or commentary.",
            marker = framing::MARKER,
            language = self.target_language,
        )
    }

    /// Translates the text of `segments`, producing new segments with the
    /// same timing. The input is never modified.
    pub async fn translate_segments(
        &self,
        segments: &[Segment],
        progress: &dyn ProgressSink,
    ) -> TranslationOutcome {
        let Some(transport) = self.transport.as_deref() else {
            warn!("No translation API key configured, skipping translation");
            return TranslationOutcome {
                segments: segments.to_vec(),
                failed_batches: Vec::new(),
            };
        };
        if segments.is_empty() {
            return TranslationOutcome::default();
        }

        let batch_count = segments.len().div_ceil(self.batch_size);
        info!(
            "Translating {} segments in {} batches with {}",
            segments.len(),
            batch_count,
            self.model
        );
        progress.set_total(batch_count as u64);

        let mut outcome = TranslationOutcome {
            segments: Vec::with_capacity(segments.len()),
            failed_batches: Vec::new(),
        };

        for (batch_index, batch) in segments.chunks(self.batch_size).enumerate() {
            let first = batch_index * self.batch_size;
            progress.message(&format!("batch {}/{}", batch_index + 1, batch_count));

            match self.translate_batch(transport, batch).await {
                Ok(slots) => {
                    outcome.segments.extend(batch.iter().zip(slots).map(|(segment, slot)| {
                        let mut translated = segment.clone();
                        if let Some(text) = slot {
                            translated.text = text;
                        }
                        translated
                    }));
                }
                Err(e) => {
                    warn!("Batch {} failed, keeping original text: {}", batch_index + 1, e);
                    outcome.segments.extend_from_slice(batch);
                    outcome.failed_batches.push(BatchFailure {
                        batch: batch_index,
                        segments: first..first + batch.len(),
                        error: e.to_string(),
                    });
                }
            }
            progress.advance(1);
        }

        progress.finish();
        outcome
    }

    async fn translate_batch(
        &self,
        transport: &dyn ChatTransport,
        batch: &[Segment],
    ) -> Result<Vec<Option<String>>> {
        let texts: Vec<&str> = batch.iter().map(|s| s.text.as_str()).collect();
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(self.system_prompt()),
                ChatMessage::user(framing::join_units(&texts)),
            ],
            temperature: self.temperature,
        };

        let reply = client::request_with_retry(transport, &self.policy, &request, self.timeout).await?;
        Ok(match reply {
            Some(content) => {
                debug!("Batch reply: {} chars", content.chars().count());
                framing::split_units(&content, batch.len())
            }
            None => {
                warn!("Translation service returned no content; keeping original text");
                vec![None; batch.len()]
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::client::MockChatTransport;
    use super::*;
    use crate::progress::NoProgress;
    use crate::progress::tests::RecordingProgress;

    fn config(batch_size: usize) -> TranslateConfig {
        TranslateConfig {
            api_key: None,
            api_key_env: "CUESMITH_TEST_UNSET_KEY".to_string(),
            batch_size,
            ..TranslateConfig::default()
        }
    }

    fn segments(n: usize) -> Vec<Segment> {
        (0..n)
            .map(|i| Segment::new(format!("Text {}", i + 1), i as f64, i as f64 + 0.5))
            .collect()
    }

    fn reply(content: &str) -> Result<HttpReply> {
        Ok(HttpReply {
            status: 200,
            body: serde_json::json!({ "choices": [{ "message": { "content": content } }] }).to_string(),
        })
    }

    fn manager(batch_size: usize, transport: MockChatTransport) -> TranslationManager {
        TranslationManager::with_transport(&config(batch_size), Box::new(transport))
            .with_retry_policy(RetryPolicy::immediate(1))
    }

    #[tokio::test]
    async fn test_unavailable_passes_through() {
        let manager = TranslationManager::new(&config(20)).unwrap();
        assert!(!manager.is_available());

        let input = segments(3);
        let outcome = manager.translate_segments(&input, &NoProgress).await;
        assert_eq!(outcome.segments, input);
        assert!(outcome.is_complete());
    }

    #[tokio::test]
    async fn test_one_request_per_batch() {
        let mut transport = MockChatTransport::new();
        let mut calls = 0;
        transport
            .expect_send()
            .withf(|request, _| request.messages[1].content.contains(framing::SEPARATOR))
            .times(2)
            .returning(move |_, _| {
                calls += 1;
                if calls == 1 {
                    reply("译1\n###SEG_SEP###\n译2\n###SEG_SEP###\n译3")
                } else {
                    reply("译4###SEG_SEP###译5")
                }
            });

        let input = segments(5);
        let progress = RecordingProgress::default();
        let outcome = manager(3, transport).translate_segments(&input, &progress).await;

        let texts: Vec<&str> = outcome.segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["译1", "译2", "译3", "译4", "译5"]);
        assert_eq!(outcome.segments[4].start, input[4].start);
        assert_eq!(input[0].text, "Text 1");
        assert_eq!(*progress.total.lock().unwrap(), 2);
        assert_eq!(*progress.done.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_short_reply_keeps_original_tail() {
        let mut transport = MockChatTransport::new();
        transport.expect_send().times(1).returning(|_, _| reply("只有一个"));

        let input = segments(3);
        let outcome = manager(20, transport).translate_segments(&input, &NoProgress).await;
        assert_eq!(outcome.segments.len(), 3);
        assert_eq!(outcome.segments[0].text, "只有一个");
        assert_eq!(outcome.segments[1].text, "Text 2");
        assert_eq!(outcome.segments[2].text, "Text 3");
        assert!(outcome.is_complete());
    }

    #[tokio::test]
    async fn test_failed_batch_falls_back_and_continues() {
        let mut transport = MockChatTransport::new();
        let mut calls = 0;
        transport.expect_send().times(3).returning(move |_, _| {
            calls += 1;
            if calls <= 2 {
                Ok(HttpReply { status: 500, body: "boom".to_string() })
            } else {
                reply("B1###SEG_SEP###B2")
            }
        });

        let input = segments(4);
        let outcome = manager(2, transport).translate_segments(&input, &NoProgress).await;
        let texts: Vec<&str> = outcome.segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Text 1", "Text 2", "B1", "B2"]);
        assert_eq!(outcome.failed_batches.len(), 1);
        assert_eq!(outcome.failed_batches[0].batch, 0);
        assert_eq!(outcome.failed_batches[0].segments, 0..2);
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_request() {
        let mut transport = MockChatTransport::new();
        transport.expect_send().times(0);
        let outcome = manager(20, transport).translate_segments(&[], &NoProgress).await;
        assert!(outcome.segments.is_empty());
    }

    #[tokio::test]
    async fn test_prompt_carries_model_and_language() {
        let mut transport = MockChatTransport::new();
        transport
            .expect_send()
            .withf(|request, timeout| {
                request.model == "custom-model"
                    && request.messages[0].content.contains("Simplified Chinese")
                    && *timeout == Duration::from_secs(7)
            })
            .times(1)
            .returning(|_, _| reply("好"));

        let outcome = manager(20, transport)
            .with_model("custom-model")
            .with_timeout(Duration::from_secs(7))
            .translate_segments(&segments(1), &NoProgress)
            .await;
        assert_eq!(outcome.segments[0].text, "好");
    }
}
