//! Mock converter for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::converter::{ConvertRequest, Converter, ConverterError};

/// A recorded conversion request for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedConversion {
    /// The request that was submitted.
    pub request: ConvertRequest,
    /// Whether the conversion succeeded.
    pub success: bool,
}

/// How the mock should fail, if at all.
#[derive(Debug, Clone)]
enum FailureMode {
    None,
    /// Fail every conversion with this message.
    Always(String),
    /// Fail the next N conversions with this message.
    Times(u32, String),
}

/// Mock implementation of the [`Converter`] trait.
///
/// Provides controllable behavior for testing:
/// - Track conversion requests for assertions
/// - Script failures (once, N times, or always)
/// - Control the produced output bytes
/// - Simulate conversion latency
#[derive(Debug, Clone)]
pub struct MockConverter {
    conversions: Arc<RwLock<Vec<RecordedConversion>>>,
    failure_mode: Arc<RwLock<FailureMode>>,
    output_payload: Arc<RwLock<Vec<u8>>>,
    conversion_delay_ms: Arc<RwLock<u64>>,
}

impl Default for MockConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConverter {
    /// Create a new mock converter that succeeds with a small fixed output.
    pub fn new() -> Self {
        Self {
            conversions: Arc::new(RwLock::new(Vec::new())),
            failure_mode: Arc::new(RwLock::new(FailureMode::None)),
            output_payload: Arc::new(RwLock::new(b"converted output".to_vec())),
            conversion_delay_ms: Arc::new(RwLock::new(0)),
        }
    }

    /// Get all recorded conversions.
    pub async fn recorded_conversions(&self) -> Vec<RecordedConversion> {
        self.conversions.read().await.clone()
    }

    /// Get the number of conversions attempted.
    pub async fn conversion_count(&self) -> usize {
        self.conversions.read().await.len()
    }

    /// Make every subsequent conversion fail with the given message.
    pub async fn fail_always(&self, message: impl Into<String>) {
        *self.failure_mode.write().await = FailureMode::Always(message.into());
    }

    /// Make the next `count` conversions fail, then succeed again.
    pub async fn fail_times(&self, count: u32, message: impl Into<String>) {
        *self.failure_mode.write().await = FailureMode::Times(count, message.into());
    }

    /// Clear any scripted failures.
    pub async fn clear_failures(&self) {
        *self.failure_mode.write().await = FailureMode::None;
    }

    /// Set the bytes written as conversion output.
    pub async fn set_output_payload(&self, payload: impl Into<Vec<u8>>) {
        *self.output_payload.write().await = payload.into();
    }

    /// Set the simulated conversion duration.
    pub async fn set_conversion_delay(&self, delay: Duration) {
        *self.conversion_delay_ms.write().await = delay.as_millis() as u64;
    }

    async fn take_failure(&self) -> Option<String> {
        let mut mode = self.failure_mode.write().await;
        match &*mode {
            FailureMode::None => None,
            FailureMode::Always(msg) => Some(msg.clone()),
            FailureMode::Times(remaining, msg) => {
                let msg = msg.clone();
                if *remaining <= 1 {
                    *mode = FailureMode::None;
                } else {
                    *mode = FailureMode::Times(remaining - 1, msg.clone());
                }
                Some(msg)
            }
        }
    }
}

#[async_trait]
impl Converter for MockConverter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn convert(&self, request: ConvertRequest) -> Result<PathBuf, ConverterError> {
        let delay_ms = *self.conversion_delay_ms.read().await;
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        if let Some(message) = self.take_failure().await {
            self.conversions.write().await.push(RecordedConversion {
                request,
                success: false,
            });
            return Err(ConverterError::conversion_failed(message, None));
        }

        let output = request.default_output_path();
        let payload = self.output_payload.read().await.clone();
        tokio::fs::write(&output, &payload).await?;

        self.conversions.write().await.push(RecordedConversion {
            request,
            success: true,
        });

        Ok(output)
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;

    fn request(temp: &tempfile::TempDir, id: &str) -> ConvertRequest {
        ConvertRequest {
            job_id: id.to_string(),
            input_path: temp.path().join("input.jpg"),
            source_format: Format::Jpg,
            target_format: Format::Png,
            output_dir: temp.path().to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_successful_conversion_writes_payload() {
        let temp = tempfile::tempdir().unwrap();
        let converter = MockConverter::new();
        converter.set_output_payload(b"png bytes".to_vec()).await;

        let output = converter.convert(request(&temp, "job-1")).await.unwrap();
        assert_eq!(tokio::fs::read(&output).await.unwrap(), b"png bytes");
        assert_eq!(converter.conversion_count().await, 1);
        assert!(converter.recorded_conversions().await[0].success);
    }

    #[tokio::test]
    async fn test_fail_times_then_recover() {
        let temp = tempfile::tempdir().unwrap();
        let converter = MockConverter::new();
        converter.fail_times(2, "transient").await;

        assert!(converter.convert(request(&temp, "a")).await.is_err());
        assert!(converter.convert(request(&temp, "b")).await.is_err());
        assert!(converter.convert(request(&temp, "c")).await.is_ok());

        let recorded = converter.recorded_conversions().await;
        assert_eq!(recorded.len(), 3);
        assert!(!recorded[0].success);
        assert!(!recorded[1].success);
        assert!(recorded[2].success);
    }

    #[tokio::test]
    async fn test_fail_always() {
        let temp = tempfile::tempdir().unwrap();
        let converter = MockConverter::new();
        converter.fail_always("codec missing").await;

        for id in ["a", "b", "c"] {
            let err = converter.convert(request(&temp, id)).await.unwrap_err();
            assert!(err.to_string().contains("codec missing"));
        }
        assert_eq!(converter.conversion_count().await, 3);
    }
}
