//! Analysis provider seam.
//!
//! The queue core delegates the actual imagery retrieval and index
//! computation to an external provider behind this trait. Core correctness
//! depends only on how success and failure are reported, not on what the
//! provider computes, so the whole analysis stack stays independently
//! testable.

use crate::job::AnalysisPayload;
use std::future::Future;

/// A failed analysis execution.
///
/// Carries a human-readable message that is retained on the job record when
/// attempts run out.
#[derive(Debug, Clone)]
pub struct AnalysisError {
    /// Human-readable error message.
    pub message: String,
}

impl AnalysisError {
    /// Creates a new analysis error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AnalysisError {}

/// Trait for async analysis providers.
///
/// Implementations retrieve satellite imagery for the payload's bounding box
/// and compute whatever derived products the caller asked for. The returned
/// value is opaque to the queue and stored verbatim on the completed job.
///
/// # Example
///
/// ```ignore
/// use fieldscan::provider::AnalysisProvider;
///
/// async fn run<P: AnalysisProvider>(provider: &P, payload: &AnalysisPayload) {
///     match provider.analyze(payload).await {
///         Ok(result) => println!("analysis done: {result}"),
///         Err(e) => eprintln!("analysis failed: {e}"),
///     }
/// }
/// ```
pub trait AnalysisProvider: Send + Sync + 'static {
    /// Runs one analysis.
    ///
    /// The worker enforces the wall-clock budget around this call; the
    /// provider does not need its own timeout.
    fn analyze(
        &self,
        payload: &AnalysisPayload,
    ) -> impl Future<Output = Result<serde_json::Value, AnalysisError>> + Send;

    /// Returns the provider name for logging.
    fn name(&self) -> &str;
}

impl<P: AnalysisProvider> AnalysisProvider for std::sync::Arc<P> {
    fn analyze(
        &self,
        payload: &AnalysisPayload,
    ) -> impl Future<Output = Result<serde_json::Value, AnalysisError>> + Send {
        (**self).analyze(payload)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_error_display() {
        let err = AnalysisError::new("scene unavailable");
        assert_eq!(format!("{}", err), "scene unavailable");
    }

    #[tokio::test]
    async fn test_arc_provider_delegates() {
        struct Fixed;

        impl AnalysisProvider for Fixed {
            async fn analyze(
                &self,
                _payload: &AnalysisPayload,
            ) -> Result<serde_json::Value, AnalysisError> {
                Ok(serde_json::json!(42))
            }

            fn name(&self) -> &str {
                "fixed"
            }
        }

        let provider = std::sync::Arc::new(Fixed);
        assert_eq!(provider.name(), "fixed");
    }
}
