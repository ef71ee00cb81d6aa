//! Analyzer - folds query data into candidate visualizations.

use async_trait::async_trait;

use super::{AccessorRegistry, AnalysisResults};
use crate::domain::foundation::DomainError;
use crate::domain::query::QueryContext;

/// One stage of the analysis fold.
///
/// Implementations must:
/// - Return only their own contribution; the pipeline merges it into `prior`
/// - Return an empty map when the data shape disqualifies them
/// - Be deterministic for a given `qdata`
///
/// Statistics should be read through `accessors` so repeated passes over the
/// same series hit the cache.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(
        &self,
        qdata: &QueryContext,
        accessors: &AccessorRegistry,
        prior: &AnalysisResults,
    ) -> Result<AnalysisResults, DomainError>;

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Adapts a synchronous closure into an [`Analyzer`].
pub struct FnAnalyzer<F> {
    name: String,
    f: F,
}

/// Builds an analyzer from a closure.
///
/// ```ignore
/// engine.register_analyzer(analyzer_fn("count", |qdata, _, _| {
///     Ok(AnalysisResults::new())
/// }));
/// ```
pub fn analyzer_fn<F>(name: impl Into<String>, f: F) -> FnAnalyzer<F>
where
    F: Fn(&QueryContext, &AccessorRegistry, &AnalysisResults) -> Result<AnalysisResults, DomainError>
        + Send
        + Sync,
{
    FnAnalyzer {
        name: name.into(),
        f,
    }
}

#[async_trait]
impl<F> Analyzer for FnAnalyzer<F>
where
    F: Fn(&QueryContext, &AccessorRegistry, &AnalysisResults) -> Result<AnalysisResults, DomainError>
        + Send
        + Sync,
{
    async fn analyze(
        &self,
        qdata: &QueryContext,
        accessors: &AccessorRegistry,
        prior: &AnalysisResults,
    ) -> Result<AnalysisResults, DomainError> {
        (self.f)(qdata, accessors, prior)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::Candidate;
    use serde_json::json;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn Analyzer) {}

    #[tokio::test]
    async fn closure_analyzer_sees_prior_results() {
        let analyzer = analyzer_fn("echo", |_, _, prior: &AnalysisResults| {
            let mut out = AnalysisResults::new();
            out.insert(
                "count".into(),
                Candidate::new(1.0, "Count", "text", json!(prior.len())),
            );
            Ok(out)
        });

        let mut prior = AnalysisResults::new();
        prior.insert("a".into(), Candidate::new(1.0, "A", "x", json!(null)));

        let out = analyzer
            .analyze(&QueryContext::default(), &AccessorRegistry::new(), &prior)
            .await
            .unwrap();
        assert_eq!(out["count"].config, json!(1));
        assert_eq!(analyzer.name(), "echo");
    }
}
