//! AnalysisPipeline - analyzers, then preprocessors.
//!
//! ```text
//! QueryContext ──▶ analyzer 1 ──▶ analyzer 2 ──▶ ... ──▶ AnalysisResults
//!                  (each sees the results so far)
//!
//! AnalysisResults ──▶ preprocessors[candidate.visualization] ──▶ QueryOutput
//!                     (or the default preprocessor)
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::analysis::{
    AccessorRegistry, AnalysisResults, Analyzer, DataTableAnalyzer, DataTablePreprocessor,
    DefaultPreprocessor, FieldAccessor, OutputEntry, Preprocessor, QueryOutput, StatValue,
};
use crate::domain::foundation::DomainError;
use crate::domain::query::{QueryContext, Series};

/// Shared analysis stages and statistics registry.
///
/// Registration may happen at any time; a run uses the analyzers and
/// preprocessors registered when it reaches that stage.
pub struct AnalysisPipeline {
    accessors: Arc<AccessorRegistry>,
    analyzers: RwLock<Vec<Arc<dyn Analyzer>>>,
    preprocessors: RwLock<HashMap<String, Arc<dyn Preprocessor>>>,
    default_preprocessor: Arc<dyn Preprocessor>,
}

impl AnalysisPipeline {
    /// Empty pipeline: no analyzers, default preprocessor only.
    pub fn new(accessors: Arc<AccessorRegistry>) -> Self {
        Self {
            accessors,
            analyzers: RwLock::new(Vec::new()),
            preprocessors: RwLock::new(HashMap::new()),
            default_preprocessor: Arc::new(DefaultPreprocessor),
        }
    }

    /// Pipeline with the built-in data table analyzer and preprocessor.
    pub fn with_defaults(max_series: usize, max_points: usize) -> Self {
        let pipeline = Self::new(Arc::new(AccessorRegistry::new()));
        pipeline.register_analyzer(Arc::new(DataTableAnalyzer::new(max_series, max_points)));
        pipeline.register_preprocessor(
            crate::domain::analysis::datatable::VISUALIZATION,
            Arc::new(DataTablePreprocessor),
        );
        pipeline
    }

    pub fn accessors(&self) -> &Arc<AccessorRegistry> {
        &self.accessors
    }

    /// Appends an analyzer to the fold.
    pub fn register_analyzer(&self, analyzer: Arc<dyn Analyzer>) {
        tracing::debug!(analyzer = analyzer.name(), "Registered analyzer");
        self.analyzers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(analyzer);
    }

    /// Sets the preprocessor for a visualization tag, replacing any previous one.
    pub fn register_preprocessor(&self, visualization: impl Into<String>, preprocessor: Arc<dyn Preprocessor>) {
        let visualization = visualization.into();
        tracing::debug!(%visualization, preprocessor = preprocessor.name(), "Registered preprocessor");
        self.preprocessors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(visualization, preprocessor);
    }

    /// Registers a statistic on every field accessor.
    pub fn set_query_prop<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(&FieldAccessor, &Series) -> StatValue + Send + Sync + 'static,
    {
        self.accessors.set_query_prop(name, f);
    }

    pub fn analyzer_count(&self) -> usize {
        self.analyzers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Folds every analyzer over `qdata`, merging each contribution.
    pub async fn analyze(&self, qdata: &QueryContext) -> Result<AnalysisResults, DomainError> {
        let analyzers: Vec<Arc<dyn Analyzer>> = self
            .analyzers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut results = AnalysisResults::new();
        for analyzer in analyzers {
            let contribution = analyzer
                .analyze(qdata, &self.accessors, &results)
                .await
                .map_err(|e| e.with_detail("analyzer", analyzer.name()))?;
            results.extend(contribution);
        }
        Ok(results)
    }

    /// Renders each candidate with the preprocessor for its visualization.
    pub fn preprocess(
        &self,
        qdata: &QueryContext,
        results: AnalysisResults,
    ) -> Result<QueryOutput, DomainError> {
        let mut output = QueryOutput::new();
        for (name, candidate) in results {
            let preprocessor = self.preprocessor_for(&candidate.visualization);
            let render = preprocessor
                .preprocess(qdata, &candidate)
                .map_err(|e| e.with_detail("preprocessor", preprocessor.name()))?;
            output.insert(name, OutputEntry::new(render, candidate));
        }
        Ok(output)
    }

    /// Both stages back to back.
    pub async fn run(&self, qdata: &QueryContext) -> Result<QueryOutput, DomainError> {
        let results = self.analyze(qdata).await?;
        self.preprocess(qdata, results)
    }

    fn preprocessor_for(&self, visualization: &str) -> Arc<dyn Preprocessor> {
        self.preprocessors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(visualization)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.default_preprocessor))
    }
}
