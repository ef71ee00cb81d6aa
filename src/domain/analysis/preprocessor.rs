//! Preprocessor - turns a candidate into render configuration.

use serde_json::{json, Map, Value as JsonValue};

use super::Candidate;
use crate::domain::foundation::DomainError;
use crate::domain::query::QueryContext;

/// Render-stage transform for one visualization tag.
///
/// The returned object becomes an output entry; its `config` key, if any,
/// is replaced by the candidate itself.
pub trait Preprocessor: Send + Sync {
    fn preprocess(
        &self,
        qdata: &QueryContext,
        candidate: &Candidate,
    ) -> Result<Map<String, JsonValue>, DomainError>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Used for candidates whose visualization has no registered preprocessor.
///
/// Produces `{visualization, title, datasets}` where `datasets` lists the
/// query's output names.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPreprocessor;

impl Preprocessor for DefaultPreprocessor {
    fn preprocess(
        &self,
        qdata: &QueryContext,
        candidate: &Candidate,
    ) -> Result<Map<String, JsonValue>, DomainError> {
        let mut out = Map::new();
        out.insert("visualization".into(), json!(candidate.visualization));
        out.insert("title".into(), json!(candidate.title));
        out.insert("datasets".into(), json!(qdata.keys()));
        Ok(out)
    }

    fn name(&self) -> &str {
        "default"
    }
}

/// Adapts a closure into a [`Preprocessor`].
pub struct FnPreprocessor<F> {
    name: String,
    f: F,
}

pub fn preprocessor_fn<F>(name: impl Into<String>, f: F) -> FnPreprocessor<F>
where
    F: Fn(&QueryContext, &Candidate) -> Result<Map<String, JsonValue>, DomainError> + Send + Sync,
{
    FnPreprocessor {
        name: name.into(),
        f,
    }
}

impl<F> Preprocessor for FnPreprocessor<F>
where
    F: Fn(&QueryContext, &Candidate) -> Result<Map<String, JsonValue>, DomainError> + Send + Sync,
{
    fn preprocess(
        &self,
        qdata: &QueryContext,
        candidate: &Candidate,
    ) -> Result<Map<String, JsonValue>, DomainError> {
        (self.f)(qdata, candidate)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
