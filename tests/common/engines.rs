// Scoring engine test doubles

use async_trait::async_trait;
use sluice::compute::{EngineError, ScoringEngine, SessionHandle, SessionOptions, Tensor};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// How the mock answers a run against a given model path
#[derive(Debug, Clone)]
pub enum Behavior {
    /// `[N, 1]` filled with one value
    Constant(f32),
    /// `[N, 1]` holding each row's first feature
    FirstFeature,
    /// Run fails
    Fail(String),
    /// Sleeps, then answers with `Constant`
    Delay(Duration, f32),
    /// Returns this tensor regardless of input
    Raw(Tensor),
}

struct MockSession {
    path: String,
}

/// Engine whose answers are scripted per model path
#[derive(Default)]
pub struct MockEngine {
    behaviors: HashMap<String, Behavior>,
    broken_paths: HashSet<String>,
    runs: AtomicUsize,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the answer for a model path
    pub fn with_model(mut self, path: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(path.to_string(), behavior);
        self
    }

    /// Session creation fails for this path
    pub fn with_broken_session(mut self, path: &str) -> Self {
        self.broken_paths.insert(path.to_string());
        self
    }

    /// Number of completed or failed run calls
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoringEngine for MockEngine {
    fn create_session(
        &self,
        model_path: &str,
        _options: &SessionOptions,
    ) -> Result<SessionHandle, EngineError> {
        if self.broken_paths.contains(model_path) {
            return Err(EngineError::Session(format!("cannot load {}", model_path)));
        }
        Ok(SessionHandle::new(MockSession {
            path: model_path.to_string(),
        }))
    }

    async fn run(
        &self,
        session: &SessionHandle,
        inputs: HashMap<String, Tensor>,
        output_names: &[String],
    ) -> Result<HashMap<String, Tensor>, EngineError> {
        self.runs.fetch_add(1, Ordering::SeqCst);

        let path = session
            .downcast_ref::<MockSession>()
            .map(|s| s.path.clone())
            .ok_or_else(|| EngineError::Run("foreign session".to_string()))?;
        let behavior = self
            .behaviors
            .get(&path)
            .cloned()
            .ok_or_else(|| EngineError::Run(format!("no behavior for {}", path)))?;
        let input = inputs
            .into_values()
            .next()
            .ok_or_else(|| EngineError::Run("no input tensor".to_string()))?;

        let rows = input.shape[0] as usize;
        let dim = input.shape[1] as usize;

        let output = match behavior {
            Behavior::Constant(value) => Tensor::new(vec![value; rows], vec![rows as i64, 1]),
            Behavior::FirstFeature => Tensor::new(
                input.data.chunks(dim).map(|row| row[0]).collect(),
                vec![rows as i64, 1],
            ),
            Behavior::Fail(message) => return Err(EngineError::Run(message)),
            Behavior::Delay(delay, value) => {
                tokio::time::sleep(delay).await;
                Tensor::new(vec![value; rows], vec![rows as i64, 1])
            }
            Behavior::Raw(tensor) => tensor,
        };

        let mut outputs = HashMap::new();
        if let Some(name) = output_names.first() {
            outputs.insert(name.clone(), output);
        }
        Ok(outputs)
    }
}

/// Engine that echoes the input under a wrong output name
pub struct WrongOutputEngine;

#[async_trait]
impl ScoringEngine for WrongOutputEngine {
    fn create_session(
        &self,
        model_path: &str,
        _options: &SessionOptions,
    ) -> Result<SessionHandle, EngineError> {
        Ok(SessionHandle::new(model_path.to_string()))
    }

    async fn run(
        &self,
        _session: &SessionHandle,
        inputs: HashMap<String, Tensor>,
        _output_names: &[String],
    ) -> Result<HashMap<String, Tensor>, EngineError> {
        let mut outputs = HashMap::new();
        for (_, tensor) in inputs {
            outputs.insert("logits".to_string(), tensor);
        }
        Ok(outputs)
    }
}
