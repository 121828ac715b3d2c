// Scoring engine boundary

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Errors raised by a scoring engine implementation.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("session creation failed: {0}")]
    Session(String),

    #[error("run failed: {0}")]
    Run(String),

    #[error("output node {0} missing from engine result")]
    MissingOutput(String),

    #[error("engine call timed out after {0:?}")]
    Timeout(Duration),
}

/// Dense row-major f32 tensor with an explicit shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    /// Shape
    pub shape: Vec<i64>,
    /// Row-major data
    pub data: Vec<f32>,
}

impl Tensor {
    /// Creates a tensor from flat data and shape
    pub fn new(data: Vec<f32>, shape: Vec<i64>) -> Self {
        Self { shape, data }
    }

    /// Rank of the tensor
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Element count implied by the shape, or `None` when a dimension is
    /// negative or the product overflows
    pub fn element_count(&self) -> Option<usize> {
        self.shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(usize::try_from(d).ok()?))
    }
}

/// Opaque handle to a session owned by the scoring engine.
///
/// Cloning is cheap; every clone refers to the same engine session, which the
/// engine must allow to run concurrently. The session is released when the
/// last handle is dropped.
#[derive(Clone)]
pub struct SessionHandle {
    id: u64,
    inner: Arc<dyn Any + Send + Sync>,
}

impl SessionHandle {
    /// Wraps an engine-specific session object
    pub fn new<T: Any + Send + Sync>(session: T) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            inner: Arc::new(session),
        }
    }

    /// Process-unique id, useful in logs
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Borrows the engine-specific session object
    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle").field("id", &self.id).finish()
    }
}

/// Graph optimisation level requested from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationLevel {
    Disabled,
    Basic,
    Extended,
    #[default]
    All,
}

/// Session creation hints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Threads used across operators
    pub inter_op_threads: usize,
    /// Threads used inside one operator
    pub intra_op_threads: usize,
    /// Optimisation level
    pub optimization: OptimizationLevel,
}

impl Default for SessionOptions {
    fn default() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            inter_op_threads: (cores / 2).max(1),
            intra_op_threads: cores,
            optimization: OptimizationLevel::All,
        }
    }
}

/// External numeric inference backend.
///
/// Implementations wrap a concrete runtime (ONNX Runtime, a remote scoring
/// service, a test double). Tensors handed to and returned from [`run`] are
/// owned values, so they are released on every exit path.
///
/// [`run`]: ScoringEngine::run
#[async_trait]
pub trait ScoringEngine: Send + Sync {
    /// Loads a model artifact and returns a shareable session handle.
    fn create_session(
        &self,
        model_path: &str,
        options: &SessionOptions,
    ) -> Result<SessionHandle, EngineError>;

    /// Runs the session, returning only the requested output nodes.
    async fn run(
        &self,
        session: &SessionHandle,
        inputs: HashMap<String, Tensor>,
        output_names: &[String],
    ) -> Result<HashMap<String, Tensor>, EngineError>;
}
