// src/inference.rs
//
// Gesture classifier. Consumed as a black box: a flattened clip window in,
// a label out. The ONNX implementation serializes calls on a mutex because
// an ort session needs `&mut` to run; every session shares one instance.

use crate::error::ClassifierError;
use crate::types::ClassifierConfig;
use ndarray::Array2;
use ort::{
    execution_providers::CUDAExecutionProvider,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub trait GestureClassifier: Send + Sync {
    /// Predict a label for a flattened window of `input_len()` values.
    fn predict(&self, features: &[f32]) -> Result<String, ClassifierError>;

    fn input_len(&self) -> usize;
}

pub struct OnnxGestureClassifier {
    session: Mutex<Session>,
    labels: Vec<String>,
    input_len: usize,
}

impl OnnxGestureClassifier {
    pub fn new(config: &ClassifierConfig, input_len: usize) -> Result<Self, ClassifierError> {
        info!("Initializing gesture classifier");
        info!("Model path: {}", config.model_path);

        if !Path::new(&config.model_path).exists() {
            return Err(ClassifierError::ModelLoad(format!(
                "{} not found",
                config.model_path
            )));
        }

        let mut builder =
            Session::builder().map_err(|e| ClassifierError::ModelLoad(e.to_string()))?;

        if config.use_cuda {
            info!("Enabling CUDA execution provider");
            builder = builder
                .with_execution_providers([CUDAExecutionProvider::default()
                    .with_device_id(0)
                    .build()])
                .map_err(|e| ClassifierError::ModelLoad(e.to_string()))?;
        }

        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .and_then(|b| b.with_intra_threads(config.num_threads.max(1)))
            .and_then(|b| b.with_inter_threads(1))
            .and_then(|b| b.commit_from_file(&config.model_path))
            .map_err(|e| ClassifierError::ModelLoad(e.to_string()))?;

        info!(
            "✓ Gesture classifier ready ({} labels, {} inputs)",
            config.labels.len(),
            input_len
        );

        Ok(Self {
            session: Mutex::new(session),
            labels: config.labels.clone(),
            input_len,
        })
    }
}

impl GestureClassifier for OnnxGestureClassifier {
    fn predict(&self, features: &[f32]) -> Result<String, ClassifierError> {
        if features.len() != self.input_len {
            return Err(ClassifierError::InputLength {
                expected: self.input_len,
                actual: features.len(),
            });
        }

        let array = Array2::from_shape_vec((1, features.len()), features.to_vec())
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        let input =
            Tensor::from_array(array).map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let output = {
            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![input])
                .map_err(|e| ClassifierError::Inference(e.to_string()))?;

            let first = &outputs[0];
            if let Ok((_, classes)) = first.try_extract_tensor::<i64>() {
                ModelOutput::ClassIndex(classes.first().copied())
            } else {
                let (_, scores) = first
                    .try_extract_tensor::<f32>()
                    .map_err(|e| ClassifierError::Inference(e.to_string()))?;
                ModelOutput::Scores(scores.to_vec())
            }
        };

        let label = output.resolve(&self.labels)?;
        debug!("Predicted gesture: {}", label);
        Ok(label)
    }

    fn input_len(&self) -> usize {
        self.input_len
    }
}

/// First output of the classifier graph: a class index (`int64`, as
/// exported for tree ensembles) or a row of class scores (`float`).
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    ClassIndex(Option<i64>),
    Scores(Vec<f32>),
}

impl ModelOutput {
    pub fn resolve(&self, labels: &[String]) -> Result<String, ClassifierError> {
        let index = match self {
            Self::ClassIndex(None) => return Err(ClassifierError::EmptyOutput),
            Self::ClassIndex(Some(idx)) => *idx,
            Self::Scores(scores) => scores
                .iter()
                .enumerate()
                .filter(|(_, s)| s.is_finite())
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(i, _)| i as i64)
                .ok_or(ClassifierError::EmptyOutput)?,
        };

        usize::try_from(index)
            .ok()
            .and_then(|i| labels.get(i))
            .cloned()
            .ok_or(ClassifierError::UnknownClass(index))
    }
}

/// Load the classifier once at startup. A missing or broken model is not
/// fatal: the service keeps detecting hands but never confirms gestures.
pub fn load_classifier(
    config: &ClassifierConfig,
    input_len: usize,
) -> Option<Arc<dyn GestureClassifier>> {
    match OnnxGestureClassifier::new(config, input_len) {
        Ok(classifier) => Some(Arc::new(classifier)),
        Err(ClassifierError::ModelLoad(reason)) => {
            warn!(
                "⚠️  Classifier unavailable ({}). Running without gesture confirmation.",
                reason
            );
            None
        }
        Err(e) => {
            error!("Failed to initialize classifier: {}", e);
            None
        }
    }
}
