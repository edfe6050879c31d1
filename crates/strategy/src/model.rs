use std::path::Path;
use std::sync::Arc;

use fxpilot_core::{Direction, FeatureVector, Signal};
use log::{debug, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Output classes, in the row order of `weights` and `biases`
pub const CLASSES: [Direction; 3] = [Direction::Sell, Direction::Hold, Direction::Buy];

/// Multinomial logistic classifier over a named feature subset.
///
/// Inputs are standardised with `(x - mean) / scale` before the linear
/// layer; confidence is the softmax probability of the winning class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub version: String,
    pub features: Vec<String>,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
    /// One row per class (SELL, HOLD, BUY), one column per feature
    pub weights: Vec<Vec<f64>>,
    pub biases: Vec<f64>,
}

impl ModelParams {
    pub fn validate(&self) -> Result<()> {
        let n = self.features.len();
        if n == 0 {
            return Err(Error::InvalidModel("no input features".into()));
        }
        if self.means.len() != n || self.scales.len() != n {
            return Err(Error::InvalidModel(format!(
                "expected {n} means/scales, got {}/{}",
                self.means.len(),
                self.scales.len()
            )));
        }
        if self.weights.len() != CLASSES.len() || self.biases.len() != CLASSES.len() {
            return Err(Error::InvalidModel(format!(
                "expected {} weight rows and biases",
                CLASSES.len()
            )));
        }
        if let Some(row) = self.weights.iter().position(|r| r.len() != n) {
            return Err(Error::InvalidModel(format!("weight row {row} has wrong width")));
        }
        if self.scales.iter().any(|s| !s.is_finite() || s.abs() < f64::EPSILON) {
            return Err(Error::InvalidModel("scales must be finite and non-zero".into()));
        }
        let all_finite = self
            .means
            .iter()
            .chain(self.biases.iter())
            .chain(self.weights.iter().flatten())
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(Error::InvalidModel("non-finite parameter".into()));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Class probabilities in `CLASSES` order
    pub fn probabilities(&self, features: &FeatureVector) -> Result<[f64; 3]> {
        let mut x = Vec::with_capacity(self.features.len());
        for (i, name) in self.features.iter().enumerate() {
            let raw = features
                .get(name)
                .ok_or_else(|| Error::FeatureMismatch(name.clone()))?;
            x.push((raw - self.means[i]) / self.scales[i]);
        }

        let mut logits = [0.0; 3];
        for (k, logit) in logits.iter_mut().enumerate() {
            *logit = self.biases[k]
                + self.weights[k]
                    .iter()
                    .zip(&x)
                    .map(|(w, v)| w * v)
                    .sum::<f64>();
        }

        let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exps = logits.map(|l| (l - max).exp());
        let total: f64 = exps.iter().sum();
        Ok(exps.map(|e| e / total))
    }

    /// Winning direction and its probability. Ties go to HOLD, then SELL.
    pub fn predict(&self, features: &FeatureVector) -> Result<(Direction, f64)> {
        let probs = self.probabilities(features)?;
        let mut best = (Direction::Hold, probs[1]);
        for (k, &p) in probs.iter().enumerate() {
            if p > best.1 {
                best = (CLASSES[k], p);
            }
        }
        Ok(best)
    }
}

/// Local signal model with hot-swappable parameters.
///
/// Inference clones the current `Arc` under a read lock and runs without
/// it, so a concurrent `load` never exposes a half-updated model.
#[derive(Debug, Default)]
pub struct LocalSignalModel {
    params: RwLock<Option<Arc<ModelParams>>>,
}

impl LocalSignalModel {
    /// Model with nothing loaded; every prediction fails until `load`
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_params(params: ModelParams) -> Result<Self> {
        let model = Self::empty();
        model.load(params)?;
        Ok(model)
    }

    /// Validates and atomically swaps in new parameters
    pub fn load(&self, params: ModelParams) -> Result<()> {
        params.validate()?;
        let version = params.version.clone();
        let previous = self.params.write().replace(Arc::new(params));
        info!(
            "[MODEL] loaded version={} (previous={})",
            version,
            previous.map(|p| p.version.clone()).unwrap_or_else(|| "none".into())
        );
        Ok(())
    }

    /// Loads a JSON artifact from disk
    pub fn load_from_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        self.load(ModelParams::from_json(&content)?)
    }

    pub fn unload(&self) {
        self.params.write().take();
    }

    pub fn version(&self) -> Option<String> {
        self.params.read().as_ref().map(|p| p.version.clone())
    }

    pub fn is_loaded(&self) -> bool {
        self.params.read().is_some()
    }

    /// Predicts a signal for `features`. Pure apart from the params snapshot.
    pub fn predict(&self, features: Arc<FeatureVector>) -> Result<Signal> {
        let snapshot = self.params.read().clone();
        let params = snapshot.ok_or(Error::ModelUnavailable)?;
        let (direction, confidence) = params.predict(&features)?;
        debug!(
            "[MODEL] {} {} confidence={:.4} version={}",
            features.instrument(),
            direction,
            confidence,
            params.version
        );
        Ok(Signal::new(direction, confidence, features))
    }
}
