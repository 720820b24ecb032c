//! Small feed-forward classifier separating MC from data.
//!
//! Architecture: `input -> hidden layers (tanh | softplus) -> 1 logit -> sigmoid`.
//! Parameters live in one flat vector so the whole network can be fitted with
//! the L-BFGS wrapper in [`crate::optimizer`]. Each layer stores its weight
//! matrix column-major (`n_out x n_in`) followed by its bias vector.
//!
//! Loss (mean binary cross-entropy from logits, plus L2 on weights):
//!
//! `L = (1/N) sum_i [log(1 + exp(eta_i)) - t_i * eta_i] + (l2/2) * sum W^2`

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rw_core::{Classifier, Dataset, Error, Label, Result, Sample};
use rw_prob::math::{log1pexp_and_sigmoid, sigmoid, softplus};
use serde::{Deserialize, Serialize};

use crate::optimizer::{LbfgsOptimizer, ObjectiveFunction, OptimizationResult, OptimizerConfig};
use crate::standardize::Standardizer;

/// Rows scored per rayon task.
const SCORE_CHUNK: usize = 1024;

/// Hidden-layer nonlinearity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// `tanh(z)`
    #[default]
    Tanh,
    /// `log(1 + exp(z))`
    Softplus,
}

impl Activation {
    #[inline]
    fn apply(self, z: f64) -> f64 {
        match self {
            Activation::Tanh => z.tanh(),
            Activation::Softplus => softplus(z),
        }
    }

    /// Derivative expressed through the pre-activation `z` and output `a`.
    #[inline]
    fn derivative(self, z: f64, a: f64) -> f64 {
        match self {
            Activation::Tanh => 1.0 - a * a,
            Activation::Softplus => sigmoid(z),
        }
    }
}

/// Network and training configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlpConfig {
    /// Hidden layer widths (may be empty: plain logistic regression).
    pub hidden: Vec<usize>,
    /// Hidden activation.
    pub activation: Activation,
    /// L2 penalty on weight matrices (biases are not penalised).
    pub l2: f64,
    /// Seed for Glorot-uniform initialisation.
    pub seed: u64,
    /// Standardize inputs with statistics of the training set.
    pub standardize: bool,
    /// L-BFGS settings.
    pub optimizer: OptimizerConfig,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden: vec![16, 16],
            activation: Activation::Tanh,
            l2: 1e-4,
            seed: 0,
            standardize: true,
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl MlpConfig {
    /// Validate widths, penalty and optimizer settings.
    pub fn validate(&self) -> Result<()> {
        if self.hidden.iter().any(|&w| w == 0) {
            return Err(Error::Validation("hidden layer widths must be > 0".to_string()));
        }
        if !self.l2.is_finite() || self.l2 < 0.0 {
            return Err(Error::Validation(format!("l2 must be finite and >= 0, got {}", self.l2)));
        }
        self.optimizer.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct LayerShape {
    n_in: usize,
    n_out: usize,
    w_offset: usize,
    b_offset: usize,
}

/// Layer layout inside the flat parameter vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Architecture {
    layers: Vec<LayerShape>,
    n_params: usize,
}

impl Architecture {
    fn new(n_features: usize, hidden: &[usize]) -> Self {
        let mut layers = Vec::with_capacity(hidden.len() + 1);
        let mut offset = 0;
        let mut n_in = n_features;
        for &n_out in hidden.iter().chain(std::iter::once(&1)) {
            let w_offset = offset;
            let b_offset = w_offset + n_in * n_out;
            offset = b_offset + n_out;
            layers.push(LayerShape { n_in, n_out, w_offset, b_offset });
            n_in = n_out;
        }
        Self { layers, n_params: offset }
    }

    fn n_features(&self) -> usize {
        self.layers[0].n_in
    }

    fn weights(&self, params: &[f64], l: usize) -> DMatrix<f64> {
        let s = self.layers[l];
        DMatrix::from_column_slice(s.n_out, s.n_in, &params[s.w_offset..s.b_offset])
    }

    fn bias(&self, params: &[f64], l: usize) -> DVector<f64> {
        let s = self.layers[l];
        DVector::from_column_slice(&params[s.b_offset..s.b_offset + s.n_out])
    }

    fn glorot_init(&self, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut params = vec![0.0; self.n_params];
        for s in &self.layers {
            let limit = (6.0 / (s.n_in + s.n_out) as f64).sqrt();
            for w in &mut params[s.w_offset..s.b_offset] {
                *w = rng.random_range(-limit..limit);
            }
        }
        params
    }
}

/// Cached forward pass over a batch (columns are events).
struct ForwardPass {
    /// `acts[0]` is the input; `acts[l + 1]` is the output of hidden layer `l`.
    acts: Vec<DMatrix<f64>>,
    /// Pre-activations of hidden layers.
    pre: Vec<DMatrix<f64>>,
    /// Output logits (length = batch size).
    logits: Vec<f64>,
}

fn forward(arch: &Architecture, activation: Activation, params: &[f64], x: DMatrix<f64>) -> ForwardPass {
    let n_layers = arch.layers.len();
    let mut acts = Vec::with_capacity(n_layers);
    let mut pre = Vec::with_capacity(n_layers - 1);
    acts.push(x);

    let mut logits = Vec::new();
    for l in 0..n_layers {
        let w = arch.weights(params, l);
        let b = arch.bias(params, l);
        let mut z = &w * &acts[l];
        for j in 0..z.ncols() {
            for i in 0..z.nrows() {
                z[(i, j)] += b[i];
            }
        }
        if l + 1 < n_layers {
            let a = z.map(|v| activation.apply(v));
            pre.push(z);
            acts.push(a);
        } else {
            logits = z.iter().copied().collect();
        }
    }
    ForwardPass { acts, pre, logits }
}

/// Stack standardized feature vectors as columns of a `p x n` matrix.
fn design_matrix(standardizer: &Standardizer, samples: &[Sample]) -> Result<DMatrix<f64>> {
    let p = standardizer.n_features();
    let mut x = DMatrix::<f64>::zeros(p, samples.len());
    let mut buf = vec![0.0; p];
    for (j, s) in samples.iter().enumerate() {
        standardizer.transform_into(s.features(), &mut buf)?;
        x.column_mut(j).copy_from_slice(&buf);
    }
    Ok(x)
}

/// Training objective: mean binary cross-entropy + L2, with exact backprop.
struct BceObjective<'a> {
    arch: &'a Architecture,
    activation: Activation,
    l2: f64,
    x: DMatrix<f64>,
    targets: Vec<f64>,
}

impl BceObjective<'_> {
    fn check(&self, params: &[f64]) -> Result<()> {
        if params.len() != self.arch.n_params {
            return Err(Error::Validation(format!(
                "expected {} parameters, got {}",
                self.arch.n_params,
                params.len()
            )));
        }
        if params.iter().any(|v| !v.is_finite()) {
            return Err(Error::Computation("params must contain only finite values".to_string()));
        }
        Ok(())
    }

    fn l2_penalty(&self, params: &[f64]) -> f64 {
        if self.l2 == 0.0 {
            return 0.0;
        }
        let sq: f64 = self
            .arch
            .layers
            .iter()
            .map(|s| params[s.w_offset..s.b_offset].iter().map(|w| w * w).sum::<f64>())
            .sum();
        0.5 * self.l2 * sq
    }
}

impl ObjectiveFunction for BceObjective<'_> {
    fn eval(&self, params: &[f64]) -> Result<f64> {
        self.check(params)?;
        let fp = forward(self.arch, self.activation, params, self.x.clone());
        let n = self.targets.len() as f64;
        let mut loss = 0.0;
        for (&eta, &t) in fp.logits.iter().zip(&self.targets) {
            let (log_term, _) = log1pexp_and_sigmoid(eta);
            loss += log_term - t * eta;
        }
        Ok(loss / n + self.l2_penalty(params))
    }

    fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        self.check(params)?;
        let fp = forward(self.arch, self.activation, params, self.x.clone());
        let n = self.targets.len() as f64;
        let mut grad = vec![0.0; self.arch.n_params];

        // dL/d(eta_i) = (sigmoid(eta_i) - t_i) / N
        let mut delta = DMatrix::<f64>::zeros(1, self.targets.len());
        for (j, (&eta, &t)) in fp.logits.iter().zip(&self.targets).enumerate() {
            delta[(0, j)] = (sigmoid(eta) - t) / n;
        }

        for l in (0..self.arch.layers.len()).rev() {
            let s = self.arch.layers[l];
            let grad_w = &delta * fp.acts[l].transpose();
            grad[s.w_offset..s.b_offset].copy_from_slice(grad_w.as_slice());
            for i in 0..s.n_out {
                grad[s.b_offset + i] = delta.row(i).sum();
            }
            if self.l2 != 0.0 {
                for k in s.w_offset..s.b_offset {
                    grad[k] += self.l2 * params[k];
                }
            }
            if l > 0 {
                let w = self.arch.weights(params, l);
                let mut back = w.transpose() * &delta;
                let z = &fp.pre[l - 1];
                let a = &fp.acts[l];
                for j in 0..back.ncols() {
                    for i in 0..back.nrows() {
                        back[(i, j)] *= self.activation.derivative(z[(i, j)], a[(i, j)]);
                    }
                }
                delta = back;
            }
        }
        Ok(grad)
    }
}

/// Outcome of a training run.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    /// Number of trainable parameters.
    pub n_params: usize,
    /// Training events.
    pub n_train: usize,
    /// Final training loss (BCE + L2).
    pub final_loss: f64,
    /// Optimizer convergence flag.
    pub converged: bool,
    /// Optimizer iterations.
    pub n_iter: u64,
    /// Loss evaluations.
    pub n_fev: usize,
    /// Gradient evaluations.
    pub n_gev: usize,
    /// Termination message.
    pub message: String,
}

impl TrainingSummary {
    fn new(n_params: usize, n_train: usize, opt: &OptimizationResult) -> Self {
        Self {
            n_params,
            n_train,
            final_loss: opt.fval,
            converged: opt.converged,
            n_iter: opt.n_iter,
            n_fev: opt.n_fev,
            n_gev: opt.n_gev,
            message: opt.message.clone(),
        }
    }
}

/// Trained multilayer perceptron.
#[derive(Debug, Clone)]
pub struct MlpClassifier {
    arch: Architecture,
    activation: Activation,
    standardizer: Standardizer,
    params: Vec<f64>,
    summary: TrainingSummary,
}

impl MlpClassifier {
    /// Fit the network on a labelled training set.
    ///
    /// Both labels must be present, otherwise the problem is degenerate.
    pub fn fit(train: &Dataset, config: &MlpConfig) -> Result<Self> {
        config.validate()?;
        let n_data = train.count(Label::Data);
        let n_mc = train.count(Label::Mc);
        if n_data == 0 || n_mc == 0 {
            return Err(Error::Validation(format!(
                "training set needs both labels (data={}, mc={})",
                n_data, n_mc
            )));
        }

        let arch = Architecture::new(train.n_features(), &config.hidden);
        let standardizer = if config.standardize {
            Standardizer::fit(train)
        } else {
            Standardizer::identity(train.n_features())
        };
        let objective = BceObjective {
            arch: &arch,
            activation: config.activation,
            l2: config.l2,
            x: design_matrix(&standardizer, train.samples())?,
            targets: train.targets(),
        };

        tracing::info!(
            n_train = train.len(),
            n_params = arch.n_params,
            hidden = ?config.hidden,
            "training classifier"
        );
        let init = arch.glorot_init(config.seed);
        let opt = LbfgsOptimizer::new(config.optimizer.clone()).minimize(&objective, &init)?;
        if !opt.fval.is_finite() {
            return Err(Error::Computation(format!("training loss is not finite: {}", opt.fval)));
        }
        tracing::info!(loss = opt.fval, converged = opt.converged, n_iter = opt.n_iter, "training complete");
        if !opt.converged {
            tracing::warn!(message = %opt.message, "classifier optimizer did not converge");
        }

        let summary = TrainingSummary::new(arch.n_params, train.len(), &opt);
        Ok(Self {
            arch,
            activation: config.activation,
            standardizer,
            params: opt.parameters,
            summary,
        })
    }

    /// Training diagnostics.
    pub fn summary(&self) -> &TrainingSummary {
        &self.summary
    }

    /// Logits for a batch of samples.
    fn logits(&self, samples: &[Sample]) -> Result<Vec<f64>> {
        let x = design_matrix(&self.standardizer, samples)?;
        Ok(forward(&self.arch, self.activation, &self.params, x).logits)
    }
}

impl Classifier for MlpClassifier {
    fn n_features(&self) -> usize {
        self.arch.n_features()
    }

    fn predict_proba(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.n_features() {
            return Err(Error::Validation(format!(
                "classifier expects {} features, got {}",
                self.n_features(),
                features.len()
            )));
        }
        let sample = Sample::new(features.to_vec(), Label::Data);
        let logits = self.logits(std::slice::from_ref(&sample))?;
        Ok(sigmoid(logits[0]))
    }

    fn predict_proba_dataset(&self, dataset: &Dataset) -> Result<Vec<f64>> {
        if dataset.n_features() != self.n_features() {
            return Err(Error::Validation(format!(
                "classifier expects {} features, dataset has {}",
                self.n_features(),
                dataset.n_features()
            )));
        }
        let chunks: Vec<Vec<f64>> = dataset
            .samples()
            .par_chunks(SCORE_CHUNK)
            .map(|chunk| self.logits(chunk))
            .collect::<Result<_>>()?;
        Ok(chunks.into_iter().flatten().map(sigmoid).collect())
    }
}
