//! Forward and backward tables for one sequence.
//!
//! Tables are indexed `[[state, t]]` for `t` in `0..=T`. Column `t` of the forward
//! table holds the probability of the first `t` symbols with the model in each
//! state at time `t`; column `t` of the backward table holds the probability of
//! the symbols from `t` on given each state at time `t`.
//!
//! Probabilities are multiplied in the linear domain, so very long sequences can
//! underflow to 0. That surfaces as [`Error::ZeroProbability`], never as an
//! infinite plog.

use ndarray::Array2;
use rayon::prelude::*;

use super::model::HiddenMarkovModel;
use crate::corpus::{Corpus, Sequence};
use crate::error::{Error, Result};

/// Forward table, backward table and total probability of one sequence under one
/// model snapshot.
#[derive(Debug, Clone)]
pub struct ForwardBackward {
    alpha: Array2<f64>,
    beta: Array2<f64>,
    probability: f64,
}

impl ForwardBackward {
    /// Run both passes over `sequence`.
    ///
    /// Fails with `ZeroProbability` when the sequence probability is exactly 0.
    pub fn compute(model: &HiddenMarkovModel, sequence: &Sequence) -> Result<Self> {
        let alpha = forward(model, sequence.symbols());
        let probability = final_probability(&alpha, sequence)?;
        let beta = backward(model, sequence.symbols());
        Ok(Self {
            alpha,
            beta,
            probability,
        })
    }

    pub fn alpha(&self) -> &Array2<f64> {
        &self.alpha
    }

    pub fn beta(&self) -> &Array2<f64> {
        &self.beta
    }

    /// `P(seq)`, the sum of the last forward column.
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// `P(seq)` recomputed from the backward table: `sum_s initial[s] * beta[s, 0]`.
    pub fn backward_probability(&self, model: &HiddenMarkovModel) -> f64 {
        model
            .initial_probabilities()
            .iter()
            .zip(self.beta.column(0))
            .map(|(pi, b)| pi * b)
            .sum()
    }

    pub fn plog(&self) -> f64 {
        plog(self.probability)
    }

    /// Number of symbols in the sequence.
    pub fn len(&self) -> usize {
        self.alpha.ncols() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Forward recurrence:
/// `alpha[s, 0] = initial[s]`,
/// `alpha[to, t] = sum_from alpha[from, t-1] * emission[from][o_{t-1}] * transition[from][to]`.
pub fn forward(model: &HiddenMarkovModel, symbols: &[usize]) -> Array2<f64> {
    let n = model.num_states();
    let len = symbols.len();
    let mut alpha = Array2::zeros((n, len + 1));

    for s in 0..n {
        alpha[[s, 0]] = model.initial(s);
    }

    for t in 1..=len {
        let obs = symbols[t - 1];
        for from in 0..n {
            let leaving = alpha[[from, t - 1]] * model.emission(from, obs);
            if leaving == 0.0 {
                continue;
            }
            for to in 0..n {
                alpha[[to, t]] += leaving * model.transition(from, to);
            }
        }
    }

    alpha
}

/// Backward recurrence:
/// `beta[s, T] = 1`,
/// `beta[from, t] = sum_to beta[to, t+1] * emission[from][o_t] * transition[from][to]`.
pub fn backward(model: &HiddenMarkovModel, symbols: &[usize]) -> Array2<f64> {
    let n = model.num_states();
    let len = symbols.len();
    let mut beta = Array2::zeros((n, len + 1));

    for s in 0..n {
        beta[[s, len]] = 1.0;
    }

    for t in (0..len).rev() {
        let obs = symbols[t];
        for from in 0..n {
            let mut sum = 0.0;
            for to in 0..n {
                sum += beta[[to, t + 1]] * model.transition(from, to);
            }
            beta[[from, t]] = sum * model.emission(from, obs);
        }
    }

    beta
}

/// Negative base-2 logarithm of a probability.
pub fn plog(probability: f64) -> f64 {
    -probability.log2()
}

/// `P(seq)` from the forward pass alone.
pub fn sequence_probability(model: &HiddenMarkovModel, sequence: &Sequence) -> Result<f64> {
    final_probability(&forward(model, sequence.symbols()), sequence)
}

fn final_probability(alpha: &Array2<f64>, sequence: &Sequence) -> Result<f64> {
    let probability = alpha.column(sequence.len()).sum();
    if !(probability > 0.0) {
        return Err(Error::ZeroProbability {
            sequence: sequence.text().to_string(),
        });
    }
    Ok(probability)
}

/// Plog of every sequence of a corpus, in corpus order, and their sum.
#[derive(Debug, Clone, PartialEq)]
pub struct LikelihoodRecord {
    plogs: Vec<f64>,
    total: f64,
}

impl LikelihoodRecord {
    pub fn from_plogs(plogs: Vec<f64>) -> Self {
        let total = plogs.iter().sum();
        Self { plogs, total }
    }

    /// Score every sequence of `corpus` under `model`. Any zero-probability
    /// sequence fails the whole record.
    pub fn compute(model: &HiddenMarkovModel, corpus: &Corpus, parallel: bool) -> Result<Self> {
        let score = |seq: &Sequence| sequence_probability(model, seq).map(plog);
        let plogs = if parallel {
            corpus
                .sequences()
                .par_iter()
                .map(score)
                .collect::<Result<Vec<_>>>()?
        } else {
            corpus
                .sequences()
                .iter()
                .map(score)
                .collect::<Result<Vec<_>>>()?
        };
        Ok(Self::from_plogs(plogs))
    }

    pub fn plogs(&self) -> &[f64] {
        &self.plogs
    }

    /// Corpus plog: the sum of the per-sequence plogs.
    pub fn total(&self) -> f64 {
        self.total
    }
}
