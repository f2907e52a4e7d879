//! Expected transition/emission counts (the E-step).
//!
//! For time step `t` and states `(i, j)` the soft count is
//!
//! `xi_t(i, j) = alpha[i, t] * emission[i][o_t] * transition[i][j] * beta[j, t+1] / P(seq)`
//!
//! and is added to the table cell `(o_t, i, j)`. A second table receives only the
//! `t = 0` contributions and feeds the re-estimation of the initial distribution.

use ndarray::{Array2, Array3};
use rayon::prelude::*;

use super::forward_backward::ForwardBackward;
use super::model::HiddenMarkovModel;
use crate::corpus::{Corpus, Sequence};
use crate::error::{Error, Result};

/// Expected counts keyed by `(symbol, from_state, to_state)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftCountTable {
    counts: Array3<f64>,
}

impl SoftCountTable {
    pub fn zeros(num_observations: usize, num_states: usize) -> Self {
        Self {
            counts: Array3::zeros((num_observations, num_states, num_states)),
        }
    }

    pub fn num_observations(&self) -> usize {
        self.counts.dim().0
    }

    pub fn num_states(&self) -> usize {
        self.counts.dim().1
    }

    pub fn get(&self, symbol: usize, from: usize, to: usize) -> f64 {
        self.counts[[symbol, from, to]]
    }

    pub fn add(&mut self, symbol: usize, from: usize, to: usize, value: f64) {
        self.counts[[symbol, from, to]] += value;
    }

    /// Add every cell of `other` into this table.
    pub fn merge(&mut self, other: &SoftCountTable) -> Result<()> {
        if self.counts.dim() != other.counts.dim() {
            return Err(Error::invalid_input(format!(
                "cannot merge soft count tables of shapes {:?} and {:?}",
                self.counts.dim(),
                other.counts.dim()
            )));
        }
        self.counts += &other.counts;
        Ok(())
    }

    /// Expected number of departures from `from`: the sum over symbols and
    /// destinations.
    pub fn departures(&self, from: usize) -> f64 {
        self.counts.index_axis(ndarray::Axis(1), from).sum()
    }

    /// Expected `from -> to` moves, summed over symbols.
    pub fn transitions(&self, from: usize, to: usize) -> f64 {
        (0..self.num_observations())
            .map(|o| self.counts[[o, from, to]])
            .sum()
    }

    /// Expected emissions of `symbol` when leaving `from`, summed over destinations.
    pub fn emissions(&self, from: usize, symbol: usize) -> f64 {
        self.counts
            .index_axis(ndarray::Axis(0), symbol)
            .row(from)
            .sum()
    }

    pub fn total(&self) -> f64 {
        self.counts.sum()
    }

    pub fn counts(&self) -> &Array3<f64> {
        &self.counts
    }
}

/// `xi_t(i, j)` for one time step of one sequence, indexed `[[i, j]]`.
pub fn xi(
    model: &HiddenMarkovModel,
    fb: &ForwardBackward,
    symbols: &[usize],
    t: usize,
) -> Array2<f64> {
    let n = model.num_states();
    let obs = symbols[t];
    let alpha = fb.alpha();
    let beta = fb.beta();
    let p = fb.probability();

    let mut xi = Array2::zeros((n, n));
    for i in 0..n {
        let leaving = alpha[[i, t]] * model.emission(i, obs) / p;
        if leaving == 0.0 {
            continue;
        }
        for j in 0..n {
            xi[[i, j]] = leaving * model.transition(i, j) * beta[[j, t + 1]];
        }
    }
    xi
}

/// Soft counts over every time step plus the `t = 0` counts, accumulated over a
/// number of sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftCounts {
    all: SoftCountTable,
    initial: SoftCountTable,
    sequences: usize,
}

impl SoftCounts {
    pub fn zeros(model: &HiddenMarkovModel) -> Self {
        let (n, m) = (model.num_states(), model.num_observations());
        Self {
            all: SoftCountTable::zeros(m, n),
            initial: SoftCountTable::zeros(m, n),
            sequences: 0,
        }
    }

    /// Soft counts of a single sequence.
    pub fn for_sequence(
        model: &HiddenMarkovModel,
        sequence: &Sequence,
        fb: &ForwardBackward,
    ) -> Self {
        let mut counts = Self::zeros(model);
        counts.accumulate(model, sequence, fb);
        counts
    }

    /// Add the contributions of `sequence` at every time step.
    pub fn accumulate(
        &mut self,
        model: &HiddenMarkovModel,
        sequence: &Sequence,
        fb: &ForwardBackward,
    ) {
        let symbols = sequence.symbols();
        for (t, &obs) in symbols.iter().enumerate() {
            let step = xi(model, fb, symbols, t);
            for ((i, j), &value) in step.indexed_iter() {
                self.all.add(obs, i, j, value);
                if t == 0 {
                    self.initial.add(obs, i, j, value);
                }
            }
        }
        self.sequences += 1;
    }

    /// Combine counts of disjoint sets of sequences.
    pub fn merge(mut self, other: &SoftCounts) -> Result<Self> {
        self.all.merge(&other.all)?;
        self.initial.merge(&other.initial)?;
        self.sequences += other.sequences;
        Ok(self)
    }

    /// Counts over all time steps.
    pub fn all(&self) -> &SoftCountTable {
        &self.all
    }

    /// Counts restricted to the first time step.
    pub fn initial(&self) -> &SoftCountTable {
        &self.initial
    }

    /// Number of sequences accumulated.
    pub fn sequences(&self) -> usize {
        self.sequences
    }
}

/// Run forward/backward on every sequence of `corpus` and sum the soft counts.
///
/// With `parallel` the sequences are spread over the rayon pool; the per-sequence
/// tables are summed, so the result matches the serial one up to rounding. A
/// zero-probability sequence aborts the whole E-step.
pub fn expectation(
    model: &HiddenMarkovModel,
    corpus: &Corpus,
    parallel: bool,
) -> Result<SoftCounts> {
    let add = |mut acc: SoftCounts, sequence: &Sequence| -> Result<SoftCounts> {
        let fb = ForwardBackward::compute(model, sequence)?;
        acc.accumulate(model, sequence, &fb);
        Ok(acc)
    };

    if parallel {
        corpus
            .sequences()
            .par_iter()
            .try_fold(|| SoftCounts::zeros(model), add)
            .try_reduce(|| SoftCounts::zeros(model), |a, b| a.merge(&b))
    } else {
        corpus
            .sequences()
            .iter()
            .try_fold(SoftCounts::zeros(model), add)
    }
}
