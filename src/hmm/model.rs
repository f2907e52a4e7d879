//! Discrete HMM parameters.
//!
//! Emission is attached to the departing state: the mass of "emit symbol `o` at
//! time `t`, then move from state `i` to state `j`" is
//! `emission[i][o] * transition[i][j]`.

use ndarray::{Array1, Array2, ArrayView1};

use super::distribution::{ensure_normalized, RandomDistribution};
use crate::corpus::Alphabet;
use crate::error::{Error, Result};

/// Tolerance used when checking that distributions sum to 1.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Represents a discrete Hidden Markov Model (HMM), storing:
/// - `num_states`: how many hidden states
/// - `num_observations`: how many distinct symbols
/// - `initial_probabilities[s]`: probability of starting in state s
/// - `transition_probabilities[[s1, s2]]`: probability of moving from s1 to s2
/// - `emission_probabilities[[s, o]]`: probability of emitting symbol o when leaving s
///
/// Every constructor checks that each distribution sums to 1, so a model obtained
/// from this module is always normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct HiddenMarkovModel {
    num_states: usize,
    num_observations: usize,
    initial_probabilities: Array1<f64>,
    transition_probabilities: Array2<f64>,
    emission_probabilities: Array2<f64>,
}

/// Read-only view of one state's parameters.
#[derive(Debug, Clone, Copy)]
pub struct State<'a> {
    pub index: usize,
    pub initial: f64,
    pub transition: ArrayView1<'a, f64>,
    pub emission: ArrayView1<'a, f64>,
}

impl HiddenMarkovModel {
    /// Create a new `HiddenMarkovModel` from nested vectors.
    ///
    /// Fails with `InvalidInput` on a shape mismatch and with
    /// `DegenerateDistribution` if any distribution is not normalized.
    pub fn new(
        num_states: usize,
        num_observations: usize,
        initial_probabilities: Vec<f64>,
        transition_probabilities: Vec<Vec<f64>>,
        emission_probabilities: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if num_states == 0 || num_observations == 0 {
            return Err(Error::invalid_input(
                "a model needs at least one state and one symbol",
            ));
        }
        if initial_probabilities.len() != num_states {
            return Err(Error::invalid_input(format!(
                "expected {} initial probabilities, got {}",
                num_states,
                initial_probabilities.len()
            )));
        }
        let transition = to_matrix("transition", transition_probabilities, num_states, num_states)?;
        let emission = to_matrix("emission", emission_probabilities, num_states, num_observations)?;

        let model = Self::from_parts(Array1::from(initial_probabilities), transition, emission);
        model.validate(DEFAULT_TOLERANCE)?;
        Ok(model)
    }

    /// Seed a model with `num_states` states over `num_observations` symbols.
    ///
    /// The initial distribution is one draw over all states; each state then gets
    /// its own transition draw and emission draw.
    pub fn random(
        num_states: usize,
        num_observations: usize,
        generator: &mut dyn RandomDistribution,
    ) -> Result<Self> {
        if num_states == 0 {
            return Err(Error::invalid_input("the number of states must be at least 1"));
        }
        if num_observations == 0 {
            return Err(Error::invalid_input("the alphabet must not be empty"));
        }

        let initial = generator.draw(num_states)?;
        ensure_normalized("initial distribution", &initial, DEFAULT_TOLERANCE)?;

        let mut transition = Array2::zeros((num_states, num_states));
        let mut emission = Array2::zeros((num_states, num_observations));
        for s in 0..num_states {
            let row = generator.draw(num_states)?;
            ensure_normalized(&format!("transitions of state {}", s), &row, DEFAULT_TOLERANCE)?;
            transition.row_mut(s).assign(&Array1::from(row));

            let row = generator.draw(num_observations)?;
            ensure_normalized(&format!("emissions of state {}", s), &row, DEFAULT_TOLERANCE)?;
            emission.row_mut(s).assign(&Array1::from(row));
        }

        Ok(Self::from_parts(Array1::from(initial), transition, emission))
    }

    /// Seed a model over a corpus alphabet.
    pub fn random_for(
        num_states: usize,
        alphabet: &Alphabet,
        generator: &mut dyn RandomDistribution,
    ) -> Result<Self> {
        Self::random(num_states, alphabet.len(), generator)
    }

    /// Assemble a model without validation. Shapes must already agree.
    pub(crate) fn from_parts(
        initial_probabilities: Array1<f64>,
        transition_probabilities: Array2<f64>,
        emission_probabilities: Array2<f64>,
    ) -> Self {
        debug_assert_eq!(transition_probabilities.dim().0, initial_probabilities.len());
        debug_assert_eq!(emission_probabilities.nrows(), initial_probabilities.len());
        Self {
            num_states: initial_probabilities.len(),
            num_observations: emission_probabilities.ncols(),
            initial_probabilities,
            transition_probabilities,
            emission_probabilities,
        }
    }

    /// Check every probability is in `[0, 1]` and every distribution sums to 1
    /// within `tolerance`.
    pub fn validate(&self, tolerance: f64) -> Result<()> {
        ensure_normalized(
            "initial distribution",
            &self.initial_probabilities.to_vec(),
            tolerance,
        )?;
        for (s, row) in self.transition_probabilities.outer_iter().enumerate() {
            ensure_normalized(&format!("transitions of state {}", s), &row.to_vec(), tolerance)?;
        }
        for (s, row) in self.emission_probabilities.outer_iter().enumerate() {
            ensure_normalized(&format!("emissions of state {}", s), &row.to_vec(), tolerance)?;
        }
        Ok(())
    }

    /// Fail unless the emission table covers exactly this alphabet.
    pub fn check_alphabet(&self, alphabet: &Alphabet) -> Result<()> {
        if alphabet.len() != self.num_observations {
            return Err(Error::invalid_input(format!(
                "model emits {} symbols but the alphabet has {}",
                self.num_observations,
                alphabet.len()
            )));
        }
        Ok(())
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn num_observations(&self) -> usize {
        self.num_observations
    }

    pub fn initial_probabilities(&self) -> &Array1<f64> {
        &self.initial_probabilities
    }

    pub fn transition_probabilities(&self) -> &Array2<f64> {
        &self.transition_probabilities
    }

    pub fn emission_probabilities(&self) -> &Array2<f64> {
        &self.emission_probabilities
    }

    #[inline]
    pub fn initial(&self, state: usize) -> f64 {
        self.initial_probabilities[state]
    }

    #[inline]
    pub fn transition(&self, from: usize, to: usize) -> f64 {
        self.transition_probabilities[[from, to]]
    }

    #[inline]
    pub fn emission(&self, state: usize, symbol: usize) -> f64 {
        self.emission_probabilities[[state, symbol]]
    }

    /// View of state `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= num_states`.
    pub fn state(&self, index: usize) -> State<'_> {
        State {
            index,
            initial: self.initial_probabilities[index],
            transition: self.transition_probabilities.row(index),
            emission: self.emission_probabilities.row(index),
        }
    }

    pub fn states(&self) -> impl Iterator<Item = State<'_>> + '_ {
        (0..self.num_states).map(move |s| self.state(s))
    }
}

fn to_matrix(what: &str, rows: Vec<Vec<f64>>, nrows: usize, ncols: usize) -> Result<Array2<f64>> {
    if rows.len() != nrows || rows.iter().any(|r| r.len() != ncols) {
        return Err(Error::invalid_input(format!(
            "{} table must be {} x {}",
            what, nrows, ncols
        )));
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((nrows, ncols), flat)
        .map_err(|e| Error::invalid_input(format!("{} table: {}", what, e)))
}
