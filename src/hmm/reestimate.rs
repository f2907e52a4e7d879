//! Parameter re-estimation from soft counts (the M-step).
//!
//! For each state `i` with `D_i = sum_{o, j} soft[o, i, j] > 0`:
//! - `transition[i][j] = sum_o soft[o, i, j] / D_i`
//! - `emission[i][o] = sum_j soft[o, i, j] / D_i`
//!
//! and `initial[i] = sum_{o, j} initial_soft[o, i, j] / N`. A state with `D_i = 0`
//! keeps its previous rows and is reported as dead.

use log::warn;
use ndarray::{Array1, Array2};

use super::distribution::ensure_normalized;
use super::model::HiddenMarkovModel;
use super::soft_counts::SoftCounts;
use crate::error::{Error, Result};

/// A state that had no expected departures during re-estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadState {
    pub state: usize,
}

/// The re-estimated model and the states that were frozen.
#[derive(Debug, Clone)]
pub struct Reestimation {
    pub model: HiddenMarkovModel,
    pub dead_states: Vec<DeadState>,
}

/// Compute new parameters from `counts`.
///
/// The previous model is only read; the caller decides whether to replace it, so a
/// failure never leaves a partially updated model behind. Fails with
/// `DegenerateDistribution` if a re-estimated distribution is off by more than
/// `tolerance`.
pub fn reestimate(
    model: &HiddenMarkovModel,
    counts: &SoftCounts,
    tolerance: f64,
) -> Result<Reestimation> {
    let n = model.num_states();
    let m = model.num_observations();
    let all = counts.all();
    if all.num_states() != n || all.num_observations() != m {
        return Err(Error::invalid_input(format!(
            "soft counts are {} states x {} symbols but the model is {} x {}",
            all.num_states(),
            all.num_observations(),
            n,
            m
        )));
    }
    if counts.sequences() == 0 {
        return Err(Error::invalid_input("cannot re-estimate from an empty corpus"));
    }

    let mut transition = model.transition_probabilities().clone();
    let mut emission = model.emission_probabilities().clone();
    let mut dead_states = Vec::new();

    for i in 0..n {
        let departures = all.departures(i);
        if !(departures > 0.0) {
            warn!("state {} has no expected departures; keeping its parameters", i);
            dead_states.push(DeadState { state: i });
            continue;
        }
        for j in 0..n {
            transition[[i, j]] = all.transitions(i, j) / departures;
        }
        for o in 0..m {
            emission[[i, o]] = all.emissions(i, o) / departures;
        }
    }

    let sequences = counts.sequences() as f64;
    let initial = Array1::from_shape_fn(n, |i| counts.initial().departures(i) / sequences);

    check(&initial, &transition, &emission, tolerance)?;

    Ok(Reestimation {
        model: HiddenMarkovModel::from_parts(initial, transition, emission),
        dead_states,
    })
}

fn check(
    initial: &Array1<f64>,
    transition: &Array2<f64>,
    emission: &Array2<f64>,
    tolerance: f64,
) -> Result<()> {
    ensure_normalized("re-estimated initial distribution", &initial.to_vec(), tolerance)?;
    for (i, row) in transition.outer_iter().enumerate() {
        ensure_normalized(
            &format!("re-estimated transitions of state {}", i),
            &row.to_vec(),
            tolerance,
        )?;
    }
    for (i, row) in emission.outer_iter().enumerate() {
        ensure_normalized(
            &format!("re-estimated emissions of state {}", i),
            &row.to_vec(),
            tolerance,
        )?;
    }
    Ok(())
}
