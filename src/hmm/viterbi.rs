//! Most likely state path for a sequence.
//!
//! Under the emission-on-departure convention the score of a path `s_0 .. s_T` is
//! `initial[s_0] * prod_t emission[s_t][o_t] * transition[s_t][s_{t+1}]`, so each
//! symbol `o_t` is labelled with the state `s_t` it was emitted from.

use super::model::HiddenMarkovModel;
use crate::error::{Error, Result};

/// Best state path for a sequence and its natural-log probability.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoding {
    /// `states[t]` is the state that emitted symbol `t`.
    pub states: Vec<usize>,
    pub log_probability: f64,
}

impl Decoding {
    /// Negative base-2 logarithm of the path probability.
    pub fn plog(&self) -> f64 {
        -self.log_probability / std::f64::consts::LN_2
    }

    /// State indices joined with `-`, one per symbol.
    pub fn state_labels(&self) -> String {
        self.states
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("-")
    }
}

/// Runs the Viterbi Algorithm for a given HMM and a sequence of symbol indices.
///
/// Returns the most likely emitting state for every symbol together with the log
/// probability of the best full path (final state included).
///
/// Fails with `InvalidInput` if any observation is out of range.
pub fn viterbi(hmm: &HiddenMarkovModel, observations: &[usize]) -> Result<Decoding> {
    if observations.is_empty() {
        return Ok(Decoding {
            states: Vec::new(),
            log_probability: 0.0,
        });
    }

    if let Some(&obs) = observations.iter().find(|&&o| o >= hmm.num_observations()) {
        return Err(Error::invalid_input(format!(
            "observation {} is out of range (max = {})",
            obs,
            hmm.num_observations() - 1
        )));
    }

    let t = observations.len();
    let n = hmm.num_states();

    // delta[time][s]: best log-probability of emitting the first `time` symbols and
    // then being in s
    // psi[time][s]: the state at time-1 on that best path
    let mut delta = vec![vec![f64::NEG_INFINITY; n]; t + 1];
    let mut psi = vec![vec![0_usize; n]; t + 1];

    for s in 0..n {
        delta[0][s] = hmm.initial(s).ln();
    }

    for time in 1..=t {
        let obs = observations[time - 1];
        for s in 0..n {
            let mut best_val = f64::NEG_INFINITY;
            let mut best_prev = 0_usize;
            for s_prev in 0..n {
                let candidate = delta[time - 1][s_prev]
                    + hmm.emission(s_prev, obs).ln()
                    + hmm.transition(s_prev, s).ln();
                if candidate > best_val {
                    best_val = candidate;
                    best_prev = s_prev;
                }
            }
            delta[time][s] = best_val;
            psi[time][s] = best_prev;
        }
    }

    let mut best_final_score = f64::NEG_INFINITY;
    let mut best_final_state = 0_usize;
    for s in 0..n {
        if delta[t][s] > best_final_score {
            best_final_score = delta[t][s];
            best_final_state = s;
        }
    }

    if best_final_score == f64::NEG_INFINITY {
        return Err(Error::ZeroProbability {
            sequence: format!("{:?}", observations),
        });
    }

    // Path backtracking over s_0 .. s_T, then drop the final (non-emitting) state
    let mut path = vec![0_usize; t + 1];
    path[t] = best_final_state;
    for time in (1..=t).rev() {
        path[time - 1] = psi[time][path[time]];
    }
    path.truncate(t);

    Ok(Decoding {
        states: path,
        log_probability: best_final_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmm::test_fixtures::two_state_fixture;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_viterbi_follows_emissions() {
        // Sticky states, each strongly preferring one symbol.
        let hmm = HiddenMarkovModel::new(
            2,
            2,
            vec![0.5, 0.5],
            vec![vec![0.9, 0.1], vec![0.1, 0.9]],
            vec![vec![0.9, 0.1], vec![0.1, 0.9]],
        )
        .unwrap();

        let decoding = viterbi(&hmm, &[0, 0, 1, 1]).unwrap();
        assert_eq!(decoding.states, vec![0, 0, 1, 1]);

        // path 0 0 1 1 1: the switch costs one 0.1 transition
        let expected = 0.5f64 * 0.81 * 0.09 * 0.81 * 0.81;
        assert_abs_diff_eq!(decoding.log_probability, expected.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_viterbi_departure_convention() {
        let (corpus, model) = two_state_fixture();
        let seq = &corpus.sequences()[0];
        let decoding = viterbi(&model, seq.symbols()).unwrap();

        assert_eq!(decoding.states.len(), seq.len());
        // a is likelier from state 0, b and # from state 1
        assert_eq!(decoding.states, vec![0, 1, 1]);
        let expected = 0.5f64 * (0.5 * 0.5) * (0.5 * 0.5) * (0.3 * 0.5);
        assert_abs_diff_eq!(decoding.plog(), -expected.log2(), epsilon = 1e-9);
    }

    #[test]
    fn test_state_labels_keep_large_indices_apart() {
        let decoding = Decoding {
            states: vec![0, 36, 1, 10],
            log_probability: 0.0,
        };
        assert_eq!(decoding.state_labels(), "0-36-1-10");

        let (corpus, model) = two_state_fixture();
        let decoding = viterbi(&model, corpus.sequences()[0].symbols()).unwrap();
        assert_eq!(decoding.state_labels(), "0-1-1");
    }

    #[test]
    fn test_viterbi_empty() {
        let (_, model) = two_state_fixture();
        let decoding = viterbi(&model, &[]).unwrap();
        assert!(decoding.states.is_empty());
    }

    #[test]
    fn test_viterbi_rejects_unknown_symbol() {
        let (_, model) = two_state_fixture();
        assert!(matches!(viterbi(&model, &[0, 7]), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_viterbi_impossible_sequence() {
        let hmm = HiddenMarkovModel::new(
            1,
            2,
            vec![1.0],
            vec![vec![1.0]],
            vec![vec![1.0, 0.0]],
        )
        .unwrap();
        assert!(matches!(
            viterbi(&hmm, &[0, 1]),
            Err(Error::ZeroProbability { .. })
        ));
    }
}
