//! Discrete Hidden Markov Models trained with Baum-Welch.
//!
//! Pipeline for one iteration:
//! - [`forward_backward`]: forward/backward tables per sequence
//! - [`soft_counts`]: expected `(symbol, from, to)` counts over the corpus (E-step)
//! - [`reestimate`]: new parameters from the counts (M-step)
//! - [`training`]: iteration, stopping rule and reporting
//!
//! Emission is attached to the departing state throughout: leaving state `i` for
//! `j` while emitting `o` has mass `emission[i][o] * transition[i][j]`.

pub mod diagnostics;
pub mod distribution;
pub mod forward_backward;
pub mod model;
pub mod reestimate;
pub mod soft_counts;
pub mod training;
pub mod viterbi;

pub use diagnostics::{best_iteration, emission_log_ratios, ranked_emissions, split_log_ratios};
pub use distribution::{
    DirichletDistribution, RandomDistribution, StickBreaking, UniformDistribution,
};
pub use forward_backward::{backward, forward, plog, ForwardBackward, LikelihoodRecord};
pub use model::{HiddenMarkovModel, State, DEFAULT_TOLERANCE};
pub use reestimate::{reestimate, DeadState, Reestimation};
pub use soft_counts::{expectation, xi, SoftCountTable, SoftCounts};
pub use training::{
    IterationReport, LogSink, NullSink, ReportSink, StopHandle, StopReason, Trainer,
    TrainingConfig, TrainingPhase, TrainingSummary,
};
pub use viterbi::{viterbi, Decoding};

#[cfg(test)]
pub(crate) mod test_fixtures {
    use super::HiddenMarkovModel;
    use crate::corpus::{Alphabet, Corpus};

    /// Corpus `["ab#", "ba#"]` and a two-state model with uniform initial and
    /// transition rows, whose tables are small enough to check by hand.
    pub(crate) fn two_state_fixture() -> (Corpus, HiddenMarkovModel) {
        let alphabet = Alphabet::new(vec!['a', 'b', '#'], '#').unwrap();
        let corpus = Corpus::new(alphabet, ["ab#", "ba#"]).unwrap();
        let model = HiddenMarkovModel::new(
            2,
            3,
            vec![0.5, 0.5],
            vec![vec![0.5, 0.5], vec![0.5, 0.5]],
            vec![vec![0.5, 0.3, 0.2], vec![0.2, 0.5, 0.3]],
        )
        .unwrap();
        (corpus, model)
    }
}
