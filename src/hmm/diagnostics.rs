//! Read-only summaries of a model used for reporting. Nothing here feeds back into
//! training.

use std::cmp::Ordering;

use super::model::HiddenMarkovModel;
use crate::corpus::Alphabet;

/// For every symbol, `log2(e_0 / e_1 / ... / e_{K-1})` where `e_s` is the
/// probability of state `s` emitting it. With two states this is the familiar
/// `log2(e_0 / e_1)`; with one state it is `log2(e_0)`.
///
/// Zero emission probabilities give infinite or NaN ratios.
pub fn emission_log_ratios(model: &HiddenMarkovModel) -> Vec<f64> {
    (0..model.num_observations())
        .map(|o| {
            let first = model.emission(0, o);
            let ratio = (1..model.num_states()).fold(first, |acc, s| acc / model.emission(s, o));
            ratio.log2()
        })
        .collect()
}

/// Symbols with a positive log ratio (largest first) and a negative one (smallest
/// first). Zero and NaN ratios are left out.
pub fn split_log_ratios(
    alphabet: &Alphabet,
    ratios: &[f64],
) -> (Vec<(char, f64)>, Vec<(char, f64)>) {
    let labelled = || {
        alphabet
            .symbols()
            .iter()
            .copied()
            .zip(ratios.iter().copied())
    };

    let mut positive: Vec<(char, f64)> = labelled().filter(|&(_, r)| r > 0.0).collect();
    positive.sort_by(|a, b| by_value_then_symbol(b, a));

    let mut negative: Vec<(char, f64)> = labelled().filter(|&(_, r)| r < 0.0).collect();
    negative.sort_by(by_value_then_symbol);

    (positive, negative)
}

/// Emission distribution of `state`, most probable symbol first (ties broken by
/// symbol, descending).
pub fn ranked_emissions(
    model: &HiddenMarkovModel,
    alphabet: &Alphabet,
    state: usize,
) -> Vec<(char, f64)> {
    let mut ranked: Vec<(char, f64)> = alphabet
        .symbols()
        .iter()
        .copied()
        .zip(model.state(state).emission.iter().copied())
        .collect();
    ranked.sort_by(|a, b| by_value_then_symbol(b, a));
    ranked
}

/// 1-based index of the lowest corpus plog in `history`.
pub fn best_iteration(history: &[f64]) -> Option<usize> {
    history
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(Ordering::Equal))
        .map(|(i, _)| i + 1)
}

fn by_value_then_symbol(a: &(char, f64), b: &(char, f64)) -> Ordering {
    a.1.partial_cmp(&b.1)
        .unwrap_or(Ordering::Equal)
        .then(a.0.cmp(&b.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmm::test_fixtures::two_state_fixture;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_two_state_log_ratios() {
        let (_, model) = two_state_fixture();
        let ratios = emission_log_ratios(&model);
        assert_abs_diff_eq!(ratios[0], (0.5f64 / 0.2).log2(), epsilon = 1e-12);
        assert_abs_diff_eq!(ratios[1], (0.3f64 / 0.5).log2(), epsilon = 1e-12);
        assert_abs_diff_eq!(ratios[2], (0.2f64 / 0.3).log2(), epsilon = 1e-12);
    }

    #[test]
    fn test_three_state_log_ratios_divide_in_order() {
        let model = HiddenMarkovModel::new(
            3,
            2,
            vec![0.2, 0.3, 0.5],
            vec![vec![0.2, 0.3, 0.5]; 3],
            vec![vec![0.8, 0.2], vec![0.5, 0.5], vec![0.25, 0.75]],
        )
        .unwrap();
        let ratios = emission_log_ratios(&model);
        assert_abs_diff_eq!(ratios[0], (0.8f64 / 0.5 / 0.25).log2(), epsilon = 1e-12);
    }

    #[test]
    fn test_split_log_ratios() {
        let (corpus, model) = two_state_fixture();
        let ratios = emission_log_ratios(&model);
        let (positive, negative) = split_log_ratios(corpus.alphabet(), &ratios);

        assert_eq!(positive.len(), 1);
        assert_eq!(positive[0].0, 'a');
        // b: log2(0.6) ~ -0.74, #: log2(2/3) ~ -0.58; most negative first
        let order: Vec<char> = negative.iter().map(|&(c, _)| c).collect();
        assert_eq!(order, vec!['b', '#']);
    }

    #[test]
    fn test_ranked_emissions() {
        let (corpus, model) = two_state_fixture();
        let ranked = ranked_emissions(&model, corpus.alphabet(), 1);
        let order: Vec<char> = ranked.iter().map(|&(c, _)| c).collect();
        assert_eq!(order, vec!['b', '#', 'a']);
    }

    #[test]
    fn test_best_iteration() {
        assert_eq!(best_iteration(&[]), None);
        assert_eq!(best_iteration(&[10.0, 8.0, 8.5]), Some(2));
        assert_eq!(best_iteration(&[3.0]), Some(1));
    }
}
