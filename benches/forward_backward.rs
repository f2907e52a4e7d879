use criterion::{black_box, criterion_group, criterion_main, Criterion};
use letter_hmm::hmm::{
    expectation, reestimate, DirichletDistribution, ForwardBackward, DEFAULT_TOLERANCE,
};
use letter_hmm::{Corpus, HiddenMarkovModel};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

fn random_words(n: usize, seed: u64) -> Vec<String> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let len = rng.gen_range(2..10);
            (0..len)
                .map(|_| LETTERS[rng.gen_range(0..LETTERS.len())] as char)
                .collect()
        })
        .collect()
}

fn setup(words: usize, states: usize) -> (Corpus, HiddenMarkovModel) {
    let corpus = Corpus::from_words(random_words(words, 42)).unwrap();
    let mut gen = DirichletDistribution::with_seed(7);
    let model = HiddenMarkovModel::random_for(states, corpus.alphabet(), &mut gen).unwrap();
    (corpus, model)
}

fn bench_forward_backward(c: &mut Criterion) {
    let mut group = c.benchmark_group("forward_backward");

    for states in [2, 8] {
        let (corpus, model) = setup(1, states);
        let seq = &corpus.sequences()[0];
        group.bench_function(format!("one_word_k{}", states), |b| {
            b.iter(|| ForwardBackward::compute(black_box(&model), black_box(seq)))
        });
    }

    group.finish();
}

fn bench_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("baum_welch_iteration");
    group.sample_size(20);

    let (corpus, model) = setup(1_000, 2);

    group.bench_function("1k_words_k2_serial", |b| {
        b.iter(|| {
            let soft = expectation(black_box(&model), &corpus, false).unwrap();
            reestimate(&model, &soft, DEFAULT_TOLERANCE).unwrap()
        })
    });

    group.bench_function("1k_words_k2_parallel", |b| {
        b.iter(|| {
            let soft = expectation(black_box(&model), &corpus, true).unwrap();
            reestimate(&model, &soft, DEFAULT_TOLERANCE).unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_forward_backward, bench_iteration);
criterion_main!(benches);
