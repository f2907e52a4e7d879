//! Learn a letter HMM from a word list.
//!
//! Usage:
//! ```text
//! cargo run --release --bin train_letters -- english1000.txt --states 2 --seed 1
//! ```

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use letter_hmm::hmm::{
    best_iteration, emission_log_ratios, ranked_emissions, split_log_ratios, viterbi,
    DirichletDistribution, IterationReport, LikelihoodRecord, RandomDistribution, ReportSink,
    StickBreaking, StopHandle, StopReason, Trainer, TrainingConfig,
};
use letter_hmm::{Alphabet, Corpus, HiddenMarkovModel};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Init {
    Dirichlet,
    StickBreaking,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Learn a letter HMM from a word list with Baum-Welch")]
struct Args {
    /// Word list, one word per line
    corpus: PathBuf,

    /// Number of hidden states (asked for interactively when omitted)
    #[arg(long, short = 'k')]
    states: Option<usize>,

    /// Seed for the parameter initialization
    #[arg(long)]
    seed: Option<u64>,

    /// How the initial parameters are drawn
    #[arg(long, value_enum, default_value = "dirichlet")]
    init: Init,

    /// Maximum number of E/M iterations
    #[arg(long, default_value = "100")]
    max_iterations: usize,

    /// Stop once the summed plog improves by less than this many bits
    #[arg(long, default_value = "0.1")]
    threshold: f64,

    /// Run the E-step on all cores
    #[arg(long)]
    parallel: bool,

    /// Print every parameter after every iteration
    #[arg(long)]
    verbose: bool,

    /// Label the first N words with their Viterbi states after training
    #[arg(long, default_value = "0")]
    decode: usize,
}

struct ConsoleSink<'a> {
    alphabet: &'a Alphabet,
    verbose: bool,
}

impl ReportSink for ConsoleSink<'_> {
    fn initialized(&mut self, model: &HiddenMarkovModel, baseline: &LikelihoodRecord) {
        if self.verbose {
            banner("Initialization");
            print_parameters(model, self.alphabet);
        }
        println!("Initial sum of plogs: {:.4}", baseline.total());
    }

    fn iteration(&mut self, model: &HiddenMarkovModel, report: &IterationReport) {
        if self.verbose {
            banner(&format!("Iteration {}", report.iteration));
            print_parameters(model, self.alphabet);
            print_log_ratios(self.alphabet, &report.log_ratios, model.num_states());
            for dead in &report.dead_states {
                println!("State {} had no expected departures and was left unchanged", dead.state);
            }
            println!("\nSum of plogs: {:.4}", report.plog);
        } else {
            println!(
                "Iteration {:>3}  sum of plogs {:.4}  improvement {:.4}",
                report.iteration,
                report.plog,
                report.improvement()
            );
        }
    }
}

fn banner(title: &str) {
    println!("{}", "-".repeat(33));
    println!("-\t{}\t\t-", title);
    println!("{}", "-".repeat(33));
}

fn print_parameters(model: &HiddenMarkovModel, alphabet: &Alphabet) {
    println!("Pi:");
    for state in model.states() {
        println!("\tState {}: {:.4}", state.index, state.initial);
    }

    println!("\n*** Emission Probabilities ***");
    for state in model.states() {
        println!("State {}", state.index);
        for (symbol, p) in ranked_emissions(model, alphabet, state.index) {
            println!("\t{}\t{:.4}", symbol, p);
        }
    }

    println!("\n*** Transition Probabilities ***");
    for state in model.states() {
        println!("From State {}:", state.index);
        for (to, p) in state.transition.iter().enumerate() {
            println!("\tTo State {}: {:.4}", to, p);
        }
    }
}

fn print_log_ratios(alphabet: &Alphabet, ratios: &[f64], num_states: usize) {
    let (positive, negative) = split_log_ratios(alphabet, ratios);
    println!("\nLog ratios of emissions from the {} states:", num_states);
    for (symbol, r) in positive {
        println!("{}\t{:.4}", symbol, r);
    }
    println!();
    for (symbol, r) in negative {
        println!("{}\t{:.4}", symbol, r);
    }
}

fn prompt_states() -> Result<usize> {
    print!("How many states would you like to use?: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    line.trim()
        .parse()
        .with_context(|| format!("not a number of states: {:?}", line.trim()))
}

fn generator(init: Init, seed: Option<u64>) -> Box<dyn RandomDistribution> {
    match (init, seed) {
        (Init::Dirichlet, Some(seed)) => Box::new(DirichletDistribution::with_seed(seed)),
        (Init::Dirichlet, None) => Box::new(DirichletDistribution::new()),
        (Init::StickBreaking, Some(seed)) => Box::new(StickBreaking::with_seed(seed)),
        (Init::StickBreaking, None) => Box::new(StickBreaking::new()),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let corpus = Corpus::load(&args.corpus)
        .with_context(|| format!("failed to load corpus from {}", args.corpus.display()))?;
    let states = match args.states {
        Some(k) => k,
        None => prompt_states()?,
    };
    if states == 0 {
        bail!("the number of states must be at least 1");
    }

    let config = TrainingConfig::new()
        .with_max_iterations(args.max_iterations)
        .with_threshold(args.threshold)
        .with_parallel(args.parallel);
    let mut generator = generator(args.init, args.seed);
    let mut trainer = Trainer::with_random_model(&corpus, states, generator.as_mut(), config)?;

    let mut sink = ConsoleSink {
        alphabet: corpus.alphabet(),
        verbose: args.verbose,
    };
    let summary = trainer.run(&mut sink, &StopHandle::new())?;

    match &summary.reason {
        StopReason::Converged => println!("\nConverged after {} iterations", summary.iterations),
        StopReason::IterationCap => {
            println!("\nStopped at the iteration cap ({})", summary.iterations)
        }
        StopReason::StopRequested => println!("\nStopped on request"),
        StopReason::Diverged(e) => eprintln!("\nTraining diverged: {}", e),
    }

    let model = trainer.model();
    if !args.verbose {
        println!();
        print_parameters(model, corpus.alphabet());
        print_log_ratios(
            corpus.alphabet(),
            &emission_log_ratios(model),
            model.num_states(),
        );
    }
    if let Some(best) = best_iteration(&summary.plog_history) {
        println!("\nLowest sum of plogs at iteration {}", best);
    }

    for seq in corpus.sequences().iter().take(args.decode) {
        let decoding = viterbi(model, seq.symbols())?;
        println!(
            "{}\t{}\t{:.4}",
            seq.text(),
            decoding.state_labels(),
            decoding.plog()
        );
    }

    Ok(())
}
