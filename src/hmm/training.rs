//! The Baum-Welch training loop.
//!
//! A [`Trainer`] moves through
//! `Initializing -> Iterating -> {Converged, Diverged, Failed}`.
//! Each iteration runs the E-step on the current model, re-estimates a candidate
//! model, scores the corpus under the candidate and only then replaces the current
//! model, so a failed iteration leaves the last good model in place.
//!
//! Training stops when the corpus plog gets worse or improves by less than
//! `threshold`, after `max_iterations`, on a cooperative stop request, or when a
//! sequence gets probability 0. Any other error (a degenerate re-estimated
//! distribution) is fatal: it is returned to the caller and the trainer refuses
//! further iterations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use super::diagnostics::emission_log_ratios;
use super::distribution::RandomDistribution;
use super::forward_backward::LikelihoodRecord;
use super::model::{HiddenMarkovModel, DEFAULT_TOLERANCE};
use super::reestimate::{reestimate, DeadState};
use super::soft_counts::expectation;
use crate::corpus::Corpus;
use crate::error::{Error, Result};

/// Configuration options for Baum-Welch training.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Maximum number of E/M iterations.
    pub max_iterations: usize,
    /// Minimum decrease of the corpus plog (bits) for training to continue.
    pub threshold: f64,
    /// Allowed deviation from 1 when checking re-estimated distributions.
    pub tolerance: f64,
    /// Spread the E-step over the rayon thread pool.
    pub parallel: bool,
}

impl TrainingConfig {
    /// Defaults: 100 iterations, threshold 0.1, tolerance 1e-6, serial E-step.
    pub fn new() -> Self {
        Self {
            max_iterations: 100,
            threshold: 0.1,
            tolerance: DEFAULT_TOLERANCE,
            parallel: false,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingPhase {
    Initializing,
    Iterating,
    Converged,
    Diverged,
    /// A fatal error aborted the run.
    Failed,
}

/// Why [`Trainer::run`] returned.
#[derive(Debug)]
pub enum StopReason {
    Converged,
    IterationCap,
    StopRequested,
    /// A sequence got probability 0; the model is the last good one.
    Diverged(Error),
}

/// Everything observable about one completed iteration.
#[derive(Debug, Clone)]
pub struct IterationReport {
    /// 1-based iteration number.
    pub iteration: usize,
    /// Corpus plog under the re-estimated model.
    pub plog: f64,
    /// Corpus plog before this iteration.
    pub previous_plog: f64,
    pub likelihood: LikelihoodRecord,
    pub dead_states: Vec<DeadState>,
    /// Per-symbol emission log ratios of the re-estimated model.
    pub log_ratios: Vec<f64>,
    pub converged: bool,
}

impl IterationReport {
    /// Decrease of the corpus plog; negative if the likelihood got worse.
    pub fn improvement(&self) -> f64 {
        self.previous_plog - self.plog
    }
}

/// Consumer of per-iteration reports. Sinks only observe; training behaves the same
/// whichever sink is attached.
pub trait ReportSink {
    fn initialized(&mut self, _model: &HiddenMarkovModel, _baseline: &LikelihoodRecord) {}

    fn iteration(&mut self, model: &HiddenMarkovModel, report: &IterationReport);
}

/// Discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn iteration(&mut self, _model: &HiddenMarkovModel, _report: &IterationReport) {}
}

/// Writes a one-line summary per iteration through `log`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn initialized(&mut self, model: &HiddenMarkovModel, baseline: &LikelihoodRecord) {
        info!(
            "initialized {} states: corpus plog {:.4}",
            model.num_states(),
            baseline.total()
        );
    }

    fn iteration(&mut self, _model: &HiddenMarkovModel, report: &IterationReport) {
        info!(
            "iteration {}: corpus plog {:.4} (improvement {:.4})",
            report.iteration,
            report.plog,
            report.improvement()
        );
    }
}

/// Cooperative stop request, checked between iterations.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of [`Trainer::run`].
#[derive(Debug)]
pub struct TrainingSummary {
    pub reason: StopReason,
    pub iterations: usize,
    /// Corpus plog of the model training started from, if it could be scored.
    pub baseline_plog: Option<f64>,
    /// Corpus plog after each completed iteration.
    pub plog_history: Vec<f64>,
}

/// Drives Baum-Welch over a corpus, owning the model being trained.
#[derive(Debug)]
pub struct Trainer<'c> {
    corpus: &'c Corpus,
    config: TrainingConfig,
    model: HiddenMarkovModel,
    phase: TrainingPhase,
    iteration: usize,
    baseline_plog: Option<f64>,
    current_plog: f64,
    plog_history: Vec<f64>,
}

impl<'c> Trainer<'c> {
    /// Start from an existing model, which must emit the corpus alphabet.
    pub fn new(
        corpus: &'c Corpus,
        model: HiddenMarkovModel,
        config: TrainingConfig,
    ) -> Result<Self> {
        if corpus.is_empty() {
            return Err(Error::invalid_input("cannot train on an empty corpus"));
        }
        model.check_alphabet(corpus.alphabet())?;
        model.validate(DEFAULT_TOLERANCE)?;
        Ok(Self {
            corpus,
            config,
            model,
            phase: TrainingPhase::Initializing,
            iteration: 0,
            baseline_plog: None,
            current_plog: f64::INFINITY,
            plog_history: Vec::new(),
        })
    }

    /// Start from a model with `num_states` states seeded by `generator`.
    pub fn with_random_model(
        corpus: &'c Corpus,
        num_states: usize,
        generator: &mut dyn RandomDistribution,
        config: TrainingConfig,
    ) -> Result<Self> {
        let model = HiddenMarkovModel::random_for(num_states, corpus.alphabet(), generator)?;
        Self::new(corpus, model, config)
    }

    pub fn model(&self) -> &HiddenMarkovModel {
        &self.model
    }

    pub fn into_model(self) -> HiddenMarkovModel {
        self.model
    }

    pub fn phase(&self) -> TrainingPhase {
        self.phase
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Number of completed iterations.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn plog_history(&self) -> &[f64] {
        &self.plog_history
    }

    /// Score the corpus under the starting model and enter `Iterating`.
    pub fn initialize(&mut self) -> Result<LikelihoodRecord> {
        if self.phase != TrainingPhase::Initializing {
            return Err(Error::invalid_input(format!(
                "trainer is already {:?}",
                self.phase
            )));
        }
        let baseline = LikelihoodRecord::compute(&self.model, self.corpus, self.config.parallel)
            .map_err(|e| self.fail(e))?;
        info!(
            "baseline corpus plog {:.4} over {} sequences",
            baseline.total(),
            self.corpus.len()
        );
        self.baseline_plog = Some(baseline.total());
        self.current_plog = baseline.total();
        self.phase = TrainingPhase::Iterating;
        Ok(baseline)
    }

    /// Run one E/M iteration.
    ///
    /// On a zero-probability sequence the trainer becomes `Diverged` and keeps the
    /// model it had before the call.
    pub fn step(&mut self) -> Result<IterationReport> {
        if self.phase != TrainingPhase::Iterating {
            return Err(Error::invalid_input(format!(
                "cannot run an iteration while {:?}",
                self.phase
            )));
        }
        let parallel = self.config.parallel;

        let expected = expectation(&self.model, self.corpus, parallel).map_err(|e| self.fail(e))?;
        let update = reestimate(&self.model, &expected, self.config.tolerance)
            .map_err(|e| self.fail(e))?;
        let likelihood = LikelihoodRecord::compute(&update.model, self.corpus, parallel)
            .map_err(|e| self.fail(e))?;

        let previous_plog = self.current_plog;
        let plog = likelihood.total();
        let converged = plog > previous_plog || previous_plog - plog < self.config.threshold;

        self.model = update.model;
        self.iteration += 1;
        self.current_plog = plog;
        self.plog_history.push(plog);

        debug!(
            "iteration {}: corpus plog {:.4} -> {:.4}",
            self.iteration, previous_plog, plog
        );
        if converged {
            info!("converged after {} iterations", self.iteration);
            self.phase = TrainingPhase::Converged;
        }

        Ok(IterationReport {
            iteration: self.iteration,
            plog,
            previous_plog,
            likelihood,
            dead_states: update.dead_states,
            log_ratios: emission_log_ratios(&self.model),
            converged,
        })
    }

    /// Train until convergence, divergence, the iteration cap or a stop request.
    ///
    /// Divergence is reported in the summary; any other error is returned, the
    /// trainer keeps its last good model and becomes `Failed`.
    pub fn run(
        &mut self,
        sink: &mut dyn ReportSink,
        stop: &StopHandle,
    ) -> Result<TrainingSummary> {
        if matches!(self.phase, TrainingPhase::Diverged | TrainingPhase::Failed) {
            return Err(Error::invalid_input(format!(
                "training has already ended as {:?}",
                self.phase
            )));
        }

        if self.phase == TrainingPhase::Initializing {
            match self.initialize() {
                Ok(baseline) => sink.initialized(&self.model, &baseline),
                Err(e) if e.is_divergence() => return Ok(self.summary(StopReason::Diverged(e))),
                Err(e) => return Err(e),
            }
        }

        loop {
            if self.phase == TrainingPhase::Converged {
                return Ok(self.summary(StopReason::Converged));
            }
            if self.iteration >= self.config.max_iterations {
                info!("stopping at the iteration cap ({})", self.config.max_iterations);
                return Ok(self.summary(StopReason::IterationCap));
            }
            if stop.is_stop_requested() {
                info!("stop requested after {} iterations", self.iteration);
                return Ok(self.summary(StopReason::StopRequested));
            }

            match self.step() {
                Ok(report) => sink.iteration(&self.model, &report),
                Err(e) if e.is_divergence() => return Ok(self.summary(StopReason::Diverged(e))),
                Err(e) => return Err(e),
            }
        }
    }

    /// [`run`](Self::run) without a sink or stop handle.
    pub fn train(&mut self) -> Result<TrainingSummary> {
        self.run(&mut NullSink, &StopHandle::new())
    }

    fn fail(&mut self, e: Error) -> Error {
        if e.is_divergence() {
            info!("training diverged: {}", e);
            self.phase = TrainingPhase::Diverged;
        } else {
            warn!("training failed: {}", e);
            self.phase = TrainingPhase::Failed;
        }
        e
    }

    fn summary(&self, reason: StopReason) -> TrainingSummary {
        TrainingSummary {
            reason,
            iterations: self.iteration,
            baseline_plog: self.baseline_plog,
            plog_history: self.plog_history.clone(),
        }
    }
}
