pub mod corpus;
pub mod error;
pub mod hmm;

pub use corpus::{Alphabet, Corpus, Sequence, END_MARKER};
pub use error::{Error, Result};
pub use hmm::{HiddenMarkovModel, Trainer, TrainingConfig};
