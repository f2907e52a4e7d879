//! Corpora of symbol sequences and the alphabet they are drawn from.
//!
//! Every sequence is terminated by the alphabet's end marker and is stored both as
//! text and as symbol indices into the alphabet, which is what the model tables
//! are indexed by.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, warn};

use crate::error::{Error, Result};

/// Marker appended to every word by the loader.
pub const END_MARKER: char = '#';

/// A finite, ordered set of symbols. Symbol identity is its index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbols: Vec<char>,
    index: HashMap<char, usize>,
    end_marker: char,
}

impl Alphabet {
    /// Build an alphabet from distinct symbols. The end marker must be one of them.
    pub fn new(symbols: Vec<char>, end_marker: char) -> Result<Self> {
        if symbols.is_empty() {
            return Err(Error::invalid_input("alphabet must not be empty"));
        }
        let mut index = HashMap::with_capacity(symbols.len());
        for (i, &c) in symbols.iter().enumerate() {
            if index.insert(c, i).is_some() {
                return Err(Error::invalid_input(format!(
                    "symbol {:?} appears twice in the alphabet",
                    c
                )));
            }
        }
        if !index.contains_key(&end_marker) {
            return Err(Error::invalid_input(format!(
                "end marker {:?} is not part of the alphabet",
                end_marker
            )));
        }
        Ok(Self {
            symbols,
            index,
            end_marker,
        })
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }

    pub fn index_of(&self, symbol: char) -> Option<usize> {
        self.index.get(&symbol).copied()
    }

    pub fn end_marker(&self) -> char {
        self.end_marker
    }

    /// Translate text into symbol indices, failing on the first unknown symbol.
    pub fn encode(&self, text: &str) -> Result<Vec<usize>> {
        text.chars()
            .map(|c| {
                self.index_of(c).ok_or_else(|| {
                    Error::invalid_input(format!(
                        "symbol {:?} in {:?} is not part of the alphabet",
                        c, text
                    ))
                })
            })
            .collect()
    }
}

/// One observed sequence, always terminated by the end marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    text: String,
    symbols: Vec<usize>,
}

impl Sequence {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Symbol indices into the corpus alphabet.
    pub fn symbols(&self) -> &[usize] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// An ordered, non-empty collection of sequences over one alphabet.
#[derive(Debug, Clone)]
pub struct Corpus {
    alphabet: Alphabet,
    sequences: Vec<Sequence>,
}

impl Corpus {
    /// Build a corpus over an explicit alphabet.
    ///
    /// Texts lacking a trailing end marker get one appended. Any symbol outside the
    /// alphabet is an error.
    pub fn new<I, S>(alphabet: Alphabet, texts: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut sequences = Vec::new();
        for text in texts {
            let mut text = text.as_ref().to_string();
            if !text.ends_with(alphabet.end_marker()) {
                text.push(alphabet.end_marker());
            }
            let symbols = alphabet.encode(&text)?;
            sequences.push(Sequence { text, symbols });
        }
        if sequences.is_empty() {
            return Err(Error::invalid_input("corpus must contain at least one sequence"));
        }
        Ok(Self {
            alphabet,
            sequences,
        })
    }

    /// Build a corpus from raw words, deriving the alphabet.
    ///
    /// Words are lower-cased and terminated with [`END_MARKER`]. The alphabet is made
    /// of letters `a`-`z`, apostrophe and period in first-seen order, plus the end
    /// marker. Other characters are dropped; blank words are skipped.
    pub fn from_words<I, S>(words: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut symbols = Vec::new();
        let mut texts = Vec::new();
        let mut dropped = 0_usize;

        for word in words {
            let word = word.as_ref().trim().to_lowercase();
            if word.is_empty() {
                continue;
            }
            let mut text = String::with_capacity(word.len() + 1);
            for c in word.chars() {
                if is_word_symbol(c) {
                    text.push(c);
                } else {
                    dropped += 1;
                }
            }
            text.push(END_MARKER);
            for c in text.chars() {
                if !symbols.contains(&c) {
                    symbols.push(c);
                }
            }
            texts.push(text);
        }

        if dropped > 0 {
            warn!("dropped {} characters outside the letter alphabet", dropped);
        }
        if texts.is_empty() {
            return Err(Error::invalid_input("corpus must contain at least one word"));
        }

        let alphabet = Alphabet::new(symbols, END_MARKER)?;
        Self::new(alphabet, texts)
    }

    /// Read a corpus with one word per line.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let lines = reader.lines().collect::<std::io::Result<Vec<_>>>()?;
        let corpus = Self::from_words(lines)?;
        debug!(
            "loaded {} words over {} symbols from {}",
            corpus.len(),
            corpus.alphabet.len(),
            path.display()
        );
        Ok(corpus)
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Occurrences of each symbol across the corpus, indexed like the alphabet.
    pub fn symbol_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.alphabet.len()];
        for seq in &self.sequences {
            for &s in seq.symbols() {
                counts[s] += 1;
            }
        }
        counts
    }
}

fn is_word_symbol(c: char) -> bool {
    c.is_ascii_lowercase() || c == '\'' || c == '.'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_words_derives_alphabet_in_first_seen_order() {
        let corpus = Corpus::from_words(["Ab", "ba"]).unwrap();
        assert_eq!(corpus.alphabet().symbols(), &['a', 'b', '#']);
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.sequences()[0].text(), "ab#");
        assert_eq!(corpus.sequences()[1].symbols(), &[1, 0, 2]);
    }

    #[test]
    fn test_from_words_drops_foreign_characters_and_blank_lines() {
        let corpus = Corpus::from_words(["co-op", "", "  ", "don't", "etc."]).unwrap();
        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.sequences()[0].text(), "coop#");
        assert_eq!(corpus.sequences()[1].text(), "don't#");
        assert_eq!(corpus.sequences()[2].text(), "etc.#");
        assert!(corpus.alphabet().index_of('-').is_none());
    }

    #[test]
    fn test_empty_corpus_is_rejected() {
        let words: Vec<&str> = vec![];
        assert!(matches!(
            Corpus::from_words(words),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_new_appends_end_marker() {
        let alphabet = Alphabet::new(vec!['a', 'b', '#'], '#').unwrap();
        let corpus = Corpus::new(alphabet, ["ab", "ba#"]).unwrap();
        assert_eq!(corpus.sequences()[0].text(), "ab#");
        assert_eq!(corpus.sequences()[1].text(), "ba#");
    }

    #[test]
    fn test_new_rejects_unknown_symbol() {
        let alphabet = Alphabet::new(vec!['a', '#'], '#').unwrap();
        assert!(matches!(
            Corpus::new(alphabet, ["ab#"]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_alphabet_requires_end_marker_and_distinct_symbols() {
        assert!(Alphabet::new(vec!['a', 'b'], '#').is_err());
        assert!(Alphabet::new(vec!['a', 'a', '#'], '#').is_err());
        assert!(Alphabet::new(vec![], '#').is_err());
    }

    #[test]
    fn test_symbol_counts() {
        let corpus = Corpus::from_words(["aab", "b"]).unwrap();
        // alphabet: a, b, #
        assert_eq!(corpus.symbol_counts(), vec![2, 2, 2]);
    }

    #[test]
    fn test_load_reads_one_word_per_line() {
        let name = format!("letter_hmm_corpus_{}.txt", std::process::id());
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, "The\nof\n\nand\n").unwrap();
        let corpus = Corpus::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.sequences()[0].text(), "the#");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = Corpus::load("/nonexistent/letter_hmm/words.txt");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
