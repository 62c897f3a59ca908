//! crates/writing_coach_core/src/vocabulary.rs
//!
//! Vocabulary scoring: word segmentation, HSK-level lookup against a read-only
//! dictionary, lexical diversity and a 0-100 richness score.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use jieba_rs::Jieba;
use pinyin::ToPinyin;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use tracing::{info, warn};

//=========================================================================================
// HSK Dictionary
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum DictionaryError {
    #[error("Failed to read HSK vocabulary file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse HSK vocabulary file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One dictionary entry, keyed by the word itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HskEntry {
    pub level: u8,
    pub pinyin: String,
    #[serde(default)]
    pub translation: String,
}

/// Immutable word → level table. Built once at startup and shared behind an `Arc`.
#[derive(Debug, Default)]
pub struct HskDictionary {
    entries: HashMap<String, HskEntry>,
}

impl HskDictionary {
    pub fn from_entries(entries: HashMap<String, HskEntry>) -> Self {
        Self { entries }
    }

    pub fn from_json(json: &str) -> Result<Self, DictionaryError> {
        Ok(Self::from_entries(serde_json::from_str(json)?))
    }

    /// Loads the dictionary file. A missing file yields an empty dictionary so the
    /// service can still start; every word then lands in the unknown bucket.
    pub fn load(path: &Path) -> Result<Self, DictionaryError> {
        match std::fs::read_to_string(path) {
            Ok(json) => {
                let dictionary = Self::from_json(&json)?;
                info!(words = dictionary.len(), "Loaded HSK vocabulary");
                Ok(dictionary)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("HSK vocabulary file not found at {}", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn lookup(&self, word: &str) -> Option<&HskEntry> {
        self.entries.get(word)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//=========================================================================================
// Segmentation
//=========================================================================================

/// Splits raw text into word tokens.
pub trait Segmenter: Send + Sync {
    fn segment<'a>(&self, text: &'a str) -> Vec<&'a str>;
}

impl Segmenter for Jieba {
    fn segment<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.cut(text, true)
    }
}

/// Toneless pinyin, one syllable per character; non-Chinese characters pass through.
pub fn plain_pinyin(word: &str) -> String {
    word.chars()
        .zip(word.to_pinyin())
        .map(|(c, p)| match p {
            Some(p) => p.plain().to_string(),
            None => c.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

//=========================================================================================
// Report Types
//=========================================================================================

/// Occurrence counts per HSK level plus an unknown bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HskDistribution {
    pub levels: [u32; 6],
    pub unknown: u32,
}

impl HskDistribution {
    fn record(&mut self, level: u8, occurrences: u32) {
        match level {
            1..=6 => self.levels[level as usize - 1] += occurrences,
            _ => self.unknown += occurrences,
        }
    }

    /// Occurrences of HSK 4, 5 and 6 words.
    pub fn advanced(&self) -> u32 {
        self.levels[3..].iter().sum()
    }
}

impl Serialize for HskDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(7))?;
        for (i, count) in self.levels.iter().enumerate() {
            map.serialize_entry(&(i + 1).to_string(), count)?;
        }
        map.serialize_entry("unknown", &self.unknown)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordDetail {
    /// 0 for words missing from the dictionary.
    pub level: u8,
    pub pinyin: String,
    pub translation: String,
    pub frequency: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VocabularyReport {
    pub total_words: u32,
    pub unique_words: u32,
    /// Type-token ratio, rounded to three decimals.
    pub ttr: f64,
    pub hsk_distribution: HskDistribution,
    /// Share of HSK 4-6 occurrences, rounded to three decimals.
    pub advanced_ratio: f64,
    pub richness_score: u8,
    pub word_details: BTreeMap<String, WordDetail>,
}

impl VocabularyReport {
    pub fn empty() -> Self {
        Self {
            total_words: 0,
            unique_words: 0,
            ttr: 0.0,
            hsk_distribution: HskDistribution::default(),
            advanced_ratio: 0.0,
            richness_score: 0,
            word_details: BTreeMap::new(),
        }
    }
}

//=========================================================================================
// Scorer
//=========================================================================================

pub struct VocabularyScorer {
    dictionary: Arc<HskDictionary>,
    segmenter: Box<dyn Segmenter>,
}

impl VocabularyScorer {
    pub fn new(dictionary: Arc<HskDictionary>, segmenter: Box<dyn Segmenter>) -> Self {
        Self {
            dictionary,
            segmenter,
        }
    }

    /// A scorer backed by jieba's bundled dictionary.
    pub fn with_jieba(dictionary: Arc<HskDictionary>) -> Self {
        Self::new(dictionary, Box::new(Jieba::new()))
    }

    pub fn score(&self, text: &str) -> VocabularyReport {
        // Single characters and punctuation runs are noise for diversity metrics.
        let words: Vec<&str> = self
            .segmenter
            .segment(text)
            .into_iter()
            .filter(|w| w.chars().count() > 1 && w.chars().any(char::is_alphanumeric))
            .collect();

        if words.is_empty() {
            return VocabularyReport::empty();
        }

        let mut frequencies: HashMap<&str, u32> = HashMap::new();
        for word in &words {
            *frequencies.entry(*word).or_insert(0) += 1;
        }

        let total_words = words.len() as u32;
        let unique_words = frequencies.len() as u32;
        let ttr = unique_words as f64 / total_words as f64;

        let mut hsk_distribution = HskDistribution::default();
        let mut word_details = BTreeMap::new();
        for (word, frequency) in frequencies {
            let detail = match self.dictionary.lookup(word) {
                Some(entry) => WordDetail {
                    level: entry.level,
                    pinyin: entry.pinyin.clone(),
                    translation: entry.translation.clone(),
                    frequency,
                },
                None => WordDetail {
                    level: 0,
                    pinyin: plain_pinyin(word),
                    translation: String::new(),
                    frequency,
                },
            };
            hsk_distribution.record(detail.level, frequency);
            word_details.insert(word.to_string(), detail);
        }

        let advanced_ratio = hsk_distribution.advanced() as f64 / total_words as f64;
        let richness_score = richness_score(ttr, advanced_ratio);

        VocabularyReport {
            total_words,
            unique_words,
            ttr: round3(ttr),
            hsk_distribution,
            advanced_ratio: round3(advanced_ratio),
            richness_score,
            word_details,
        }
    }
}

/// `min(100, round(ttr * 60 + advanced_ratio * 40 * 100))`. The advanced term is
/// scaled by 100 while the diversity term is not; the clamp keeps it in range.
pub fn richness_score(ttr: f64, advanced_ratio: f64) -> u8 {
    let raw = (ttr * 60.0 + advanced_ratio * 40.0 * 100.0).round();
    raw.clamp(0.0, 100.0) as u8
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
