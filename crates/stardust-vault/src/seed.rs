//! BIP-39 mnemonic helpers
//!
//! Generation and validation are delegated to the `bip39` crate. Phrases are
//! handed out as [`Zeroizing`] strings so they are wiped when dropped.

use bip39::{Language, Mnemonic};
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),
    #[error("Unsupported word count: {0} (expected 12 or 24)")]
    UnsupportedWordCount(usize),
    #[error("Mnemonic generation failed: {0}")]
    GenerationFailed(String),
}

/// Supported phrase lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WordCount {
    /// 128 bits of entropy
    #[default]
    Twelve,
    /// 256 bits of entropy
    TwentyFour,
}

impl WordCount {
    pub fn count(self) -> usize {
        match self {
            Self::Twelve => 12,
            Self::TwentyFour => 24,
        }
    }
}

impl TryFrom<usize> for WordCount {
    type Error = SeedError;

    fn try_from(words: usize) -> Result<Self, Self::Error> {
        match words {
            12 => Ok(Self::Twelve),
            24 => Ok(Self::TwentyFour),
            other => Err(SeedError::UnsupportedWordCount(other)),
        }
    }
}

/// Generate a new English mnemonic.
pub fn generate_mnemonic(words: WordCount) -> Result<Zeroizing<String>, SeedError> {
    let mnemonic = Mnemonic::generate_in(Language::English, words.count())
        .map_err(|e| SeedError::GenerationFailed(e.to_string()))?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

/// Parse an English mnemonic, checking words and checksum.
pub fn parse_mnemonic(phrase: &str) -> Result<Mnemonic, SeedError> {
    Mnemonic::parse_in(Language::English, phrase.trim())
        .map_err(|e| SeedError::InvalidMnemonic(e.to_string()))
}

/// Whether `phrase` is a valid 12- or 24-word English mnemonic.
pub fn validate_mnemonic(phrase: &str) -> bool {
    parse_mnemonic(phrase)
        .map(|m| WordCount::try_from(m.word_count()).is_ok())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VECTOR_12: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_generate_12_words() {
        let phrase = generate_mnemonic(WordCount::Twelve).unwrap();
        assert_eq!(phrase.split_whitespace().count(), 12);
        assert!(validate_mnemonic(&phrase));
    }

    #[test]
    fn test_generate_24_words() {
        let phrase = generate_mnemonic(WordCount::TwentyFour).unwrap();
        assert_eq!(phrase.split_whitespace().count(), 24);
        assert!(validate_mnemonic(&phrase));
    }

    #[test]
    fn test_generated_phrases_differ() {
        let a = generate_mnemonic(WordCount::Twelve).unwrap();
        let b = generate_mnemonic(WordCount::Twelve).unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn test_known_vector_is_valid() {
        assert!(validate_mnemonic(VECTOR_12));
        assert!(validate_mnemonic(&format!("  {}\n", VECTOR_12)));
    }

    #[test]
    fn test_bad_checksum_rejected() {
        // Last word changed: words are valid, checksum is not.
        let bad = VECTOR_12.replace("about", "abandon");
        assert!(!validate_mnemonic(&bad));
        assert!(matches!(parse_mnemonic(&bad), Err(SeedError::InvalidMnemonic(_))));
    }

    #[test]
    fn test_unknown_word_rejected() {
        assert!(!validate_mnemonic("hello world this is not a mnemonic at all ok fine"));
        assert!(!validate_mnemonic(""));
    }

    #[test]
    fn test_word_count_conversion() {
        assert_eq!(WordCount::try_from(12).unwrap(), WordCount::Twelve);
        assert_eq!(WordCount::try_from(24).unwrap(), WordCount::TwentyFour);
        assert!(matches!(
            WordCount::try_from(15),
            Err(SeedError::UnsupportedWordCount(15))
        ));
    }
}
