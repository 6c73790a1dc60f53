//! Password rules for wallet encryption
//!
//! There is one hard rule: a password must have at least
//! [`MIN_PASSWORD_LEN`] characters. Everything else is advisory. The
//! [`assess`] estimate feeds a log warning when a wallet is stored under a
//! guessable password, but it never rejects one.
//!
//! The estimate is character-pool size times
//! length, minus penalties for dictionary words, repeats and runs.

use std::collections::HashSet;

/// Shortest password accepted by the vault.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Entropy (bits) below which a warning is logged.
pub const RECOMMENDED_ENTROPY_BITS: f64 = 50.0;

/// Coarse password strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Strength {
    /// Below 30 bits
    VeryWeak,
    /// 30–49 bits
    Weak,
    /// 50–79 bits
    Reasonable,
    /// 80 bits or more
    Strong,
}

impl Strength {
    fn from_bits(bits: f64) -> Self {
        if bits < 30.0 {
            Self::VeryWeak
        } else if bits < RECOMMENDED_ENTROPY_BITS {
            Self::Weak
        } else if bits < 80.0 {
            Self::Reasonable
        } else {
            Self::Strong
        }
    }

    pub fn is_recommended(self) -> bool {
        self >= Self::Reasonable
    }
}

/// Result of [`assess`].
#[derive(Debug, Clone)]
pub struct Assessment {
    pub entropy_bits: f64,
    pub strength: Strength,
    pub warnings: Vec<&'static str>,
}

/// Words that show up in wallet password dumps.
const DICTIONARY: &[&str] = &[
    "password", "passw0rd", "qwerty", "123456", "111111", "letmein", "welcome", "admin",
    "iloveyou", "monkey", "dragon", "football", "wallet", "crypto", "stardust", "mnemonic",
    "polkadot", "substrate", "bitcoin", "secret",
];

/// Character count, not byte count.
pub fn char_len(password: &str) -> usize {
    password.chars().count()
}

/// Whether `password` is long enough to be accepted with the given minimum.
pub fn meets_min_length(password: &str, min_len: usize) -> bool {
    char_len(password) >= min_len.max(MIN_PASSWORD_LEN)
}

/// Estimate password strength.
pub fn assess(password: &str) -> Assessment {
    let mut warnings = Vec::new();
    let len = char_len(password);
    if len == 0 {
        return Assessment {
            entropy_bits: 0.0,
            strength: Strength::VeryWeak,
            warnings: vec!["empty password"],
        };
    }

    let pool = pool_size(password);
    let mut bits = len as f64 * pool.log2();

    let lower = password.to_lowercase();
    if DICTIONARY.iter().any(|w| lower.contains(w)) {
        bits *= 0.5;
        warnings.push("contains a common word");
    }

    let distinct = password.chars().collect::<HashSet<_>>().len();
    if distinct * 2 < len {
        bits *= distinct as f64 / len as f64 + 0.5;
        warnings.push("many repeated characters");
    }

    let runs = ascending_or_descending_runs(password);
    if runs >= 3 {
        bits -= runs as f64 * 2.5;
        warnings.push("contains sequences like abc or 321");
    }

    if len < 12 {
        warnings.push("shorter than 12 characters");
    }

    let bits = bits.max(0.0);
    Assessment {
        entropy_bits: bits,
        strength: Strength::from_bits(bits),
        warnings,
    }
}

fn pool_size(password: &str) -> f64 {
    let (mut lower, mut upper, mut digit, mut symbol, mut other) = (false, false, false, false, false);
    for ch in password.chars() {
        match ch {
            'a'..='z' => lower = true,
            'A'..='Z' => upper = true,
            '0'..='9' => digit = true,
            c if c.is_ascii() => symbol = true,
            _ => other = true,
        }
    }

    let pool = [(lower, 26.0), (upper, 26.0), (digit, 10.0), (symbol, 33.0), (other, 96.0)]
        .iter()
        .filter(|(present, _)| *present)
        .map(|(_, size)| size)
        .sum::<f64>();
    pool.max(2.0)
}

/// Count 3-character windows that step by +1 or -1.
fn ascending_or_descending_runs(password: &str) -> usize {
    let codes: Vec<i64> = password.chars().map(|c| c as i64).collect();
    codes
        .windows(3)
        .filter(|w| {
            let (d1, d2) = (w[1] - w[0], w[2] - w[1]);
            d1 == d2 && d1.abs() == 1
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_length_counts_chars() {
        assert!(!meets_min_length("short", MIN_PASSWORD_LEN));
        assert!(!meets_min_length("1234567", MIN_PASSWORD_LEN));
        assert!(meets_min_length("12345678", MIN_PASSWORD_LEN));
        // 8 multi-byte characters
        assert!(meets_min_length("密码密码密码密码", MIN_PASSWORD_LEN));
    }

    #[test]
    fn test_min_length_never_below_floor() {
        assert!(!meets_min_length("abc", 2));
        assert!(!meets_min_length("abcdefghij", 12));
        assert!(meets_min_length("abcdefghijkl", 12));
    }

    #[test]
    fn test_empty_is_very_weak() {
        let a = assess("");
        assert_eq!(a.entropy_bits, 0.0);
        assert_eq!(a.strength, Strength::VeryWeak);
    }

    #[test]
    fn test_dictionary_word_flagged() {
        let a = assess("MyWallet2024");
        assert!(a.warnings.contains(&"contains a common word"));
    }

    #[test]
    fn test_sequence_flagged() {
        let a = assess("abcdefgh");
        assert!(a.warnings.contains(&"contains sequences like abc or 321"));
        assert!(!a.strength.is_recommended());
    }

    #[test]
    fn test_repeats_penalised() {
        let repeated = assess("aaaaaaaaaaaa");
        let varied = assess("qxmtpjwrkzvb");
        assert!(repeated.entropy_bits < varied.entropy_bits);
        assert!(repeated.warnings.contains(&"many repeated characters"));
    }

    #[test]
    fn test_long_mixed_password_recommended() {
        let a = assess("Velvet!Harbor#Quartz9");
        assert!(a.strength.is_recommended(), "got {:?} ({:.1} bits)", a.strength, a.entropy_bits);
        assert!(a.warnings.is_empty());
    }

    #[test]
    fn test_more_classes_more_bits() {
        assert!(assess("kqzvmtrw").entropy_bits < assess("kQ7!mT#w").entropy_bits);
    }

    #[test]
    fn test_strength_order() {
        assert!(Strength::VeryWeak < Strength::Weak);
        assert!(Strength::Weak < Strength::Reasonable);
        assert!(Strength::Reasonable < Strength::Strong);
    }
}
