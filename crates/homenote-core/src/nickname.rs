//! Nickname rules
//!
//! A nickname is 2 to 10 characters of ASCII letters, digits and Hangul
//! (syllables and jamo). Anything else is stripped by [`filter_nickname`]
//! while the user types and rejected by [`validate_nickname`] on submit.

use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum nickname length in characters
pub const NICKNAME_MIN_LEN: usize = 2;

/// Maximum nickname length in characters
pub const NICKNAME_MAX_LEN: usize = 10;

static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9가-힣ㄱ-ㅎㅏ-ㅣ]").expect("nickname pattern is valid"));

/// Why a nickname was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NicknameError {
    #[error("nickname must be at least {NICKNAME_MIN_LEN} characters")]
    TooShort,
    #[error("nickname must be at most {NICKNAME_MAX_LEN} characters")]
    TooLong,
    #[error("nickname may only contain letters, digits and Hangul")]
    InvalidCharacters,
}

/// Drop every character a nickname may not contain
#[must_use]
pub fn filter_nickname(input: &str) -> String {
    DISALLOWED.replace_all(input, "").into_owned()
}

/// Check a nickname, reporting the first rule it breaks
///
/// # Errors
/// - `NicknameError` naming the broken rule
pub fn check_nickname(nickname: &str) -> Result<(), NicknameError> {
    if DISALLOWED.is_match(nickname) {
        return Err(NicknameError::InvalidCharacters);
    }

    let len = nickname.chars().count();
    if len < NICKNAME_MIN_LEN {
        Err(NicknameError::TooShort)
    } else if len > NICKNAME_MAX_LEN {
        Err(NicknameError::TooLong)
    } else {
        Ok(())
    }
}

/// Whether `nickname` is acceptable
#[inline]
#[must_use]
pub fn validate_nickname(nickname: &str) -> bool {
    check_nickname(nickname).is_ok()
}
