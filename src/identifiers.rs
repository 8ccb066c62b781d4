//! Key validation and normalization for each lookup [`Mode`].
//!
//! ISBNs are reduced to their digits (plus a trailing `X` for ISBN-10) and
//! checked against their checksum. LCCNs follow the Library of Congress
//! normalization rules: whitespace removed, anything after a `/` dropped,
//! and a hyphenated serial zero-padded to six digits.

use thiserror::Error;

use crate::models::Mode;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid ISBN '{0}': expected 10 or 13 digits with a valid checksum")]
    InvalidIsbn(String),
    #[error("invalid LCCN '{0}': expected an optional alphabetic prefix and 8 or 10 digits")]
    InvalidLccn(String),
}

/// Validate `key` under the rules of `mode` and return its normalized form.
pub fn normalize_key(key: &str, mode: Mode) -> Result<String, KeyError> {
    match mode {
        Mode::Isbn => normalize_isbn(key),
        Mode::Lccn => normalize_lccn(key),
    }
}

/// Strip separators and validate an ISBN-10 or ISBN-13.
pub fn normalize_isbn(isbn: &str) -> Result<String, KeyError> {
    let normalized: String = isbn
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect::<String>()
        .to_uppercase();

    let valid = match normalized.len() {
        10 => validate_isbn10(&normalized),
        13 => validate_isbn13(&normalized),
        _ => false,
    };

    if valid {
        Ok(normalized)
    } else {
        Err(KeyError::InvalidIsbn(isbn.to_string()))
    }
}

pub fn is_valid_isbn(isbn: &str) -> bool {
    normalize_isbn(isbn).is_ok()
}

fn validate_isbn10(isbn: &str) -> bool {
    let chars: Vec<char> = isbn.chars().collect();
    let mut sum = 0u32;
    for (i, &c) in chars.iter().enumerate() {
        let value = match c {
            'X' if i == 9 => 10,
            d => match d.to_digit(10) {
                Some(v) => v,
                None => return false,
            },
        };
        sum += value * (10 - i as u32);
    }
    sum % 11 == 0
}

fn validate_isbn13(isbn: &str) -> bool {
    let mut sum = 0u32;
    for (i, c) in isbn.chars().enumerate() {
        let Some(value) = c.to_digit(10) else {
            return false;
        };
        sum += if i % 2 == 0 { value } else { value * 3 };
    }
    sum % 10 == 0
}

/// Normalize an LCCN, e.g. `"n78-890351"` → `"n78890351"` and
/// `"85-2 "` → `"85000002"`.
pub fn normalize_lccn(lccn: &str) -> Result<String, KeyError> {
    let mut s: String = lccn.chars().filter(|c| !c.is_whitespace()).collect();
    if let Some(pos) = s.find('/') {
        s.truncate(pos);
    }

    if let Some(pos) = s.find('-') {
        let (head, tail) = s.split_at(pos);
        let serial = &tail[1..];
        if serial.is_empty() || serial.len() > 6 || !serial.chars().all(|c| c.is_ascii_digit()) {
            return Err(KeyError::InvalidLccn(lccn.to_string()));
        }
        s = format!("{}{:0>6}", head, serial);
    }

    let prefix_len = s.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    let digits = &s[prefix_len..];
    let valid = prefix_len <= 3
        && (digits.len() == 8 || digits.len() == 10)
        && digits.chars().all(|c| c.is_ascii_digit());

    if valid {
        Ok(s.to_lowercase())
    } else {
        Err(KeyError::InvalidLccn(lccn.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isbn13_valid() {
        assert_eq!(normalize_isbn("9780004704814").unwrap(), "9780004704814");
        assert_eq!(normalize_isbn("978-0-00-470481-4").unwrap(), "9780004704814");
    }

    #[test]
    fn test_isbn10_with_x() {
        assert_eq!(normalize_isbn("0-8044-2957-x").unwrap(), "080442957X");
        assert!(is_valid_isbn("0006174280"));
    }

    #[test]
    fn test_isbn_bad_checksum() {
        assert_eq!(
            normalize_isbn("9780004704815"),
            Err(KeyError::InvalidIsbn("9780004704815".to_string()))
        );
        assert!(!is_valid_isbn("1111"));
        assert!(!is_valid_isbn("X000000000"));
    }

    #[test]
    fn test_lccn_normalization() {
        assert_eq!(normalize_lccn("n78-890351").unwrap(), "n78890351");
        assert_eq!(normalize_lccn("85-2 ").unwrap(), "85000002");
        assert_eq!(normalize_lccn("2001-1114").unwrap(), "2001001114");
        assert_eq!(normalize_lccn("75-425165//r75").unwrap(), "75425165");
        assert_eq!(normalize_lccn(" 79139101 /AC/r932").unwrap(), "79139101");
    }

    #[test]
    fn test_lccn_invalid() {
        assert!(normalize_lccn("abcd12345678").is_err());
        assert!(normalize_lccn("85-").is_err());
        assert!(normalize_lccn("12").is_err());
    }

    #[test]
    fn test_normalize_key_dispatches_on_mode() {
        assert!(normalize_key("9780004704814", Mode::Isbn).is_ok());
        assert!(normalize_key("9780004704814", Mode::Lccn).is_err());
    }
}
