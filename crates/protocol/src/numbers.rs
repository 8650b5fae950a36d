//! Comma-separated integer lists

use crate::error::ProtocolError;

/// Parse a comma-separated list of integers.
///
/// Whitespace around tokens is ignored and a blank string is the empty list.
/// A single trailing comma is tolerated.
pub fn parse_numbers(raw: &str) -> Result<Vec<i64>, ProtocolError> {
    let raw = raw.trim();
    let raw = raw.strip_suffix(',').unwrap_or(raw).trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    raw.split(',')
        .map(|token| {
            let token = token.trim();
            token
                .parse::<i64>()
                .map_err(|_| ProtocolError::InvalidNumber(token.to_string()))
        })
        .collect()
}

/// Format integers as a comma-separated list without spaces
pub fn format_numbers(numbers: &[i64]) -> String {
    numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numbers_trims_tokens() {
        assert_eq!(parse_numbers(" 1, 2 ,3").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_numbers("-4,5").unwrap(), vec![-4, 5]);
    }

    #[test]
    fn test_parse_numbers_blank_and_trailing_comma() {
        assert!(parse_numbers("").unwrap().is_empty());
        assert!(parse_numbers("   ").unwrap().is_empty());
        assert_eq!(parse_numbers("7,8,").unwrap(), vec![7, 8]);
    }

    #[test]
    fn test_parse_numbers_rejects_garbage() {
        assert_eq!(
            parse_numbers("1,two,3"),
            Err(ProtocolError::InvalidNumber("two".to_string()))
        );
        assert_eq!(
            parse_numbers("1,,3"),
            Err(ProtocolError::InvalidNumber(String::new()))
        );
    }

    #[test]
    fn test_format_numbers() {
        assert_eq!(format_numbers(&[1, -2, 3]), "1,-2,3");
        assert_eq!(format_numbers(&[]), "");
    }
}
