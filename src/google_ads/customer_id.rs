use crate::error::AdsError;
use std::fmt;

/// A Google Ads customer id, normalized to ASCII digits.
///
/// Account ids are treated as sensitive: `Debug` prints the masked form and
/// there is deliberately no `Display`. Use [`CustomerId::as_str`] only where the
/// full id must reach the upstream API or the database.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CustomerId(String);

impl CustomerId {
    /// Strips every non-digit character. Fails when nothing is left.
    pub fn parse(raw: &str) -> Result<Self, AdsError> {
        let digits = sanitize(raw);
        if digits.is_empty() {
            return Err(AdsError::InvalidCustomerId(
                "customer id must contain digits".to_string(),
            ));
        }
        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn masked(&self) -> Masked<'_> {
        Masked(&self.0)
    }
}

impl fmt::Debug for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomerId({})", self.masked())
    }
}

/// Display adapter rendering `first3***last3`.
pub struct Masked<'a>(&'a str);

impl fmt::Display for Masked<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&mask(self.0))
    }
}

/// Keeps only ASCII digits (`"123-456-7890"` -> `"1234567890"`).
pub fn sanitize(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// `first3***last3`; ids of six digits or fewer are fully hidden.
pub fn mask(id: &str) -> String {
    let digits = sanitize(id);
    if digits.len() <= 6 {
        return "***".to_string();
    }
    format!("{}***{}", &digits[..3], &digits[digits.len() - 3..])
}

/// Masks every path segment that looks like a customer id (seven or more digits,
/// dashes allowed) so request paths can be logged.
pub fn mask_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let digits = segment.chars().filter(char::is_ascii_digit).count();
            let id_like =
                digits >= 7 && segment.chars().all(|c| c.is_ascii_digit() || c == '-');
            if id_like {
                mask(segment)
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_are_stripped() {
        assert_eq!(
            CustomerId::parse("123-456-7890").unwrap(),
            CustomerId::parse("1234567890").unwrap()
        );
        assert_eq!(CustomerId::parse(" 123 456 7890 ").unwrap().as_str(), "1234567890");
    }

    #[test]
    fn sanitizing_is_idempotent() {
        let once = sanitize("12-34-56 78.90");
        assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn ids_without_digits_are_rejected() {
        assert!(CustomerId::parse("--").is_err());
        assert!(CustomerId::parse("").is_err());
    }

    #[test]
    fn masking_keeps_only_edges() {
        let id = CustomerId::parse("123-456-7890").unwrap();
        let masked = id.masked().to_string();
        assert_eq!(masked, "123***890");
        assert!(!masked.contains("1234567890"));
        assert_eq!(format!("{id:?}"), "CustomerId(123***890)");
    }

    #[test]
    fn short_ids_are_fully_hidden() {
        assert_eq!(mask("123456"), "***");
        assert_eq!(mask("1234567"), "123***567");
    }

    #[test]
    fn id_segments_in_paths_are_masked() {
        assert_eq!(mask_path("/diag/mcc-for/1234567890"), "/diag/mcc-for/123***890");
        assert_eq!(mask_path("/diag/mcc-for/123-456-7890"), "/diag/mcc-for/123***890");
        assert_eq!(mask_path("/diag/ping"), "/diag/ping");
        assert_eq!(mask_path("/oauth/google-ads/start"), "/oauth/google-ads/start");
        assert_eq!(mask_path("/"), "/");
    }
}
