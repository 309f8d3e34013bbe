#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PhoneError {
    #[error("phone number has too few digits: {0:?}")]
    TooShort(String),
    #[error("phone number has an unexpected digit count ({digits} digits): {raw:?}")]
    UnexpectedLength { raw: String, digits: usize },
}

/// An 11-digit, leading-`1` phone number, the canonical on-disk form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPhone(String);

impl CanonicalPhone {
    /// Strip everything but digits, then normalize: 10 digits get a leading
    /// `1`, 11 digits starting with `1` pass through unchanged, anything else
    /// is rejected. Non-blocking by itself — callers decide whether a
    /// rejected phone blocks the event.
    pub fn parse(raw: &str) -> Result<Self, PhoneError> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        match digits.len() {
            10 => Ok(Self(format!("1{digits}"))),
            11 if digits.starts_with('1') => Ok(Self(digits)),
            n if n < 10 => Err(PhoneError::TooShort(raw.to_string())),
            n => Err(PhoneError::UnexpectedLength { raw: raw.to_string(), digits: n }),
        }
    }

    pub fn digit_count(&self) -> usize { self.0.len() }

    pub fn is_mobile_length(&self) -> bool { self.0.len() >= 10 }
}

impl AsRef<str> for CanonicalPhone {
    fn as_ref(&self) -> &str { &self.0 }
}

impl std::fmt::Display for CanonicalPhone {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_digit_gets_leading_one() {
        let p = CanonicalPhone::parse("(800) 555-0100").unwrap();
        assert_eq!(p.as_ref(), "18005550100");
    }

    #[test]
    fn bare_ten_digit() {
        let p = CanonicalPhone::parse("8005550100").unwrap();
        assert_eq!(p.as_ref(), "18005550100");
    }

    #[test]
    fn eleven_digit_unchanged() {
        let p = CanonicalPhone::parse("18005550100").unwrap();
        assert_eq!(p.as_ref(), "18005550100");
    }

    #[test]
    fn too_short_is_rejected() {
        assert!(CanonicalPhone::parse("12345").is_err());
    }

    #[test]
    fn eleven_digit_not_leading_one_is_rejected() {
        assert!(matches!(
            CanonicalPhone::parse("28005550100"),
            Err(PhoneError::UnexpectedLength { .. })
        ));
    }
}
