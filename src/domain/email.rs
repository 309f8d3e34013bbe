use md5::Digest;
use md5::Md5;
use validator::ValidateEmail;

/// Lowercase and trim, the canonical form used as registry/cache key.
pub fn normalize_email(raw: &str) -> String { raw.trim().to_lowercase() }

/// Stable identity key for registries: md5 of the normalized address, hex
/// encoded. Not used for anything security-sensitive.
pub fn fingerprint_email(raw: &str) -> String {
    let normalized = normalize_email(raw);
    let digest = Md5::digest(normalized.as_bytes());
    hex::encode(digest)
}

/// A syntactically valid email address. Parsing normalizes (lowercase, trim)
/// before validating, so `ContactEmail::parse` is the single gate both the
/// validator and the adapters rely on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactEmail(String);

impl ContactEmail {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let normalized = normalize_email(raw);
        ValidateEmail::validate_email(&normalized)
            .then_some(Self(normalized.clone()))
            .ok_or(format!("Invalid email format: {raw:?}"))
    }

    pub fn domain(&self) -> Option<&str> { self.0.split('@').nth(1) }

    pub fn is_gmail(&self) -> bool { self.domain().is_some_and(|d| d.eq_ignore_ascii_case("gmail.com")) }
}

impl AsRef<str> for ContactEmail {
    fn as_ref(&self) -> &str { &self.0 }
}

impl std::fmt::Display for ContactEmail {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use claims::assert_err;
    use fake::faker::internet::en::SafeEmail;
    use fake::Fake;
    use quickcheck::Arbitrary;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn normalizes_before_fingerprinting() {
        let a = fingerprint_email("  Foo@Bar.COM ");
        let b = fingerprint_email("foo@bar.com");
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_missing_at() {
        assert_err!(ContactEmail::parse("johnfoo.com"));
    }

    #[test]
    fn accepts_plain_address() {
        let e = ContactEmail::parse("  New@Example.com ").unwrap();
        assert_eq!(e.as_ref(), "new@example.com");
    }

    #[test]
    fn gmail_detection_is_case_insensitive() {
        let e = ContactEmail::parse("a@GMAIL.com").unwrap();
        assert!(e.is_gmail());
    }

    #[derive(Clone, Debug)]
    struct FakeEmail(String);

    impl Arbitrary for FakeEmail {
        fn arbitrary(g: &mut quickcheck::Gen) -> Self {
            let mut rng = StdRng::seed_from_u64(u64::arbitrary(g));
            Self(SafeEmail().fake_with_rng(&mut rng))
        }
    }

    #[quickcheck_macros::quickcheck]
    fn any_fake_safe_email_parses(email: FakeEmail) -> bool { ContactEmail::parse(&email.0).is_ok() }
}
