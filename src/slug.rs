//! Slug and target URL rules shared by the store, the router and CSV import.

use rand::Rng;

use crate::error::LinkError;

pub const MAX_SLUG_LEN: usize = 50;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_";

fn is_slug_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// `[A-Za-z0-9_]{1,50}`
pub fn is_valid(slug: &str) -> bool {
    !slug.is_empty() && slug.len() <= MAX_SLUG_LEN && slug.chars().all(is_slug_char)
}

/// Drop every character outside the slug alphabet.
pub fn sanitize(input: &str) -> String {
    input.chars().filter(|c| is_slug_char(*c)).collect()
}

/// Sanitize a non-empty user slug and check what survives.
pub fn clean(input: &str) -> Result<String, LinkError> {
    let slug = sanitize(input);
    if slug.is_empty() {
        return Err(LinkError::InvalidSlug(
            "allowed characters are a-z, A-Z, 0-9 and _".into(),
        ));
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err(LinkError::InvalidSlug(format!(
            "must be at most {MAX_SLUG_LEN} characters"
        )));
    }
    Ok(slug)
}

/// Random slug of `len` characters from the slug alphabet.
pub fn random(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Validate a target URL: absolute http(s) with a host. Returns the trimmed form.
///
/// The stored string is sent verbatim as a `Location` header, so inner
/// whitespace and control characters are rejected (the URL parser would
/// silently drop tabs and newlines).
pub fn clean_target_url(input: &str) -> Result<String, LinkError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(LinkError::InvalidUrl("target URL is required".into()));
    }
    if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(LinkError::InvalidUrl(
            "URL must not contain spaces or control characters".into(),
        ));
    }

    let parsed =
        url::Url::parse(trimmed).map_err(|e| LinkError::InvalidUrl(format!("{e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(LinkError::InvalidUrl(
            "URL must start with http:// or https://".into(),
        ));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(LinkError::InvalidUrl("URL must include a host".into()));
    }

    Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_charset_and_length() {
        assert!(is_valid("promo"));
        assert!(is_valid("Promo_2024"));
        assert!(is_valid(&"a".repeat(50)));
        assert!(!is_valid(""));
        assert!(!is_valid(&"a".repeat(51)));
        assert!(!is_valid("with-dash"));
        assert!(!is_valid("spa ce"));
        assert!(!is_valid("ünï"));
    }

    #[test]
    fn sanitize_strips_foreign_characters() {
        assert_eq!(sanitize("sum-mer sale!"), "summersale");
        assert_eq!(sanitize("--"), "");
        assert!(matches!(clean("!!!"), Err(LinkError::InvalidSlug(_))));
        assert!(matches!(clean(&"x".repeat(60)), Err(LinkError::InvalidSlug(_))));
        assert_eq!(clean("a/b").unwrap(), "ab");
    }

    #[test]
    fn random_slugs_use_the_alphabet() {
        for _ in 0..200 {
            let slug = random(6);
            assert_eq!(slug.len(), 6);
            assert!(is_valid(&slug), "{slug}");
        }
    }

    #[test]
    fn target_urls_must_be_absolute_http() {
        assert_eq!(
            clean_target_url("  https://example.com/sale ").unwrap(),
            "https://example.com/sale"
        );
        assert!(clean_target_url("http://localhost:8080/x?y=1").is_ok());
        assert!(matches!(clean_target_url(""), Err(LinkError::InvalidUrl(_))));
        assert!(matches!(clean_target_url("example.com"), Err(LinkError::InvalidUrl(_))));
        assert!(matches!(
            clean_target_url("javascript:alert(1)"),
            Err(LinkError::InvalidUrl(_))
        ));
        assert!(matches!(clean_target_url("ftp://files.example.com"), Err(LinkError::InvalidUrl(_))));
    }

    #[test]
    fn target_urls_reject_inner_whitespace_and_controls() {
        for bad in [
            "https://a.example/x\ny",
            "https://a.example/\tq",
            "https://a.example/a b",
            "https://a.example/\r\nSet-Cookie:x",
            "https://a.example/\u{7f}",
        ] {
            assert!(
                matches!(clean_target_url(bad), Err(LinkError::InvalidUrl(_))),
                "{bad:?}"
            );
        }
    }
}
