use regex::Regex;
use tracing::debug;

use crate::types::Intent;

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '"'];

/// Classifies an initial spoken command as a destination page or a question.
///
/// Literal addresses win over inferred ones: an explicit `http(s)://` token or
/// a bare `host.tld` token is taken first, and only then the
/// `look up <domain>` phrasing is tried. The first candidate in the
/// transcript wins; there is no ranking among several addresses.
pub struct IntentExtractor {
    address: Regex,
    look_up: Regex,
}

impl Default for IntentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentExtractor {
    pub fn new() -> Self {
        Self {
            address: Regex::new(r"(?i:https?)://\S+|[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}")
                .expect("address pattern is valid"),
            look_up: Regex::new(r"(?i)look up ([a-zA-Z0-9.-]+)").expect("look-up pattern is valid"),
        }
    }

    pub fn extract(&self, transcript: &str) -> Intent {
        if let Some(address) = self.literal_address(transcript) {
            debug!(%address, "Transcript names an address");
            return Intent::DestinationPage(address);
        }

        if let Some(caps) = self.look_up.captures(transcript) {
            let domain = caps[1].trim_end_matches('.');
            if has_public_suffix(domain) {
                debug!(domain, "Look-up phrase names a domain");
                return Intent::DestinationPage(format!("http://{domain}"));
            }
            debug!(domain, "Look-up target has no public suffix");
        }

        Intent::GenericQuestion(transcript.to_string())
    }

    fn literal_address(&self, transcript: &str) -> Option<String> {
        for m in self.address.find_iter(transcript) {
            let token = m.as_str();
            if has_scheme(token) {
                return Some(token.trim_end_matches(TRAILING_PUNCTUATION).to_string());
            }
            // Bare tokens only count when they end in a known public suffix.
            if has_public_suffix(token) {
                return Some(format!("http://{token}"));
            }
        }
        None
    }
}

fn has_scheme(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// True when the last label(s) of `domain` form a known public suffix.
pub fn has_public_suffix(domain: &str) -> bool {
    let domain = domain.trim_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return false;
    }
    psl::suffix(domain.as_bytes()).is_some_and(|suffix| suffix.is_known())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> Intent {
        IntentExtractor::new().extract(text)
    }

    #[test]
    fn test_explicit_address_is_kept_verbatim() {
        assert_eq!(
            extract("please open https://en.wikipedia.org/wiki/Rust_(programming_language) now"),
            Intent::DestinationPage(
                "https://en.wikipedia.org/wiki/Rust_(programming_language)".to_string()
            )
        );
        assert_eq!(
            extract("go to http://example.com/search?q=1"),
            Intent::DestinationPage("http://example.com/search?q=1".to_string())
        );
    }

    #[test]
    fn test_explicit_address_drops_sentence_punctuation() {
        assert_eq!(
            extract("Open https://example.com."),
            Intent::DestinationPage("https://example.com".to_string())
        );
    }

    #[test]
    fn test_bare_domain_gets_http_prefix() {
        assert_eq!(
            extract("open example.com"),
            Intent::DestinationPage("http://example.com".to_string())
        );
        assert_eq!(
            extract("Open Wikipedia.org."),
            Intent::DestinationPage("http://Wikipedia.org".to_string())
        );
    }

    #[test]
    fn test_first_address_wins() {
        assert_eq!(
            extract("compare example.com with https://rust-lang.org"),
            Intent::DestinationPage("http://example.com".to_string())
        );
    }

    #[test]
    fn test_look_up_valid_domain() {
        assert_eq!(
            extract("look up wikipedia.org"),
            Intent::DestinationPage("http://wikipedia.org".to_string())
        );
        assert_eq!(
            extract("Could you Look Up bbc.co.uk for me"),
            Intent::DestinationPage("http://bbc.co.uk".to_string())
        );
    }

    #[test]
    fn test_look_up_invalid_suffix_is_a_question() {
        let text = "look up example.invalidtld";
        assert_eq!(extract(text), Intent::GenericQuestion(text.to_string()));

        let text = "look up localhost";
        assert_eq!(extract(text), Intent::GenericQuestion(text.to_string()));
    }

    #[test]
    fn test_plain_question() {
        let text = "What is the capital of France?";
        assert_eq!(extract(text), Intent::GenericQuestion(text.to_string()));
    }

    #[test]
    fn test_version_numbers_are_not_addresses() {
        let text = "what changed in version 3.14";
        assert_eq!(extract(text), Intent::GenericQuestion(text.to_string()));
    }

    #[test]
    fn test_has_public_suffix() {
        assert!(has_public_suffix("example.com"));
        assert!(has_public_suffix("example.co.uk"));
        assert!(has_public_suffix("Example.ORG"));
        assert!(!has_public_suffix("example.invalidtld"));
        assert!(!has_public_suffix(""));
    }
}
