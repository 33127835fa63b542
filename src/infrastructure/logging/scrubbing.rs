use regex::Regex;
use std::fmt;

/// Redacts contact details from user text before it is logged
#[derive(Clone)]
pub struct PiiScrubber {
    email_pattern: Regex,
    phone_pattern: Regex,
}

impl PiiScrubber {
    /// Create a new scrubber
    pub fn new() -> Self {
        Self {
            email_pattern: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
                .expect("email pattern is valid"),
            // International or local numbers with at least 7 digits, allowing
            // spaces, dots, dashes and parentheses between groups
            phone_pattern: Regex::new(r"\+?\(?\d{1,4}\)?(?:[\s.-]?\(?\d{2,4}\)?){2,4}")
                .expect("phone pattern is valid"),
        }
    }

    /// Replace e-mail addresses and phone numbers
    pub fn scrub(&self, text: &str) -> String {
        let scrubbed = self.email_pattern.replace_all(text, "[EMAIL_REDACTED]");
        self.phone_pattern
            .replace_all(&scrubbed, |caps: &regex::Captures| {
                let digits = caps[0].chars().filter(char::is_ascii_digit).count();
                if digits >= 7 {
                    "[PHONE_REDACTED]".to_string()
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned()
    }

    /// Scrubbed text cut to at most `max_chars` characters
    pub fn preview(&self, text: &str, max_chars: usize) -> String {
        let scrubbed = self.scrub(text);
        if scrubbed.chars().count() <= max_chars {
            scrubbed
        } else {
            let cut: String = scrubbed.chars().take(max_chars).collect();
            format!("{cut}...")
        }
    }
}

impl Default for PiiScrubber {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PiiScrubber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PiiScrubber").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrub_email() {
        let scrubber = PiiScrubber::new();
        let scrubbed = scrubber.scrub("reach me at jane.doe+shop@example.co.uk please");

        assert!(!scrubbed.contains("jane.doe"));
        assert!(scrubbed.contains("[EMAIL_REDACTED]"));
    }

    #[test]
    fn test_scrub_phone_numbers() {
        let scrubber = PiiScrubber::new();
        for message in ["call +1 (555) 123-4567", "my cell is 0412 345 678"] {
            let scrubbed = scrubber.scrub(message);
            assert!(scrubbed.contains("[PHONE_REDACTED]"), "{scrubbed}");
        }
    }

    #[test]
    fn test_short_numbers_survive() {
        let scrubber = PiiScrubber::new();
        let message = "we have 12 staff and 3 locations since 2019";
        assert_eq!(scrubber.scrub(message), message);
    }

    #[test]
    fn test_preview_truncates_after_scrubbing() {
        let scrubber = PiiScrubber::new();
        let preview = scrubber.preview("email: a@b.io and then a very long tail", 20);
        assert!(preview.starts_with("email: [EMAIL_REDAC"));
        assert!(preview.ends_with("..."));
    }
}
