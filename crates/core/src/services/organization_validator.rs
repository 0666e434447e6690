//! Contact-field validation for organizations.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

#[allow(clippy::expect_used)]
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

#[allow(clippy::expect_used)]
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[\s\-()]*([0-9][\s\-()]*){6,20}$").expect("valid phone regex")
});

/// Checks organization contact fields.
pub trait OrganizationValidator: Send + Sync {
    /// `local@domain.tld`.
    fn validate_email(&self, email: &str) -> bool;

    /// An http or https URL; a missing scheme means https.
    fn validate_website(&self, website: &str) -> bool;

    /// 6 to 20 digits with an optional leading `+` and separators.
    fn validate_phone(&self, phone: &str) -> bool;
}

/// Default regex and URL based validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultOrganizationValidator;

impl OrganizationValidator for DefaultOrganizationValidator {
    fn validate_email(&self, email: &str) -> bool {
        EMAIL_RE.is_match(email)
    }

    fn validate_website(&self, website: &str) -> bool {
        let candidate = if website.starts_with("http") {
            website.to_string()
        } else {
            format!("https://{website}")
        };

        Url::parse(&candidate)
            .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
            .unwrap_or(false)
    }

    fn validate_phone(&self, phone: &str) -> bool {
        let compact: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
        PHONE_RE.is_match(&compact)
    }
}
