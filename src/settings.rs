use crate::config::{self, AppConfig};
use crate::error::LinkError;
use crate::slug;

/// Redirect behaviour that admins can change at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectSettings {
    /// Seconds shown on the countdown page; always at least 1.
    pub countdown_seconds: u32,
    /// Custom interstitial page replacing the built-in countdown.
    pub ui_page_url: Option<String>,
}

impl RedirectSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            countdown_seconds: config.countdown_seconds,
            ui_page_url: config.ui_page_url.clone(),
        }
    }

    /// Build settings from raw form input. Non-positive or unparsable
    /// countdowns fall back to the default; a non-empty page URL must be valid.
    pub fn from_input(countdown: &str, ui_page_url: Option<&str>) -> Result<Self, LinkError> {
        let countdown_seconds = config::normalize_countdown(countdown.trim().parse().ok());

        let ui_page_url = match ui_page_url.map(str::trim).filter(|s| !s.is_empty()) {
            Some(url) => Some(slug::clean_target_url(url)?),
            None => None,
        };

        Ok(Self {
            countdown_seconds,
            ui_page_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_form_input() {
        let s = RedirectSettings::from_input(" 5 ", Some("https://example.com/wait")).unwrap();
        assert_eq!(s.countdown_seconds, 5);
        assert_eq!(s.ui_page_url.as_deref(), Some("https://example.com/wait"));

        let s = RedirectSettings::from_input("0", Some("  ")).unwrap();
        assert_eq!(s.countdown_seconds, 10);
        assert!(s.ui_page_url.is_none());

        let s = RedirectSettings::from_input("soon", None).unwrap();
        assert_eq!(s.countdown_seconds, 10);
    }

    #[test]
    fn rejects_bad_page_url() {
        let err = RedirectSettings::from_input("5", Some("/relative/page")).unwrap_err();
        assert!(matches!(err, LinkError::InvalidUrl(_)));
    }
}
