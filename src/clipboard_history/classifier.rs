//! Sensitive-content classification
//!
//! The watcher asks a [`ContentClassifier`] before recording anything.
//! The shipped implementation is a length-plus-symbol password heuristic.

use crate::config::ClassifierSettings;

/// Decides whether captured content must stay out of the history.
pub trait ContentClassifier: Send + Sync {
    fn is_sensitive(&self, content: &str) -> bool;
}

/// Short text containing any marker symbol is treated as a password.
#[derive(Debug, Clone)]
pub struct PasswordHeuristic {
    enabled: bool,
    max_length: usize,
    symbols: Vec<char>,
}

impl PasswordHeuristic {
    pub fn from_settings(settings: &ClassifierSettings) -> Self {
        Self {
            enabled: settings.exclude_passwords,
            max_length: settings.password_max_length,
            symbols: settings.password_symbols.chars().collect(),
        }
    }
}

impl Default for PasswordHeuristic {
    fn default() -> Self {
        Self::from_settings(&ClassifierSettings::default())
    }
}

impl ContentClassifier for PasswordHeuristic {
    fn is_sensitive(&self, content: &str) -> bool {
        self.enabled
            && content.chars().count() < self.max_length
            && content.chars().any(|c| self.symbols.contains(&c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_with_symbol_is_sensitive() {
        let heuristic = PasswordHeuristic::default();
        assert!(heuristic.is_sensitive("secret!1"));
        assert!(heuristic.is_sensitive("p@ss"));
    }

    #[test]
    fn test_plain_or_long_text_is_not_sensitive() {
        let heuristic = PasswordHeuristic::default();
        assert!(!heuristic.is_sensitive("just some words"));

        let long = format!("{}!", "a".repeat(49));
        assert_eq!(long.chars().count(), 50);
        assert!(!heuristic.is_sensitive(&long));
    }

    #[test]
    fn test_disabled_heuristic_accepts_everything() {
        let settings = ClassifierSettings {
            exclude_passwords: false,
            ..ClassifierSettings::default()
        };
        assert!(!PasswordHeuristic::from_settings(&settings).is_sensitive("secret!1"));
    }

    #[test]
    fn test_custom_symbols_and_length() {
        let settings = ClassifierSettings {
            exclude_passwords: true,
            password_max_length: 10,
            password_symbols: "~".to_string(),
        };
        let heuristic = PasswordHeuristic::from_settings(&settings);
        assert!(heuristic.is_sensitive("abc~"));
        assert!(!heuristic.is_sensitive("abc!"));
        assert!(!heuristic.is_sensitive("abcdefghi~x"));
    }
}
