//! Clipboard change detection
//!
//! Turns a backend change counter into change notifications so the watcher
//! can skip payload reads while nothing has changed. Backends without a
//! counter report `None` and every poll falls through to a content read.

use tracing::debug;

/// Tracks the last change token seen from the backend.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last_token: Option<u64>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self { last_token: None }
    }

    /// Check whether the clipboard changed since the last call.
    ///
    /// Returns:
    /// - `Some(true)` if the token moved (or this is the first observation)
    /// - `Some(false)` if the token is unchanged
    /// - `None` if `token` is `None`; the caller should read and compare content
    pub fn has_changed(&mut self, token: Option<u64>) -> Option<bool> {
        let current = token?;

        let changed = match self.last_token {
            Some(last) => current != last,
            None => true,
        };

        if changed {
            debug!(
                old_token = self.last_token,
                new_token = current,
                "Clipboard change detected via change token"
            );
        }

        self.last_token = Some(current);
        Some(changed)
    }

    /// Forget the last token. The next check reports a change.
    pub fn reset(&mut self) {
        self.last_token = None;
    }

    #[cfg(test)]
    pub fn last_token(&self) -> Option<u64> {
        self.last_token
    }
}
