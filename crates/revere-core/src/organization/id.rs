//! Identifier validity.
//!
//! Two tiers are kept apart: an id can be *displayable* (non-empty, fine to
//! show and to select) without being *fetchable* (shaped like an id the
//! backend issued, safe to send in a filter). The demo placeholder org is the
//! canonical example of the first kind.

use once_cell::sync::Lazy;
use regex::Regex;

static CANONICAL_UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("canonical uuid pattern is valid")
});

/// Classification of an identifier string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// Canonical hyphenated UUID, as issued by the backend.
    Backend,
    /// Non-empty but not backend-shaped; usable locally only.
    DisplayOnly,
    Empty,
}

impl IdKind {
    /// Blank ids are `Empty`. The UUID match is exact, so a padded id is
    /// display-only and is never sent to the backend as given.
    pub fn classify(id: &str) -> Self {
        if id.trim().is_empty() {
            Self::Empty
        } else if CANONICAL_UUID.is_match(id) {
            Self::Backend
        } else {
            Self::DisplayOnly
        }
    }

    pub fn is_displayable(self) -> bool {
        !matches!(self, Self::Empty)
    }

    pub fn is_fetchable(self) -> bool {
        matches!(self, Self::Backend)
    }
}

/// True when `id` may be sent to the backend as a filter value.
pub fn is_fetchable_id(id: &str) -> bool {
    IdKind::classify(id).is_fetchable()
}

/// True when `id` may be shown and selected locally.
pub fn is_displayable_id(id: &str) -> bool {
    IdKind::classify(id).is_displayable()
}
