//! Item identity and record model.
//!
//! # Responsibility
//! - Define `ItemId` (committed vs. draft) and `ItemRecord`.
//! - Validate item text length before any persistence happens.
//!
//! # Invariants
//! - `CommittedId` values are strictly positive.
//! - `ItemId::Draft` never appears in an order sequence.
//! - Text longer than `MAX_ITEM_TEXT_CHARS` characters is never persisted.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Maximum item text length, counted in Unicode scalar values.
pub const MAX_ITEM_TEXT_CHARS: usize = 25;

/// Identifier of a committed (entered) list item.
///
/// Derived from creation time in epoch milliseconds, then bumped to stay
/// strictly increasing. See `service::id_alloc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct CommittedId(i64);

impl CommittedId {
    /// Wraps a raw id. Returns `None` for zero or negative values.
    pub fn new(raw: i64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    /// Returns the raw integer value.
    pub fn get(self) -> i64 {
        self.0
    }

    /// Clamps `raw` up to the smallest valid id.
    pub(crate) fn at_least_one(raw: i64) -> Self {
        Self(raw.max(1))
    }
}

impl TryFrom<i64> for CommittedId {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("committed id must be positive, got {value}"))
    }
}

impl From<CommittedId> for i64 {
    fn from(value: CommittedId) -> Self {
        value.0
    }
}

impl Display for CommittedId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemId {
    /// Entered item that takes part in the order sequence.
    Committed(CommittedId),
    /// The input row text not yet committed with Enter.
    Draft,
}

impl ItemId {
    /// Returns the committed id, or `None` for the draft.
    pub fn committed(self) -> Option<CommittedId> {
        match self {
            Self::Committed(id) => Some(id),
            Self::Draft => None,
        }
    }

    pub fn is_draft(self) -> bool {
        matches!(self, Self::Draft)
    }
}

impl From<CommittedId> for ItemId {
    fn from(value: CommittedId) -> Self {
        Self::Committed(value)
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Committed(id) => write!(f, "{id}"),
            Self::Draft => write!(f, "draft"),
        }
    }
}

/// Validation failures for item text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    TextTooLong { chars: usize, max: usize },
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TextTooLong { chars, max } => write!(
                f,
                "item text is too long: {chars} characters, only {max} are allowed"
            ),
        }
    }
}

impl Error for ItemValidationError {}

/// Checks item text against the length limit.
pub fn validate_text(text: &str) -> Result<(), ItemValidationError> {
    let chars = text.chars().count();
    if chars > MAX_ITEM_TEXT_CHARS {
        return Err(ItemValidationError::TextTooLong {
            chars,
            max: MAX_ITEM_TEXT_CHARS,
        });
    }
    Ok(())
}

/// One stored list item (or the draft row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: ItemId,
    pub text: String,
}

impl ItemRecord {
    pub fn new(id: impl Into<ItemId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }

    /// Creates the draft record for the input row.
    pub fn draft(text: impl Into<String>) -> Self {
        Self::new(ItemId::Draft, text)
    }

    /// Validates record text.
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        validate_text(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_text, CommittedId, ItemId, ItemRecord, ItemValidationError};

    #[test]
    fn committed_id_rejects_non_positive_values() {
        assert!(CommittedId::new(0).is_none());
        assert!(CommittedId::new(-5).is_none());
        assert_eq!(CommittedId::new(7).map(CommittedId::get), Some(7));
    }

    #[test]
    fn validate_text_counts_characters_not_bytes() {
        let accented = "é".repeat(25);
        assert!(accented.len() > 25);
        validate_text(&accented).expect("25 characters should be accepted");

        let err = validate_text(&"x".repeat(26)).expect_err("26 characters must be rejected");
        assert_eq!(err, ItemValidationError::TextTooLong { chars: 26, max: 25 });
    }

    #[test]
    fn empty_text_is_valid() {
        validate_text("").expect("empty text is allowed");
    }

    #[test]
    fn order_sequence_serializes_as_plain_integers() {
        let ids = vec![CommittedId::new(3).unwrap(), CommittedId::new(1).unwrap()];
        let json = serde_json::to_string(&ids).unwrap();
        assert_eq!(json, "[3,1]");

        let bad = serde_json::from_str::<Vec<CommittedId>>("[1,0]");
        assert!(bad.is_err());
    }

    #[test]
    fn draft_record_uses_draft_identity() {
        let record = ItemRecord::draft("typing");
        assert!(record.id.is_draft());
        assert_eq!(record.id.committed(), None);
        assert_eq!(ItemId::Draft.to_string(), "draft");
    }
}
