//! References from files to resources owned by other subsystems.

use serde::{Deserialize, Serialize};

/// A `{type, id}` pair naming an external resource (an album, a note...).
///
/// The filesystem core stores and copies these; it never checks that the
/// referenced resource exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

impl ResourceIdentifier {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}
