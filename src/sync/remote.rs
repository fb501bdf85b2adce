//! Remote collaborator contracts.
//!
//! The remote store only needs an idempotent `create` keyed on record id and
//! an equality `query`. The media store takes raw bytes and hands back a URL.

use serde_json::Value;
use thiserror::Error;

/// Document store that holds the remote copy of every collection.
pub trait RemoteStore: Send + Sync + 'static {
    /// Upsert `document` under `id` in `collection`.
    fn create(
        &self,
        collection: &str,
        id: &str,
        document: Value,
    ) -> impl std::future::Future<Output = Result<(), RemoteError>> + Send;

    /// Documents in `collection` matching every filter.
    fn query(
        &self,
        collection: &str,
        filters: &[QueryFilter],
    ) -> impl std::future::Future<Output = Result<Vec<Value>, RemoteError>> + Send;
}

/// Blob store for activity media.
pub trait MediaStore: Send + Sync + 'static {
    /// Store `blob` at `path` and return its public URL.
    fn upload(
        &self,
        blob: &[u8],
        path: &str,
    ) -> impl std::future::Future<Output = Result<String, RemoteError>> + Send;
}

/// Equality filter on a top-level document field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilter {
    pub field: String,
    pub value: String,
}

impl QueryFilter {
    pub fn eq(field: &str, value: impl ToString) -> Self {
        Self {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    /// Whether a document's field matches this filter.
    pub fn matches(&self, document: &Value) -> bool {
        match document.get(&self.field) {
            Some(Value::String(s)) => *s == self.value,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

/// Remote store errors.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RemoteError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Network(_) => true,
            RemoteError::Rejected { status, .. } => *status >= 500 || *status == 429,
            RemoteError::Serialization(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_matches_strings_and_numbers() {
        let doc = json!({ "ownerId": "abc", "points": 12 });
        assert!(QueryFilter::eq("ownerId", "abc").matches(&doc));
        assert!(QueryFilter::eq("points", 12).matches(&doc));
        assert!(!QueryFilter::eq("ownerId", "xyz").matches(&doc));
        assert!(!QueryFilter::eq("missing", "abc").matches(&doc));
    }

    #[test]
    fn test_transient_classification() {
        assert!(RemoteError::Network("reset".into()).is_transient());
        assert!(RemoteError::Rejected {
            status: 503,
            message: String::new()
        }
        .is_transient());
        assert!(!RemoteError::Rejected {
            status: 400,
            message: String::new()
        }
        .is_transient());
    }
}
