//! The document observation flowing through the merge pipeline.

use crate::Error;
use serde::{Deserialize, Serialize};

/// One fetch of a URL.
///
/// On input this is a single observation. On output of
/// [`DocumentProcessor::process`](crate::DocumentProcessor::process) the
/// publish date and first fetch time come from the earliest observation of the
/// URL, while the text and fetch time come from the latest one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub pub_date: i64,
    pub fetch_time: i64,
    pub text: String,

    /// Fetch time of the earliest known observation. Set only on output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_fetch_time: Option<i64>,
}

impl Document {
    pub fn new(url: impl Into<String>, pub_date: i64, fetch_time: i64, text: impl Into<String>) -> Self {
        Self { url: url.into(), pub_date, fetch_time, text: text.into(), first_fetch_time: None }
    }

    /// Reject documents that cannot be partitioned by URL.
    pub fn validate(&self) -> Result<(), Error> {
        if self.url.trim().is_empty() {
            return Err(Error::InvalidInput("url cannot be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_empty_url() {
        let doc = Document::new("  ", 1, 2, "text");
        assert!(matches!(doc.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_validate_ok() {
        assert!(Document::new("/a", 1, 2, "text").validate().is_ok());
    }

    #[test]
    fn test_first_fetch_time_omitted_until_set() {
        let doc = Document::new("/a", 90, 150, "v1");
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("first_fetch_time").is_none());

        let merged = Document { first_fetch_time: Some(150), ..doc };
        let json = serde_json::to_value(&merged).unwrap();
        assert_eq!(json["first_fetch_time"], 150);
    }

    #[test]
    fn test_deserialize_without_first_fetch_time() {
        let doc: Document =
            serde_json::from_str(r#"{"url":"/a","pub_date":100,"fetch_time":200,"text":"v2"}"#).unwrap();
        assert_eq!(doc, Document::new("/a", 100, 200, "v2"));
    }
}
