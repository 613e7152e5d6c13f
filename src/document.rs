//! Document payload submitted to the registration API.
//!
//! These are plain value types. Field names match the wire format expected
//! by the remote endpoint, so most fields keep their snake_case JSON names
//! while the description and import flag use camelCase.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

/// A goods-introduction document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub description: Description,
    pub doc_id: String,
    pub doc_status: String,
    pub doc_type: String,
    #[serde(rename = "importRequest")]
    pub import_request: bool,
    pub owner_inn: String,
    pub participant_inn: String,
    pub producer_inn: String,
    pub production_date: String,
    pub production_type: String,
    #[serde(default)]
    pub products: Vec<Product>,
    pub reg_date: String,
    pub reg_number: String,
}

/// Participant details nested under `description`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    #[serde(rename = "participantInn")]
    pub participant_inn: String,
}

/// A single product line with its certificate and code metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub certificate_document: String,
    pub certificate_document_date: String,
    pub certificate_document_number: String,
    pub owner_inn: String,
    pub producer_inn: String,
    pub production_date: String,
    pub tnved_code: String,
    pub uit_code: String,
    pub uitu_code: String,
}

impl Document {
    /// Load a document from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading document");

        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse a document from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_document() -> Document {
        Document {
            description: Description {
                participant_inn: "345678901234".to_string(),
            },
            doc_id: "1".to_string(),
            doc_status: "new".to_string(),
            doc_type: "LP_INTRODUCE_GOODS".to_string(),
            import_request: true,
            owner_inn: "012345678901".to_string(),
            participant_inn: "123456789012".to_string(),
            producer_inn: "234567890123".to_string(),
            production_date: "2020-01-23".to_string(),
            production_type: "food".to_string(),
            products: vec![Product {
                certificate_document: "licence".to_string(),
                certificate_document_date: "2020-01-23".to_string(),
                certificate_document_number: "n2".to_string(),
                owner_inn: "456789012345".to_string(),
                producer_inn: "567890123456".to_string(),
                production_date: "2020-01-23".to_string(),
                tnved_code: "0123456789".to_string(),
                uit_code: "012456789012345678LLLLLLLLLLLLL".to_string(),
                uitu_code: "012345678901234567".to_string(),
            }],
            reg_date: "2020-01-23".to_string(),
            reg_number: "n1".to_string(),
        }
    }

    #[test]
    fn test_wire_field_names() {
        let value = serde_json::to_value(sample_document()).unwrap();

        assert_eq!(value["description"]["participantInn"], "345678901234");
        assert_eq!(value["importRequest"], true);
        assert_eq!(value["doc_type"], "LP_INTRODUCE_GOODS");
        assert_eq!(value["products"][0]["uit_code"], "012456789012345678LLLLLLLLLLLLL");
        assert!(value.get("import_request").is_none());
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "description": { "participantInn": "1" },
            "doc_id": "42",
            "doc_status": "new",
            "doc_type": "LP_INTRODUCE_GOODS",
            "importRequest": false,
            "owner_inn": "2",
            "participant_inn": "3",
            "producer_inn": "4",
            "production_date": "2024-05-01",
            "production_type": "own",
            "reg_date": "2024-05-02",
            "reg_number": "r-7"
        }"#;

        let document = Document::from_json(json).unwrap();
        assert_eq!(document.doc_id, "42");
        assert!(!document.import_request);
        assert!(document.products.is_empty());
    }

    #[test]
    fn test_from_json_rejects_missing_fields() {
        let result = Document::from_json(r#"{ "doc_id": "1" }"#);
        assert!(matches!(result, Err(crate::error::CrptError::Serialization(_))));
    }

    #[test]
    fn test_from_file_reads_demo_document() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/document.json");

        let document = Document::from_file(path).unwrap();
        assert_eq!(document, sample_document());
    }

    #[test]
    fn test_from_file_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();

        let result = Document::from_file(dir.path().join("absent.json"));
        assert!(matches!(result, Err(crate::error::CrptError::Io(_))));
    }

    #[test]
    fn test_from_file_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = Document::from_file(&path);
        assert!(matches!(result, Err(crate::error::CrptError::Serialization(_))));
    }
}
