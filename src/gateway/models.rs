// src/gateway/models.rs
use std::fmt;
use std::str::FromStr;

use axum::body::Bytes;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::utils::error::GatewayError;

// --- Validation Messages ---
pub const INVALID_SOURCE_TYPE: &str = "Invalid source_type. Must be 'image', 'pdf', or 'web'";
pub const FILE_REQUIRED: &str = "File is required for image/pdf";
pub const URL_REQUIRED: &str = "URL is required for web source";

/// Which extraction strategy a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Image,
    Pdf,
    Web,
}

impl FromStr for SourceType {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(SourceType::Image),
            "pdf" => Ok(SourceType::Pdf),
            "web" => Ok(SourceType::Web),
            _ => Err(GatewayError::invalid(INVALID_SOURCE_TYPE)),
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceType::Image => "image",
            SourceType::Pdf => "pdf",
            SourceType::Web => "web",
        };
        f.write_str(name)
    }
}

/// An uploaded file as received from the multipart form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: Option<String>,
    pub bytes: Bytes,
}

/// Raw form fields of an `/extract/` request, before validation.
#[derive(Debug, Clone, Default)]
pub struct ExtractionRequest {
    pub source_type: Option<String>,
    pub file: Option<Upload>,
    pub url: Option<String>,
}

/// A validated request: the source type and the one input it needs.
#[derive(Debug, Clone)]
pub enum Source {
    Image(Upload),
    Pdf(Upload),
    Web(String),
}

impl Source {
    pub fn kind(&self) -> SourceType {
        match self {
            Source::Image(_) => SourceType::Image,
            Source::Pdf(_) => SourceType::Pdf,
            Source::Web(_) => SourceType::Web,
        }
    }
}

impl ExtractionRequest {
    /// Applies the validation rules in order: source type, then file, then url.
    /// Empty uploads and blank urls count as missing.
    pub fn validate(self) -> Result<Source, GatewayError> {
        let source_type: SourceType = self
            .source_type
            .as_deref()
            .ok_or_else(|| GatewayError::invalid(INVALID_SOURCE_TYPE))?
            .parse()?;

        match source_type {
            SourceType::Image | SourceType::Pdf => {
                let file = self
                    .file
                    .filter(|upload| !upload.bytes.is_empty())
                    .ok_or_else(|| GatewayError::invalid(FILE_REQUIRED))?;
                Ok(if source_type == SourceType::Image {
                    Source::Image(file)
                } else {
                    Source::Pdf(file)
                })
            }
            SourceType::Web => {
                let url = self
                    .url
                    .map(|url| url.trim().to_string())
                    .filter(|url| !url.is_empty())
                    .ok_or_else(|| GatewayError::invalid(URL_REQUIRED))?;
                Ok(Source::Web(url))
            }
        }
    }
}

// --- Response Bodies ---

/// The uniform success body: `{"text": ..., "tables": [...]}`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ExtractionResult {
    pub text: String,
    pub tables: Vec<Table>,
}

impl ExtractionResult {
    pub fn text_only(text: String) -> Self {
        Self {
            text,
            tables: Vec::new(),
        }
    }
}

/// A PDF table region is plain text; a web table keeps its column structure.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Table {
    Text(String),
    Columns(WebTable),
}

/// A parsed HTML table, column-major.
///
/// Serializes as `{"<column>": {"0": <cell>, "1": <cell>, ...}, ...}` with columns in
/// document order and missing cells as `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebTable {
    pub columns: Vec<TableColumn>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableColumn {
    pub name: String,
    pub cells: Vec<Option<String>>,
}

impl Serialize for WebTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for column in &self.columns {
            map.serialize_entry(&column.name, &IndexedCells(&column.cells))?;
        }
        map.end()
    }
}

struct IndexedCells<'a>(&'a [Option<String>]);

impl Serialize for IndexedCells<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (row, cell) in self.0.iter().enumerate() {
            map.serialize_entry(&row.to_string(), cell)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn upload(bytes: &'static [u8]) -> Upload {
        Upload {
            filename: Some("scan.png".to_string()),
            bytes: Bytes::from_static(bytes),
        }
    }

    fn message(result: Result<Source, GatewayError>) -> String {
        match result {
            Err(GatewayError::InvalidInput(msg)) => msg,
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn unknown_source_type_is_rejected_first() {
        let request = ExtractionRequest {
            source_type: Some("docx".to_string()),
            file: None,
            url: None,
        };
        assert_eq!(message(request.validate()), INVALID_SOURCE_TYPE);

        let missing = ExtractionRequest::default();
        assert_eq!(message(missing.validate()), INVALID_SOURCE_TYPE);

        // Matching is case-sensitive
        let shouted = ExtractionRequest {
            source_type: Some("PDF".to_string()),
            ..Default::default()
        };
        assert_eq!(message(shouted.validate()), INVALID_SOURCE_TYPE);
    }

    #[test]
    fn image_and_pdf_require_a_file() {
        for kind in ["image", "pdf"] {
            let request = ExtractionRequest {
                source_type: Some(kind.to_string()),
                file: None,
                url: Some("https://example.com".to_string()),
            };
            assert_eq!(message(request.validate()), FILE_REQUIRED);
        }

        let empty = ExtractionRequest {
            source_type: Some("image".to_string()),
            file: Some(upload(b"")),
            url: None,
        };
        assert_eq!(message(empty.validate()), FILE_REQUIRED);
    }

    #[test]
    fn web_requires_a_url() {
        let request = ExtractionRequest {
            source_type: Some("web".to_string()),
            file: Some(upload(b"ignored")),
            url: None,
        };
        assert_eq!(message(request.validate()), URL_REQUIRED);

        let blank = ExtractionRequest {
            source_type: Some("web".to_string()),
            file: None,
            url: Some("   ".to_string()),
        };
        assert_eq!(message(blank.validate()), URL_REQUIRED);
    }

    #[test]
    fn valid_requests_carry_their_input() {
        let request = ExtractionRequest {
            source_type: Some("pdf".to_string()),
            file: Some(upload(b"%PDF-1.5")),
            url: None,
        };
        let source = request.validate().expect("pdf request should validate");
        assert_eq!(source.kind(), SourceType::Pdf);

        let request = ExtractionRequest {
            source_type: Some("web".to_string()),
            file: None,
            url: Some(" https://example.com/page ".to_string()),
        };
        match request.validate().expect("web request should validate") {
            Source::Web(url) => assert_eq!(url, "https://example.com/page"),
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn web_table_serializes_column_major_in_document_order() {
        let table = WebTable {
            columns: vec![
                TableColumn {
                    name: "Name".to_string(),
                    cells: vec![Some("Alice".to_string()), Some("Bob".to_string())],
                },
                TableColumn {
                    name: "Age".to_string(),
                    cells: vec![Some("30".to_string()), None],
                },
            ],
        };

        let encoded = serde_json::to_string(&table).unwrap();
        assert_eq!(
            encoded,
            r#"{"Name":{"0":"Alice","1":"Bob"},"Age":{"0":"30","1":null}}"#
        );
    }

    #[test]
    fn result_tables_are_untagged() {
        let result = ExtractionResult {
            text: "Quarterly report".to_string(),
            tables: vec![Table::Text("Region Sales\nNorth 10".to_string())],
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"text": "Quarterly report", "tables": ["Region Sales\nNorth 10"]})
        );
    }
}
