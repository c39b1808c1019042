//! Parsing of SAIJ wire envelopes into the document model.
//!
//! Search responses carry each hit's abstract as a JSON document embedded
//! in a string; full-document responses embed the canonical payload the
//! same way under a `data` key.

use serde::Deserialize;
use serde_json::Value;

use crate::source::{
    ContentType, DocumentSummary, ID_POINTER, Kind, Result, Search, SearchPage, SourceError,
    TIMESTAMP_POINTER, value_as_i64,
};

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(rename = "searchResults")]
    results: SearchResults,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResults {
    #[serde(rename = "totalSearchResults", default)]
    total: u64,
    #[serde(rename = "documentResultList", default)]
    docs: Vec<DocResult>,
}

#[derive(Debug, Deserialize)]
struct DocResult {
    #[serde(rename = "documentAbstract")]
    abstract_json: String,
}

/// Parse a search response envelope into a [`SearchPage`].
///
/// Hits whose embedded abstract cannot be parsed are dropped from the
/// items (they still count toward `raw_count`, which drives pagination).
pub(super) fn parse_search(envelope: Value, query: &Search) -> Result<SearchPage> {
    let envelope: SearchEnvelope = serde_json::from_value(envelope)
        .map_err(|e| SourceError::invalid(format!("malformed search envelope: {}", e)))?;

    let raw_count = envelope.results.docs.len();
    let items = envelope
        .results
        .docs
        .iter()
        .filter_map(|doc| {
            let abstract_value: Value = match serde_json::from_str(&doc.abstract_json) {
                Ok(value) => value,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping hit with malformed abstract");
                    return None;
                }
            };
            to_summary(&abstract_value, query)
        })
        .collect();

    Ok(SearchPage {
        raw_count,
        total: Some(envelope.results.total),
        items,
    })
}

/// Project a search-hit abstract into a [`DocumentSummary`].
///
/// Returns `None` when the abstract lacks the one field every hit must
/// have: its identifier. Unsupported content types are kept with
/// `content_type: None` so the caller can count and filter them.
fn to_summary(abstract_value: &Value, query: &Search) -> Option<DocumentSummary> {
    let id = abstract_value.pointer(ID_POINTER)?.as_str()?.to_string();

    let content_type = abstract_value
        .pointer("/document/metadata/document-content-type")
        .and_then(Value::as_str)
        .and_then(ContentType::parse);

    let kind: Kind = abstract_value
        .pointer("/document/content/tipo-norma")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();

    Some(DocumentSummary {
        id,
        content_type,
        kind,
        status: pointer_string(abstract_value, "/document/content/estado"),
        date: pointer_string(abstract_value, "/document/content/fecha"),
        timestamp: abstract_value.pointer(TIMESTAMP_POINTER).and_then(value_as_i64),
        query: query.clone(),
    })
}

/// Extract the canonical payload embedded in a `view-document` response.
/// Missing or empty `data` means the document does not exist: the service
/// answers 200 with an empty envelope for unknown identifiers.
pub(super) fn parse_document_envelope(envelope: &Value) -> Option<Value> {
    let data = envelope.get("data")?.as_str()?;
    if data.is_empty() {
        return None;
    }
    serde_json::from_str(data).ok()
}

fn pointer_string(value: &Value, pointer: &str) -> String {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn abstract_json(id: &str, content_type: &str, timestamp: i64) -> String {
        json!({
            "document": {
                "metadata": {
                    "uuid": id,
                    "document-content-type": content_type,
                    "timestamp": timestamp
                },
                "content": {
                    "tipo-norma": { "codigo": "LEY", "texto": "Ley" },
                    "estado": "Vigente",
                    "fecha": "2020-01-01"
                }
            }
        })
        .to_string()
    }

    fn envelope(total: u64, abstracts: &[String]) -> Value {
        json!({
            "searchResults": {
                "totalSearchResults": total,
                "documentResultList": abstracts
                    .iter()
                    .map(|a| json!({ "documentAbstract": a }))
                    .collect::<Vec<_>>()
            }
        })
    }

    #[test]
    fn test_parse_search_page() {
        let envelope = envelope(
            120,
            &[
                abstract_json("a1", "legislacion", 5),
                abstract_json("a2", "dictamen", 6),
            ],
        );

        let page = parse_search(envelope, &Search::default()).unwrap();

        assert_eq!(page.raw_count, 2);
        assert_eq!(page.total, Some(120));
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].id, "a1");
        assert_eq!(page.items[0].content_type, Some(ContentType::Legislacion));
        assert_eq!(page.items[0].timestamp, Some(5));
        // Unsupported content types are kept for counting, unclassified.
        assert_eq!(page.items[1].content_type, None);
    }

    #[test]
    fn test_parse_search_drops_malformed_abstracts() {
        let envelope = envelope(
            10,
            &["{ not json".to_string(), abstract_json("a1", "legislacion", 5)],
        );

        let page = parse_search(envelope, &Search::default()).unwrap();

        // Malformed hits still count as raw results for pagination.
        assert_eq!(page.raw_count, 2);
        assert_eq!(page.items.len(), 1);
    }

    #[test]
    fn test_parse_search_empty_page() {
        let envelope = json!({ "searchResults": { "totalSearchResults": 0 } });

        let page = parse_search(envelope, &Search::default()).unwrap();

        assert_eq!(page.raw_count, 0);
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_parse_search_malformed_envelope() {
        let err = parse_search(json!({ "unexpected": true }), &Search::default()).unwrap_err();
        assert!(matches!(err, SourceError::Invalid { .. }));
    }

    #[test]
    fn test_parse_document_envelope() {
        let payload = json!({ "document": { "metadata": { "uuid": "a1" } } });
        let envelope = json!({ "data": payload.to_string() });

        assert_eq!(parse_document_envelope(&envelope), Some(payload));
    }

    #[test]
    fn test_parse_document_envelope_empty_data() {
        assert_eq!(parse_document_envelope(&json!({ "data": "" })), None);
        assert_eq!(parse_document_envelope(&json!({})), None);
    }
}
