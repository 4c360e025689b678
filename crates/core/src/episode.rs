//! Episode wire models and list handling.
//!
//! The backend serves episode payloads in two key-casing flavours
//! (`patientName` from newer endpoints, `PatientName` from older ones).
//! Rather than branching on casing at every usage site, the wire structs
//! accept both spellings in a single serde pass and the rest of the client
//! only ever sees the canonical camelCase shape.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{ModelError, ModelResult};
use ccr_types::EpisodeStatus;

/// One clinical coding case, as returned by the episode list and
/// suggestion endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    /// Backend identifier. Accepted as either a JSON string or a bare
    /// number; always carried as a string for URL construction.
    #[serde(alias = "Id", deserialize_with = "id_from_string_or_number")]
    pub id: String,

    #[serde(default, alias = "NhsNumber")]
    pub nhs_number: Option<String>,

    #[serde(default, alias = "PatientName")]
    pub patient_name: Option<String>,

    #[serde(default, alias = "AdmissionDate")]
    pub admission_date: Option<DateTime<Utc>>,

    #[serde(default, alias = "Specialty")]
    pub specialty: Option<String>,

    #[serde(default, alias = "SourceText")]
    pub source_text: Option<String>,

    /// Missing status is treated as Draft, matching the backend's default
    /// for freshly created episodes.
    #[serde(default, alias = "Status")]
    pub status: EpisodeStatus,
}

impl Episode {
    /// Patient name for display output.
    pub fn display_name(&self) -> &str {
        self.patient_name.as_deref().unwrap_or("(unnamed)")
    }
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(i64),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}

/// Draft fields sent to `episodes/suggest` and `episodes`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeDraft {
    pub nhs_number: String,
    pub patient_name: String,
    pub admission_date: DateTime<Utc>,
    pub specialty: String,
    pub source_text: String,
}

/// A normalized page of episodes.
///
/// The list endpoint returns either a bare JSON array (one full page,
/// total = length) or an `{items, total}` object. Both shapes normalize
/// to this struct; callers never see the difference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodePage {
    pub items: Vec<Episode>,
    pub total: u64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Array(Vec<Episode>),
    Object {
        #[serde(default, alias = "Items")]
        items: Vec<Episode>,
        #[serde(default, alias = "Total")]
        total: Option<u64>,
    },
}

impl EpisodePage {
    /// Normalize a raw list response into a page.
    ///
    /// `null` (a 204 or empty body upstream) yields an empty page.
    pub fn from_value(value: serde_json::Value) -> ModelResult<Self> {
        if value.is_null() {
            return Ok(EpisodePage::default());
        }

        let page = match serde_json::from_value::<ListResponse>(value)? {
            ListResponse::Array(items) => {
                let total = items.len() as u64;
                EpisodePage { items, total }
            }
            ListResponse::Object { items, total } => {
                let total = total.unwrap_or(items.len() as u64);
                EpisodePage { items, total }
            }
        };
        Ok(page)
    }
}

/// Filter and pagination parameters for the episode list.
#[derive(Debug, Clone, PartialEq)]
pub struct ListFilter {
    /// Exact status match, applied server-side and re-applied to the
    /// fetched page.
    pub status: Option<EpisodeStatus>,
    /// Inclusive lower bound on admission date.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on admission date.
    pub to: Option<DateTime<Utc>>,
    pub page: u32,
    pub page_size: u32,
}

impl Default for ListFilter {
    fn default() -> Self {
        ListFilter {
            status: None,
            from: None,
            to: None,
            page: 1,
            page_size: 25,
        }
    }
}

impl ListFilter {
    /// Query pairs for `GET episodes`. Unset filters are omitted;
    /// pagination is always sent.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status".to_owned(), u8::from(status).to_string()));
        }
        if let Some(from) = self.from {
            pairs.push(("from".to_owned(), iso_millis(from)));
        }
        if let Some(to) = self.to {
            pairs.push(("to".to_owned(), iso_millis(to)));
        }
        pairs.push(("page".to_owned(), self.page.to_string()));
        pairs.push(("pageSize".to_owned(), self.page_size.to_string()));
        pairs
    }

    /// Whether an episode passes the status filter. Used to re-apply the
    /// filter to the fetched page rather than trusting the backend alone.
    pub fn status_matches(&self, episode: &Episode) -> bool {
        match self.status {
            Some(status) => episode.status == status,
            None => true,
        }
    }
}

fn iso_millis(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an inclusive date-bound argument (`YYYY-MM-DD` or full RFC 3339)
/// into a UTC timestamp at the start of that day.
pub fn parse_date_bound(input: &str) -> ModelResult<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = chrono::NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|e| ModelError::InvalidInput(format!("invalid date '{input}': {e}")))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ModelError::InvalidInput(format!("invalid date '{input}'")))?;
    Ok(DateTime::from_naive_utc_and_offset(midnight, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_camel_case_episode() {
        let value = json!({
            "id": "ep-1",
            "nhsNumber": "9999999999",
            "patientName": "John Smith",
            "admissionDate": "2024-01-10T09:30:00Z",
            "specialty": "Respiratory Medicine",
            "status": 1
        });

        let episode: Episode = serde_json::from_value(value).expect("parse");
        assert_eq!(episode.id, "ep-1");
        assert_eq!(episode.display_name(), "John Smith");
        assert_eq!(episode.status, EpisodeStatus::Submitted);
    }

    #[test]
    fn parses_pascal_case_episode() {
        let value = json!({
            "Id": 42,
            "PatientName": "Sarah Williams",
            "AdmissionDate": "2024-01-10T09:30:00Z",
            "Specialty": "Cardiology",
            "Status": 2
        });

        let episode: Episode = serde_json::from_value(value).expect("parse");
        assert_eq!(episode.id, "42");
        assert_eq!(episode.patient_name.as_deref(), Some("Sarah Williams"));
        assert_eq!(episode.status, EpisodeStatus::Approved);
    }

    #[test]
    fn missing_status_defaults_to_draft() {
        let episode: Episode =
            serde_json::from_value(json!({ "id": "ep-2" })).expect("parse minimal");
        assert_eq!(episode.status, EpisodeStatus::Draft);
        assert_eq!(episode.display_name(), "(unnamed)");
    }

    #[test]
    fn list_shapes_normalize_identically() {
        let items = json!([
            { "id": "a", "status": 1 },
            { "id": "b", "status": 1 }
        ]);
        let array_page = EpisodePage::from_value(items.clone()).expect("array shape");
        let object_page =
            EpisodePage::from_value(json!({ "items": items, "total": 2 })).expect("object shape");

        assert_eq!(array_page, object_page);
        assert_eq!(array_page.items.len(), 2);
        assert_eq!(array_page.total, 2);
    }

    #[test]
    fn object_shape_carries_explicit_total() {
        let page = EpisodePage::from_value(json!({
            "items": [{ "id": "a" }],
            "total": 57
        }))
        .expect("parse");
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total, 57);
    }

    #[test]
    fn object_shape_without_total_falls_back_to_length() {
        let page =
            EpisodePage::from_value(json!({ "items": [{ "id": "a" }, { "id": "b" }] }))
                .expect("parse");
        assert_eq!(page.total, 2);
    }

    #[test]
    fn null_response_is_an_empty_page() {
        let page = EpisodePage::from_value(serde_json::Value::Null).expect("parse null");
        assert!(page.items.is_empty());
        assert_eq!(page.total, 0);
    }

    #[test]
    fn query_pairs_include_all_set_filters() {
        let filter = ListFilter {
            status: Some(EpisodeStatus::Submitted),
            from: Some(parse_date_bound("2024-01-01").expect("from")),
            to: Some(parse_date_bound("2024-01-31").expect("to")),
            page: 1,
            page_size: 25,
        };

        assert_eq!(
            filter.query_pairs(),
            vec![
                ("status".to_owned(), "1".to_owned()),
                ("from".to_owned(), "2024-01-01T00:00:00.000Z".to_owned()),
                ("to".to_owned(), "2024-01-31T00:00:00.000Z".to_owned()),
                ("page".to_owned(), "1".to_owned()),
                ("pageSize".to_owned(), "25".to_owned()),
            ]
        );
    }

    #[test]
    fn query_pairs_omit_unset_filters() {
        let filter = ListFilter::default();
        assert_eq!(
            filter.query_pairs(),
            vec![
                ("page".to_owned(), "1".to_owned()),
                ("pageSize".to_owned(), "25".to_owned()),
            ]
        );
    }

    #[test]
    fn status_filter_reapplies_to_fetched_page() {
        let filter = ListFilter {
            status: Some(EpisodeStatus::Submitted),
            ..ListFilter::default()
        };
        let submitted: Episode =
            serde_json::from_value(json!({ "id": "a", "status": 1 })).expect("parse");
        let draft: Episode =
            serde_json::from_value(json!({ "id": "b", "status": 0 })).expect("parse");

        assert!(filter.status_matches(&submitted));
        assert!(!filter.status_matches(&draft));
        assert!(ListFilter::default().status_matches(&draft));
    }

    #[test]
    fn draft_serializes_to_camel_case_wire_form() {
        let draft = EpisodeDraft {
            nhs_number: "9999999999".to_owned(),
            patient_name: "John Smith".to_owned(),
            admission_date: parse_date_bound("2024-01-10").expect("date"),
            specialty: "Respiratory Medicine".to_owned(),
            source_text: "Admitted with community-acquired pneumonia.".to_owned(),
        };

        let value = serde_json::to_value(&draft).expect("render");
        assert_eq!(value["nhsNumber"], "9999999999");
        assert_eq!(value["patientName"], "John Smith");
        assert_eq!(value["specialty"], "Respiratory Medicine");
        assert!(value["sourceText"].as_str().is_some());
    }

    #[test]
    fn rejects_malformed_date_bound() {
        let err = parse_date_bound("January 2024").expect_err("should reject");
        assert!(matches!(err, ModelError::InvalidInput(msg) if msg.contains("January")));
    }
}
