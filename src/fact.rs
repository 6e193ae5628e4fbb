use chrono::Local;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One extracted snippet with its surrounding context. Pattern tools fill
/// only `pre`/`fact`/`post`; entity tools add the exact match and a
/// canonical name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub pre: String,
    pub fact: String,
    pub post: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The JSON shape handed to the fact sink: a `Fact` annotated with identity,
/// provenance and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactRecord {
    pub id: String,
    #[serde(flatten)]
    pub fact: Fact,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
    /// The cid of the document this fact came from, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Which tool produced the fact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processor: Option<String>,
    /// Fact group label chosen by the submitter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set: Option<String>,
    pub created_date: String,
    pub updated_date: String,
}

impl FactRecord {
    pub fn new(
        fact: Fact,
        source: Option<String>,
        tags: Vec<String>,
        processor: Option<String>,
        set: Option<String>,
    ) -> Self {
        // Matches the date format the fact index was mapped with.
        let stamp = Local::now().format("%Y-%m-%d %H%M").to_string();
        Self {
            id: Uuid::new_v4().simple().to_string(),
            fact,
            tags,
            source,
            processor,
            set,
            created_date: stamp.clone(),
            updated_date: stamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_are_omitted() {
        let fact = Fact {
            pre: "the ".to_string(),
            fact: "gene".to_string(),
            post: " expression".to_string(),
            exact: None,
            name: None,
        };
        let json = serde_json::to_value(&fact).unwrap();
        assert!(json.get("exact").is_none());
        assert!(json.get("name").is_none());
    }

    #[test]
    fn record_flattens_fact_fields() {
        let record = FactRecord::new(
            Fact {
                fact: "gene".to_string(),
                ..Fact::default()
            },
            Some("abc123".to_string()),
            vec!["daily".to_string()],
            Some("amiregex".to_string()),
            None,
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["fact"], "gene");
        assert_eq!(json["source"], "abc123");
        assert_eq!(json["created_date"], json["updated_date"]);
    }
}
