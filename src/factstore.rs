use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::PipelineError;
use crate::fact::FactRecord;

/// The narrow boundary the pipeline needs from the fact store: accept one
/// record. Query semantics live entirely on the other side.
pub trait FactSink: Send + Sync {
    fn put(&self, record: &FactRecord) -> Result<(), PipelineError>;
}

/// Document-store client posting fact records as JSON to `<api>/<id>`.
#[derive(Clone)]
pub struct HttpFactSink {
    client: Client,
    api_url: String,
}

impl HttpFactSink {
    pub fn new(api_url: &str) -> Result<Self, PipelineError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("factmine/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PipelineError::FactStoreHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| PipelineError::FactStoreHttp(err.to_string()))?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }
}

impl FactSink for HttpFactSink {
    fn put(&self, record: &FactRecord) -> Result<(), PipelineError> {
        let url = format!("{}/{}", self.api_url, record.id);
        let response = self
            .client
            .post(&url)
            .json(record)
            .send()
            .map_err(|err| PipelineError::FactStoreHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "fact store request failed".to_string());
            return Err(PipelineError::FactStoreStatus { status, message });
        }
        Ok(())
    }
}

/// Pushes a harvested batch to the sink, annotating each fact with its
/// provenance. Returns how many records were stored.
pub fn store_facts(
    sink: &dyn FactSink,
    facts: Vec<crate::fact::Fact>,
    source: Option<&str>,
    tags: &[String],
    processor: Option<&str>,
    set: Option<&str>,
) -> Result<usize, PipelineError> {
    let mut stored = 0;
    for fact in facts {
        let record = FactRecord::new(
            fact,
            source.map(|cid| cid.to_string()),
            tags.to_vec(),
            processor.map(|name| name.to_string()),
            set.map(|tag| tag.to_string()),
        );
        sink.put(&record)?;
        stored += 1;
    }
    tracing::info!(stored, source, "facts sent to store");
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use crate::fact::Fact;

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<FactRecord>>,
    }

    impl FactSink for RecordingSink {
        fn put(&self, record: &FactRecord) -> Result<(), PipelineError> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    #[test]
    fn store_facts_annotates_provenance() {
        let sink = RecordingSink::default();
        let facts = vec![
            Fact {
                fact: "gene".to_string(),
                ..Fact::default()
            },
            Fact {
                fact: "protein".to_string(),
                ..Fact::default()
            },
        ];

        let stored = store_facts(
            &sink,
            facts,
            Some("abc123"),
            &["daily".to_string()],
            Some("amiregex"),
            None,
        )
        .unwrap();

        assert_eq!(stored, 2);
        let records = sink.records.lock().unwrap();
        assert_eq!(records[0].source.as_deref(), Some("abc123"));
        assert_eq!(records[1].tags, vec!["daily".to_string()]);
        assert_ne!(records[0].id, records[1].id);
    }
}
