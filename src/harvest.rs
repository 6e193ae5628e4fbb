use std::fs;
use std::thread;
use std::time::Duration;

use camino::Utf8Path;

use crate::error::PipelineError;
use crate::fact::Fact;

/// Tag of the elements carrying one match each in a tool results file.
const RESULT_TAG: &str = "result";

/// Which attribute of a result element holds the matched value. Tools
/// disagree: the pattern tool uses `value0`, the species tool a
/// `match`/`name` pair, the identifier tool `exact`. `pre` and `post` are
/// universal.
#[derive(Debug, Clone, Copy)]
pub struct RecordMapping {
    pub fact_attr: &'static str,
    pub exact_attr: Option<&'static str>,
    pub name_attr: Option<&'static str>,
}

pub const AMI_REGEX: RecordMapping = RecordMapping {
    fact_attr: "value0",
    exact_attr: None,
    name_attr: None,
};

pub const AMI_SPECIES: RecordMapping = RecordMapping {
    fact_attr: "match",
    exact_attr: Some("exact"),
    name_attr: Some("name"),
};

pub const AMI_IDENTIFIER: RecordMapping = RecordMapping {
    fact_attr: "exact",
    exact_attr: None,
    name_attr: None,
};

/// How long to keep trying before concluding a results file will not turn up.
///
/// There is an observed race between a tool exiting and its results file
/// becoming visible, so parse failures are treated as transient up to the
/// attempt bound.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

/// Harvest result. An empty `facts` with `failed` set means the retry budget
/// ran out, as opposed to a genuine zero-match run.
#[derive(Debug, Clone, Default)]
pub struct HarvestOutcome {
    pub facts: Vec<Fact>,
    pub failed: bool,
}

/// Reads a tool results file into facts, retrying while the file is missing
/// or unparseable. Exhaustion yields zero facts rather than an error, with
/// the `failed` flag distinguishing the two cases.
pub fn harvest(path: &Utf8Path, mapping: &RecordMapping, policy: RetryPolicy) -> HarvestOutcome {
    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        match parse_results(path, mapping) {
            Ok(facts) => {
                tracing::debug!(%path, count = facts.len(), attempt, "harvested results");
                return HarvestOutcome {
                    facts,
                    failed: false,
                };
            }
            Err(err) => {
                tracing::debug!(%path, attempt, %err, "results not ready");
                if attempt < attempts {
                    thread::sleep(policy.delay);
                }
            }
        }
    }
    tracing::warn!(%path, attempts, "harvest retry budget exhausted");
    HarvestOutcome {
        facts: Vec::new(),
        failed: true,
    }
}

/// One parse of a results file: every `result` element, in document order,
/// mapped through the tool's attribute shape.
pub fn parse_results(path: &Utf8Path, mapping: &RecordMapping) -> Result<Vec<Fact>, PipelineError> {
    let content = fs::read_to_string(path.as_std_path()).map_err(|err| {
        PipelineError::ResultsParse {
            path: path.to_string(),
            message: err.to_string(),
        }
    })?;
    let document = roxmltree::Document::parse(&content).map_err(|err| {
        PipelineError::ResultsParse {
            path: path.to_string(),
            message: err.to_string(),
        }
    })?;

    let attr = |node: &roxmltree::Node<'_, '_>, name: &str| {
        node.attribute(name).unwrap_or_default().to_string()
    };

    Ok(document
        .descendants()
        .filter(|node| node.has_tag_name(RESULT_TAG))
        .map(|node| Fact {
            pre: attr(&node, "pre"),
            fact: attr(&node, mapping.fact_attr),
            post: attr(&node, "post"),
            exact: mapping
                .exact_attr
                .and_then(|name| node.attribute(name))
                .map(|value| value.to_string()),
            name: mapping
                .name_attr
                .and_then(|name| node.attribute(name))
                .map(|value| value.to_string()),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use camino::Utf8PathBuf;

    use super::*;

    #[test]
    fn parse_maps_attributes_in_document_order() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("results.xml")).unwrap();
        std::fs::write(
            path.as_std_path(),
            r#"<results>
                <result pre="the " value0="gene" post=" expression"/>
                <result pre="a " value0="protein" post=" domain"/>
            </results>"#,
        )
        .unwrap();

        let facts = parse_results(&path, &AMI_REGEX).unwrap();
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].fact, "gene");
        assert_eq!(facts[1].fact, "protein");
        assert!(facts[0].exact.is_none());
    }

    #[test]
    fn species_mapping_reads_exact_and_name() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("results.xml")).unwrap();
        std::fs::write(
            path.as_std_path(),
            r#"<results>
                <result pre="in " match="E. coli" exact="E. coli" name="Escherichia coli" post=" cultures"/>
            </results>"#,
        )
        .unwrap();

        let facts = parse_results(&path, &AMI_SPECIES).unwrap();
        assert_eq!(facts[0].fact, "E. coli");
        assert_eq!(facts[0].name.as_deref(), Some("Escherichia coli"));
    }

    #[test]
    fn parse_missing_file_is_an_error() {
        let path = Utf8PathBuf::from("/nonexistent/results.xml");
        assert_matches!(
            parse_results(&path, &AMI_REGEX),
            Err(PipelineError::ResultsParse { .. })
        );
    }
}
