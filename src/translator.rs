use camino::Utf8Path;

use crate::error::PipelineError;
use crate::fact::Fact;
use crate::harvest::{self, RecordMapping};

/// Converts a results file produced by an externally-run tool into facts,
/// without touching any workspace. Dispatches purely on the tool name; the
/// attribute mappings are the same ones the harvester uses.
pub fn translate(tool: &str, file: &Utf8Path) -> Result<Vec<Fact>, PipelineError> {
    harvest::parse_results(file, mapping_for(tool)?)
}

fn mapping_for(tool: &str) -> Result<&'static RecordMapping, PipelineError> {
    match tool.to_ascii_lowercase().as_str() {
        "amiregex" => Ok(&harvest::AMI_REGEX),
        "amispecies" => Ok(&harvest::AMI_SPECIES),
        "amiidentifier" => Ok(&harvest::AMI_IDENTIFIER),
        other => Err(PipelineError::UnsupportedTool(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use camino::Utf8PathBuf;

    use super::*;

    #[test]
    fn unknown_tool_is_rejected_before_reading_the_file() {
        let missing = Utf8PathBuf::from("/nonexistent/results.xml");
        assert_matches!(
            translate("amiwords", &missing),
            Err(PipelineError::UnsupportedTool(_))
        );
    }

    #[test]
    fn identifier_mapping_uses_exact_as_fact() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("results.xml")).unwrap();
        std::fs::write(
            path.as_std_path(),
            r#"<results><result pre="doi:" exact="10.1234/x" post=" cited"/></results>"#,
        )
        .unwrap();

        let facts = translate("amiidentifier", &path).unwrap();
        assert_eq!(facts[0].fact, "10.1234/x");
    }
}
