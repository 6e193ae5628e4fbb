use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use uuid::Uuid;

use crate::error::PipelineError;

/// Canonical file names downstream tools read by convention.
pub const SCHOLARLY_HTML: &str = "scholarly.html";
pub const RESULTS_FILE: &str = "results.xml";

/// One document's working directory, keyed by its content identifier.
///
/// All processors operating on the same cid share this layout: canonical
/// `fulltext.*` files at the top level, tool output under
/// `results/<tool>/<variant>/`.
#[derive(Debug, Clone)]
pub struct Workspace {
    cid: String,
    dir: Utf8PathBuf,
}

impl Workspace {
    /// Resolves (and creates, idempotently) the workspace for a cid.
    pub fn resolve(storage_dir: &Utf8Path, cid: &str) -> Result<Self, PipelineError> {
        let dir = storage_dir.join(cid);
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| PipelineError::Filesystem(format!("create {dir}: {err}")))?;
        Ok(Self {
            cid: cid.to_string(),
            dir,
        })
    }

    pub fn cid(&self) -> &str {
        &self.cid
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Canonical fulltext file for an extension, e.g. `fulltext.pdf`.
    pub fn fulltext(&self, ext: &str) -> Utf8PathBuf {
        self.dir.join(format!("fulltext.{ext}"))
    }

    pub fn scholarly_html(&self) -> Utf8PathBuf {
        self.dir.join(SCHOLARLY_HTML)
    }

    /// Where a tool run leaves its result set: `results/<tool>/<variant>/results.xml`.
    pub fn results_file(&self, tool: &str, variant: &str) -> Utf8PathBuf {
        self.dir.join("results").join(tool).join(variant).join(RESULTS_FILE)
    }

    /// First file with the given extension whose name is not `canonical`,
    /// in lexicographic order so repeated scans pick the same file.
    pub fn first_candidate(
        &self,
        ext: &str,
        canonical: &str,
    ) -> Result<Option<Utf8PathBuf>, PipelineError> {
        Ok(self
            .sorted_entries()?
            .into_iter()
            .find(|path| {
                path.extension().map(|e| e.eq_ignore_ascii_case(ext)) == Some(true)
                    && path.file_name() != Some(canonical)
            }))
    }

    /// Copies the first candidate file to the canonical name, but only when
    /// the canonical name does not already exist (first writer wins).
    /// Returns the promoted source file name, or `None` when nothing was
    /// promoted.
    pub fn promote(&self, ext: &str, canonical: &str) -> Result<Option<String>, PipelineError> {
        let target = self.dir.join(canonical);
        if target.as_std_path().exists() {
            return Ok(None);
        }
        let Some(source) = self.first_candidate(ext, canonical)? else {
            return Ok(None);
        };
        fs::copy(source.as_std_path(), target.as_std_path())
            .map_err(|err| PipelineError::Filesystem(format!("copy {source}: {err}")))?;
        tracing::debug!(cid = %self.cid, %source, canonical, "promoted file");
        Ok(source.file_name().map(|name| name.to_string()))
    }

    /// Sorted names of the regular files at the top of the workspace.
    pub fn list_files(&self) -> Result<Vec<String>, PipelineError> {
        Ok(self
            .sorted_entries()?
            .into_iter()
            .filter(|path| path.is_file())
            .filter_map(|path| path.file_name().map(|name| name.to_string()))
            .collect())
    }

    fn sorted_entries(&self) -> Result<Vec<Utf8PathBuf>, PipelineError> {
        let entries = fs::read_dir(self.dir.as_std_path())
            .map_err(|err| PipelineError::Filesystem(format!("read {}: {err}", self.dir)))?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| PipelineError::Filesystem(err.to_string()))?;
            let path = Utf8PathBuf::from_path_buf(entry.path())
                .map_err(|path| PipelineError::Filesystem(format!("non-utf8 path {path:?}")))?;
            paths.push(path);
        }
        paths.sort();
        Ok(paths)
    }
}

/// Fresh opaque content identifier for a document that has none yet.
pub fn generate_cid() -> String {
    Uuid::new_v4().simple().to_string()
}
