use std::fs;

use camino::Utf8PathBuf;
use regex::Regex;

use crate::error::PipelineError;
use crate::harvest::{self, RetryPolicy};
use crate::params::{Params, canonical_flag};
use crate::processor::{Context, Processor, ProcessorOutput};
use crate::runner::{RunOutcome, split_lines};
use crate::workspace::{SCHOLARLY_HTML, Workspace, generate_cid};

/// Spellings under which callers pass the document URL.
const URL_KEYS: &[&str] = &["u", "-u", "url", "--url"];
/// Spellings of the reserved content-identifier key.
const CID_KEYS: &[&str] = &["cid", "-cid", "--cid"];

/// Stylesheet norma applies when the caller names none; a resource inside
/// the norma distribution, passed through verbatim.
const DEFAULT_NORMA_XSL: &str = "/org/xmlcml/norma/pubstyle/nlm/toHtml.xsl";
/// Ruleset used when a pattern extraction names none.
const DEFAULT_RULESET: &str = "concatenated";
/// Species category used when an entity extraction names none.
const DEFAULT_SPECIES: &str = "binomial";

/// The closed set of processor names, as exposed to callers.
pub fn names() -> &'static [&'static str] {
    &["retrieve", "quickscrape", "norma", "amiregex", "amispecies"]
}

/// Resolves a processor by its canonical lowercase name.
pub fn from_name(name: &str) -> Result<Box<dyn Processor>, PipelineError> {
    match name.to_ascii_lowercase().as_str() {
        "retrieve" => Ok(Box::new(Retrieve)),
        "quickscrape" => Ok(Box::new(Quickscrape)),
        "norma" => Ok(Box::new(Norma)),
        "amiregex" => Ok(Box::new(Amiregex)),
        "amispecies" => Ok(Box::new(Amispecies)),
        other => Err(PipelineError::UnsupportedTool(other.to_string())),
    }
}

fn supplied_cid(params: &Params) -> Option<String> {
    params.get_any(CID_KEYS).map(|cid| cid.to_string())
}

/// Fixes the cid for this run (caller-supplied or generated), resolves its
/// workspace and records cid + store URL on the output.
fn establish_workspace(
    ctx: &Context<'_>,
    params: &Params,
    out: &mut ProcessorOutput,
) -> Result<Workspace, PipelineError> {
    let cid = out
        .cid
        .clone()
        .or_else(|| supplied_cid(params))
        .unwrap_or_else(generate_cid);
    let workspace = Workspace::resolve(&ctx.settings.storage_dir, &cid)?;
    out.store = Some(ctx.settings.store_url(&cid));
    out.cid = Some(cid);
    Ok(workspace)
}

/// Workspace for a cid the caller was required to supply.
fn required_workspace(
    ctx: &Context<'_>,
    params: &Params,
    out: &mut ProcessorOutput,
) -> Result<Workspace, PipelineError> {
    let cid = out
        .cid
        .clone()
        .or_else(|| supplied_cid(params))
        .ok_or_else(|| PipelineError::MissingParameter("cid".to_string()))?;
    let workspace = Workspace::resolve(&ctx.settings.storage_dir, &cid)?;
    out.store = Some(ctx.settings.store_url(&cid));
    out.cid = Some(cid);
    Ok(workspace)
}

/// Runs a secondary tool from an after-hook through the shared runner,
/// folding its stderr and any spawn failure into the output record. Returns
/// whether the tool actually ran to completion.
fn run_secondary(ctx: &Context<'_>, argv: &[String], out: &mut ProcessorOutput) -> bool {
    match ctx.runner.run(argv) {
        RunOutcome::Completed { stderr, .. } => {
            out.errors.extend(split_lines(&stderr));
            true
        }
        RunOutcome::SpawnFailed { message } => {
            out.errors.push(format!("failed to spawn command: {message}"));
            false
        }
        RunOutcome::TimedOut { limit } => {
            out.errors
                .push(format!("command timed out after {}s", limit.as_secs()));
            false
        }
    }
}

fn store_files(workspace: &Workspace, store: &str) -> Result<Vec<String>, PipelineError> {
    Ok(workspace
        .list_files()?
        .into_iter()
        .map(|name| format!("{store}/{name}"))
        .collect())
}

/// Flat directory-name form of a URL, matching the layout the scraper
/// writes: `://` and `/` become `_`, `:` is dropped.
fn url_slug(url: &str) -> String {
    url.replace("://", "_").replace('/', "_").replace(':', "")
}

/// Minimal HTML synthesized from plain text: paragraphs on blank-line
/// boundaries, entity-escaped.
fn text_to_html(text: &str) -> String {
    let boundary = Regex::new(r"\n[ \t]*\n").expect("static pattern");
    let mut html = String::from("<html>\n<body>\n");
    for paragraph in boundary.split(text) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        let escaped = paragraph
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;");
        html.push_str("<p>");
        html.push_str(&escaped);
        html.push_str("</p>\n");
    }
    html.push_str("</body>\n</html>\n");
    html
}

/// Fetches a document URL into a fresh (or caller-named) workspace, then
/// derives the canonical `fulltext.*` set from whatever arrived: PDFs are
/// promoted and text-extracted, bare text is wrapped into minimal HTML.
pub struct Retrieve;

impl Processor for Retrieve {
    fn name(&self) -> &'static str {
        "retrieve"
    }

    fn before(
        &self,
        ctx: &Context<'_>,
        params: &mut Params,
        out: &mut ProcessorOutput,
    ) -> Result<(), PipelineError> {
        if params.is_empty() {
            return Ok(());
        }
        establish_workspace(ctx, params, out)?;
        Ok(())
    }

    fn command(
        &self,
        ctx: &Context<'_>,
        params: &Params,
        out: &mut ProcessorOutput,
    ) -> Result<Vec<String>, PipelineError> {
        let mut command = vec![ctx.settings.bin.wget.clone()];
        if params.is_empty() {
            command.push("--help".to_string());
            return Ok(command);
        }

        let url = params
            .get_any(URL_KEYS)
            .ok_or_else(|| PipelineError::MissingParameter("url".to_string()))?
            .to_string();
        // With the before-hook disabled the workspace has not been fixed yet.
        let workspace = establish_workspace(ctx, params, out)?;

        let filename = url
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or("fulltext")
            .to_string();
        command.push(url);
        command.push("-O".to_string());
        command.push(workspace.dir().join(filename).to_string());
        command.extend(params.to_args(&["-u", "--url", "--cid", "-O", "-o", "--output"]));
        Ok(command)
    }

    fn after(
        &self,
        ctx: &Context<'_>,
        params: &Params,
        out: &mut ProcessorOutput,
    ) -> Result<(), PipelineError> {
        if params.get_any(URL_KEYS).is_none() {
            return Ok(());
        }
        let workspace = required_workspace(ctx, params, out)?;

        workspace.promote("pdf", "fulltext.pdf")?;

        // Text extraction from every retrieved PDF.
        loop {
            let Some(pdf) = next_unconverted_pdf(&workspace)? else {
                break;
            };
            let txt = pdf.with_extension("txt");
            let argv = vec![
                ctx.settings.bin.pdftotext.clone(),
                pdf.to_string(),
                txt.to_string(),
            ];
            if !run_secondary(ctx, &argv, out) {
                break;
            }
            if !txt.as_std_path().exists() {
                out.errors.push(format!("text extraction produced no {txt}"));
                break;
            }
        }

        workspace.promote("txt", "fulltext.txt")?;
        workspace.promote("html", "fulltext.html")?;
        let html = workspace.fulltext("html");
        let txt = workspace.fulltext("txt");
        if !html.as_std_path().exists() && txt.as_std_path().exists() {
            let text = fs::read_to_string(txt.as_std_path())
                .map_err(|err| PipelineError::Filesystem(format!("read {txt}: {err}")))?;
            fs::write(html.as_std_path(), text_to_html(&text))
                .map_err(|err| PipelineError::Filesystem(format!("write {html}: {err}")))?;
        }
        workspace.promote("xml", "fulltext.xml")?;

        let store = out.store.clone().unwrap_or_default();
        out.files = store_files(&workspace, &store)?;
        Ok(())
    }
}

fn next_unconverted_pdf(workspace: &Workspace) -> Result<Option<Utf8PathBuf>, PipelineError> {
    for name in workspace.list_files()? {
        let path = workspace.dir().join(&name);
        if path.extension().map(|ext| ext.eq_ignore_ascii_case("pdf")) == Some(true)
            && !path.with_extension("txt").as_std_path().exists()
        {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// Scrapes article files for a URL with the journal-scraper definitions,
/// then relocates the scraper's temporary output into the cid's workspace.
pub struct Quickscrape;

impl Processor for Quickscrape {
    fn name(&self) -> &'static str {
        "quickscrape"
    }

    fn command(
        &self,
        ctx: &Context<'_>,
        params: &Params,
        _out: &mut ProcessorOutput,
    ) -> Result<Vec<String>, PipelineError> {
        let mut command = vec![ctx.settings.bin.quickscrape.clone()];
        if params.is_empty() {
            command.push("--help".to_string());
            return Ok(command);
        }
        // Output location and format are owned by the pipeline; conflicting
        // caller flags are dropped.
        command.extend(params.to_args(&[
            "-d",
            "--scraperdir",
            "-o",
            "--output",
            "-f",
            "--outformat",
            "--cid",
        ]));
        command.push("--scraperdir".to_string());
        command.push(ctx.settings.scraper_dir.to_string());
        command.push("--output".to_string());
        command.push(ctx.settings.scrape_tmp_dir.to_string());
        command.push("--outformat".to_string());
        command.push("bibjson".to_string());
        Ok(command)
    }

    fn after(
        &self,
        ctx: &Context<'_>,
        params: &Params,
        out: &mut ProcessorOutput,
    ) -> Result<(), PipelineError> {
        let Some(url) = params.get_any(URL_KEYS) else {
            return Ok(());
        };
        let tmp_dir = ctx.settings.scrape_tmp_dir.join(url_slug(url));
        let workspace = establish_workspace(ctx, params, out)?;

        let entries = fs::read_dir(tmp_dir.as_std_path())
            .map_err(|err| PipelineError::Filesystem(format!("read {tmp_dir}: {err}")))?;
        for entry in entries {
            let entry = entry.map_err(|err| PipelineError::Filesystem(err.to_string()))?;
            let name = entry.file_name();
            let target = workspace.dir().as_std_path().join(&name);
            fs::copy(entry.path(), target)
                .map_err(|err| PipelineError::Filesystem(format!("copy {name:?}: {err}")))?;
        }
        fs::remove_dir_all(tmp_dir.as_std_path())
            .map_err(|err| PipelineError::Filesystem(format!("remove {tmp_dir}: {err}")))?;

        let store = out.store.clone().unwrap_or_default();
        out.files = store_files(&workspace, &store)?;
        Ok(())
    }
}

/// Converts the workspace fulltext XML into `scholarly.html` with the
/// normalizer tool, defaulting to its built-in NLM stylesheet.
pub struct Norma;

impl Processor for Norma {
    fn name(&self) -> &'static str {
        "norma"
    }

    fn command(
        &self,
        ctx: &Context<'_>,
        params: &Params,
        out: &mut ProcessorOutput,
    ) -> Result<Vec<String>, PipelineError> {
        let mut command = vec![ctx.settings.bin.norma.clone()];
        if !params.is_empty() && !params.contains_any(&["x", "-x", "xsl", "--xsl"]) {
            command.push("--xsl".to_string());
            command.push(DEFAULT_NORMA_XSL.to_string());
        }
        for (key, value) in params.iter() {
            let flag = canonical_flag(key);
            if flag == "--cid" {
                let workspace = Workspace::resolve(&ctx.settings.storage_dir, value)?;
                out.store = Some(ctx.settings.store_url(value));
                out.cid = Some(value.to_string());
                command.push("-q".to_string());
                command.push(workspace.dir().to_string());
                command.push("--input".to_string());
                command.push(workspace.fulltext("xml").to_string());
                command.push("--output".to_string());
                command.push(workspace.scholarly_html().to_string());
            } else {
                command.push(flag);
                command.push(value.to_string());
            }
        }
        Ok(command)
    }

    fn after(
        &self,
        ctx: &Context<'_>,
        params: &Params,
        out: &mut ProcessorOutput,
    ) -> Result<(), PipelineError> {
        if supplied_cid(params).is_none() && out.cid.is_none() {
            return Ok(());
        }
        let workspace = required_workspace(ctx, params, out)?;
        out.promoted = workspace.promote("html", SCHOLARLY_HTML)?;
        Ok(())
    }
}

fn ruleset_name(params: &Params) -> String {
    params
        .get_any(&["g", "-g", "regex", "--regex"])
        .unwrap_or(DEFAULT_RULESET)
        .to_string()
}

/// Pattern extraction over `scholarly.html`, harvesting the tool's results
/// file into facts.
pub struct Amiregex;

impl Processor for Amiregex {
    fn name(&self) -> &'static str {
        "amiregex"
    }

    fn command(
        &self,
        ctx: &Context<'_>,
        params: &Params,
        out: &mut ProcessorOutput,
    ) -> Result<Vec<String>, PipelineError> {
        let workspace = required_workspace(ctx, params, out)?;
        let ruleset = ruleset_name(params);
        let mut command = vec![
            ctx.settings.bin.ami_regex.clone(),
            "-q".to_string(),
            workspace.dir().to_string(),
            "--input".to_string(),
            workspace.scholarly_html().to_string(),
            "--regex".to_string(),
            ctx.settings.ruleset_path(&ruleset).to_string(),
        ];
        command.extend(params.to_args(&[
            "--cid",
            "-g",
            "--regex",
            "-q",
            "-i",
            "--input",
            "-o",
            "--output",
        ]));
        Ok(command)
    }

    fn after(
        &self,
        ctx: &Context<'_>,
        params: &Params,
        out: &mut ProcessorOutput,
    ) -> Result<(), PipelineError> {
        let workspace = required_workspace(ctx, params, out)?;
        let results = workspace.results_file("regex", &ruleset_name(params));
        harvest_into(ctx, &results, &harvest::AMI_REGEX, out);
        Ok(())
    }
}

fn species_category(params: &Params) -> String {
    params
        .get_any(&["sp", "-sp", "species", "--species"])
        .unwrap_or(DEFAULT_SPECIES)
        .to_string()
}

/// Named-entity extraction of species mentions over `scholarly.html`.
pub struct Amispecies;

impl Processor for Amispecies {
    fn name(&self) -> &'static str {
        "amispecies"
    }

    fn command(
        &self,
        ctx: &Context<'_>,
        params: &Params,
        out: &mut ProcessorOutput,
    ) -> Result<Vec<String>, PipelineError> {
        let workspace = required_workspace(ctx, params, out)?;
        let mut command = vec![
            ctx.settings.bin.ami_species.clone(),
            "-q".to_string(),
            workspace.dir().to_string(),
            "--input".to_string(),
            workspace.scholarly_html().to_string(),
            "--species".to_string(),
            species_category(params),
        ];
        command.extend(params.to_args(&[
            "--cid",
            "-sp",
            "--species",
            "-q",
            "-i",
            "--input",
            "-o",
            "--output",
        ]));
        Ok(command)
    }

    fn after(
        &self,
        ctx: &Context<'_>,
        params: &Params,
        out: &mut ProcessorOutput,
    ) -> Result<(), PipelineError> {
        let workspace = required_workspace(ctx, params, out)?;
        let results = workspace.results_file("species", &species_category(params));
        harvest_into(ctx, &results, &harvest::AMI_SPECIES, out);
        Ok(())
    }
}

fn harvest_into(
    ctx: &Context<'_>,
    results: &camino::Utf8Path,
    mapping: &harvest::RecordMapping,
    out: &mut ProcessorOutput,
) {
    let policy = RetryPolicy {
        attempts: ctx.settings.harvest_attempts,
        delay: std::time::Duration::from_millis(ctx.settings.harvest_delay_ms),
    };
    let outcome = harvest::harvest(results, mapping, policy);
    out.factcount = Some(outcome.facts.len());
    out.harvest_failed = outcome.failed;
    out.facts = outcome.facts;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_matches_scraper_layout() {
        assert_eq!(
            url_slug("http://example.org/article/1:2"),
            "http_example.org_article_12"
        );
    }

    #[test]
    fn text_to_html_wraps_paragraphs() {
        let html = text_to_html("first para\nstill first\n\nsecond <b>\n");
        assert!(html.contains("<p>first para\nstill first</p>"));
        assert!(html.contains("<p>second &lt;b&gt;</p>"));
    }

    #[test]
    fn registry_is_closed() {
        for name in names() {
            assert!(from_name(name).is_ok());
        }
        assert!(matches!(
            from_name("amiwords"),
            Err(PipelineError::UnsupportedTool(_))
        ));
    }
}
