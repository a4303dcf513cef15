//! Markdown report rendering for a finished run.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use orchestration::RunOutcome;

/// Render the full run report as markdown.
pub fn render(query: &str, outcome: &RunOutcome) -> String {
    let mut out = String::new();
    out.push_str("# Panel Analysis Report\n\n");
    out.push_str(&format!("**Query:** {query}\n\n"));
    out.push_str(&format!(
        "**Run:** `{}`: {} cycle(s), {} debate entr{}\n\n",
        outcome.run_id,
        outcome.iterations,
        outcome.debate_count,
        if outcome.debate_count == 1 { "y" } else { "ies" }
    ));

    out.push_str("## Answer\n\n");
    if outcome.final_answer.is_empty() {
        out.push_str("_The run produced no synthesized answer._\n");
    } else {
        out.push_str(&outcome.final_answer);
        out.push('\n');
    }

    out.push_str("\n## Workers consulted\n\n");
    for node in &outcome.routing_history {
        out.push_str(&format!("- {node}\n"));
    }

    if !outcome.sources.is_empty() {
        out.push_str("\n## Sources\n\n");
        for source in outcome.sources.values() {
            out.push_str(&format!("- [{}]({})", source.title, source.url));
            if let Some(snippet) = &source.snippet {
                out.push_str(&format!(" - {snippet}"));
            }
            out.push('\n');
        }
    }

    out
}

/// Write the report under `dir` with a timestamped name; returns the path.
pub fn write(dir: &Path, query: &str, outcome: &RunOutcome) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating report directory {}", dir.display()))?;
    let name = format!("panel-report-{}.md", Utc::now().format("%Y%m%d-%H%M%S"));
    let path = dir.join(name);
    std::fs::write(&path, render(query, outcome))
        .with_context(|| format!("writing report {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestration::SourceCitation;
    // RunOutcome has no test constructor in the core; build one over serde.
    fn outcome() -> RunOutcome {
        serde_json::from_value(serde_json::json!({
            "run_id": "8c7f1e9a-4a67-4c87-9d1e-3f1a2b3c4d5e",
            "final_answer": "The merger likely raises concentration above agency thresholds.",
            "routing_history": ["quant", "synthesis"],
            "sources": {},
            "iterations": 3,
            "debate_count": 0,
            "trace": [],
        }))
        .unwrap()
    }

    #[test]
    fn test_render_contains_answer_and_history() {
        let report = render("Does the merger raise HHI above 2500?", &outcome());
        assert!(report.contains("# Panel Analysis Report"));
        assert!(report.contains("above agency thresholds"));
        assert!(report.contains("- quant"));
        assert!(report.contains("- synthesis"));
        // No sources section when nothing was cited.
        assert!(!report.contains("## Sources"));
    }

    #[test]
    fn test_render_lists_sources() {
        let mut o = outcome();
        o.sources.insert(
            "https://example.org/hmg".into(),
            SourceCitation::new("https://example.org/hmg", "Merger Guidelines"),
        );
        let report = render("q", &o);
        assert!(report.contains("[Merger Guidelines](https://example.org/hmg)"));
    }

    #[test]
    fn test_write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "q", &outcome()).unwrap();
        assert!(path.exists());
        let body = std::fs::read_to_string(path).unwrap();
        assert!(body.contains("Panel Analysis Report"));
    }
}
