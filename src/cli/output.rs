//! Output formatting for CLI commands.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::args::{OnionIndexArgs, OutputFormat};
use crate::host::HostStatus;
use crate::search::SearchHit;

/// Renders a command result as plain text.
pub trait HumanOutput {
    fn write_human(&self, out: &mut dyn Write) -> io::Result<()>;
}

/// Result of a search command.
#[derive(Debug, Serialize)]
pub struct SearchOutput {
    pub query: String,
    pub total_hits: u64,
    pub max_score: Option<f32>,
    pub duration_ms: u64,
    pub hits: Vec<SearchHit>,
}

/// Index statistics.
#[derive(Debug, Serialize)]
pub struct IndexStats {
    pub index_dir: String,
    pub generation: u64,
    pub committed_at: DateTime<Utc>,
    pub live_documents: u64,
    pub max_doc: u64,
    pub segments: usize,
    pub index_size_bytes: u64,
}

/// Result of an add command.
#[derive(Debug, Serialize)]
pub struct AddOutput {
    pub documents_added: usize,
    pub lines_skipped: usize,
    pub generation: u64,
    pub duration_ms: u64,
}

/// Result of a remove command.
#[derive(Debug, Serialize)]
pub struct RemoveOutput {
    pub url: String,
    pub generation: u64,
    pub live_documents: u64,
}

/// Ban state of a host after a ban, unban or is-banned command.
#[derive(Debug, Serialize)]
pub struct BanOutput {
    pub url: String,
    pub host: String,
    pub banned: bool,
}

/// Host table summary.
#[derive(Debug, Serialize)]
pub struct HostsOutput {
    pub known_hosts: u64,
    pub status: Option<HostStatus>,
}

impl HumanOutput for SearchOutput {
    fn write_human(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Search Results:")?;
        writeln!(out, "═══════════════")?;

        for (i, hit) in self.hits.iter().enumerate() {
            writeln!(out)?;
            writeln!(out, "Result {}: (Score: {:.3})", i + 1, hit.score)?;
            writeln!(out, "─────────────")?;
            for (name, value) in &hit.fields {
                writeln!(out, "{name}: {value}")?;
            }
        }

        writeln!(out)?;
        writeln!(out, "Total hits: {}", self.total_hits)?;
        writeln!(out, "Search time: {}ms", self.duration_ms)
    }
}

impl HumanOutput for IndexStats {
    fn write_human(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Index Statistics:")?;
        writeln!(out, "════════════════")?;
        writeln!(out, "Directory: {}", self.index_dir)?;
        writeln!(out, "Generation: {}", self.generation)?;
        writeln!(out, "Committed at: {}", self.committed_at.to_rfc3339())?;
        writeln!(out, "Live documents: {}", self.live_documents)?;
        writeln!(out, "Deleted documents: {}", self.max_doc - self.live_documents)?;
        writeln!(out, "Number of segments: {}", self.segments)?;
        writeln!(out, "Index size: {}", format_bytes(self.index_size_bytes))
    }
}

impl HumanOutput for AddOutput {
    fn write_human(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(
            out,
            "Added {} documents in {}ms (generation {})",
            self.documents_added, self.duration_ms, self.generation
        )?;
        if self.lines_skipped > 0 {
            writeln!(out, "Skipped {} malformed lines", self.lines_skipped)?;
        }
        Ok(())
    }
}

impl HumanOutput for RemoveOutput {
    fn write_human(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(
            out,
            "Removed {} (generation {}, {} live documents)",
            self.url, self.generation, self.live_documents
        )
    }
}

impl HumanOutput for BanOutput {
    fn write_human(&self, out: &mut dyn Write) -> io::Result<()> {
        let state = if self.banned { "banned" } else { "not banned" };
        writeln!(out, "{}: {state}", self.host)
    }
}

impl HumanOutput for HostsOutput {
    fn write_human(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Known hosts: {}", self.known_hosts)?;
        if let Some(status) = &self.status {
            let state = if status.online { "online" } else { "offline" };
            writeln!(
                out,
                "{}: {state} (updated {})",
                status.host,
                status.updated_at.to_rfc3339()
            )?;
        }
        Ok(())
    }
}

/// Write a command result to stdout in the selected format.
pub fn output_result<T: Serialize + HumanOutput>(
    result: &T,
    args: &OnionIndexArgs,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_result(&mut out, result, args.output_format, args.pretty)
}

/// Write a command result to `out` in the given format.
pub fn write_result<T: Serialize + HumanOutput>(
    out: &mut dyn Write,
    result: &T,
    format: OutputFormat,
    pretty: bool,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Human => result.write_human(out)?,
        OutputFormat::Json => {
            let json = if pretty {
                serde_json::to_string_pretty(result)?
            } else {
                serde_json::to_string(result)?
            };
            writeln!(out, "{json}")?;
        }
    }
    Ok(())
}

/// Format bytes into human-readable format.
fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    let unit = UNITS[unit_index];
    if unit_index == 0 {
        format!("{bytes} {unit}")
    } else {
        format!("{size:.1} {unit}")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::index::DocAddress;
    use crate::schema::FieldValue;

    fn render<T: Serialize + HumanOutput>(result: &T, format: OutputFormat) -> String {
        let mut buf = Vec::new();
        write_result(&mut buf, result, format, false).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1048576), "1.0 MB");
    }

    #[test]
    fn test_search_output() {
        let output = SearchOutput {
            query: "world".to_string(),
            total_hits: 1,
            max_score: Some(0.5),
            duration_ms: 3,
            hits: vec![SearchHit {
                score: 0.5,
                address: DocAddress::new(0, 0),
                fields: BTreeMap::from([(
                    "URL".to_string(),
                    FieldValue::Text("http://a.onion/1".to_string()),
                )]),
            }],
        };

        let human = render(&output, OutputFormat::Human);
        assert!(human.contains("Result 1: (Score: 0.500)"));
        assert!(human.contains("URL: http://a.onion/1"));
        assert!(human.contains("Total hits: 1"));

        let json: serde_json::Value =
            serde_json::from_str(&render(&output, OutputFormat::Json)).unwrap();
        assert_eq!(json["total_hits"], 1);
        assert_eq!(json["hits"][0]["fields"]["URL"], "http://a.onion/1");
        assert!(json["hits"][0].get("address").is_none());
    }

    #[test]
    fn test_ban_output() {
        let output = BanOutput {
            url: "http://example.onion/".to_string(),
            host: "example.onion".to_string(),
            banned: false,
        };
        assert_eq!(render(&output, OutputFormat::Human), "example.onion: not banned\n");
    }
}
