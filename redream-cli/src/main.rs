//! redream-cli: command-line client for the RE:DREAM HTTP API
//!
//! # Subcommands
//! - `analyze <text> [--json]`  run the pipeline on a dream and store it
//! - `list [--json]`            show stored records, oldest first
//! - `delete <id>`              delete a record by id
//! - `status`                   show server health

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8767";
const SNIPPET_DELIMITER: &str = "<br>";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "redream-cli", version, about = "RE:DREAM dream analysis client")]
struct Cli {
    /// RE:DREAM HTTP server URL (overrides REDREAM_HTTP_URL env var)
    #[arg(long, env = "REDREAM_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Analyze a dream and store the result
    Analyze {
        /// Dream text in the source language
        text: String,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// List stored dream records
    List {
        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Delete a stored record
    Delete {
        /// Record id
        id: i64,
    },

    /// Show server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RecordView {
    pub id: i64,
    pub dream_text: String,
    pub keywords: Vec<String>,
    pub emotion: String,
    pub confidence: f32,
    pub search_results: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeResponse {
    pub record: RecordView,
    pub illustration: String,
    pub took_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ListResponse {
    pub records: Vec<RecordView>,
    pub count: usize,
}

// ============================================================================
// Formatting
// ============================================================================

/// Multi-line human-readable rendering of one record.
pub fn format_record(r: &RecordView) -> String {
    let mut out = format!("#{} [{} {:.0}%]\n", r.id, r.emotion, r.confidence * 100.0);
    if let Some(ts) = &r.created_at {
        out.push_str(&format!("Recorded:  {}\n", ts));
    }
    out.push_str(&format!("Dream:     {}\n", r.dream_text));
    out.push_str(&format!("Keywords:  {}\n", format_keywords(&r.keywords)));
    out.push_str("Interpretation:\n");
    for snippet in split_snippets(&r.search_results) {
        out.push_str(&format!("  - {}\n", snippet));
    }
    out
}

pub fn format_keywords(keywords: &[String]) -> String {
    if keywords.is_empty() {
        "(none)".to_string()
    } else {
        keywords.join(", ")
    }
}

/// Split the stored interpretation back into its snippets.
pub fn split_snippets(search_results: &str) -> Vec<&str> {
    search_results
        .split(SNIPPET_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// One-line summary used by `list`, dream text capped at 40 chars.
pub fn summary_line(r: &RecordView) -> String {
    let mut preview: String = r.dream_text.chars().take(40).collect();
    if r.dream_text.chars().count() > 40 {
        preview.push('…');
    }
    format!("{:>5}  {:<8}  {}", r.id, r.emotion, preview)
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send a request and return the JSON body, exiting on transport or HTTP errors.
fn send(request: reqwest::blocking::RequestBuilder, url: &str) -> anyhow::Result<serde_json::Value> {
    let resp = match request.send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("redream-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let body: serde_json::Value = resp.json().unwrap_or_default();
    if !status.is_success() {
        let msg = body["error"].as_str().unwrap_or("no error message");
        eprintln!("redream-cli: server returned {}: {}", status, msg);
        std::process::exit(1);
    }
    Ok(body)
}

fn do_analyze(server: &str, text: &str, json_output: bool) -> anyhow::Result<()> {
    // Translation, inference and search run server-side
    let url = format!("{}/analyze", server);
    let body = send(
        client(120)?.post(&url).json(&serde_json::json!({ "dream_text": text })),
        &url,
    )?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let parsed: AnalyzeResponse = serde_json::from_value(body)?;
    print!("{}", format_record(&parsed.record));
    println!("Illustration: {}", parsed.illustration);
    if let Some(ms) = parsed.took_ms {
        println!("Took: {} ms", ms);
    }
    Ok(())
}

fn do_list(server: &str, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/records", server);
    let body = send(client(30)?.get(&url), &url)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let parsed: ListResponse = serde_json::from_value(body)?;
    if parsed.records.is_empty() {
        eprintln!("No dreams recorded yet");
        return Ok(());
    }
    println!("{:>5}  {:<8}  DREAM", "ID", "EMOTION");
    for r in &parsed.records {
        println!("{}", summary_line(r));
    }
    println!("\n{} record(s)", parsed.count);
    Ok(())
}

fn do_delete(server: &str, id: i64) -> anyhow::Result<()> {
    let url = format!("{}/delete", server);
    let resp = match client(30)?.post(&url).json(&serde_json::json!({ "id": id })).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("redream-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    match resp.status() {
        reqwest::StatusCode::OK => println!("Deleted record #{}", id),
        reqwest::StatusCode::NOT_FOUND => {
            eprintln!("redream-cli: no record with id {}", id);
            std::process::exit(2);
        }
        status => {
            let body = resp.text().unwrap_or_default();
            eprintln!("redream-cli: server returned {}: {}", status, body);
            std::process::exit(1);
        }
    }
    Ok(())
}

fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);

    match client(10)?.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("RE:DREAM server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:         {}", body["version"].as_str().unwrap_or("?"));
            println!("Store:           {}", body["store"].as_str().unwrap_or("?"));
            println!("Socket:          {}", body["socket"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            eprintln!("redream-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("redream-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Analyze { text, json } => do_analyze(&server, &text, json),
        Commands::List { json } => do_list(&server, json),
        Commands::Delete { id } => do_delete(&server, id),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("redream-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_record(id: i64, text: &str, search_results: &str) -> RecordView {
        RecordView {
            id,
            dream_text: text.to_string(),
            keywords: vec!["flew".to_string(), "ocean".to_string()],
            emotion: "POSITIVE".to_string(),
            confidence: 0.87,
            search_results: search_results.to_string(),
            created_at: Some("2026-10-19T10:00:00Z".to_string()),
        }
    }

    #[test]
    fn test_split_snippets_on_delimiter() {
        let parts = split_snippets("first<br> second <br>third");
        assert_eq!(parts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_split_snippets_placeholder_is_single_item() {
        let parts = split_snippets("검색 결과를 찾을 수 없습니다.");
        assert_eq!(parts, vec!["검색 결과를 찾을 수 없습니다."]);
    }

    #[test]
    fn test_split_snippets_skips_empty_segments() {
        assert!(split_snippets("").is_empty());
        assert_eq!(split_snippets("a<br><br>b"), vec!["a", "b"]);
    }

    #[test]
    fn test_format_keywords() {
        assert_eq!(format_keywords(&[]), "(none)");
        assert_eq!(
            format_keywords(&["sky".to_string(), "sea".to_string()]),
            "sky, sea"
        );
    }

    #[test]
    fn test_format_record_contents() {
        let r = mock_record(7, "I flew over the ocean", "one<br>two");
        let out = format_record(&r);
        assert!(out.starts_with("#7 [POSITIVE 87%]"), "got: {}", out);
        assert!(out.contains("Keywords:  flew, ocean"));
        assert!(out.contains("  - one\n  - two\n"));
        assert!(out.contains("Recorded:  2026-10-19T10:00:00Z"));
    }

    #[test]
    fn test_summary_line_truncates_long_text() {
        let long = "꿈".repeat(60);
        let line = summary_line(&mock_record(1, &long, ""));
        assert!(line.ends_with('…'));
        assert_eq!(line.chars().filter(|c| *c == '꿈').count(), 40);
    }

    #[test]
    fn test_summary_line_short_text_untouched() {
        let line = summary_line(&mock_record(12, "short dream", ""));
        assert!(line.contains("   12  POSITIVE  short dream"));
        assert!(!line.ends_with('…'));
    }

    #[test]
    fn test_analyze_response_parses_server_shape() {
        let body = serde_json::json!({
            "record": {
                "id": 3,
                "dream_text": "꿈",
                "keywords": [],
                "emotion": "NEGATIVE",
                "confidence": 0.6,
                "search_results": "a<br>b",
                "created_at": "2026-10-19T10:00:00Z"
            },
            "illustration": "/static/images/부정.png",
            "took_ms": 120
        });
        let parsed: AnalyzeResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.record.id, 3);
        assert_eq!(parsed.illustration, "/static/images/부정.png");
        assert_eq!(parsed.took_ms, Some(120));
    }
}
