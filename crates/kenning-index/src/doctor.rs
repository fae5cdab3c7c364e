//! Build failure diagnosis: locate the files a compiler complains about,
//! gather their code and recent history, and ask for a fix.

use std::fmt::Write;
use std::path::{Component, Path};
use std::sync::LazyLock;

use kenning_memory::MemoryKind;
use regex::Regex;

use crate::ask::Advisor;
use crate::error::Result;

const WINDOW_LINES: usize = 20;
const EVOLUTION_RECALL: usize = 5;

static LOCATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // rustc
        r"--> (.*?):(\d+):(\d+)",
        // windows absolute
        r"([a-zA-Z]:[\\/].*?):(\d+):(\d+)",
        // relative or unix absolute, starting a word
        r"(?m)(?:^|[\s(\x22'])([./\\][^\s:]*):(\d+):(\d+)",
        // python traceback
        r#"File "(.*?)", line (\d+)"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("location regex is valid"))
    .collect()
});

/// A file position mentioned in build output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLocation {
    pub path: String,
    pub line: usize,
}

/// Distinct file locations in `output`, first mention wins. Paths under
/// `node_modules` or `target` are skipped.
#[must_use]
pub fn error_locations(output: &str) -> Vec<ErrorLocation> {
    let mut found: Vec<ErrorLocation> = Vec::new();
    for pattern in LOCATION_PATTERNS.iter() {
        for caps in pattern.captures_iter(output) {
            let (Some(path), Some(line)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let path = path.as_str().trim().replace('\\', "/");
            if path.is_empty() || is_vendored(&path) || found.iter().any(|l| l.path == path) {
                continue;
            }
            let Ok(line) = line.as_str().parse() else {
                continue;
            };
            found.push(ErrorLocation { path, line });
        }
    }
    found
}

fn is_vendored(path: &str) -> bool {
    Path::new(path).components().any(|c| {
        matches!(c, Component::Normal(name) if name == "node_modules" || name == "target")
    })
}

/// Numbered lines within `WINDOW_LINES` of the 1-based `line`.
#[must_use]
pub fn code_window(source: &str, line: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let start = line.saturating_sub(WINDOW_LINES);
    let end = (line + WINDOW_LINES).min(lines.len());
    let mut out = String::new();
    for (i, text) in lines.iter().enumerate().take(end).skip(start) {
        let _ = writeln!(out, "{:4} | {text}", i + 1);
    }
    out
}

impl Advisor {
    /// Diagnose a failed build from its output.
    ///
    /// With no recognizable file locations this degrades to a plain
    /// [`ask`](Advisor::ask) over the raw output.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is not ready.
    pub async fn diagnose_build(&self, output: &str) -> Result<String> {
        let locations = error_locations(output);
        tracing::info!(locations = locations.len(), "diagnosing build output");

        let mut reports = Vec::new();
        let mut history: Vec<String> = Vec::new();
        for location in &locations {
            match self
                .index
                .recall_in_context(&location.path, &location.path, EVOLUTION_RECALL)
                .await
            {
                Ok(memories) => {
                    for m in memories {
                        let entry = format!("- {}", m.record.content);
                        if m.record.kind == MemoryKind::Evolution && !history.contains(&entry) {
                            history.push(entry);
                        }
                    }
                }
                Err(e) => tracing::warn!(path = %location.path, "evolution recall failed: {e}"),
            }

            let (abs, _) = self.index.resolve(Path::new(&location.path));
            match tokio::fs::read(&abs).await {
                Ok(bytes) => {
                    let source = String::from_utf8_lossy(&bytes);
                    reports.push(format!(
                        "### File: {} (Line {})\n```\n{}```\n",
                        location.path,
                        location.line,
                        code_window(&source, location.line)
                    ));
                }
                Err(e) => tracing::debug!(path = %abs.display(), "cannot read reported file: {e}"),
            }
        }

        if reports.is_empty() {
            tracing::warn!("no readable file locations in build output, falling back to ask");
            return self
                .ask(&format!(
                    "Diagnose this build failure and suggest a fix:\n{output}"
                ))
                .await;
        }

        let recent = if history.is_empty() {
            String::new()
        } else {
            format!(
                "\n\nRECENT CHANGES (possible regressions):\n{}",
                history.join("\n")
            )
        };
        let prompt = format!(
            "You are a build doctor. A build has failed. Analyze the compiler output and the code \
             context to suggest a definitive fix.\n\n\
             ERRORS:\n{output}{recent}\n\n\
             CODE CONTEXT FROM FILES:\n{}\n\
             DIAGNOSIS PROTOCOL:\n\
             1. Identify the exact line causing the error.\n\
             2. Check whether this is a regression (see RECENT CHANGES).\n\
             3. Provide the full code block for the fix.\n\
             4. If several files are involved, list them all.\n",
            reports.join("\n")
        );
        Ok(self.complete(&prompt).await)
    }
}
