//! Shell command vetting. Never fails closed: anything that goes wrong
//! yields an `allow` verdict that says why.

use kenning_llm::privacy::PrivacySanitizer;
use kenning_llm::tiers::TierChain;
use serde::{Deserialize, Serialize};

use crate::ask::Advisor;
use crate::context::preview;

const GATE_RESULTS: usize = 3;
const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
    Modify,
}

impl Decision {
    /// Unknown decisions read as `Allow`.
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "deny" => Self::Deny,
            "modify" => Self::Modify,
            _ => Self::Allow,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateVerdict {
    pub decision: Decision,
    pub reason: String,
    pub safe_command: String,
}

impl GateVerdict {
    fn allow(command: &str, reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Allow,
            reason: reason.into(),
            safe_command: command.to_owned(),
        }
    }
}

impl Advisor {
    /// Ask the first tier whether `command` should run, given the code it
    /// most likely touches.
    pub async fn gatekeep(&self, command: &str) -> GateVerdict {
        let Some(tier) = self.tiers.first() else {
            return GateVerdict::allow(command, "No LLM tier configured, allowing by default");
        };
        let results = match self.index.query(command, GATE_RESULTS).await {
            Ok(results) => results,
            Err(e) => return GateVerdict::allow(command, format!("Index unavailable, allowing by default: {e}")),
        };

        let context = if results.is_empty() {
            "No relevant code context.".to_owned()
        } else {
            results
                .iter()
                .map(|r| {
                    format!(
                        "{} ({}) @ {}:{} -> {}",
                        r.entity.name,
                        r.entity.kind,
                        r.entity.file_path,
                        r.entity.start_line,
                        preview(&r.entity.content, SNIPPET_CHARS).replace('\n', " ")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n\n")
        };
        let prompt = format!(
            "You are a terminal gatekeeper.\n\n\
             PROJECT CONTEXT:\n{context}\n\n\
             The user is about to run this shell command:\n{command}\n\n\
             Decide whether this command should run.\n\
             Return a JSON object with these fields:\n\
             - decision: one of \"allow\", \"deny\", \"modify\"\n\
             - reason: short explanation\n\
             - safe_command: command to run if decision is \"allow\" or \"modify\"\n\n\
             Respond with JSON only.\n"
        );

        let single = TierChain::new(vec![tier.clone()]);
        let masker = self.masker();
        let sanitizer = masker.as_ref().map(|m| m as &dyn PrivacySanitizer);
        match single.complete(&prompt, sanitizer).await {
            Ok(reply) => parse_verdict(&reply, command),
            Err(e) => {
                tracing::error!("gatekeeper error: {e}");
                GateVerdict::allow(command, format!("Gatekeeper error, allowing by default: {e}"))
            }
        }
    }
}

/// Read the JSON object in `reply`, tolerating surrounding prose or code fences.
fn parse_verdict(reply: &str, command: &str) -> GateVerdict {
    let object = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => reply.trim(),
    };
    let value: serde_json::Value = match serde_json::from_str(object) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("gatekeeper reply is not JSON: {e}");
            return GateVerdict::allow(command, format!("Gatekeeper error, allowing by default: {e}"));
        }
    };
    let field = |name: &str| {
        value
            .get(name)
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_owned)
    };

    GateVerdict {
        decision: field("decision").map_or(Decision::Allow, |d| Decision::parse(&d)),
        reason: field("reason").unwrap_or_default(),
        safe_command: field("safe_command").unwrap_or_else(|| command.to_owned()),
    }
}
