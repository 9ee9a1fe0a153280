//! Query-mode classification.
//!
//! One temperature-0 LLM call returns `{mode, reasoning, scope}`. The
//! parser is defensive: any malformed output falls back to CONCEPTUAL, and
//! never propagates an error.

use serde::Deserialize;
use tracing::{debug, warn};

use llm_service::TextGenerator;

use crate::prompts::CLASSIFIER_SYSTEM;

/// Closed set of retrieval modes; dispatch is exhaustive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryMode {
    Diagnostic,
    Exploratory,
    Analytical,
    Conceptual,
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub mode: QueryMode,
    pub reasoning: String,
    pub scope: Option<String>,
}

impl Classification {
    fn fallback(reason: &str) -> Self {
        Self {
            mode: QueryMode::Conceptual,
            reasoning: reason.to_string(),
            scope: None,
        }
    }
}

/// Classify a question. Never fails; parse problems mean CONCEPTUAL.
pub async fn classify(llm: &dyn TextGenerator, question: &str) -> Classification {
    let prompt = format!("Question: {question}\n\nRespond with the JSON object only.");
    let raw = match llm
        .generate_with_temperature(&prompt, Some(CLASSIFIER_SYSTEM), 0.0)
        .await
    {
        Ok(r) => r,
        Err(e) => {
            warn!("classifier call failed, defaulting to conceptual: {e}");
            return Classification::fallback("classifier unavailable");
        }
    };
    let parsed = parse_classifier_output(&raw);
    debug!(mode = ?parsed.mode, "question classified");
    parsed
}

/// Parse the classifier's JSON, tolerating fencing and stray prose.
pub fn parse_classifier_output(raw: &str) -> Classification {
    #[derive(Deserialize)]
    struct Wire {
        mode: String,
        #[serde(default)]
        reasoning: String,
        #[serde(default)]
        scope: Option<String>,
    }

    let json_slice = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if end > start => &raw[start..=end],
        _ => return Classification::fallback("no JSON object in classifier output"),
    };

    let wire: Wire = match serde_json::from_str(json_slice) {
        Ok(w) => w,
        Err(_) => return Classification::fallback("classifier output unparseable"),
    };

    let mode = match wire.mode.trim().to_ascii_uppercase().as_str() {
        "DIAGNOSTIC" => QueryMode::Diagnostic,
        "EXPLORATORY" => QueryMode::Exploratory,
        "ANALYTICAL" => QueryMode::Analytical,
        "CONCEPTUAL" => QueryMode::Conceptual,
        _ => return Classification::fallback("unknown mode in classifier output"),
    };

    Classification {
        mode,
        reasoning: wire.reasoning,
        scope: wire.scope.filter(|s| !s.trim().is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json() {
        let c = parse_classifier_output(
            r#"{"mode": "DIAGNOSTIC", "reasoning": "mentions an exception", "scope": "api"}"#,
        );
        assert_eq!(c.mode, QueryMode::Diagnostic);
        assert_eq!(c.scope.as_deref(), Some("api"));
    }

    #[test]
    fn tolerates_code_fences_and_prose() {
        let c = parse_classifier_output(
            "Sure!\n```json\n{\"mode\": \"exploratory\", \"reasoning\": \"trace\"}\n```",
        );
        assert_eq!(c.mode, QueryMode::Exploratory);
    }

    #[test]
    fn malformed_output_defaults_to_conceptual() {
        assert_eq!(
            parse_classifier_output("not json at all").mode,
            QueryMode::Conceptual
        );
        assert_eq!(
            parse_classifier_output("{\"mode\": \"WEIRD\"}").mode,
            QueryMode::Conceptual
        );
        assert_eq!(parse_classifier_output("{broken").mode, QueryMode::Conceptual);
    }
}
