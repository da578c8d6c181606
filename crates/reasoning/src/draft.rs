use crate::error::{Result, SynthesisError};
use crate::record::{collect_citations, ReasoningStep};
use repotrace_graph::ExpansionRequest;
use serde::Deserialize;

/// Parsed collaborator output, before any evidence check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub prompt: String,
    pub answer: String,
    pub reasoning: Vec<ReasoningStep>,
    pub integration_points: Vec<String>,

    /// Spans the collaborator asked for instead of guessing
    pub need_evidence: Vec<ExpansionRequest>,
}

impl Draft {
    #[must_use]
    pub fn citations(&self) -> Vec<String> {
        collect_citations(&self.reasoning, &self.answer)
    }
}

#[derive(Deserialize)]
struct RawDraft {
    #[serde(default, alias = "question", alias = "requirement")]
    prompt: String,
    #[serde(default, alias = "proposal")]
    answer: String,
    #[serde(default)]
    reasoning: Vec<RawStep>,
    #[serde(default)]
    integration_points: Vec<String>,
    #[serde(default)]
    need_evidence: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStep {
    Text(String),
    Cite {
        cite: String,
        #[serde(default)]
        note: Option<String>,
    },
    Inference {
        inference: String,
    },
    Tagged(ReasoningStep),
}

impl From<RawStep> for ReasoningStep {
    fn from(raw: RawStep) -> Self {
        match raw {
            RawStep::Text(text) | RawStep::Inference { inference: text } => {
                Self::Inference { text }
            }
            RawStep::Cite { cite, note } => Self::Citation { unit: cite, note },
            RawStep::Tagged(step) => step,
        }
    }
}

/// Parse a completion into a [`Draft`].
///
/// Accepts a bare JSON object, a fenced ```json block, or prose surrounding one
/// object. Unreadable `need_evidence` entries are ignored.
pub fn parse_draft(raw: &str) -> Result<Draft> {
    let body = json_body(raw)
        .ok_or_else(|| SynthesisError::MalformedDraft("no JSON object in completion".to_string()))?;
    let parsed: RawDraft = serde_json::from_str(body)
        .map_err(|e| SynthesisError::MalformedDraft(e.to_string()))?;

    let draft = Draft {
        prompt: parsed.prompt.trim().to_string(),
        answer: parsed.answer.trim().to_string(),
        reasoning: parsed
            .reasoning
            .into_iter()
            .map(ReasoningStep::from)
            .filter(|step| match step {
                ReasoningStep::Inference { text } => !text.trim().is_empty(),
                ReasoningStep::Citation { unit, .. } => !unit.trim().is_empty(),
            })
            .collect(),
        integration_points: parsed
            .integration_points
            .into_iter()
            .map(|point| point.trim().to_string())
            .filter(|point| !point.is_empty())
            .collect(),
        need_evidence: parsed
            .need_evidence
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect(),
    };

    if draft.answer.is_empty() && draft.need_evidence.is_empty() {
        return Err(SynthesisError::MalformedDraft("draft has no answer".to_string()));
    }
    Ok(draft)
}

fn json_body(raw: &str) -> Option<&str> {
    if let Some(start) = raw.find("```json") {
        let rest = &raw[start + "```json".len()..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim());
        }
    }
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn accepts_fenced_json_with_mixed_steps() {
        let raw = r#"Here you go:
```json
{
  "prompt": "When is a card charged?",
  "answer": "Only for positive totals [cite:shop/cart.py::Cart.checkout].",
  "reasoning": [
    "Checkout guards the charge.",
    {"cite": "shop/payments.py::charge"},
    {"type": "citation", "unit": "shop/cart.py::Cart.total"},
    {"inference": "   "}
  ],
  "need_evidence": [{"kind": "callers_of", "unit": "shop/payments.py::charge"}, {"kind": "bogus"}]
}
```"#;
        let draft = parse_draft(raw).unwrap();
        assert_eq!(draft.reasoning.len(), 3);
        assert_eq!(
            draft.citations(),
            vec![
                "shop/payments.py::charge".to_string(),
                "shop/cart.py::Cart.total".to_string(),
                "shop/cart.py::Cart.checkout".to_string(),
            ]
        );
        assert_eq!(
            draft.need_evidence,
            vec![ExpansionRequest::CallersOf(
                "shop/payments.py::charge".parse().unwrap()
            )]
        );
    }

    #[test]
    fn bare_object_inside_prose() {
        let draft = parse_draft("Sure. {\"answer\": \"ok\"} Done.").unwrap();
        assert_eq!(draft.answer, "ok");
        assert!(draft.citations().is_empty());
    }

    #[test]
    fn rejects_non_json_and_empty_answers() {
        assert!(matches!(
            parse_draft("I cannot help with that."),
            Err(SynthesisError::MalformedDraft(_))
        ));
        assert!(matches!(
            parse_draft("{\"prompt\": \"q\", \"answer\": \"  \"}"),
            Err(SynthesisError::MalformedDraft(_))
        ));
    }
}
