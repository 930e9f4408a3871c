//! Classifier adapter
//!
//! Wraps one request/response exchange with a language model:
//! - [`build_prompt`] embeds the incident message in a fixed instruction
//! - [`LanguageModel::complete`] is the external call
//! - [`parse_reply`] turns the reply into a [`ClassificationResult`]
//!
//! Model failures become "no result" (`None`). Unparseable replies become
//! [`ClassificationResult::malformed`]. Neither is propagated as an error.

use crate::error::ModelError;
use crate::types::{ClassificationResult, Department, Urgency};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Single-turn text completion backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send one prompt and return the raw reply text
    ///
    /// # Errors
    /// Any transport, status or decode failure of the backend
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;
}

/// Build the extraction prompt for one incident message
#[must_use]
pub fn build_prompt(message: &str) -> String {
    let departments = Department::ALL
        .iter()
        .map(Department::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are an assistant helping city officials triage incident reports submitted by the public.

Extract the following from the incident message below:

1. The most prominent place name in the message.
2. The one or two keywords that best describe the incident.
3. How urgently the incident should be responded to, on a scale of 1-10.
4. The city department best suited to respond. Choose one of: {departments}. If no department clearly applies, or the event is not unusual enough to need a response, use an empty string.

Message: "{message}"

Respond in JSON format:
{{
  "place": [...],
  "keywords": [...],
  "urgency": "...",
  "department": "..."
}}
"#
    )
}

/// A field the model may send as one string or a list of strings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) if s.trim().is_empty() => Vec::new(),
            Self::One(s) => vec![s],
            Self::Many(items) => items,
        }
    }
}

/// Urgency as a number or numeric text
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawUrgency {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl RawUrgency {
    fn to_urgency(&self) -> Option<Urgency> {
        match self {
            Self::Integer(i) => Some(Urgency::clamped(*i)),
            Self::Float(f) => Urgency::parse_lenient(&f.to_string()),
            Self::Text(s) => Urgency::parse_lenient(s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawReply {
    #[serde(default)]
    place: Option<OneOrMany>,
    #[serde(default)]
    keywords: Option<OneOrMany>,
    #[serde(default)]
    urgency: Option<RawUrgency>,
    #[serde(default)]
    department: Option<String>,
}

/// Strip a surrounding markdown code fence, if any
fn unfence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse a model reply into a classification
///
/// Returns [`ClassificationResult::malformed`] if the reply is not a JSON
/// object of the expected shape. Departments matching the enumeration are
/// normalized to their canonical spelling; anything else is kept verbatim.
#[must_use]
pub fn parse_reply(reply: &str) -> ClassificationResult {
    let raw: RawReply = match serde_json::from_str(unfence(reply)) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable model reply");
            return ClassificationResult::malformed();
        }
    };

    let department = raw.department.map(|d| match d.parse::<Department>() {
        Ok(known) => known.as_str().to_string(),
        Err(_) => d.trim().to_string(),
    });

    ClassificationResult {
        place: raw.place.map(OneOrMany::into_vec).unwrap_or_default(),
        keywords: raw.keywords.map(OneOrMany::into_vec).unwrap_or_default(),
        urgency: raw.urgency.as_ref().and_then(RawUrgency::to_urgency),
        department,
    }
}

/// Prompt builder, model call and reply parser in one step
#[derive(Clone)]
pub struct ClassifierAdapter {
    model: Arc<dyn LanguageModel>,
}

impl ClassifierAdapter {
    /// Create adapter over a model backend
    #[inline]
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Classify one non-empty message
    ///
    /// # Returns
    /// - `None` if the model call failed (logged)
    /// - a malformed result if the reply could not be parsed
    /// - the parsed classification otherwise
    pub async fn classify(&self, message: &str) -> Option<ClassificationResult> {
        let prompt = build_prompt(message);
        match self.model.complete(&prompt).await {
            Ok(reply) => Some(parse_reply(&reply)),
            Err(e) => {
                tracing::error!(error = %e, "model call failed");
                None
            }
        }
    }
}

impl fmt::Debug for ClassifierAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierAdapter").finish_non_exhaustive()
    }
}
