//! Typed result shapes returned by the model for each analysis task.
//!
//! The model is asked for one JSON object per task. Decoding is driven by the
//! requested [`AnalysisType`], so the variant of an [`AnalysisResult`] always
//! matches the type that produced it.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    #[default]
    Review,
    Optimize,
    Secure,
    Explain,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Review => "review",
            AnalysisType::Optimize => "optimize",
            AnalysisType::Secure => "secure",
            AnalysisType::Explain => "explain",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "review" => Some(AnalysisType::Review),
            "optimize" => Some(AnalysisType::Optimize),
            "secure" | "security" => Some(AnalysisType::Secure),
            "explain" => Some(AnalysisType::Explain),
            _ => None,
        }
    }

    pub fn all() -> [AnalysisType; 4] {
        [
            AnalysisType::Review,
            AnalysisType::Optimize,
            AnalysisType::Secure,
            AnalysisType::Explain,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnalysisType::Review => "Code Review",
            AnalysisType::Optimize => "Optimization",
            AnalysisType::Secure => "Security Scan",
            AnalysisType::Explain => "Explanation",
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    #[serde(alias = "high", alias = "HIGH")]
    High,
    #[serde(alias = "medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "low", alias = "LOW")]
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDetail {
    pub line: u32,
    pub severity: Severity,
    pub issue: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewAnalysis {
    pub summary: String,
    pub details: Vec<ReviewDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeAnalysis {
    pub summary: String,
    #[serde(rename = "optimizedCode")]
    pub optimized_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub line: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecureAnalysis {
    pub summary: String,
    pub vulnerabilities: Vec<Vulnerability>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineExplanation {
    pub line: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainAnalysis {
    pub summary: String,
    #[serde(rename = "lineByLine")]
    pub line_by_line: Vec<LineExplanation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnalysisResult {
    Review(ReviewAnalysis),
    Optimize(OptimizeAnalysis),
    Secure(SecureAnalysis),
    Explain(ExplainAnalysis),
}

impl AnalysisResult {
    /// The analysis type this result answers.
    pub fn kind(&self) -> AnalysisType {
        match self {
            AnalysisResult::Review(_) => AnalysisType::Review,
            AnalysisResult::Optimize(_) => AnalysisType::Optimize,
            AnalysisResult::Secure(_) => AnalysisType::Secure,
            AnalysisResult::Explain(_) => AnalysisType::Explain,
        }
    }

    pub fn summary(&self) -> &str {
        match self {
            AnalysisResult::Review(r) => &r.summary,
            AnalysisResult::Optimize(r) => &r.summary,
            AnalysisResult::Secure(r) => &r.summary,
            AnalysisResult::Explain(r) => &r.summary,
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("the model returned an empty response")]
    Empty,
    #[error("the model response is not a valid {kind} result: {source}")]
    Shape {
        kind: AnalysisType,
        #[source]
        source: serde_json::Error,
    },
}

/// Decode raw model output into the result shape for `kind`.
pub fn decode(kind: AnalysisType, raw: &str) -> Result<AnalysisResult, DecodeError> {
    let body = extract_json(raw).ok_or(DecodeError::Empty)?;
    let shape = |source| DecodeError::Shape { kind, source };

    let result = match kind {
        AnalysisType::Review => AnalysisResult::Review(serde_json::from_str(body).map_err(shape)?),
        AnalysisType::Optimize => {
            AnalysisResult::Optimize(serde_json::from_str(body).map_err(shape)?)
        }
        AnalysisType::Secure => AnalysisResult::Secure(serde_json::from_str(body).map_err(shape)?),
        AnalysisType::Explain => {
            AnalysisResult::Explain(serde_json::from_str(body).map_err(shape)?)
        }
    };
    Ok(result)
}

/// Matches a reply that is one fenced block from start to end.
fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)\A```[A-Za-z]*[ \t]*\r?\n?(.*?)\s*```\z").expect("fence pattern is valid")
    })
}

fn is_json_object(text: &str) -> bool {
    text.starts_with('{') && serde_json::from_str::<serde_json::Value>(text).is_ok()
}

/// Find the JSON object in a model reply.
///
/// A reply that already parses is used as is, so backticks or braces inside
/// string values are never touched. Otherwise a fence wrapping the whole
/// reply is removed, and as a last resort the text from the first `{` to
/// the last `}` is taken.
fn extract_json(raw: &str) -> Option<&str> {
    let mut text = raw.trim();
    if text.is_empty() {
        return None;
    }
    if is_json_object(text) {
        return Some(text);
    }

    if let Some(inner) = fence_regex().captures(text).and_then(|c| c.get(1)) {
        text = inner.as_str().trim();
        if is_json_object(text) {
            return Some(text);
        }
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => Some(&text[start..=end]),
        _ => Some(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REVIEW: &str = r#"{
        "summary": "Two problems.",
        "details": [
            {"line": 7, "severity": "High", "issue": "XSS", "suggestion": "Sanitize bio"},
            {"line": 3, "severity": "low", "issue": "Loop", "suggestion": "Remove it"}
        ]
    }"#;

    #[test]
    fn decodes_every_kind_into_matching_variant() {
        let samples = [
            (AnalysisType::Review, REVIEW.to_string()),
            (
                AnalysisType::Optimize,
                r#"{"summary":"Faster","optimizedCode":"fn main() {}"}"#.to_string(),
            ),
            (
                AnalysisType::Secure,
                r#"{"summary":"One issue","vulnerabilities":[{"line":2,"type":"XSS","description":"d","recommendation":"r"}]}"#.to_string(),
            ),
            (
                AnalysisType::Explain,
                r#"{"summary":"Prints","lineByLine":[{"line":"print(1)","explanation":"prints one"}]}"#.to_string(),
            ),
        ];

        for (kind, raw) in samples {
            let result = decode(kind, &raw).unwrap();
            assert_eq!(result.kind(), kind);
        }
    }

    #[test]
    fn review_fields_map_through() {
        let AnalysisResult::Review(review) = decode(AnalysisType::Review, REVIEW).unwrap() else {
            panic!("expected review");
        };
        assert_eq!(review.summary, "Two problems.");
        assert_eq!(review.details.len(), 2);
        assert_eq!(review.details[0].severity, Severity::High);
        assert_eq!(review.details[1].severity, Severity::Low);
        assert_eq!(review.details[1].line, 3);
    }

    #[test]
    fn strips_markdown_fence_and_prose() {
        let raw = "Here you go:\n```json\n{\"summary\":\"ok\",\"optimizedCode\":\"x\"}\n```\nThanks!";
        let result = decode(AnalysisType::Optimize, raw).unwrap();
        assert_eq!(result.summary(), "ok");

        let raw = "Sure! {\"summary\":\"bare\",\"optimizedCode\":\"y\"} hope that helps";
        let result = decode(AnalysisType::Optimize, raw).unwrap();
        assert_eq!(result.summary(), "bare");
    }

    #[test]
    fn fences_inside_string_values_are_kept() {
        let raw = r#"{"summary":"ok","optimizedCode":"```js\nconst a = {b: 1};\n```"}"#;
        let AnalysisResult::Optimize(optimize) = decode(AnalysisType::Optimize, raw).unwrap() else {
            panic!("expected optimize");
        };
        assert_eq!(optimize.optimized_code, "```js\nconst a = {b: 1};\n```");

        let raw = r#"{"summary":"s","lineByLine":[{"line":"let s = \"```\";","explanation":"a `fence` literal"}]}"#;
        let AnalysisResult::Explain(explain) = decode(AnalysisType::Explain, raw).unwrap() else {
            panic!("expected explain");
        };
        assert_eq!(explain.line_by_line[0].line, "let s = \"```\";");
    }

    #[test]
    fn outer_fence_is_removed_without_cutting_inner_fence() {
        let raw = "```json\n{\"summary\":\"s\",\"optimizedCode\":\"```py\\nx = 1\\n```\"}\n```";
        let AnalysisResult::Optimize(optimize) = decode(AnalysisType::Optimize, raw).unwrap() else {
            panic!("expected optimize");
        };
        assert_eq!(optimize.optimized_code, "```py\nx = 1\n```");
    }

    #[test]
    fn rejects_wrong_shape() {
        let err = decode(AnalysisType::Secure, REVIEW).unwrap_err();
        assert!(matches!(err, DecodeError::Shape { kind: AnalysisType::Secure, .. }));
        assert!(err.to_string().contains("secure"));
    }

    #[test]
    fn rejects_unknown_severity() {
        let raw = r#"{"summary":"s","details":[{"line":1,"severity":"Critical","issue":"i","suggestion":"s"}]}"#;
        assert!(decode(AnalysisType::Review, raw).is_err());
    }

    #[test]
    fn rejects_empty_and_non_json() {
        assert!(matches!(decode(AnalysisType::Explain, "   "), Err(DecodeError::Empty)));
        assert!(matches!(
            decode(AnalysisType::Explain, "I cannot help with that."),
            Err(DecodeError::Shape { .. })
        ));
    }

    #[test]
    fn result_serializes_with_type_tag() {
        let result = decode(AnalysisType::Optimize, r#"{"summary":"s","optimizedCode":"c"}"#).unwrap();
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["type"], "optimize");
        assert_eq!(value["optimizedCode"], "c");
    }

    #[test]
    fn parses_type_names() {
        assert_eq!(AnalysisType::from_str("Security"), Some(AnalysisType::Secure));
        assert_eq!(AnalysisType::from_str("explain"), Some(AnalysisType::Explain));
        assert_eq!(AnalysisType::from_str("lint"), None);
    }
}
