//! Decoding of decision-source output.
//!
//! All "the model might say anything" handling lives here: fence stripping,
//! locating the JSON object, strict schema decoding, and the deterministic
//! resolution of well-formed but invalid choices.
//!
//! Decoding and resolution are separate on purpose. Text that is not a
//! well-formed decision is a [`SwitchyardError::Decode`]; a well-formed
//! decision naming something unknown is a policy violation that resolution
//! always recovers from.

use serde::{Deserialize, Serialize};
use switchyard_common::{Result, SwitchyardError, TaskState};
use switchyard_specialists::SpecialistRegistry;
use switchyard_specialists::registry::{END_ALIASES, END_SENTINEL};

/// Where the supervisor wants to go next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Next {
    End,
    Specialist(String),
}

impl From<String> for Next {
    fn from(raw: String) -> Self {
        let trimmed = raw.trim();
        if END_ALIASES.iter().any(|alias| alias.eq_ignore_ascii_case(trimmed)) {
            Self::End
        } else {
            Self::Specialist(trimmed.to_string())
        }
    }
}

impl From<Next> for String {
    fn from(next: Next) -> Self {
        match next {
            Next::End => END_SENTINEL.to_string(),
            Next::Specialist(id) => id,
        }
    }
}

impl std::fmt::Display for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::End => f.write_str(END_SENTINEL),
            Self::Specialist(id) => f.write_str(id),
        }
    }
}

/// Parsed supervisor output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub next: Next,
    #[serde(default)]
    pub reason: String,
}

/// Validator verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Outcome {
    Continue,
    Finish,
    /// Anything else the model produced; resolved by policy, never trusted.
    Unrecognized(String),
}

impl From<String> for Outcome {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CONTINUE" | "SUPERVISOR" => Self::Continue,
            "FINISH" => Self::Finish,
            other if END_ALIASES.iter().any(|alias| alias.eq_ignore_ascii_case(other)) => {
                Self::Finish
            }
            _ => Self::Unrecognized(raw),
        }
    }
}

impl From<Outcome> for String {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Continue => "CONTINUE".to_string(),
            Outcome::Finish => "FINISH".to_string(),
            Outcome::Unrecognized(raw) => raw,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Continue => f.write_str("CONTINUE"),
            Self::Finish => f.write_str("FINISH"),
            Self::Unrecognized(raw) => write!(f, "unrecognized({raw})"),
        }
    }
}

/// Parsed validator output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationDecision {
    pub outcome: Outcome,
    #[serde(default)]
    pub reason: String,
}

/// Remove optional markdown code fences around a model reply.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string (`json`, `JSON`, ...) up to the end of the line.
        text = match rest.find('\n') {
            Some(pos) => &rest[pos + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Find the first balanced JSON object in `s`, ignoring braces inside strings.
pub fn extract_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn decode<T: serde::de::DeserializeOwned>(raw: &str, what: &str) -> Result<T> {
    let text = strip_code_fences(raw);
    let invalid = |e: serde_json::Error| {
        SwitchyardError::Decode(format!("invalid {what} decision: {e}"))
    };

    match serde_json::from_str(text) {
        Ok(decision) => Ok(decision),
        // A bare object that fails the schema is reported as-is.
        Err(e) if extract_json_object(text) == Some(text) => Err(invalid(e)),
        Err(_) => {
            let candidate = extract_json_object(text).ok_or_else(|| {
                SwitchyardError::Decode(format!(
                    "no JSON object in {what} output: {}",
                    preview(raw)
                ))
            })?;
            serde_json::from_str(candidate).map_err(invalid)
        }
    }
}

fn preview(raw: &str) -> String {
    const MAX: usize = 160;
    let mut out: String = raw.chars().take(MAX).collect();
    if raw.chars().count() > MAX {
        out.push_str("...");
    }
    out
}

pub fn decode_routing(raw: &str) -> Result<RoutingDecision> {
    decode(raw, "supervisor")
}

pub fn decode_validation(raw: &str) -> Result<ValidationDecision> {
    decode(raw, "validator")
}

/// What the supervisor's choice resolves to once checked against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteResolution {
    End,
    Dispatch(String),
    /// The named specialist is unknown; `applied` is the deterministic substitute.
    Fallback { rejected: String, applied: String },
}

/// Check a routing decision against the registry.
///
/// Unknown ids fall back to the most recently dispatched specialist, or to
/// `default_specialist` before the first dispatch.
pub fn resolve_route(
    decision: &RoutingDecision,
    state: &TaskState,
    registry: &SpecialistRegistry,
    default_specialist: &str,
) -> RouteResolution {
    match &decision.next {
        Next::End => RouteResolution::End,
        Next::Specialist(id) if registry.contains(id) => RouteResolution::Dispatch(id.clone()),
        Next::Specialist(id) => {
            let applied = state
                .current_specialist()
                .filter(|current| registry.contains(current))
                .unwrap_or(default_specialist)
                .to_string();
            RouteResolution::Fallback {
                rejected: id.clone(),
                applied,
            }
        }
    }
}

/// Collapse an unrecognized outcome: CONTINUE normally, FINISH on the final round.
pub fn resolve_outcome(outcome: &Outcome, final_round: bool) -> Outcome {
    match outcome {
        Outcome::Unrecognized(_) if final_round => Outcome::Finish,
        Outcome::Unrecognized(_) => Outcome::Continue,
        known => known.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use switchyard_specialists::StaticSpecialist;

    fn registry() -> SpecialistRegistry {
        let mut registry = SpecialistRegistry::new();
        for id in ["domain-lookup", "metrics-query", "other"] {
            registry
                .register(Arc::new(StaticSpecialist::new(id, id, "ok")))
                .unwrap();
        }
        registry
    }

    #[test]
    fn strip_fences_variants() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn extract_object_from_prose() {
        let input = r#"Sure! {"next":"other","reason":"x"} Hope that helps."#;
        assert_eq!(
            extract_json_object(input),
            Some(r#"{"next":"other","reason":"x"}"#)
        );
    }

    #[test]
    fn extract_object_ignores_braces_in_strings() {
        let input = r#"{"next":"other","reason":"use } carefully {"}"#;
        assert_eq!(extract_json_object(input), Some(input));
    }

    #[test]
    fn extract_object_incomplete_or_missing() {
        assert_eq!(extract_json_object(r#"{"next":"other""#), None);
        assert_eq!(extract_json_object("no json here"), None);
    }

    #[test]
    fn decode_routing_plain_and_fenced() {
        let plain = decode_routing(r#"{"next":"domain-lookup","reason":"registry"}"#).unwrap();
        assert_eq!(plain.next, Next::Specialist("domain-lookup".into()));
        assert_eq!(plain.reason, "registry");

        let fenced = decode_routing("```json\n{\"next\":\"END\",\"reason\":\"done\"}\n```").unwrap();
        assert_eq!(fenced.next, Next::End);
    }

    #[test]
    fn decode_routing_end_aliases() {
        assert_eq!(decode_routing(r#"{"next":"__end__"}"#).unwrap().next, Next::End);
        assert_eq!(decode_routing(r#"{"next":"end"}"#).unwrap().next, Next::End);
    }

    #[test]
    fn decode_routing_trailing_prose() {
        let decision =
            decode_routing(r#"{"next":"other","reason":"x"} Hope that helps."#).unwrap();
        assert_eq!(decision.next, Next::Specialist("other".into()));
        assert_eq!(decision.reason, "x");

        let leading = decode_routing(r#"Routing now: {"next":"END"} done."#).unwrap();
        assert_eq!(leading.next, Next::End);
    }

    #[test]
    fn decode_routing_missing_reason_defaults_empty() {
        let decision = decode_routing(r#"{"next":"other"}"#).unwrap();
        assert_eq!(decision.reason, "");
    }

    #[test]
    fn decode_routing_errors() {
        for raw in [
            "I think the domain expert should handle this.",
            r#"{"reason":"no next field"}"#,
            r#"{"next": 42}"#,
            "[1, 2, 3]",
            "",
        ] {
            assert!(
                matches!(decode_routing(raw), Err(SwitchyardError::Decode(_))),
                "expected decode error for {raw:?}"
            );
        }
    }

    #[test]
    fn decode_validation_outcomes() {
        let finish = decode_validation(r#"{"outcome":"FINISH","reason":"done"}"#).unwrap();
        assert_eq!(finish.outcome, Outcome::Finish);

        let cont = decode_validation(r#"{"outcome":"continue","reason":"metrics missing"}"#).unwrap();
        assert_eq!(cont.outcome, Outcome::Continue);

        let end = decode_validation(r#"{"outcome":"__end__","reason":"answered"}"#).unwrap();
        assert_eq!(end.outcome, Outcome::Finish);
        let end_upper = decode_validation(r#"{"outcome":"END"}"#).unwrap();
        assert_eq!(end_upper.outcome, Outcome::Finish);

        let odd = decode_validation(r#"{"outcome":"MAYBE","reason":"?"}"#).unwrap();
        assert_eq!(odd.outcome, Outcome::Unrecognized("MAYBE".into()));

        assert!(decode_validation(r#"{"reason":"no outcome"}"#).is_err());
    }

    #[test]
    fn routing_decision_round_trip() {
        for decision in [
            RoutingDecision {
                next: Next::Specialist("metrics-query".into()),
                reason: "qps still missing".into(),
            },
            RoutingDecision {
                next: Next::End,
                reason: "all sub-tasks answered".into(),
            },
        ] {
            let json = serde_json::to_string(&decision).unwrap();
            assert_eq!(decode_routing(&json).unwrap(), decision);
        }
    }

    #[test]
    fn validation_decision_round_trip() {
        for outcome in [Outcome::Continue, Outcome::Finish] {
            let decision = ValidationDecision {
                outcome,
                reason: "domain done, metrics done".into(),
            };
            let json = serde_json::to_string(&decision).unwrap();
            assert_eq!(decode_validation(&json).unwrap(), decision);
        }
    }

    #[test]
    fn resolve_known_and_end() {
        let registry = registry();
        let state = TaskState::new("t", "x");

        let known = decode_routing(r#"{"next":"metrics-query"}"#).unwrap();
        assert_eq!(
            resolve_route(&known, &state, &registry, "other"),
            RouteResolution::Dispatch("metrics-query".into())
        );

        let end = decode_routing(r#"{"next":"END"}"#).unwrap();
        assert_eq!(resolve_route(&end, &state, &registry, "other"), RouteResolution::End);
    }

    #[test]
    fn resolve_unknown_uses_default_before_first_dispatch() {
        let registry = registry();
        let state = TaskState::new("t", "x");
        let bogus = decode_routing(r#"{"next":"bogus-id"}"#).unwrap();

        assert_eq!(
            resolve_route(&bogus, &state, &registry, "other"),
            RouteResolution::Fallback {
                rejected: "bogus-id".into(),
                applied: "other".into()
            }
        );
    }

    #[test]
    fn resolve_unknown_prefers_current_specialist() {
        let registry = registry();
        let mut state = TaskState::new("t", "x");
        state.set_current_specialist("domain-lookup");
        let bogus = decode_routing(r#"{"next":"Domain_Expert"}"#).unwrap();

        assert_eq!(
            resolve_route(&bogus, &state, &registry, "other"),
            RouteResolution::Fallback {
                rejected: "Domain_Expert".into(),
                applied: "domain-lookup".into()
            }
        );
    }

    #[test]
    fn resolve_outcome_policy() {
        let odd = Outcome::Unrecognized("MAYBE".into());
        assert_eq!(resolve_outcome(&odd, false), Outcome::Continue);
        assert_eq!(resolve_outcome(&odd, true), Outcome::Finish);
        assert_eq!(resolve_outcome(&Outcome::Continue, true), Outcome::Continue);
        assert_eq!(resolve_outcome(&Outcome::Finish, false), Outcome::Finish);
    }
}
