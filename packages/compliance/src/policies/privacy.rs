//! Privacy and communications policies: PII redaction, inclusive language.

use regex::Regex;

use crate::policy::{
    str_field, str_field_any, Payload, Policy, PolicyCategory, PolicyContext, PolicyMeta,
    PolicyResult, PolicySeverity,
};

const INTERNAL_DOMAIN: &str = "@company.com";

/// Redacts PII from messages leaving the company.
///
/// SSNs, phone numbers, and email addresses in the body are replaced with
/// `[REDACTED]` when the recipient is external; the rewritten payload is
/// attached to a Modify verdict.
pub struct PiiRedactionPolicy {
    meta: PolicyMeta,
    patterns: Vec<Regex>,
}

impl PiiRedactionPolicy {
    pub fn new() -> Self {
        // SSN before phone: both match 9-11 digit groups and the SSN
        // grouping must win.
        let patterns = [
            r"\b\d{3}[- ]?\d{2}[- ]?\d{4}\b",
            r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b",
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect();

        Self {
            meta: PolicyMeta::new(
                "PRIV-001",
                "PII Protection Policy",
                PolicyCategory::PiiProtection,
                PolicySeverity::High,
            ),
            patterns,
        }
    }

    fn redact(&self, text: &str) -> (String, bool) {
        let mut redacted = text.to_string();
        let mut found = false;
        for pattern in &self.patterns {
            if pattern.is_match(&redacted) {
                redacted = pattern.replace_all(&redacted, "[REDACTED]").into_owned();
                found = true;
            }
        }
        (redacted, found)
    }
}

impl Default for PiiRedactionPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for PiiRedactionPolicy {
    fn meta(&self) -> &PolicyMeta {
        &self.meta
    }

    fn evaluate(&self, action: &str, payload: &Payload, _context: &PolicyContext) -> PolicyResult {
        let action_lower = action.to_lowercase();
        if !["send_email", "send_message", "send_notification"]
            .iter()
            .any(|a| action_lower.contains(a))
        {
            return self.meta.allow("Not a communication action");
        }

        let Some(recipient) = str_field_any(payload, &["to", "recipient"]) else {
            return self.meta.allow("No recipient specified");
        };
        if recipient.ends_with(INTERNAL_DOMAIN) {
            return self.meta.allow("Internal recipient");
        }

        let body_key = ["body", "message", "content"]
            .iter()
            .find(|key| str_field(payload, key).is_some());
        let Some(body_key) = body_key else {
            return self.meta.allow("No message body");
        };
        let body = str_field(payload, body_key).unwrap_or("");

        let (redacted, found) = self.redact(body);
        if !found {
            return self.meta.allow("No PII detected");
        }

        let mut modified = payload.clone();
        modified.insert(
            body_key.to_string(),
            serde_json::Value::String(redacted),
        );

        self.meta.modify(
            "PII redacted for external recipient",
            modified,
            Some("Review the redacted message before resending sensitive data".to_string()),
        )
    }
}

/// Blocks non-inclusive terminology in outbound communications.
pub struct InclusiveLanguagePolicy {
    meta: PolicyMeta,
    blocked_terms: Vec<&'static str>,
}

impl InclusiveLanguagePolicy {
    pub fn new() -> Self {
        Self {
            meta: PolicyMeta::new(
                "COMM-001",
                "Inclusive Language Policy",
                PolicyCategory::Communications,
                PolicySeverity::Low,
            ),
            blocked_terms: vec!["rockstar", "ninja", "guru", "manpower"],
        }
    }
}

impl Default for InclusiveLanguagePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for InclusiveLanguagePolicy {
    fn meta(&self) -> &PolicyMeta {
        &self.meta
    }

    fn evaluate(&self, action: &str, payload: &Payload, _context: &PolicyContext) -> PolicyResult {
        let action_lower = action.to_lowercase();
        if !action_lower.contains("send") && !action_lower.contains("post") {
            return self.meta.allow("Not a communication action");
        }

        let body = str_field_any(payload, &["body", "message", "content"])
            .unwrap_or("")
            .to_lowercase();

        for term in &self.blocked_terms {
            if body.contains(term) {
                return self.meta.deny(
                    format!("Non-inclusive term detected: '{term}'"),
                    Some("Rephrase using inclusive language".to_string()),
                );
            }
        }

        self.meta.allow("Language check passed")
    }
}
