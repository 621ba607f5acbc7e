//! Cleans the serialized conversation before it is forwarded to an executor.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::notices::INJECTED;

static WARNING_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<<<WARNING>>>.*?<<</WARNING>>>").unwrap());

/// Conversation payload after cleaning, plus what was learned while cleaning it.
#[derive(Debug, Clone, PartialEq)]
pub struct RectifiedInput {
    /// JSON array of `{msg, isbot, ...}` records, re-serialized.
    pub payload: String,
    /// The latest user turn mentions the product keyword and no safety guard
    /// is configured; the reply should carry the advisory line.
    pub mentions_brand: bool,
}

/// Strip system-injected notices from every turn, drop warning tags from bot
/// turns and look for the brand keyword in the most recent user turn.
///
/// Fields other than `msg` and `isbot` are carried through untouched.
pub fn rectify_input(
    raw: &str,
    brand_keyword: &str,
    safety_guard_configured: bool,
) -> Result<RectifiedInput, serde_json::Error> {
    let mut records: Vec<Value> = serde_json::from_str(raw)?;

    for record in records.iter_mut() {
        let is_bot = is_truthy(record.get("isbot"));
        let Some(Value::String(msg)) = record.get_mut("msg") else {
            continue;
        };
        for notice in INJECTED {
            if msg.contains(notice) {
                *msg = msg.replace(notice, "").trim().to_string();
            }
        }
        if is_bot {
            *msg = WARNING_BLOCK.replace_all(msg.as_str(), "").into_owned();
        }
    }

    let keyword = brand_keyword.to_uppercase();
    let mentions_brand = !safety_guard_configured
        && !keyword.is_empty()
        && records
            .iter()
            .rev()
            .find(|r| !is_truthy(r.get("isbot")))
            .and_then(|r| r.get("msg").and_then(Value::as_str))
            .map(|msg| msg.to_uppercase().contains(&keyword))
            .unwrap_or(false);

    Ok(RectifiedInput {
        payload: serde_json::to_string(&records)?,
        mentions_brand,
    })
}

/// Loose boolean reading of the `isbot` flag (bool, 0/1, "0"/"1", null).
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty() && s != "0",
        _ => false,
    }
}
