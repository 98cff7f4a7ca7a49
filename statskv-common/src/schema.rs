//! Shape checks for untrusted JSON
//!
//! Both the inbound update body and the stored stats record arrive as
//! arbitrary [`serde_json::Value`]s. The checks here walk the value once,
//! collect every violation with the path of the offending field, and only
//! hand back a typed value when nothing was wrong.
//!
//! Issues render as a nested error tree (see [`ValidationIssues::format`]):
//!
//! ```json
//! {"_errors": [], "totalGuilds": {"_errors": ["Required"]}}
//! ```

use crate::record::{InboundUpdate, LastUpdated, StatsRecord};
use serde_json::{Map, Value};
use std::fmt;

/// Key holding the messages that belong to a node itself
pub const ERRORS_KEY: &str = "_errors";

/// A single schema violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Field names from the root down to the offending field; empty for the root
    pub path: Vec<String>,
    pub message: String,
}

/// Every violation found while checking one value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationIssues {
    issues: Vec<ValidationIssue>,
}

impl ValidationIssues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: &[&str], message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            path: path.iter().map(|p| p.to_string()).collect(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter()
    }

    /// Messages recorded for exactly `path`
    pub fn messages_at(&self, path: &[&str]) -> Vec<&str> {
        self.issues
            .iter()
            .filter(|i| i.path.iter().map(String::as_str).eq(path.iter().copied()))
            .map(|i| i.message.as_str())
            .collect()
    }

    /// Render the issues as a tree keyed by field name.
    ///
    /// Every node on the way to a failing field carries an `_errors` array;
    /// messages land in the array of the node they were reported on.
    pub fn format(&self) -> Map<String, Value> {
        let mut root = empty_node();
        for issue in &self.issues {
            insert_message(&mut root, &issue.path, &issue.message);
        }
        root
    }

    fn into_result<T>(self, value: Option<T>) -> Result<T, ValidationIssues> {
        match value {
            Some(value) if self.is_empty() => Ok(value),
            _ => Err(self),
        }
    }
}

impl fmt::Display for ValidationIssues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for issue in &self.issues {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            if issue.path.is_empty() {
                write!(f, "{}", issue.message)?;
            } else {
                write!(f, "{}: {}", issue.path.join("."), issue.message)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationIssues {}

fn insert_message(node: &mut Map<String, Value>, path: &[String], message: &str) {
    match path.split_first() {
        None => {
            if let Some(Value::Array(errors)) = node.get_mut(ERRORS_KEY) {
                errors.push(Value::String(message.to_string()));
            }
        }
        Some((head, rest)) => {
            let child = node
                .entry(head.clone())
                .or_insert_with(|| Value::Object(empty_node()));
            if let Value::Object(child) = child {
                insert_message(child, rest, message);
            }
        }
    }
}

fn child<'a>(path: &[&'a str], key: &'a str) -> Vec<&'a str> {
    let mut field = path.to_vec();
    field.push(key);
    field
}

fn empty_node() -> Map<String, Value> {
    let mut node = Map::new();
    node.insert(ERRORS_KEY.to_string(), Value::Array(Vec::new()));
    node
}

/// JSON type name as it appears in issue messages
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expected(what: &str, got: &Value) -> String {
    format!("Expected {}, received {}", what, type_name(got))
}

fn object<'a>(
    value: &'a Value,
    path: &[&str],
    issues: &mut ValidationIssues,
) -> Option<&'a Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        other => {
            issues.push(path, expected("object", other));
            None
        }
    }
}

fn integer(
    map: &Map<String, Value>,
    path: &[&str],
    key: &str,
    issues: &mut ValidationIssues,
) -> Option<i64> {
    let field = child(path, key);
    match map.get(key) {
        None => {
            issues.push(&field, "Required");
            None
        }
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            // `3.0` is an integer as far as the wire format is concerned.
            // Counters are i64, so integral values outside its range are refused.
            let f = n.as_f64().unwrap_or(f64::NAN);
            if f.fract() != 0.0 {
                issues.push(&field, "Expected integer, received float");
                None
            } else if f < i64::MIN as f64 || f >= i64::MAX as f64 {
                issues.push(&field, "Integer out of range");
                None
            } else {
                Some(f as i64)
            }
        }
        Some(other) => {
            issues.push(&field, expected("number", other));
            None
        }
    }
}

fn string(
    map: &Map<String, Value>,
    path: &[&str],
    key: &str,
    issues: &mut ValidationIssues,
) -> Option<String> {
    let field = child(path, key);
    match map.get(key) {
        None => {
            issues.push(&field, "Required");
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            issues.push(&field, expected("string", other));
            None
        }
    }
}

/// Absent is fine, `null` is not.
fn optional_bool(
    map: &Map<String, Value>,
    path: &[&str],
    key: &str,
    issues: &mut ValidationIssues,
) -> Option<bool> {
    match map.get(key) {
        None => None,
        Some(Value::Bool(b)) => Some(*b),
        Some(other) => {
            issues.push(&child(path, key), expected("boolean", other));
            None
        }
    }
}

/// Check an inbound update body.
pub fn inbound_update(value: &Value) -> Result<InboundUpdate, ValidationIssues> {
    let mut issues = ValidationIssues::new();
    let Some(map) = object(value, &[], &mut issues) else {
        return Err(issues);
    };

    let total_guilds = integer(map, &[], "totalGuilds", &mut issues);
    let total_channels = integer(map, &[], "totalChannels", &mut issues);
    let total_members = integer(map, &[], "totalMembers", &mut issues);
    let increment_total_stats_sent =
        optional_bool(map, &[], "incrementTotalStatsSent", &mut issues);

    let update = match (total_guilds, total_channels, total_members) {
        (Some(total_guilds), Some(total_channels), Some(total_members)) => Some(InboundUpdate {
            total_guilds,
            total_channels,
            total_members,
            increment_total_stats_sent,
        }),
        _ => None,
    };
    issues.into_result(update)
}

/// Check a stored stats record.
///
/// Top-level fields the schema does not name are kept in
/// [`StatsRecord::extra`] so that writing the record back preserves them.
pub fn stats_record(value: &Value) -> Result<StatsRecord, ValidationIssues> {
    let mut issues = ValidationIssues::new();
    let Some(map) = object(value, &[], &mut issues) else {
        return Err(issues);
    };

    let total_guilds = integer(map, &[], "totalGuilds", &mut issues);
    let total_channels = integer(map, &[], "totalChannels", &mut issues);
    let total_members = integer(map, &[], "totalMembers", &mut issues);
    let total_stats_sent = integer(map, &[], "totalStatsSent", &mut issues);
    let last_updated = last_updated(map, &mut issues);

    let extra: Map<String, Value> = map
        .iter()
        .filter(|(k, _)| !StatsRecord::FIELDS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let record = match (
        total_guilds,
        total_channels,
        total_members,
        total_stats_sent,
        last_updated,
    ) {
        (
            Some(total_guilds),
            Some(total_channels),
            Some(total_members),
            Some(total_stats_sent),
            Some(last_updated),
        ) => Some(StatsRecord {
            total_guilds,
            total_channels,
            total_members,
            total_stats_sent,
            last_updated,
            extra,
        }),
        _ => None,
    };
    issues.into_result(record)
}

fn last_updated(map: &Map<String, Value>, issues: &mut ValidationIssues) -> Option<LastUpdated> {
    const PATH: &[&str] = &["lastUpdated"];

    let Some(value) = map.get("lastUpdated") else {
        issues.push(PATH, "Required");
        return None;
    };
    let inner = object(value, PATH, issues)?;

    let date = string(inner, PATH, "date", issues);
    let timestamp_milliseconds = integer(inner, PATH, "timestampMilliseconds", issues);
    let timestamp_seconds = integer(inner, PATH, "timestampSeconds", issues);

    Some(LastUpdated {
        date: date?,
        timestamp_milliseconds: timestamp_milliseconds?,
        timestamp_seconds: timestamp_seconds?,
    })
}
