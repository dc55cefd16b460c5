//! Shared value types for the stack domain.
//!
//! [`Value`] is how every resource property that may depend on deployment
//! context (region, account) or on another resource is expressed. Keeping
//! references explicit in the value tree is what lets [`crate::graph`] build
//! the dependency graph without relying on declaration order.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::LogicalId;

// ---------------------------------------------------------------------------
// Property values
// ---------------------------------------------------------------------------

/// A value resolved by the platform at deployment time rather than at
/// synthesis time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PseudoParameter {
    /// The region the stack is deployed into.
    Region,
    /// The account the stack is deployed into.
    AccountId,
    /// The partition (`aws`, `aws-cn`, ...) of the region.
    Partition,
}

impl PseudoParameter {
    /// Returns the platform's name for this parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Region => "AWS::Region",
            Self::AccountId => "AWS::AccountId",
            Self::Partition => "AWS::Partition",
        }
    }
}

// ---------------------------------------------------------------------------

/// A resource property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// A fixed string known at synthesis time.
    Literal(String),
    /// A deployment-context value (region, account, partition).
    Pseudo(PseudoParameter),
    /// The primary identifier of another resource in the stack.
    ///
    /// For named resources this is the physical name; for roles and buckets
    /// it is their name as well.
    Ref(LogicalId),
    /// A named attribute of another resource (e.g. its `Arn`).
    Attribute {
        /// Resource whose attribute is read.
        resource: LogicalId,
        /// Attribute name.
        name: String,
    },
    /// Concatenation of values with no separator.
    Join(Vec<Value>),
}

impl Value {
    /// Creates a [`Value::Literal`].
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    /// Creates a [`Value::Attribute`] reading `Arn` from `resource`.
    pub fn arn_of(resource: &LogicalId) -> Self {
        Self::Attribute {
            resource: resource.clone(),
            name: "Arn".to_string(),
        }
    }

    /// Concatenates `parts`, merging adjacent literals.
    ///
    /// A join whose parts are all literal collapses to a single
    /// [`Value::Literal`]; a join of one part collapses to that part.
    pub fn join(parts: impl IntoIterator<Item = Value>) -> Self {
        let mut merged: Vec<Value> = Vec::new();
        for part in parts {
            let flattened = match part {
                Value::Join(inner) => inner,
                other => vec![other],
            };
            for piece in flattened {
                match piece {
                    Value::Literal(next) if next.is_empty() => {}
                    Value::Literal(next) => {
                        if let Some(Value::Literal(prev)) = merged.last_mut() {
                            prev.push_str(&next);
                        } else {
                            merged.push(Value::Literal(next));
                        }
                    }
                    other => merged.push(other),
                }
            }
        }

        match merged.len() {
            0 => Value::Literal(String::new()),
            1 => merged.remove(0),
            _ => Value::Join(merged),
        }
    }

    /// Returns the string if this value is fully known at synthesis time.
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(s) => Some(s),
            _ => None,
        }
    }

    /// Returns `true` if this value is exactly the literal `"*"`.
    pub fn is_wildcard(&self) -> bool {
        self.as_literal() == Some("*")
    }

    /// Returns every resource this value refers to.
    pub fn references(&self) -> BTreeSet<LogicalId> {
        let mut out = BTreeSet::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references(&self, out: &mut BTreeSet<LogicalId>) {
        match self {
            Self::Literal(_) | Self::Pseudo(_) => {}
            Self::Ref(id) => {
                out.insert(id.clone());
            }
            Self::Attribute { resource, .. } => {
                out.insert(resource.clone());
            }
            Self::Join(parts) => parts.iter().for_each(|p| p.collect_references(out)),
        }
    }
}

/// Renders unresolved parts in `${...}` placeholder form, e.g.
/// `arn:aws:lambda:${AWS::Region}:${AWS::AccountId}:function:x`.
impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "{s}"),
            Self::Pseudo(p) => write!(f, "${{{}}}", p.as_str()),
            Self::Ref(id) => write!(f, "${{{id}}}"),
            Self::Attribute { resource, name } => write!(f, "${{{resource}.{name}}}"),
            Self::Join(parts) => parts.iter().try_for_each(|p| write!(f, "{p}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// What happens to a resource when the stack is torn down or the resource is
/// replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    /// The resource is deleted with the stack.
    Destroy,
    /// The resource is orphaned and survives teardown.
    Retain,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the whole number of days elapsed from `self` to `later`.
    ///
    /// Negative when `later` is before `self`.
    pub fn days_until(self, later: Timestamp) -> i64 {
        (later.0 - self.0).num_days()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> LogicalId {
        LogicalId::new(s).unwrap()
    }

    #[test]
    fn join_of_literals_collapses() {
        let v = Value::join([Value::literal("arn:aws:lambda:"), Value::literal("eu-west-1")]);
        assert_eq!(v, Value::literal("arn:aws:lambda:eu-west-1"));
    }

    #[test]
    fn join_keeps_unresolved_parts() {
        let v = Value::join([
            Value::literal("arn:"),
            Value::Pseudo(PseudoParameter::Partition),
            Value::literal(":s3:::"),
            Value::Ref(id("Bucket")),
        ]);
        assert_eq!(v.to_string(), "arn:${AWS::Partition}:s3:::${Bucket}");
        assert_eq!(v.references().into_iter().collect::<Vec<_>>(), vec![id("Bucket")]);
    }

    #[test]
    fn nested_joins_are_flattened() {
        let inner = Value::join([Value::arn_of(&id("Bucket")), Value::literal("/")]);
        let outer = Value::join([inner, Value::literal("*")]);
        match outer {
            Value::Join(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[1], Value::literal("/*"));
            }
            other => panic!("expected join, got {other:?}"),
        }
    }

    #[test]
    fn wildcard_is_detected() {
        assert!(Value::literal("*").is_wildcard());
        assert!(!Value::literal("arn:aws:ecr:*").is_wildcard());
    }
}
