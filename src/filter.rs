//! Filter Compiler - turns caller-supplied key/value pairs into store predicates
//!
//! Two strategies share one compiler:
//! - schema-validated: a key is admitted when the inferred schema has seen the
//!   field; numeric-looking values become numeric equality, everything else a
//!   case-insensitive whole-value match.
//! - enum-validated: a fixed catalog of field rules; enum fields only accept a
//!   known member and are rewritten to its canonical spelling.
//!
//! Unknown keys and unacceptable values are dropped, never reported.

use crate::record::{integral_digits, parse_number, wide_integer, FieldValue, Record, EAN_CODE};
use crate::schema::InferredSchema;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

/// Raw request parameters, already percent-decoded.
pub type QueryParams = BTreeMap<String, String>;

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").expect("valid whitespace pattern");
}

/// Trim and collapse internal whitespace runs to a single space.
pub fn normalize_whitespace(raw: &str) -> String {
    WHITESPACE_RUN.replace_all(raw.trim(), " ").into_owned()
}

/// Single-field match condition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum Predicate {
    /// Numeric equality. Text cells that parse fully as the same number match
    /// too, since CSV ingestion stores cells verbatim.
    Number(f64),
    /// Integer equality on canonical digits, for literals `f64` cannot hold
    /// exactly. Long numeric codes never collapse onto a neighbour.
    Integer(String),
    /// Whole-value equality ignoring case. Never a substring or pattern match.
    TextIgnoreCase(String),
    /// Byte-exact text equality.
    Exact(String),
}

impl Predicate {
    pub fn matches(&self, value: &FieldValue) -> bool {
        match (self, value) {
            (Predicate::Number(want), FieldValue::Number(have)) => want == have,
            (Predicate::Number(want), FieldValue::Text(have)) => match wide_integer(have) {
                Some(digits) => integral_digits(*want).as_deref() == Some(digits.as_str()),
                None => parse_number(have).map(|n| n == *want).unwrap_or(false),
            },
            (Predicate::Integer(want), FieldValue::Number(have)) => {
                integral_digits(*have).as_deref() == Some(want.as_str())
            }
            (Predicate::Integer(want), FieldValue::Text(have)) => {
                wide_integer(have).as_deref() == Some(want.as_str())
            }
            (Predicate::TextIgnoreCase(want), FieldValue::Text(have)) => {
                want.to_lowercase() == have.to_lowercase()
            }
            (Predicate::Exact(want), FieldValue::Text(have)) => want == have,
            _ => false,
        }
    }
}

/// Conjunction of per-field predicates
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QueryFilter {
    predicates: BTreeMap<String, Predicate>,
}

impl QueryFilter {
    /// Matches every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// Point lookup on the identifier field.
    pub fn identifier(identifier: &str) -> Self {
        let mut filter = Self::default();
        filter.insert(EAN_CODE, Predicate::Exact(identifier.to_string()));
        filter
    }

    pub fn insert(&mut self, field: impl Into<String>, predicate: Predicate) {
        self.predicates.insert(field.into(), predicate);
    }

    pub fn get(&self, field: &str) -> Option<&Predicate> {
        self.predicates.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.predicates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// A record missing a filtered field never matches.
    pub fn matches(&self, record: &Record) -> bool {
        self.predicates.iter().all(|(field, predicate)| {
            record
                .get(field)
                .map(|value| predicate.matches(value))
                .unwrap_or(false)
        })
    }
}

/// How a fixed-catalog field accepts filter values
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRule {
    Text,
    Numeric,
    Enum(Vec<String>),
}

/// Declared field rules for the enum-validated strategy
#[derive(Debug, Clone, Default)]
pub struct FixedSchema {
    rules: BTreeMap<String, FieldRule>,
}

impl FixedSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, field: impl Into<String>, rule: FieldRule) -> Self {
        self.rules.insert(field.into(), rule);
        self
    }

    pub fn rule(&self, field: &str) -> Option<&FieldRule> {
        self.rules.get(field)
    }

    /// The apparel product catalog the first version of the service shipped with.
    pub fn product_catalog() -> Self {
        let members = |values: &[&str]| values.iter().map(|v| v.to_string()).collect();
        Self::new()
            .with_rule("style_code", FieldRule::Text)
            .with_rule("option_code", FieldRule::Text)
            .with_rule("MRP", FieldRule::Numeric)
            .with_rule("Brick", FieldRule::Enum(members(&["Shirt", "T-shirt", "Jeans", "Trouser"])))
            .with_rule(
                "Sleeve",
                FieldRule::Enum(members(&["Full Sleeve", "Half Sleeve", "Sleeveless"])),
            )
    }
}

/// Selects which validation the compiler applies
#[derive(Debug, Clone, Copy)]
pub enum FilterStrategy<'a> {
    SchemaValidated(&'a InferredSchema),
    EnumValidated(&'a FixedSchema),
}

impl FilterStrategy<'_> {
    pub fn compile(&self, params: &QueryParams) -> QueryFilter {
        let mut filter = QueryFilter::default();
        for (key, value) in params {
            let predicate = match self {
                FilterStrategy::SchemaValidated(schema) => schema_predicate(schema, key, value),
                FilterStrategy::EnumValidated(fixed) => fixed_predicate(fixed, key, value),
            };
            if let Some(predicate) = predicate {
                filter.insert(key.clone(), predicate);
            }
        }
        filter
    }
}

fn schema_predicate(schema: &InferredSchema, key: &str, value: &str) -> Option<Predicate> {
    if !schema.contains(key) {
        return None;
    }
    Some(numeric_predicate(value).unwrap_or_else(|| Predicate::TextIgnoreCase(value.to_string())))
}

fn numeric_predicate(value: &str) -> Option<Predicate> {
    match wide_integer(value) {
        Some(digits) => Some(Predicate::Integer(digits)),
        None => parse_number(value).map(Predicate::Number),
    }
}

fn fixed_predicate(fixed: &FixedSchema, key: &str, value: &str) -> Option<Predicate> {
    match fixed.rule(key)? {
        FieldRule::Text => Some(Predicate::Exact(value.to_string())),
        FieldRule::Numeric => numeric_predicate(value),
        FieldRule::Enum(members) => {
            let wanted = normalize_whitespace(value).to_lowercase();
            members
                .iter()
                .find(|member| member.to_lowercase() == wanted)
                .map(|member| Predicate::Exact(member.clone()))
        }
    }
}
