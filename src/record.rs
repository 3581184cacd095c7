//! Record model - open field/value mappings with a scalar value type
//!
//! Records carry no fixed column set. Every value is one of three kinds
//! (text, number, absent) and callers branch on the kind explicitly.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Reserved uniqueness key present on every stored record.
pub const EAN_CODE: &str = "EAN_code";

/// Store-assigned scan sequence, rendered on output only.
pub const RECORD_ID: &str = "_id";

/// Bookkeeping fields owned by the store, never reported as schema.
pub const INTERNAL_FIELDS: &[&str] = &[RECORD_ID, "__v"];

/// One parsed CSV row: header name -> raw cell text.
pub type RawRow = BTreeMap<String, String>;

pub fn is_internal_field(name: &str) -> bool {
    INTERNAL_FIELDS.contains(&name)
}

/// Scalar value held by a record field
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Absent,
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    /// String form used as a value-count key. Absent values count as "null".
    pub fn stringify(&self) -> String {
        match self {
            FieldValue::Absent => "null".to_string(),
            other => other.to_string(),
        }
    }

    /// String form used as a group key; absent values belong to no group.
    pub fn group_key(&self) -> Option<String> {
        match self {
            FieldValue::Absent => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => match integral(*n) {
                Some(i) => write!(f, "{}", i),
                None => write!(f, "{}", n),
            },
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Absent => Ok(()),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldValue::Number(n) => match integral(*n) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Absent => serializer.serialize_unit(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

// 2^53, the largest range where f64 holds every integer exactly
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

fn integral(n: f64) -> Option<i64> {
    if n.fract() == 0.0 && n.abs() <= MAX_EXACT_INT {
        Some(n as i64)
    } else {
        None
    }
}

/// Canonical digits of an integer literal too wide for `f64` to hold exactly
/// (beyond +/-2^53). `None` for anything else, including in-range integers.
pub fn wide_integer(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits = digits.trim_start_matches('0');
    let exact = digits.len() < 16
        || digits
            .parse::<u64>()
            .map(|n| n <= MAX_EXACT_INT as u64)
            .unwrap_or(false);
    if exact {
        None
    } else {
        Some(format!("{}{}", sign, digits))
    }
}

/// Exact decimal digits of an integral `f64`.
pub fn integral_digits(n: f64) -> Option<String> {
    if n.is_finite() && n.fract() == 0.0 {
        Some(format!("{:.0}", n))
    } else {
        None
    }
}

/// Parse a caller-supplied string as a number, rejecting partial and
/// non-finite forms ("12abc", "NaN", "inf").
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(n),
        _ => None,
    }
}

/// One stored row. `seq` is the store's scan position and lives outside the
/// user fields, so a CSV column of the same name is never overwritten.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "BTreeMap<String, FieldValue>")]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
    seq: Option<u64>,
}

impl From<BTreeMap<String, FieldValue>> for Record {
    fn from(fields: BTreeMap<String, FieldValue>) -> Self {
        Self { fields, seq: None }
    }
}

/// Emits the user fields, plus `_id` from the scan sequence unless the
/// record carries its own `_id` column.
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let seq = self.seq.filter(|_| !self.fields.contains_key(RECORD_ID));
        let mut map = serializer.serialize_map(Some(self.fields.len() + seq.iter().count()))?;
        if let Some(seq) = seq {
            map.serialize_entry(RECORD_ID, &seq)?;
        }
        for (field, value) in &self.fields {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lift a raw CSV row into a record without touching the cell text.
    pub fn from_raw(row: RawRow) -> Self {
        row.into_iter()
            .map(|(k, v)| (k, FieldValue::Text(v)))
            .collect::<BTreeMap<_, _>>()
            .into()
    }

    pub fn seq(&self) -> Option<u64> {
        self.seq
    }

    pub fn set_seq(&mut self, seq: u64) {
        self.seq = Some(seq);
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.remove(field)
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn identifier(&self) -> Option<&str> {
        self.get(EAN_CODE).and_then(FieldValue::as_str)
    }

    pub fn set_identifier(&mut self, identifier: String) {
        self.fields.insert(EAN_CODE.to_string(), FieldValue::Text(identifier));
    }

    /// User fields only, without the scan sequence. This is the stored body.
    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    /// Fields visible to callers, store bookkeeping excluded.
    pub fn user_fields(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter().filter(|(k, _)| !is_internal_field(k))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
