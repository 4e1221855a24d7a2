//! Driver rows and row reassembly.
//!
//! A [`Row`] is the flat alias-to-value mapping a driver hands back. This
//! module turns rows into nested [`Record`] graphs under the direction of a
//! [`SelectionDescriptor`]: JSON-decoding embedded relation columns for the
//! single-query strategy, and grouping/de-duplicating helpers for the
//! round-trip strategy. Reassembly is pure; running it twice over the same
//! rows produces structurally identical results.

use compact_str::{CompactString, format_compact};
use hashbrown::HashMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{Error, Result};
use crate::query::descriptor::{Cardinality, RelationFetch, SelectionDescriptor};
use crate::value::{DriverValue, Value};

/// A flat result row: output alias to raw driver value, in select order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(CompactString, DriverValue)>,
}

impl Row {
    pub fn new(columns: impl IntoIterator<Item = (impl AsRef<str>, DriverValue)>) -> Self {
        Row {
            columns: columns
                .into_iter()
                .map(|(name, value)| (CompactString::new(name.as_ref()), value))
                .collect(),
        }
    }

    pub fn get(&self, alias: &str) -> Option<&DriverValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == alias)
            .map(|(_, value)| value)
    }

    pub fn first(&self) -> Option<&DriverValue> {
        self.columns.first().map(|(_, value)| value)
    }
}

/// One field of a reassembled record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(Value),
    /// To-one relation; `None` is the explicit absent value for an
    /// outer-joined branch with no match.
    One(Option<Box<Record>>),
    /// To-many relation; empty when nothing matched, never absent.
    Many(Vec<Record>),
}

/// A reassembled nested result: ordered field map.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(CompactString, FieldValue)>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Scalar accessor; `None` for relation fields or missing names.
    pub fn scalar(&self, field: &str) -> Option<&Value> {
        match self.get(field) {
            Some(FieldValue::Scalar(v)) => Some(v),
            _ => None,
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub(crate) fn insert(&mut self, field: impl AsRef<str>, value: FieldValue) {
        self.fields
            .push((CompactString::new(field.as_ref()), value));
    }

    pub(crate) fn remove(&mut self, field: &str) -> Option<FieldValue> {
        let index = self.fields.iter().position(|(name, _)| name == field)?;
        Some(self.fields.remove(index).1)
    }

    /// The record as a JSON value, relations nested.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name.as_str(), value)?;
        }
        map.end()
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldValue::Scalar(v) => v.serialize(serializer),
            FieldValue::One(None) => serializer.serialize_none(),
            FieldValue::One(Some(record)) => record.serialize(serializer),
            FieldValue::Many(records) => records.serialize(serializer),
        }
    }
}

/// Decodes one driver row's scalar columns per the descriptor. Relation
/// fields are not touched; the caller attaches them afterwards.
pub(crate) fn decode_row(descriptor: &SelectionDescriptor, row: &Row) -> Result<Record> {
    let mut record = Record::default();
    for column in &descriptor.columns {
        let raw = row.get(&column.alias).ok_or_else(|| {
            Error::mapping(format!(
                "row is missing output column \"{}\" for table \"{}\"",
                column.alias, descriptor.table
            ))
        })?;
        let value = column.ty.decode(raw.clone(), &column.field)?;
        record.insert(&column.field, FieldValue::Scalar(value));
    }
    Ok(record)
}

/// Reassembles rows from the single-query (lateral) strategy: every
/// relation arrives as a pre-aggregated JSON column or key.
pub(crate) fn reassemble_embedded(
    descriptor: &SelectionDescriptor,
    rows: &[Row],
) -> Result<Vec<Record>> {
    rows.iter()
        .map(|row| {
            let mut record = decode_row(descriptor, row)?;
            for relation in &descriptor.relations {
                let RelationFetch::Embedded { alias } = &relation.fetch else {
                    return Err(Error::mapping(
                        "embedded reassembly given a batched descriptor".to_string(),
                    ));
                };
                let json = match row.get(alias) {
                    None | Some(DriverValue::Null) => serde_json::Value::Null,
                    Some(DriverValue::Text(text)) => serde_json::from_str(text).map_err(|e| {
                        Error::mapping(format!("relation \"{}\": invalid json: {e}", relation.field))
                    })?,
                    Some(other) => {
                        return Err(Error::mapping(format!(
                            "relation \"{}\": expected json text, got {other:?}",
                            relation.field
                        )));
                    }
                };
                let value = relation_from_json(relation.cardinality, &relation.descriptor, &json)?;
                record.insert(&relation.field, value);
            }
            strip_hidden(descriptor, &mut record);
            Ok(record)
        })
        .collect()
}

fn relation_from_json(
    cardinality: Cardinality,
    descriptor: &SelectionDescriptor,
    json: &serde_json::Value,
) -> Result<FieldValue> {
    match cardinality {
        Cardinality::Many => match json {
            serde_json::Value::Null => Ok(FieldValue::Many(Vec::new())),
            serde_json::Value::Array(items) => Ok(FieldValue::Many(
                items
                    .iter()
                    .map(|item| record_from_json(descriptor, item))
                    .collect::<Result<_>>()?,
            )),
            other => Err(Error::mapping(format!(
                "table \"{}\": expected json array, got {other}",
                descriptor.table
            ))),
        },
        Cardinality::One => match json {
            serde_json::Value::Null => Ok(FieldValue::One(None)),
            object => Ok(FieldValue::One(Some(Box::new(record_from_json(
                descriptor, object,
            )?)))),
        },
    }
}

fn record_from_json(
    descriptor: &SelectionDescriptor,
    json: &serde_json::Value,
) -> Result<Record> {
    let object = json.as_object().ok_or_else(|| {
        Error::mapping(format!(
            "table \"{}\": expected json object, got {json}",
            descriptor.table
        ))
    })?;
    let mut record = Record::default();
    for column in &descriptor.columns {
        if column.hidden {
            continue;
        }
        let raw = object.get(column.field.as_str()).unwrap_or(&serde_json::Value::Null);
        let value = column.ty.decode_json(raw, &column.field)?;
        record.insert(&column.field, FieldValue::Scalar(value));
    }
    for relation in &descriptor.relations {
        let nested = object
            .get(relation.field.as_str())
            .unwrap_or(&serde_json::Value::Null);
        let value = relation_from_json(relation.cardinality, &relation.descriptor, nested)?;
        record.insert(&relation.field, value);
    }
    Ok(record)
}

/// A grouping key over one or more record fields. `None` when any key field
/// is null or missing; such parents match no children.
pub(crate) fn group_key(record: &Record, fields: &[CompactString]) -> Option<CompactString> {
    let mut token = CompactString::default();
    for field in fields {
        match record.scalar(field) {
            None | Some(Value::Null) => return None,
            Some(value) => token = format_compact!("{token}|{}", value.key_token()),
        }
    }
    Some(token)
}

/// Groups child records by their key fields, preserving arrival order
/// within each group.
pub(crate) fn group_by_key(
    children: Vec<Record>,
    key_fields: &[CompactString],
) -> HashMap<CompactString, Vec<Record>> {
    let mut groups: HashMap<CompactString, Vec<Record>> = HashMap::new();
    for child in children {
        if let Some(key) = group_key(&child, key_fields) {
            groups.entry(key).or_default().push(child);
        }
    }
    groups
}

/// Collapses repeated records keyed by primary-key values, keeping the
/// first occurrence. Used where a driving join repeats a record across
/// returned rows.
pub(crate) fn dedup_by_primary_key(records: &mut Vec<Record>, primary_key: &[CompactString]) {
    if primary_key.is_empty() {
        return;
    }
    let mut seen: HashMap<CompactString, ()> = HashMap::new();
    records.retain(|record| {
        let mut token = CompactString::default();
        for field in primary_key {
            match record.scalar(field) {
                Some(value) => token = format_compact!("{token}|{}", value.key_token()),
                // No usable key; keep the record rather than guess.
                None => return true,
            }
        }
        seen.insert(token, ()).is_none()
    });
}

/// Removes key columns that were selected only for stitching.
pub(crate) fn strip_hidden(descriptor: &SelectionDescriptor, record: &mut Record) {
    for column in &descriptor.columns {
        if column.hidden {
            record.remove(&column.field);
        }
    }
}
