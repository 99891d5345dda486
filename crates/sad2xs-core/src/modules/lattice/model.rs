use crate::domain::{SadError, SadResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Element-type keywords recognised in SAD lattice files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Drift,
    Bend,
    Quad,
    Oct,
    Mult,
    Sol,
    Cavi,
    Mark,
    Moni,
    Beambeam,
    Apert,
}

impl ElementKind {
    pub const ALL: [ElementKind; 11] = [
        Self::Drift,
        Self::Bend,
        Self::Quad,
        Self::Oct,
        Self::Mult,
        Self::Sol,
        Self::Cavi,
        Self::Mark,
        Self::Moni,
        Self::Beambeam,
        Self::Apert,
    ];

    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Drift => "drift",
            Self::Bend => "bend",
            Self::Quad => "quad",
            Self::Oct => "oct",
            Self::Mult => "mult",
            Self::Sol => "sol",
            Self::Cavi => "cavi",
            Self::Mark => "mark",
            Self::Moni => "moni",
            Self::Beambeam => "beambeam",
            Self::Apert => "apert",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.keyword() == keyword)
    }
}

impl Display for ElementKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).keyword())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Record(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Text(_) => "string",
            Self::Record(_) => "record",
        }
    }
}

/// Attributes of one named element.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementRecord {
    attributes: BTreeMap<String, AttributeValue>,
}

impl ElementRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: AttributeValue) {
        self.attributes.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Numeric attribute, `Ok(None)` when absent and an error when present
    /// with a non-numeric value.
    pub fn number(&self, name: &str, element: &str) -> SadResult<Option<f64>> {
        match self.attributes.get(name) {
            None => Ok(None),
            Some(AttributeValue::Number(value)) => Ok(Some(*value)),
            Some(other) => Err(SadError::input_validation(
                "INPUT.ELEMENT_ATTRIBUTE_TYPE",
                format!(
                    "element '{}': attribute '{}' must be a number, found {}",
                    element,
                    name,
                    other.type_name()
                ),
            )),
        }
    }

    pub fn required_number(&self, name: &str, element: &str) -> SadResult<f64> {
        self.number(name, element)?.ok_or_else(|| {
            SadError::input_validation(
                "INPUT.ELEMENT_ATTRIBUTE_MISSING",
                format!("element '{}': missing required attribute '{}'", element, name),
            )
        })
    }

    /// Field-level update: fields of `other` overwrite same-named fields,
    /// fields only present here are kept.
    pub fn merge(&mut self, other: ElementRecord) {
        self.attributes.extend(other.attributes);
    }
}

impl FromIterator<(String, AttributeValue)> for ElementRecord {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        Self {
            attributes: iter.into_iter().collect(),
        }
    }
}

/// Named elements of a single kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementTable {
    elements: BTreeMap<String, ElementRecord>,
}

impl ElementTable {
    /// Inserts `record` or merges it into an existing element of the same
    /// name. Returns `true` when a merge happened.
    pub fn merge_record(&mut self, name: impl Into<String>, record: ElementRecord) -> bool {
        let name = name.into();
        match self.elements.get_mut(&name) {
            Some(existing) => {
                existing.merge(record);
                true
            }
            None => {
                self.elements.insert(name, record);
                false
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ElementRecord> {
        self.elements.get(name)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ElementRecord)> {
        self.elements
            .iter()
            .map(|(name, record)| (name.as_str(), record))
    }
}

/// A sequence token split into its element name and reversal marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceEntry<'a> {
    pub name: &'a str,
    pub reversed: bool,
}

impl<'a> SequenceEntry<'a> {
    pub fn parse(token: &'a str) -> Self {
        match token.strip_prefix('-') {
            Some(name) => Self {
                name,
                reversed: true,
            },
            None => Self {
                name: token,
                reversed: false,
            },
        }
    }
}

/// Parsed lattice: one table per element kind plus the beamline sequence.
///
/// Serializes as `{"bend": {...}, "drift": {...}, ..., "line": [...]}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LatticeDocument {
    #[serde(flatten)]
    tables: BTreeMap<ElementKind, ElementTable>,
    #[serde(default)]
    line: Vec<String>,
}

impl LatticeDocument {
    pub fn table(&self, kind: ElementKind) -> Option<&ElementTable> {
        self.tables.get(&kind)
    }

    pub fn tables(&self) -> impl Iterator<Item = (ElementKind, &ElementTable)> {
        self.tables.iter().map(|(kind, table)| (*kind, table))
    }

    pub fn merge_element(
        &mut self,
        kind: ElementKind,
        name: impl Into<String>,
        record: ElementRecord,
    ) -> bool {
        self.tables
            .entry(kind)
            .or_default()
            .merge_record(name, record)
    }

    pub fn sequence(&self) -> &[String] {
        &self.line
    }

    /// Replaces the sequence and hands back the previous one, if any.
    pub fn replace_sequence(&mut self, tokens: Vec<String>) -> Option<Vec<String>> {
        let previous = std::mem::replace(&mut self.line, tokens);
        (!previous.is_empty()).then_some(previous)
    }

    pub fn element_count(&self) -> usize {
        self.tables.values().map(ElementTable::len).sum()
    }

    /// Every kind defining `name`, in kind order.
    pub fn kinds_defining(&self, name: &str) -> Vec<ElementKind> {
        self.tables
            .iter()
            .filter(|(_, table)| table.get(name).is_some())
            .map(|(kind, _)| *kind)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{AttributeValue, ElementKind, ElementRecord, LatticeDocument, SequenceEntry};

    fn record(fields: &[(&str, f64)]) -> ElementRecord {
        fields
            .iter()
            .map(|(name, value)| (name.to_string(), AttributeValue::Number(*value)))
            .collect()
    }

    #[test]
    fn keywords_round_trip_for_every_kind() {
        for kind in ElementKind::ALL {
            assert_eq!(ElementKind::from_keyword(kind.keyword()), Some(kind));
        }
        assert_eq!(ElementKind::from_keyword("line"), None);
        assert_eq!(ElementKind::from_keyword("BEND"), None);
    }

    #[test]
    fn merge_updates_fields_without_dropping_old_ones() {
        let mut document = LatticeDocument::default();
        assert!(!document.merge_element(
            ElementKind::Bend,
            "b1",
            record(&[("l", 1.0), ("angle", 0.1)])
        ));
        assert!(document.merge_element(
            ElementKind::Bend,
            "b1",
            record(&[("angle", 0.2), ("e1", 0.5)])
        ));

        let merged = document
            .table(ElementKind::Bend)
            .and_then(|table| table.get("b1"))
            .expect("b1 should exist");
        assert_eq!(merged, &record(&[("l", 1.0), ("angle", 0.2), ("e1", 0.5)]));
    }

    #[test]
    fn required_number_reports_element_and_attribute() {
        let element = record(&[("l", 1.0)]);
        let error = element
            .required_number("angle", "b1")
            .expect_err("missing angle should fail");
        assert_eq!(error.placeholder(), "INPUT.ELEMENT_ATTRIBUTE_MISSING");
        assert!(error.message().contains("'b1'"));
        assert!(error.message().contains("'angle'"));

        let mut element = ElementRecord::new();
        element.insert("l", AttributeValue::Text("long".to_string()));
        let error = element.number("l", "d1").expect_err("text length should fail");
        assert_eq!(error.placeholder(), "INPUT.ELEMENT_ATTRIBUTE_TYPE");
    }

    #[test]
    fn sequence_entry_splits_reversal_marker() {
        assert_eq!(
            SequenceEntry::parse("-bb"),
            SequenceEntry {
                name: "bb",
                reversed: true
            }
        );
        assert_eq!(
            SequenceEntry::parse("aa"),
            SequenceEntry {
                name: "aa",
                reversed: false
            }
        );
    }

    #[test]
    fn document_serializes_tables_beside_line() {
        let mut document = LatticeDocument::default();
        document.merge_element(ElementKind::Drift, "d1", record(&[("l", 0.5)]));
        document.replace_sequence(vec!["d1".to_string(), "-d1".to_string()]);

        let json = serde_json::to_value(&document).expect("document should serialize");
        assert_eq!(
            json,
            serde_json::json!({ "drift": { "d1": { "l": 0.5 } }, "line": ["d1", "-d1"] })
        );

        let reread: LatticeDocument =
            serde_json::from_value(json).expect("document should deserialize");
        assert_eq!(reread, document);
    }

    #[test]
    fn unknown_table_keys_are_rejected_on_load() {
        let error = serde_json::from_str::<LatticeDocument>(r#"{ "wiggler": {}, "line": [] }"#)
            .expect_err("unknown kind should fail");
        assert!(error.to_string().contains("wiggler"));
    }
}
