use crate::domain::{SadError, SadResult};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Formatter;

/// Cells of one column. A column is numeric only when every cell parses as a
/// finite number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnValues {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(values) => values.len(),
            Self::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            Self::Numeric(values) => Some(values),
            Self::Text(_) => None,
        }
    }

    /// Cells rendered as strings; numeric cells use their shortest repr.
    pub fn to_text(&self) -> Vec<String> {
        match self {
            Self::Numeric(values) => values.iter().map(f64::to_string).collect(),
            Self::Text(values) => values.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TwissColumn {
    pub name: String,
    pub values: ColumnValues,
}

/// Columns in header order. Serializes as a JSON object whose keys keep that
/// order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TwissTable {
    columns: Vec<TwissColumn>,
}

impl TwissTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column. Names must be unique and every column must have the
    /// same number of rows.
    pub fn push_column(&mut self, name: impl Into<String>, values: ColumnValues) -> SadResult<()> {
        let name = name.into();
        if self.column(&name).is_some() {
            return Err(SadError::input_validation(
                "INPUT.TWISS_COLUMN_DUPLICATE",
                format!("column '{}' appears more than once", name),
            ));
        }
        let expected_rows = self.columns.first().map(|column| column.values.len());
        if let Some(expected_rows) = expected_rows.filter(|rows| *rows != values.len()) {
            return Err(SadError::input_validation(
                "INPUT.TWISS_COLUMN_LENGTH",
                format!(
                    "column '{}' has {} rows, expected {}",
                    name,
                    values.len(),
                    expected_rows
                ),
            ));
        }
        self.columns.push(TwissColumn { name, values });
        Ok(())
    }

    pub fn columns(&self) -> &[TwissColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&ColumnValues> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .map(|column| &column.values)
    }

    pub fn row_count(&self) -> usize {
        self.columns
            .first()
            .map(|column| column.values.len())
            .unwrap_or(0)
    }

    pub fn numeric_column(&self, name: &str) -> SadResult<&[f64]> {
        let values = self.required_column(name)?;
        values.as_numeric().ok_or_else(|| {
            SadError::input_validation(
                "INPUT.TWISS_COLUMN_TYPE",
                format!("column '{}' must be numeric", name),
            )
        })
    }

    pub fn text_column(&self, name: &str) -> SadResult<Vec<String>> {
        Ok(self.required_column(name)?.to_text())
    }

    fn required_column(&self, name: &str) -> SadResult<&ColumnValues> {
        self.column(name).ok_or_else(|| {
            SadError::input_validation(
                "INPUT.TWISS_COLUMN_MISSING",
                format!("missing column '{}'", name),
            )
        })
    }
}

impl Serialize for TwissTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for column in &self.columns {
            map.serialize_entry(&column.name, &column.values)?;
        }
        map.end()
    }
}

struct TwissTableVisitor;

impl<'de> Visitor<'de> for TwissTableVisitor {
    type Value = TwissTable;

    fn expecting(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("an object mapping column names to arrays")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut table = TwissTable::new();
        while let Some((name, values)) = access.next_entry::<String, ColumnValues>()? {
            table
                .push_column(name, values)
                .map_err(|error| serde::de::Error::custom(error.message()))?;
        }
        Ok(table)
    }
}

impl<'de> Deserialize<'de> for TwissTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(TwissTableVisitor)
    }
}
