use crate::domain::{SadError, SadResult};
use crate::modules::twiss::TwissTable;
use serde::Serialize;
use std::collections::HashMap;

/// SAD Twiss column → optics name used in reports.
pub const REFERENCE_COLUMN_MAP: [(&str, &str); 12] = [
    ("Element", "name"),
    ("s(m)", "s"),
    ("BX", "betx"),
    ("AX", "alfx"),
    ("BY", "bety"),
    ("AY", "alfy"),
    ("NX", "mux"),
    ("NY", "muy"),
    ("EX", "dx"),
    ("EY", "dy"),
    ("EPX", "dpx"),
    ("EPY", "dpy"),
];

/// Reference optics read from a SAD Twiss table, names lower-cased so they
/// match built line names.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceOptics {
    pub name: Vec<String>,
    pub s: Vec<f64>,
    pub betx: Vec<f64>,
    pub alfx: Vec<f64>,
    pub bety: Vec<f64>,
    pub alfy: Vec<f64>,
    pub mux: Vec<f64>,
    pub muy: Vec<f64>,
    pub dx: Vec<f64>,
    pub dy: Vec<f64>,
    pub dpx: Vec<f64>,
    pub dpy: Vec<f64>,
}

impl ReferenceOptics {
    pub fn from_twiss(table: &TwissTable) -> SadResult<Self> {
        let missing: Vec<&str> = REFERENCE_COLUMN_MAP
            .iter()
            .map(|(sad_column, _)| *sad_column)
            .filter(|sad_column| table.column(sad_column).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(SadError::input_validation(
                "INPUT.COMPARE_REFERENCE_COLUMNS",
                format!(
                    "reference twiss table is missing columns: {}",
                    missing.join(", ")
                ),
            ));
        }

        let numeric = |sad_column: &str| -> SadResult<Vec<f64>> {
            Ok(table.numeric_column(sad_column)?.to_vec())
        };
        let optics = Self {
            name: table
                .text_column("Element")?
                .into_iter()
                .map(|name| name.to_lowercase())
                .collect(),
            s: numeric("s(m)")?,
            betx: numeric("BX")?,
            alfx: numeric("AX")?,
            bety: numeric("BY")?,
            alfy: numeric("AY")?,
            mux: numeric("NX")?,
            muy: numeric("NY")?,
            dx: numeric("EX")?,
            dy: numeric("EY")?,
            dpx: numeric("EPX")?,
            dpy: numeric("EPY")?,
        };
        if optics.name.is_empty() {
            return Err(SadError::input_validation(
                "INPUT.COMPARE_REFERENCE_EMPTY",
                "reference twiss table has no rows",
            ));
        }
        Ok(optics)
    }

    pub fn len(&self) -> usize {
        self.name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// Row of the first occurrence of every name.
    pub fn first_rows(&self) -> HashMap<&str, usize> {
        let mut rows = HashMap::with_capacity(self.name.len());
        for (row, name) in self.name.iter().enumerate() {
            rows.entry(name.as_str()).or_insert(row);
        }
        rows
    }

    pub fn twiss_init(&self) -> Option<TwissInit> {
        if self.is_empty() {
            return None;
        }
        Some(TwissInit {
            element: self.name[0].clone(),
            betx: self.betx[0],
            alfx: self.alfx[0],
            bety: self.bety[0],
            alfy: self.alfy[0],
            dx: self.dx[0],
            dy: self.dy[0],
            dpx: self.dpx[0],
            dpy: self.dpy[0],
        })
    }
}

/// Initial conditions for an external Twiss computation, taken from the first
/// reference row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TwissInit {
    pub element: String,
    pub betx: f64,
    pub alfx: f64,
    pub bety: f64,
    pub alfy: f64,
    pub dx: f64,
    pub dy: f64,
    pub dpx: f64,
    pub dpy: f64,
}

/// Externally computed optics along the built line.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedOptics {
    pub s: Vec<f64>,
    pub betx: Vec<f64>,
    pub bety: Vec<f64>,
}

impl ComputedOptics {
    pub fn from_table(table: &TwissTable) -> SadResult<Self> {
        Ok(Self {
            s: table.numeric_column("s")?.to_vec(),
            betx: table.numeric_column("betx")?.to_vec(),
            bety: table.numeric_column("bety")?.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ComputedOptics, ReferenceOptics};
    use crate::modules::twiss::parse_twiss_table;

    const REFERENCE: &str = "\
Element s(m) BX AX BY AY NX NY EX EY EPX EPY
IP 0 8 0.5 4 -0.5 0 0 0.1 0 0.01 0
QF.1 1.5 12 -1 3 0.2 0.1 0.05 0.2 0 0.02 0
";

    #[test]
    fn reference_columns_are_renamed_and_names_lowered() {
        let table = parse_twiss_table(REFERENCE).expect("reference should parse");
        let optics = ReferenceOptics::from_twiss(&table).expect("columns should map");
        assert_eq!(optics.name, vec!["ip", "qf.1"]);
        assert_eq!(optics.betx, vec![8.0, 12.0]);
        assert_eq!(optics.first_rows().get("qf.1"), Some(&1));

        let init = optics.twiss_init().expect("init from first row");
        assert_eq!(init.element, "ip");
        assert_eq!((init.betx, init.alfx, init.bety, init.alfy), (8.0, 0.5, 4.0, -0.5));
        assert_eq!((init.dx, init.dpx), (0.1, 0.01));
    }

    #[test]
    fn repeated_reference_names_resolve_to_first_row() {
        let source = format!("{}IP 3 8 0.5 4 -0.5 0.2 0.1 0 0 0 0\n", REFERENCE);
        let table = parse_twiss_table(&source).expect("reference should parse");
        let optics = ReferenceOptics::from_twiss(&table).expect("columns should map");
        let rows = optics.first_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.get("ip"), Some(&0));
        assert_eq!(rows.get("qd.1"), None);
    }

    #[test]
    fn missing_reference_column_is_reported() {
        let table = parse_twiss_table("Element s(m) BX\nIP 0 8\n").expect("table should parse");
        let error = ReferenceOptics::from_twiss(&table).expect_err("AX is missing");
        assert_eq!(error.placeholder(), "INPUT.COMPARE_REFERENCE_COLUMNS");
        assert!(error.message().ends_with("AX, BY, AY, NX, NY, EX, EY, EPX, EPY"));
    }

    #[test]
    fn header_only_reference_is_rejected() {
        let header = REFERENCE.lines().next().expect("header line");
        let table = parse_twiss_table(header).expect("header-only table");
        let error = ReferenceOptics::from_twiss(&table).expect_err("no rows");
        assert_eq!(error.placeholder(), "INPUT.COMPARE_REFERENCE_EMPTY");
    }

    #[test]
    fn computed_optics_need_beta_columns() {
        let table = parse_twiss_table("name s betx\nip.1 0 8\n").expect("table should parse");
        let error = ComputedOptics::from_table(&table).expect_err("bety is missing");
        assert!(error.message().contains("'bety'"));
    }
}
