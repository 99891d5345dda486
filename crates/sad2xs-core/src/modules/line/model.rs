use crate::domain::SadResult;
use crate::modules::twiss::{ColumnValues, TwissTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeSide {
    Entry,
    Exit,
}

impl EdgeSide {
    pub const fn swapped(self) -> Self {
        match self {
            Self::Entry => Self::Exit,
            Self::Exit => Self::Entry,
        }
    }
}

/// Thick and thin elements in the xtrack dictionary layout, tagged by
/// `__class__`. `SRotation::angle` is in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__class__")]
pub enum LineElement {
    Drift {
        length: f64,
    },
    Marker,
    Bend {
        k0: f64,
        h: f64,
        length: f64,
    },
    DipoleEdge {
        k: f64,
        e1: f64,
        hgap: f64,
        fint: f64,
        side: EdgeSide,
    },
    Quadrupole {
        length: f64,
        k1: f64,
    },
    SRotation {
        angle: f64,
    },
}

impl LineElement {
    pub const fn class_name(&self) -> &'static str {
        match self {
            Self::Drift { .. } => "Drift",
            Self::Marker => "Marker",
            Self::Bend { .. } => "Bend",
            Self::DipoleEdge { .. } => "DipoleEdge",
            Self::Quadrupole { .. } => "Quadrupole",
            Self::SRotation { .. } => "SRotation",
        }
    }

    pub const fn length(&self) -> f64 {
        match self {
            Self::Drift { length } | Self::Bend { length, .. } | Self::Quadrupole { length, .. } => {
                *length
            }
            Self::Marker | Self::DipoleEdge { .. } | Self::SRotation { .. } => 0.0,
        }
    }

    /// The element as seen when its group is traversed backwards. Rotations
    /// flip sign and edges change side; curvature flips only on request.
    pub fn reversed(&self, negate_curvature: bool) -> Self {
        let sign = if negate_curvature { -1.0 } else { 1.0 };
        match self {
            Self::SRotation { angle } => Self::SRotation { angle: -angle },
            Self::DipoleEdge {
                k,
                e1,
                hgap,
                fint,
                side,
            } => Self::DipoleEdge {
                k: sign * k,
                e1: sign * e1,
                hgap: *hgap,
                fint: *fint,
                side: side.swapped(),
            },
            Self::Bend { k0, h, length } => Self::Bend {
                k0: sign * k0,
                h: sign * h,
                length: *length,
            },
            other => other.clone(),
        }
    }
}

/// A converted SAD element: one xtrack element or an ordered group of them.
#[derive(Debug, Clone, PartialEq)]
pub enum ConvertedElement {
    Single(LineElement),
    Group(Vec<LineElement>),
}

impl ConvertedElement {
    /// Groups of one collapse to a single element.
    pub fn from_parts(mut parts: Vec<LineElement>) -> Self {
        if parts.len() == 1 {
            if let Some(element) = parts.pop() {
                return Self::Single(element);
            }
        }
        Self::Group(parts)
    }

    pub fn parts(&self) -> &[LineElement] {
        match self {
            Self::Single(element) => std::slice::from_ref(element),
            Self::Group(parts) => parts,
        }
    }

    pub fn reversed(&self, negate_curvature: bool) -> Self {
        match self {
            Self::Single(element) => Self::Single(element.reversed(negate_curvature)),
            Self::Group(parts) => Self::Group(
                parts
                    .iter()
                    .rev()
                    .map(|element| element.reversed(negate_curvature))
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleRef {
    pub p0c: f64,
    pub mass0: f64,
}

/// Built line in the layout `xtrack.Line.from_dict` reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub element_names: Vec<String>,
    pub elements: BTreeMap<String, LineElement>,
    pub particle_ref: ParticleRef,
}

impl Line {
    pub fn len(&self) -> usize {
        self.element_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.element_names.is_empty()
    }

    /// Elements in beamline order. Names without an element entry are
    /// skipped; the builder never produces them.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &LineElement)> {
        self.element_names.iter().filter_map(|name| {
            self.elements
                .get(name)
                .map(|element| (name.as_str(), element))
        })
    }

    pub fn total_length(&self) -> f64 {
        self.iter().map(|(_, element)| element.length()).sum()
    }

    /// Columns `name`, `element_type`, `s` (at entry) and `length`.
    pub fn table(&self) -> SadResult<TwissTable> {
        let mut names = Vec::with_capacity(self.len());
        let mut classes = Vec::with_capacity(self.len());
        let mut positions = Vec::with_capacity(self.len());
        let mut lengths = Vec::with_capacity(self.len());

        let mut s = 0.0;
        for (name, element) in self.iter() {
            names.push(name.to_string());
            classes.push(element.class_name().to_string());
            positions.push(s);
            lengths.push(element.length());
            s += element.length();
        }

        let mut table = TwissTable::new();
        table.push_column("name", ColumnValues::Text(names))?;
        table.push_column("element_type", ColumnValues::Text(classes))?;
        table.push_column("s", ColumnValues::Numeric(positions))?;
        table.push_column("length", ColumnValues::Numeric(lengths))?;
        Ok(table)
    }
}
