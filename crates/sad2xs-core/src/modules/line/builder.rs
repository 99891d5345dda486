use super::conventions::{BuildConventions, QuadStrength, SkewQuadrupole};
use super::model::{ConvertedElement, EdgeSide, Line, LineElement, ParticleRef};
use crate::common::constants::{BEND_ROTATIONS_DEG, SKEW_QUAD_ROTATIONS_DEG};
use crate::domain::{SadError, SadResult};
use crate::modules::lattice::{ElementKind, ElementRecord, LatticeDocument, SequenceEntry};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

const ROTATION_MATCH_TOLERANCE_DEG: f64 = 1.0e-9;

/// Converts one parsed element into its xtrack form.
pub fn convert_element(
    kind: ElementKind,
    name: &str,
    record: &ElementRecord,
    conventions: &BuildConventions,
) -> SadResult<ConvertedElement> {
    match kind {
        ElementKind::Drift => convert_drift(name, record),
        ElementKind::Bend => convert_bend(name, record, conventions),
        ElementKind::Quad => convert_quad(name, record, conventions),
        ElementKind::Oct
        | ElementKind::Mult
        | ElementKind::Sol
        | ElementKind::Cavi
        | ElementKind::Mark
        | ElementKind::Moni
        | ElementKind::Beambeam
        | ElementKind::Apert => {
            let converted = match record.number("l", name)? {
                Some(length) => LineElement::Drift { length },
                None => LineElement::Marker,
            };
            debug!(
                element = name,
                kind = %kind,
                class = converted.class_name(),
                "element kind is not modelled, inserted placeholder"
            );
            Ok(ConvertedElement::Single(converted))
        }
    }
}

fn convert_drift(name: &str, record: &ElementRecord) -> SadResult<ConvertedElement> {
    let length = record.required_number("l", name)?;
    if let Some(extra) = record.keys().find(|key| *key != "l") {
        return Err(SadError::input_validation(
            "INPUT.DRIFT_ATTRIBUTE",
            format!(
                "drift '{}': unexpected attribute '{}', only 'l' is allowed",
                name, extra
            ),
        ));
    }
    Ok(ConvertedElement::Single(LineElement::Drift { length }))
}

fn convert_bend(
    name: &str,
    record: &ElementRecord,
    conventions: &BuildConventions,
) -> SadResult<ConvertedElement> {
    let angle = record.required_number("angle", name)?;
    if angle == 0.0 {
        let element = match record.number("l", name)? {
            Some(length) => LineElement::Drift { length },
            None => LineElement::Marker,
        };
        return Ok(ConvertedElement::Single(element));
    }

    let length = record.required_number("l", name)?;
    if length <= 0.0 {
        return Err(SadError::input_validation(
            "INPUT.BEND_LENGTH",
            format!(
                "bend '{}': angle {} needs a positive length, found l={}",
                name, angle, length
            ),
        ));
    }
    let k0 = angle / length;
    let rotate = record.number("rotate", name)?;
    if let Some(rotate) = rotate {
        if !matches_any(rotate, &BEND_ROTATIONS_DEG) {
            return Err(SadError::input_validation(
                "INPUT.BEND_ROTATION",
                format!(
                    "bend '{}': rotate={} is not supported, expected 90 or -90",
                    name, rotate
                ),
            ));
        }
    }

    let e1 = record.number("e1", name)?;
    let e2 = record.number("e2", name)?;
    let fint = if e1.is_some() || e2.is_some() {
        record.required_number("f1", name)?
    } else {
        0.0
    };
    let edge = |e: f64, side: EdgeSide| LineElement::DipoleEdge {
        k: k0,
        e1: e * angle,
        hgap: conventions.edge_hgap,
        fint,
        side,
    };

    let mut parts = Vec::with_capacity(5);
    if let Some(rotate) = rotate {
        parts.push(LineElement::SRotation { angle: -rotate });
    }
    if let Some(e1) = e1 {
        parts.push(edge(e1, EdgeSide::Entry));
    }
    parts.push(LineElement::Bend {
        k0,
        h: k0,
        length,
    });
    if let Some(e2) = e2 {
        parts.push(edge(e2, EdgeSide::Exit));
    }
    if let Some(rotate) = rotate {
        parts.push(LineElement::SRotation { angle: rotate });
    }
    Ok(ConvertedElement::from_parts(parts))
}

fn convert_quad(
    name: &str,
    record: &ElementRecord,
    conventions: &BuildConventions,
) -> SadResult<ConvertedElement> {
    let length = record.required_number("l", name)?;
    let k1_sad = record.number("k1", name)?.unwrap_or(0.0);
    let k1 = match conventions.quad_strength {
        QuadStrength::Normalized => k1_sad,
        QuadStrength::Integrated if length == 0.0 => {
            return Err(SadError::input_validation(
                "INPUT.QUAD_LENGTH",
                format!("quad '{}': integrated k1 needs a non-zero length", name),
            ));
        }
        QuadStrength::Integrated => k1_sad / length,
    };
    let quadrupole = LineElement::Quadrupole { length, k1 };

    let Some(rotate) = record.number("rotate", name)? else {
        return Ok(ConvertedElement::Single(quadrupole));
    };
    if !matches_any(rotate, &SKEW_QUAD_ROTATIONS_DEG) {
        return Err(SadError::input_validation(
            "INPUT.QUAD_ROTATION",
            format!(
                "quad '{}': rotate={} is not supported, expected 45 or -45",
                name, rotate
            ),
        ));
    }

    match conventions.skew_quadrupole {
        SkewQuadrupole::Rotate => Ok(ConvertedElement::Group(vec![
            LineElement::SRotation { angle: -rotate },
            quadrupole,
            LineElement::SRotation { angle: rotate },
        ])),
        SkewQuadrupole::Drift => {
            warn!(element = name, rotate, "skew quadrupole replaced by a drift");
            Ok(ConvertedElement::Single(LineElement::Drift { length }))
        }
        SkewQuadrupole::Reject => Err(SadError::input_validation(
            "INPUT.QUAD_SKEW",
            format!("quad '{}': skew quadrupoles are disabled (rotate={})", name, rotate),
        )),
    }
}

fn matches_any(value: f64, allowed: &[f64]) -> bool {
    allowed
        .iter()
        .any(|candidate| (value - candidate).abs() <= ROTATION_MATCH_TOLERANCE_DEG)
}

/// Converts every element of every table. A name defined under two kinds is
/// an error since the sequence could not tell them apart.
pub fn convert_elements(
    document: &LatticeDocument,
    conventions: &BuildConventions,
) -> SadResult<BTreeMap<String, ConvertedElement>> {
    let mut converted: BTreeMap<String, ConvertedElement> = BTreeMap::new();
    for (kind, table) in document.tables() {
        for (name, record) in table.iter() {
            if converted.contains_key(name) {
                let kinds: Vec<String> = document
                    .kinds_defining(name)
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                return Err(SadError::input_validation(
                    "INPUT.ELEMENT_DUPLICATE",
                    format!(
                        "element '{}' is defined as more than one kind ({})",
                        name,
                        kinds.join(", ")
                    ),
                ));
            }
            converted.insert(
                name.to_string(),
                convert_element(kind, name, record, conventions)?,
            );
        }
    }
    Ok(converted)
}

/// Expands sequence tokens into uniquely named xtrack elements.
pub fn expand_sequence(
    sequence: &[String],
    converted: &BTreeMap<String, ConvertedElement>,
    conventions: &BuildConventions,
) -> SadResult<Vec<(String, LineElement)>> {
    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    let mut seen = BTreeSet::new();
    let mut expanded = Vec::with_capacity(sequence.len());

    for (position, token) in sequence.iter().enumerate() {
        let entry = SequenceEntry::parse(token);
        let element = converted.get(entry.name).ok_or_else(|| {
            SadError::input_validation(
                "INPUT.SEQUENCE_UNKNOWN_ELEMENT",
                format!(
                    "sequence position {}: '{}' is not a defined element",
                    position + 1,
                    token
                ),
            )
        })?;

        let occurrence = occurrences.entry(entry.name).or_insert(0);
        *occurrence += 1;
        let base_name = conventions
            .occurrence_suffix
            .name_for(entry.name, *occurrence);

        let element = if entry.reversed {
            element.reversed(conventions.negate_bend_on_reversal)
        } else {
            element.clone()
        };

        let named: Vec<(String, LineElement)> = match element {
            ConvertedElement::Single(element) => vec![(base_name, element)],
            ConvertedElement::Group(parts) => parts
                .into_iter()
                .enumerate()
                .map(|(index, part)| (format!("{}:{}", base_name, index), part))
                .collect(),
        };

        for (name, part) in named {
            if !seen.insert(name.clone()) {
                return Err(SadError::input_validation(
                    "INPUT.LINE_NAME_COLLISION",
                    format!(
                        "sequence position {}: generated name '{}' is already in use",
                        position + 1,
                        name
                    ),
                ));
            }
            expanded.push((name, part));
        }
    }

    Ok(expanded)
}

pub fn build_line(document: &LatticeDocument, conventions: &BuildConventions) -> SadResult<Line> {
    let converted = convert_elements(document, conventions)?;
    if document.sequence().is_empty() {
        warn!("lattice has no line statement, built line is empty");
    }
    let expanded = expand_sequence(document.sequence(), &converted, conventions)?;

    let mut element_names = Vec::with_capacity(expanded.len());
    let mut elements = BTreeMap::new();
    for (name, element) in expanded {
        element_names.push(name.clone());
        elements.insert(name, element);
    }

    let line = Line {
        element_names,
        elements,
        particle_ref: ParticleRef {
            p0c: conventions.p0c,
            mass0: conventions.mass0,
        },
    };
    info!(
        defined = converted.len(),
        elements = line.len(),
        length = line.total_length(),
        "built line"
    );
    Ok(line)
}
