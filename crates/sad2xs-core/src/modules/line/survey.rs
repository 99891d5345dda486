//! Floor coordinates of a built line.
//!
//! Follows the MAD-X survey convention: the global position `V` and the local
//! frame `W` are updated per element as `V ← W·R + V`, `W ← W·S`, where `R` is
//! the element displacement and `S` its rotation in the local frame. Rows give
//! the coordinates at each element entry, plus a final `_end_point`.

use super::model::{Line, LineElement};
use crate::common::constants::DEGRAD;
use crate::domain::SadResult;
use crate::modules::twiss::{ColumnValues, TwissTable};
use faer::Mat;

pub const SURVEY_END_POINT: &str = "_end_point";

#[derive(Debug, Clone, PartialEq)]
pub struct SurveyRow {
    pub name: String,
    pub s: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub theta: f64,
    pub phi: f64,
    pub psi: f64,
}

struct Frame {
    position: Mat<f64>,
    orientation: Mat<f64>,
}

impl Frame {
    fn origin() -> Self {
        Self {
            position: Mat::zeros(3, 1),
            orientation: Mat::identity(3, 3),
        }
    }

    fn row(&self, name: &str, s: f64) -> SurveyRow {
        let w = &self.orientation;
        let theta = w[(0, 2)].atan2(w[(2, 2)]);
        let phi = w[(1, 2)].atan2(w[(0, 2)].hypot(w[(2, 2)]));
        let psi = w[(1, 0)].atan2(w[(1, 1)]);
        SurveyRow {
            name: name.to_string(),
            s,
            x: self.position[(0, 0)],
            y: self.position[(1, 0)],
            z: self.position[(2, 0)],
            theta,
            phi,
            psi,
        }
    }

    fn advance(&mut self, element: &LineElement) {
        let Some((displacement, rotation)) = element_transform(element) else {
            return;
        };
        self.position = &(&self.orientation * &displacement) + &self.position;
        self.orientation = &self.orientation * &rotation;
    }
}

fn column(values: [f64; 3]) -> Mat<f64> {
    Mat::from_fn(3, 1, |i, _| values[i])
}

fn matrix(rows: [[f64; 3]; 3]) -> Mat<f64> {
    Mat::from_fn(3, 3, |i, j| rows[i][j])
}

/// Displacement and rotation of one element, `None` for elements that leave
/// the frame untouched.
fn element_transform(element: &LineElement) -> Option<(Mat<f64>, Mat<f64>)> {
    match element {
        LineElement::Drift { length } | LineElement::Quadrupole { length, .. } => {
            Some((column([0.0, 0.0, *length]), Mat::identity(3, 3)))
        }
        LineElement::Bend { h, length, .. } => {
            let angle = h * length;
            if angle == 0.0 {
                return Some((column([0.0, 0.0, *length]), Mat::identity(3, 3)));
            }
            let rho = length / angle;
            let (sin, cos) = angle.sin_cos();
            Some((
                column([rho * (cos - 1.0), 0.0, rho * sin]),
                matrix([[cos, 0.0, -sin], [0.0, 1.0, 0.0], [sin, 0.0, cos]]),
            ))
        }
        LineElement::SRotation { angle } => {
            let (sin, cos) = (angle * DEGRAD).sin_cos();
            Some((
                Mat::zeros(3, 1),
                matrix([[cos, -sin, 0.0], [sin, cos, 0.0], [0.0, 0.0, 1.0]]),
            ))
        }
        LineElement::Marker | LineElement::DipoleEdge { .. } => None,
    }
}

pub fn survey_line(line: &Line) -> Vec<SurveyRow> {
    let mut frame = Frame::origin();
    let mut rows = Vec::with_capacity(line.len() + 1);
    let mut s = 0.0;
    for (name, element) in line.iter() {
        rows.push(frame.row(name, s));
        frame.advance(element);
        s += element.length();
    }
    rows.push(frame.row(SURVEY_END_POINT, s));
    rows
}

/// Survey rows as columns `name, s, X, Y, Z, theta, phi, psi`.
pub fn survey_table(rows: &[SurveyRow]) -> SadResult<TwissTable> {
    let numeric = |field: fn(&SurveyRow) -> f64| {
        ColumnValues::Numeric(rows.iter().map(field).collect())
    };

    let mut table = TwissTable::new();
    table.push_column(
        "name",
        ColumnValues::Text(rows.iter().map(|row| row.name.clone()).collect()),
    )?;
    table.push_column("s", numeric(|row| row.s))?;
    table.push_column("X", numeric(|row| row.x))?;
    table.push_column("Y", numeric(|row| row.y))?;
    table.push_column("Z", numeric(|row| row.z))?;
    table.push_column("theta", numeric(|row| row.theta))?;
    table.push_column("phi", numeric(|row| row.phi))?;
    table.push_column("psi", numeric(|row| row.psi))?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::{SURVEY_END_POINT, survey_line, survey_table};
    use crate::modules::line::model::{Line, LineElement, ParticleRef};
    use std::collections::BTreeMap;
    use std::f64::consts::FRAC_PI_2;

    fn line_of(elements: Vec<(&str, LineElement)>) -> Line {
        let element_names = elements.iter().map(|(name, _)| name.to_string()).collect();
        let elements: BTreeMap<String, LineElement> = elements
            .into_iter()
            .map(|(name, element)| (name.to_string(), element))
            .collect();
        Line {
            element_names,
            elements,
            particle_ref: ParticleRef {
                p0c: 4.0e9,
                mass0: 510_998.95,
            },
        }
    }

    fn quarter_bend() -> LineElement {
        LineElement::Bend {
            k0: FRAC_PI_2 / 2.0,
            h: FRAC_PI_2 / 2.0,
            length: 2.0,
        }
    }

    #[test]
    fn straight_line_advances_along_z() {
        let line = line_of(vec![
            ("d1", LineElement::Drift { length: 1.5 }),
            ("m1", LineElement::Marker),
            (
                "q1",
                LineElement::Quadrupole {
                    length: 0.5,
                    k1: 0.3,
                },
            ),
        ]);
        let rows = survey_line(&line);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[2].z, 1.5);
        let end = &rows[3];
        assert_eq!(end.name, SURVEY_END_POINT);
        assert_eq!(end.s, 2.0);
        assert_eq!((end.x, end.y, end.z), (0.0, 0.0, 2.0));
    }

    #[test]
    fn four_quarter_bends_close_the_ring() {
        let line = line_of(vec![
            ("b1", quarter_bend()),
            ("b2", quarter_bend()),
            ("b3", quarter_bend()),
            ("b4", quarter_bend()),
        ]);
        let rows = survey_line(&line);

        let after_first = &rows[1];
        assert!((after_first.theta + FRAC_PI_2).abs() < 1.0e-12);
        assert!(after_first.x < 0.0);

        let end = &rows[4];
        assert!(end.x.abs() < 1.0e-12);
        assert!(end.z.abs() < 1.0e-12);
        assert!(end.theta.abs() < 1.0e-12);
    }

    #[test]
    fn rotated_bend_deflects_vertically() {
        let line = line_of(vec![
            ("r1", LineElement::SRotation { angle: 90.0 }),
            ("b1", quarter_bend()),
            ("r2", LineElement::SRotation { angle: -90.0 }),
        ]);
        let end = survey_line(&line).pop().expect("end point row");
        assert!(end.x.abs() < 1.0e-12);
        assert!(end.y < -1.0);
        assert!((end.phi + FRAC_PI_2).abs() < 1.0e-12);
    }

    #[test]
    fn table_has_survey_columns() {
        let line = line_of(vec![("d1", LineElement::Drift { length: 1.0 })]);
        let table = survey_table(&survey_line(&line)).expect("survey table");
        assert_eq!(
            table.column_names().collect::<Vec<_>>(),
            vec!["name", "s", "X", "Y", "Z", "theta", "phi", "psi"]
        );
        assert_eq!(table.numeric_column("Z").expect("Z column"), &[0.0, 1.0]);
    }
}
