//! Physical constants and fixed conventions shared by the conversion stages.

pub const PI: f64 = std::f64::consts::PI;
pub const RADDEG: f64 = 180.0 / PI;
pub const DEGRAD: f64 = PI / 180.0;

/// Electron rest energy in eV (CODATA 2018).
pub const ELECTRON_MASS_EV: f64 = 510_998.950_00_f64;

/// Reference momentum used for the SuperKEKB low-energy ring lattices.
pub const DEFAULT_P0C_EV: f64 = 4.0e9;

/// Half-gap assigned to every dipole edge: linear field drop-off, as in the
/// MAD-X convention for `fint` with unknown gap.
pub const DEFAULT_EDGE_HGAP: f64 = 1.0 / 6.0;

/// Frame rotations (degrees) accepted on a bend.
pub const BEND_ROTATIONS_DEG: [f64; 2] = [90.0, -90.0];

/// Frame rotations (degrees) that turn a normal quadrupole into a skew one.
pub const SKEW_QUAD_ROTATIONS_DEG: [f64; 2] = [45.0, -45.0];
