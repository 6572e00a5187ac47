use crate::Float;

/// Closed enumerations used across the crate (muon origin categories).
pub mod enums;
/// A thin three-vector wrapper used for positions and displacements.
pub mod vectors;

/// Column-name fragment for a displacement threshold: `0.5` becomes `"0p5"`,
/// integer thresholds keep their plain decimal form (`"1"` through `"10"`).
pub fn threshold_label(threshold_mm: Float) -> String {
    if threshold_mm.fract() == 0.0 {
        format!("{}", threshold_mm as i64)
    } else {
        format!("{}", threshold_mm).replace('.', "p")
    }
}
