//! Physical and numerical constants

use std::f64::consts::PI;

/// 4π
pub const PI4: f64 = 4.0 * PI;

/// 1/(4π), Biot-Savart prefactor
pub const INV_PI4: f64 = 1.0 / PI4;

/// 2π
pub const PI2: f64 = 2.0 * PI;

/// Small epsilon for geometric comparisons
pub const EPSY: f64 = 1.0e-12;

/// Sea-level air density (kg/m³)
pub const DEFAULT_DENSITY: f64 = 1.225;

/// Maximum corners per panel
pub const MAX_PANEL_NODES: usize = 4;

/// Maximum fine loops merged into one coarse loop per level
pub const MAX_AGGLOMERATE: usize = 4;

/// Largest Mach number accepted by the Prandtl-Glauert correction
pub const MAX_MACH: f64 = 0.99;

/// Turbulent flat-plate skin friction (Schlichting), Cf = 0.455 / (log10 Re)^2.58
pub fn schlichting_skin_friction(reynolds: f64) -> f64 {
    if reynolds <= 1.0 {
        return 0.0;
    }
    0.455 / reynolds.log10().powf(2.58)
}

/// Prandtl-Glauert factor β = sqrt(1 - M²)
pub fn prandtl_glauert_beta(mach: f64) -> f64 {
    (1.0 - mach * mach).max(0.0).sqrt()
}
