//! Case configuration in JSON or TOML
//!
//! Every field has a default so a case file only names what differs.
//!
//! ## Example TOML configuration
//!
//! ```toml
//! case_id = "rect_wing"
//! symmetry = "y"
//!
//! [flight]
//! mach = 0.3
//! alpha_deg = 5.0
//!
//! [reference]
//! sref = 1.0
//! cref = 1.0
//! bref = 1.0
//!
//! [solver.mode]
//! type = "gmres"
//! restart = 30
//! max_outer = 10
//! reduction = 1e-8
//!
//! [geometry]
//! type = "rectangular_wing"
//! chord = 1.0
//! semi_span = 0.5
//! n_chord = 4
//! n_span = 8
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::constants::{DEFAULT_DENSITY, MAX_MACH};
use crate::core::mesh::{JsonMeshLoader, MeshError, MeshSource, SurfaceMesh, WingSpec};
use crate::core::model::RotorDisk;
use crate::core::types::{SymmetryPlane, Vec3};

// ============================================================================
// Strategy selectors
// ============================================================================

/// Linear solver, selected once per run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SolverMode {
    /// Damped Jacobi relaxation
    Jacobi {
        /// Relaxation factor ω
        #[serde(default = "default_jacobi_relaxation")]
        relaxation: f64,
    },
    /// Restarted GMRES
    Gmres {
        /// Inner iterations per restart cycle
        #[serde(default = "default_restart")]
        restart: usize,
        /// Maximum restart cycles
        #[serde(default = "default_max_outer")]
        max_outer: usize,
        /// Stop once the residual dropped by this factor
        #[serde(default = "default_reduction")]
        reduction: f64,
    },
}

impl Default for SolverMode {
    fn default() -> Self {
        SolverMode::Gmres {
            restart: default_restart(),
            max_outer: default_max_outer(),
            reduction: default_reduction(),
        }
    }
}

fn default_jacobi_relaxation() -> f64 {
    0.8
}
fn default_restart() -> usize {
    30
}
fn default_max_outer() -> usize {
    10
}
fn default_reduction() -> f64 {
    1e-8
}

/// How forces are recovered from circulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceMethod {
    /// ρ Γ V × l on bound edges
    KuttaJoukowski,
    /// ΔCp q A n over panels
    PressureIntegration,
    /// Far-wake momentum balance
    Trefftz,
}

/// Reported coefficient strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ForceType {
    /// Coefficients from the latest iteration
    Instantaneous { method: ForceMethod },
    /// Running mean over the last `steps` iterations
    Averaged { method: ForceMethod, steps: usize },
}

impl Default for ForceType {
    fn default() -> Self {
        ForceType::Instantaneous {
            method: ForceMethod::KuttaJoukowski,
        }
    }
}

impl ForceType {
    pub fn method(&self) -> ForceMethod {
        match self {
            ForceType::Instantaneous { method } | ForceType::Averaged { method, .. } => *method,
        }
    }

    /// Averaging window length (1 for instantaneous)
    pub fn window(&self) -> usize {
        match self {
            ForceType::Instantaneous { .. } => 1,
            ForceType::Averaged { steps, .. } => (*steps).max(1),
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Free-stream condition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightCondition {
    #[serde(default)]
    pub mach: f64,
    /// Angle of attack in degrees
    #[serde(default)]
    pub alpha_deg: f64,
    /// Sideslip angle in degrees
    #[serde(default)]
    pub beta_deg: f64,
    /// Free-stream speed
    #[serde(default = "default_velocity")]
    pub velocity: f64,
    #[serde(default = "default_density")]
    pub density: f64,
    /// Reynolds number based on the reference chord, 0 disables the
    /// zero-lift drag estimate
    #[serde(default)]
    pub reynolds: f64,
}

fn default_velocity() -> f64 {
    1.0
}
fn default_density() -> f64 {
    DEFAULT_DENSITY
}

impl Default for FlightCondition {
    fn default() -> Self {
        Self {
            mach: 0.0,
            alpha_deg: 0.0,
            beta_deg: 0.0,
            velocity: default_velocity(),
            density: default_density(),
            reynolds: 0.0,
        }
    }
}

impl FlightCondition {
    /// Unit free-stream direction (cosα cosβ, −sinβ, sinα cosβ)
    pub fn direction(&self) -> Vec3 {
        let (sa, ca) = self.alpha_deg.to_radians().sin_cos();
        let (sb, cb) = self.beta_deg.to_radians().sin_cos();
        Vec3::new(ca * cb, -sb, sa * cb)
    }

    /// Lift direction (−sinα, 0, cosα)
    pub fn lift_direction(&self) -> Vec3 {
        let (sa, ca) = self.alpha_deg.to_radians().sin_cos();
        Vec3::new(-sa, 0.0, ca)
    }

    /// Side-force direction, lift × drag
    pub fn side_direction(&self) -> Vec3 {
        self.lift_direction().cross(&self.direction())
    }

    /// Free-stream velocity vector
    pub fn freestream(&self) -> Vec3 {
        self.direction() * self.velocity
    }

    /// Dynamic pressure ½ρV²
    pub fn dynamic_pressure(&self) -> f64 {
        0.5 * self.density * self.velocity * self.velocity
    }
}

/// Reference quantities for coefficients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferenceValues {
    #[serde(default = "default_one")]
    pub sref: f64,
    #[serde(default = "default_one")]
    pub cref: f64,
    #[serde(default = "default_one")]
    pub bref: f64,
    /// Moment reference (centre of gravity)
    #[serde(default)]
    pub cg: Vec3,
}

fn default_one() -> f64 {
    1.0
}

impl Default for ReferenceValues {
    fn default() -> Self {
        Self {
            sref: 1.0,
            cref: 1.0,
            bref: 1.0,
            cg: Vec3::zero(),
        }
    }
}

/// Body rotation rates in rad/s
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RotationRates {
    #[serde(default)]
    pub p: f64,
    #[serde(default)]
    pub q: f64,
    #[serde(default)]
    pub r: f64,
}

impl RotationRates {
    pub fn vector(&self) -> Vec3 {
        Vec3::new(self.p, self.q, self.r)
    }
}

/// Wake layout and relaxation controls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WakeConfig {
    /// Nodes per trailing line including the trailing-edge node
    #[serde(default = "default_trailing_nodes")]
    pub trailing_nodes: usize,
    /// Streamwise wake length; ten times the geometry extent when absent
    #[serde(default)]
    pub far_field_distance: Option<f64>,
    /// Ratio between consecutive wake segment lengths
    #[serde(default = "default_stretch_ratio")]
    pub stretch_ratio: f64,
    /// Most solves on the initial wake before relaxation; the stage ends at
    /// the first converged solve
    #[serde(default = "default_rigid_iterations")]
    pub rigid_iterations: usize,
    /// Wake relaxation cycles
    #[serde(default = "default_relax_iterations")]
    pub relax_iterations: usize,
    /// Blend between old and aligned node positions, in (0, 1]
    #[serde(default = "default_wake_relaxation")]
    pub relaxation: f64,
    /// L2 tangency residual declaring convergence
    #[serde(default = "default_wake_tolerance")]
    pub tolerance: f64,
}

fn default_trailing_nodes() -> usize {
    16
}
fn default_stretch_ratio() -> f64 {
    1.15
}
fn default_rigid_iterations() -> usize {
    1
}
fn default_relax_iterations() -> usize {
    5
}
fn default_wake_relaxation() -> f64 {
    0.5
}
fn default_wake_tolerance() -> f64 {
    1e-6
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            trailing_nodes: default_trailing_nodes(),
            far_field_distance: None,
            stretch_ratio: default_stretch_ratio(),
            rigid_iterations: default_rigid_iterations(),
            relax_iterations: default_relax_iterations(),
            relaxation: default_wake_relaxation(),
            tolerance: default_wake_tolerance(),
        }
    }
}

/// Linear solve controls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SolverConfig {
    #[serde(default)]
    pub mode: SolverMode,
    /// Number of multigrid levels, 1 disables coarsening
    #[serde(default = "default_levels")]
    pub multigrid_levels: usize,
    /// Jacobi sweeps or multigrid cycles
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Absolute residual tolerance
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Coarsest-level sweeps when multigrid preconditions GMRES
    #[serde(default = "default_coarse_sweeps")]
    pub coarse_sweeps: usize,
    #[serde(default = "default_smooth")]
    pub pre_smooth: usize,
    #[serde(default = "default_smooth")]
    pub post_smooth: usize,
    /// Damping of the multigrid smoother
    #[serde(default = "default_smoothing_relaxation")]
    pub smoothing_relaxation: f64,
    /// Log progress every N iterations (0 = silent)
    #[serde(default)]
    pub print_interval: usize,
    /// Worker threads, 0 = all available
    #[serde(default)]
    pub threads: usize,
}

fn default_levels() -> usize {
    1
}
fn default_max_iterations() -> usize {
    500
}
fn default_tolerance() -> f64 {
    1e-10
}
fn default_coarse_sweeps() -> usize {
    10
}
fn default_smooth() -> usize {
    2
}
fn default_smoothing_relaxation() -> f64 {
    0.7
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            mode: SolverMode::default(),
            multigrid_levels: default_levels(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            coarse_sweeps: default_coarse_sweeps(),
            pre_smooth: default_smooth(),
            post_smooth: default_smooth(),
            smoothing_relaxation: default_smoothing_relaxation(),
            print_interval: 0,
            threads: 0,
        }
    }
}

/// Near/far split and kernel regularisation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InfluenceConfig {
    /// A cluster is far when its distance exceeds this multiple of its
    /// radius; 0 evaluates every interaction exactly
    #[serde(default = "default_far_field_ratio")]
    pub far_field_ratio: f64,
    /// Maximum loops per cluster-tree leaf
    #[serde(default = "default_leaf_size")]
    pub leaf_size: usize,
    /// Far clusters whose influence bound is below this are dropped
    #[serde(default)]
    pub negligible_influence: f64,
    /// Vortex core radius as a fraction of the mean edge length
    #[serde(default = "default_core_ratio")]
    pub core_ratio: f64,
}

fn default_far_field_ratio() -> f64 {
    5.0
}
fn default_leaf_size() -> usize {
    8
}
fn default_core_ratio() -> f64 {
    0.01
}

impl Default for InfluenceConfig {
    fn default() -> Self {
        Self {
            far_field_ratio: default_far_field_ratio(),
            leaf_size: default_leaf_size(),
            negligible_influence: 0.0,
            core_ratio: default_core_ratio(),
        }
    }
}

/// Force recovery controls
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ForceConfig {
    #[serde(default)]
    pub force_type: ForceType,
    /// Section lift limit; enables the CLmax post-process
    #[serde(default)]
    pub clmax_2d: Option<f64>,
}

/// Restart file locations
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RestartConfig {
    #[serde(default)]
    pub load: Option<PathBuf>,
    #[serde(default)]
    pub save: Option<PathBuf>,
}

/// Where the panel geometry comes from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeometrySource {
    /// JSON [`SurfaceMesh`] file, relative to the case file
    File { path: PathBuf },
    /// Generated flat rectangular wing
    RectangularWing {
        chord: f64,
        semi_span: f64,
        n_chord: usize,
        n_span: usize,
        #[serde(default)]
        full_span: bool,
        #[serde(default)]
        cosine_span: bool,
    },
}

/// Complete case description
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseConfig {
    /// Identifier stored in restart files and reports
    #[serde(default = "default_case_id")]
    pub case_id: String,
    #[serde(default)]
    pub geometry: Option<GeometrySource>,
    #[serde(default)]
    pub flight: FlightCondition,
    #[serde(default)]
    pub reference: ReferenceValues,
    #[serde(default)]
    pub rates: RotationRates,
    #[serde(default)]
    pub symmetry: Option<SymmetryPlane>,
    #[serde(default)]
    pub wake: WakeConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub influence: InfluenceConfig,
    #[serde(default)]
    pub forces: ForceConfig,
    #[serde(default)]
    pub restart: RestartConfig,
    #[serde(default)]
    pub rotors: Vec<RotorDisk>,
}

fn default_case_id() -> String {
    "case".to_string()
}

impl Default for CaseConfig {
    fn default() -> Self {
        Self {
            case_id: default_case_id(),
            geometry: None,
            flight: FlightCondition::default(),
            reference: ReferenceValues::default(),
            rates: RotationRates::default(),
            symmetry: None,
            wake: WakeConfig::default(),
            solver: SolverConfig::default(),
            influence: InfluenceConfig::default(),
            forces: ForceConfig::default(),
            restart: RestartConfig::default(),
            rotors: Vec::new(),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

impl CaseConfig {
    /// Reject values the solver cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.flight;
        if !(0.0..=MAX_MACH).contains(&f.mach) {
            return Err(invalid("flight.mach", format!("{} outside [0, {MAX_MACH}]", f.mach)));
        }
        if !f.velocity.is_finite() || f.velocity < 0.0 {
            return Err(invalid("flight.velocity", "must be finite and non-negative"));
        }
        if !(f.density > 0.0) {
            return Err(invalid("flight.density", "must be positive"));
        }
        if !f.alpha_deg.is_finite() || !f.beta_deg.is_finite() {
            return Err(invalid("flight.alpha_deg", "angles must be finite"));
        }

        let r = &self.reference;
        for (name, value) in [
            ("reference.sref", r.sref),
            ("reference.cref", r.cref),
            ("reference.bref", r.bref),
        ] {
            if !(value > 0.0) {
                return Err(invalid(name, "must be positive"));
            }
        }

        let w = &self.wake;
        if w.trailing_nodes < 2 {
            return Err(invalid("wake.trailing_nodes", "need at least 2 nodes"));
        }
        if !(w.stretch_ratio > 0.0) {
            return Err(invalid("wake.stretch_ratio", "must be positive"));
        }
        if !(w.relaxation > 0.0 && w.relaxation <= 1.0) {
            return Err(invalid("wake.relaxation", "must be in (0, 1]"));
        }
        if let Some(d) = w.far_field_distance {
            if !(d > 0.0) {
                return Err(invalid("wake.far_field_distance", "must be positive"));
            }
        }

        let s = &self.solver;
        if s.multigrid_levels == 0 {
            return Err(invalid("solver.multigrid_levels", "need at least one level"));
        }
        if !(s.smoothing_relaxation > 0.0 && s.smoothing_relaxation < 2.0) {
            return Err(invalid("solver.smoothing_relaxation", "must be in (0, 2)"));
        }
        match s.mode {
            SolverMode::Jacobi { relaxation } => {
                if !(relaxation > 0.0 && relaxation < 2.0) {
                    return Err(invalid("solver.mode.relaxation", "must be in (0, 2)"));
                }
            }
            SolverMode::Gmres {
                restart, max_outer, ..
            } => {
                if restart == 0 || max_outer == 0 {
                    return Err(invalid("solver.mode", "restart and max_outer must be positive"));
                }
            }
        }

        let i = &self.influence;
        if i.leaf_size == 0 {
            return Err(invalid("influence.leaf_size", "must be positive"));
        }
        if i.far_field_ratio != 0.0 && !(i.far_field_ratio > 1.0) {
            return Err(invalid("influence.far_field_ratio", "must be 0 or greater than 1"));
        }
        if !(i.core_ratio >= 0.0) || !(i.negligible_influence >= 0.0) {
            return Err(invalid("influence.core_ratio", "must be non-negative"));
        }

        if let ForceType::Averaged { steps: 0, .. } = self.forces.force_type {
            return Err(invalid("forces.force_type.steps", "must be positive"));
        }
        if let Some(cl) = self.forces.clmax_2d {
            if !(cl > 0.0) {
                return Err(invalid("forces.clmax_2d", "must be positive"));
            }
        }
        for (k, rotor) in self.rotors.iter().enumerate() {
            if !(rotor.radius > 0.0) || rotor.axis.normalize().is_none() {
                return Err(invalid("rotors", format!("rotor {k} needs a radius and an axis")));
            }
        }

        if let Some(plane) = self.symmetry {
            let asymmetric = match plane {
                SymmetryPlane::Y => f.beta_deg != 0.0 || self.rates.p != 0.0 || self.rates.r != 0.0,
                SymmetryPlane::X | SymmetryPlane::Z => false,
            };
            if asymmetric {
                log::warn!(
                    "Symmetry plane {:?} with an asymmetric onset flow; results describe the mirrored pair",
                    plane
                );
            }
        }
        Ok(())
    }

    /// Build the mesh named by `geometry`, resolving files against `base_dir`
    pub fn load_mesh(&self, base_dir: &Path) -> Result<SurfaceMesh, ConfigError> {
        match &self.geometry {
            Some(GeometrySource::File { path }) => Ok(JsonMeshLoader.load_geometry(&base_dir.join(path))?),
            Some(GeometrySource::RectangularWing {
                chord,
                semi_span,
                n_chord,
                n_span,
                full_span,
                cosine_span,
            }) => Ok(crate::core::mesh::rectangular_wing(&WingSpec {
                chord: *chord,
                semi_span: *semi_span,
                n_chord: *n_chord,
                n_span: *n_span,
                full_span: *full_span,
                cosine_span: *cosine_span,
            })),
            None => Err(ConfigError::MissingField("geometry".to_string())),
        }
    }
}

// ============================================================================
// Loading and saving
// ============================================================================

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?;
        match ext.to_lowercase().as_str() {
            "json" => Some(ConfigFormat::Json),
            "toml" => Some(ConfigFormat::Toml),
            _ => None,
        }
    }
}

/// Load and validate a case configuration; format from the extension
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CaseConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let format = ConfigFormat::from_path(path)
        .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;
    let config = parse_config(&content, format)?;
    config.validate()?;
    Ok(config)
}

/// Parse a case configuration from a string
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<CaseConfig, ConfigError> {
    match format {
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
        }
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
        }
    }
}

/// Save a case configuration; format from the extension
pub fn save_config<P: AsRef<Path>>(config: &CaseConfig, path: P) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)
        .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;
    let content = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?,
        ConfigFormat::Toml => {
            toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?
        }
    };
    fs::write(path, content)?;
    Ok(())
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Serialization error
    #[error("Serialize error: {0}")]
    SerializeError(String),

    /// Unknown file extension
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// Required field absent
    #[error("Missing field: {0}")]
    MissingField(String),

    /// Value out of range
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// Geometry could not be built
    #[error(transparent)]
    Mesh(#[from] MeshError),
}
