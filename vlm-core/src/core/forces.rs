//! Force and moment recovery from a converged circulation field
//!
//! Three estimates are produced side by side:
//!
//! - **Kutta-Joukowski**: `ρ Γ (V × l)` on every bound edge, with the local
//!   velocity at the edge midpoint. Each loop takes half the force of a
//!   shared edge and the whole force of a boundary edge.
//! - **Pressure integration**: `ΔCp q A n` per loop, ΔCp being the loop
//!   force along its normal.
//! - **Trefftz plane**: trailing-line tails projected onto the plane normal
//!   to the free stream act as 2-D point vortices; each horseshoe's bound
//!   segment feels `V_inf + w/2`.
//!
//! With a mirror plane (x or y) the totals stand for the whole body: forces
//! in the plane and the moment about its normal are doubled, the rest are
//! zero. The ground plane (z) only contributes its image to the induced
//! velocity.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use vortex_lattice_solvers::parallel::parallel_map_indexed;

use crate::core::assembly::VelocityField;
use crate::core::biot_savart::point_vortex_2d;
use crate::core::config::{CaseConfig, FlightCondition, ForceMethod, ReferenceValues};
use crate::core::constants::schlichting_skin_friction;
use crate::core::model::VortexLatticeModel;
use crate::core::onset::OnsetFlow;
use crate::core::span_load::{ClmaxResult, SpanLoad, limit_clmax, span_loads};
use crate::core::types::{LoopId, SymmetryPlane, Vec3};

/// Non-dimensional force and moment set
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ForceCoefficients {
    pub cfx: f64,
    pub cfy: f64,
    pub cfz: f64,
    pub cl: f64,
    pub cd: f64,
    pub cs: f64,
    pub cmx: f64,
    pub cmy: f64,
    pub cmz: f64,
}

impl ForceCoefficients {
    /// Normalise body-axis totals; zero dynamic pressure gives zero
    pub fn from_totals(totals: &LoadTotals, flight: &FlightCondition, reference: &ReferenceValues) -> Self {
        let qs = flight.dynamic_pressure() * reference.sref;
        if qs <= 0.0 {
            return Self::default();
        }
        let f = totals.force / qs;
        let m = totals.moment / qs;
        Self {
            cfx: f.x,
            cfy: f.y,
            cfz: f.z,
            cl: f.dot(&flight.lift_direction()),
            cd: f.dot(&flight.direction()),
            cs: f.dot(&flight.side_direction()),
            cmx: m.x / reference.bref,
            cmy: m.y / reference.cref,
            cmz: m.z / reference.bref,
        }
    }

    fn to_array(self) -> [f64; 9] {
        [
            self.cfx, self.cfy, self.cfz, self.cl, self.cd, self.cs, self.cmx, self.cmy, self.cmz,
        ]
    }

    fn from_array(a: [f64; 9]) -> Self {
        Self {
            cfx: a[0],
            cfy: a[1],
            cfz: a[2],
            cl: a[3],
            cd: a[4],
            cs: a[5],
            cmx: a[6],
            cmy: a[7],
            cmz: a[8],
        }
    }
}

/// Running mean over the last `capacity` coefficient sets
#[derive(Debug, Clone)]
pub struct CoefficientWindow {
    capacity: usize,
    values: VecDeque<ForceCoefficients>,
}

impl CoefficientWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            values: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn push(&mut self, c: ForceCoefficients) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(c);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> ForceCoefficients {
        if self.values.is_empty() {
            return ForceCoefficients::default();
        }
        let mut sum = [0.0; 9];
        for c in &self.values {
            for (s, v) in sum.iter_mut().zip(c.to_array()) {
                *s += v;
            }
        }
        let n = self.values.len() as f64;
        ForceCoefficients::from_array(sum.map(|s| s / n))
    }
}

/// Dimensional force and moment about the reference point
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadTotals {
    pub force: Vec3,
    pub moment: Vec3,
}

impl LoadTotals {
    /// Whole-body totals from the modelled half
    pub fn mirrored(self, symmetry: Option<SymmetryPlane>) -> Self {
        match symmetry {
            Some(plane @ (SymmetryPlane::X | SymmetryPlane::Y)) => {
                let axis = plane.axis();
                Self {
                    force: (self.force * 2.0).with_component(axis, 0.0),
                    moment: Vec3::zero().with_component(axis, 2.0 * self.moment.component(axis)),
                }
            }
            _ => self,
        }
    }
}

/// Per-edge and per-loop results of the Kutta-Joukowski pass
#[derive(Debug, Clone)]
pub struct SurfaceLoads {
    pub edge_forces: Vec<Vec3>,
    pub loop_forces: Vec<Vec3>,
    /// Moment of each loop's edge forces about the reference point
    pub loop_moments: Vec<Vec3>,
    /// Total velocity at each control point
    pub loop_velocity: Vec<Vec3>,
    pub cp: Vec<f64>,
    pub delta_cp: Vec<f64>,
}

/// Kutta-Joukowski edge forces and the derived loop loads
pub fn surface_loads(
    model: &VortexLatticeModel,
    onset: &OnsetFlow,
    field: &VelocityField<'_>,
    flight: &FlightCondition,
) -> SurfaceLoads {
    let rho = flight.density;
    let q = flight.dynamic_pressure();
    let v_inf_sqr = flight.velocity * flight.velocity;

    let edge_forces: Vec<Vec3> = parallel_map_indexed(model.edges.len(), |e| {
        let edge = &model.edges[e];
        if edge.on_symmetry_plane || edge.strength == 0.0 || edge.length == 0.0 {
            return Vec3::zero();
        }
        let v = onset.total_at(model, edge.midpoint) + field.induced(edge.midpoint);
        let f = v.cross(&(edge.direction * edge.length)) * (rho * edge.strength);
        if f.is_finite() {
            f
        } else {
            log::warn!("Non-finite force on edge {} ignored", e);
            Vec3::zero()
        }
    });

    let per_loop: Vec<(Vec3, Vec3, Vec3)> = parallel_map_indexed(model.num_loops(), |i| {
        let l = &model.loops[i];
        let mut force = Vec3::zero();
        let mut moment = Vec3::zero();
        for &(e, _) in &l.edges {
            let edge = &model.edges[e.index()];
            let share = if edge.loops.len() == 1 { 1.0 } else { 0.5 };
            let f = edge_forces[e.index()] * share;
            force += f;
            moment += (edge.midpoint - onset.cg).cross(&f);
        }
        let velocity = onset.total_at(model, l.control_point)
            + l.onset_correction
            + field.induced(l.control_point);
        (force, moment, velocity)
    });

    let mut loop_forces = Vec::with_capacity(per_loop.len());
    let mut loop_moments = Vec::with_capacity(per_loop.len());
    let mut loop_velocity = Vec::with_capacity(per_loop.len());
    let mut cp = Vec::with_capacity(per_loop.len());
    let mut delta_cp = Vec::with_capacity(per_loop.len());
    for (l, (force, moment, velocity)) in model.loops.iter().zip(per_loop) {
        cp.push(if v_inf_sqr > 0.0 {
            1.0 - velocity.length_sqr() / v_inf_sqr
        } else {
            0.0
        });
        delta_cp.push(if q > 0.0 && l.area > 0.0 {
            force.dot(&l.normal) / (q * l.area)
        } else {
            0.0
        });
        loop_forces.push(force);
        loop_moments.push(moment);
        loop_velocity.push(velocity);
    }

    SurfaceLoads {
        edge_forces,
        loop_forces,
        loop_moments,
        loop_velocity,
        cp,
        delta_cp,
    }
}

/// Store the loop results in the model
pub fn apply_surface_loads(model: &mut VortexLatticeModel, loads: &SurfaceLoads) {
    for (i, l) in model.loops.iter_mut().enumerate() {
        l.velocity = loads.loop_velocity[i];
        l.cp = loads.cp[i];
        l.delta_cp = loads.delta_cp[i];
        l.cp_upper = l.cp - 0.5 * l.delta_cp;
        l.cp_lower = l.cp + 0.5 * l.delta_cp;
    }
}

fn loaded(model: &VortexLatticeModel) -> impl Iterator<Item = usize> + '_ {
    (0..model.num_loops()).filter(move |&i| model.is_loaded(LoopId(i)))
}

/// Kutta-Joukowski totals over loaded loops
pub fn kutta_joukowski_totals(model: &VortexLatticeModel, loads: &SurfaceLoads) -> LoadTotals {
    let mut totals = LoadTotals::default();
    for i in loaded(model) {
        totals.force += loads.loop_forces[i];
        totals.moment += loads.loop_moments[i];
    }
    totals
}

/// Pressure-integration totals over loaded loops
pub fn pressure_totals(
    model: &VortexLatticeModel,
    loads: &SurfaceLoads,
    flight: &FlightCondition,
    cg: Vec3,
) -> LoadTotals {
    let q = flight.dynamic_pressure();
    let mut totals = LoadTotals::default();
    for i in loaded(model) {
        let l = &model.loops[i];
        let f = l.normal * (loads.delta_cp[i] * q * l.area);
        totals.force += f;
        totals.moment += (l.control_point - cg).cross(&f);
    }
    totals
}

/// Trefftz-plane totals and the far-wake induced velocity per horseshoe
#[derive(Debug, Clone)]
pub struct TrefftzResult {
    pub totals: LoadTotals,
    /// Induced velocity at the projected midpoint of each horseshoe
    pub downwash: Vec<Vec3>,
}

/// Far-wake analysis on the plane normal to the free stream
pub fn trefftz_plane(model: &VortexLatticeModel, flight: &FlightCondition, cg: Vec3, core: f64) -> TrefftzResult {
    let d = flight.direction();
    let project = |p: Vec3| p - d * d.dot(&p);
    let tails: Vec<Vec3> = model
        .lines
        .iter()
        .map(|l| project(l.points.last().copied().unwrap_or_default()))
        .collect();

    let induced = |x: Vec3| -> Vec3 {
        let direct = |q: Vec3| -> Vec3 {
            model
                .lines
                .iter()
                .zip(&tails)
                .map(|(l, &t)| point_vortex_2d(q, t, d, core) * l.strength)
                .sum()
        };
        match model.symmetry {
            Some(plane) => direct(x) + plane.reflect(direct(plane.reflect(x))),
            None => direct(x),
        }
    };

    let downwash: Vec<Vec3> = parallel_map_indexed(model.horseshoes.len(), |h| {
        let hs = &model.horseshoes[h];
        let a = tails[hs.line_a.index()];
        let b = tails[hs.line_b.index()];
        induced((a + b) * 0.5)
    });

    let rho = flight.density;
    let v_inf = d * flight.velocity;
    let mut totals = LoadTotals::default();
    for (hs, w) in model.horseshoes.iter().zip(&downwash) {
        if !model.is_loaded(hs.owner) {
            continue;
        }
        let gamma = model.loops[hs.owner.index()].circulation;
        let bound = tails[hs.line_a.index()] - tails[hs.line_b.index()];
        let f = (v_inf + *w * 0.5).cross(&bound) * (rho * gamma);
        totals.force += f;
        totals.moment += (model.edges[hs.edge.index()].midpoint - cg).cross(&f);
    }
    TrefftzResult { totals, downwash }
}

/// Everything the integrator reports for one solution
#[derive(Debug, Clone, Serialize)]
pub struct ForceReport {
    pub kutta_joukowski: ForceCoefficients,
    pub pressure: ForceCoefficients,
    pub trefftz: ForceCoefficients,
    /// Coefficients of the configured method, before averaging
    pub selected: ForceCoefficients,
    /// Zero-lift drag from flat-plate skin friction
    pub cdo: f64,
    pub cp_min: f64,
    pub cp_max: f64,
    /// Largest local dynamic pressure over the free-stream value
    pub q_max: f64,
    pub span_loads: Vec<SpanLoad>,
    pub clmax: Option<ClmaxResult>,
}

impl ForceReport {
    /// Integrate every estimate; `loads` must come from [`surface_loads`]
    /// on the same circulation
    pub fn build(
        model: &VortexLatticeModel,
        loads: &SurfaceLoads,
        trefftz: &TrefftzResult,
        config: &CaseConfig,
    ) -> Self {
        let flight = &config.flight;
        let reference = &config.reference;
        let cg = reference.cg;
        let coefficients = |t: LoadTotals| {
            ForceCoefficients::from_totals(&t.mirrored(model.symmetry), flight, reference)
        };
        let kutta_joukowski = coefficients(kutta_joukowski_totals(model, loads));
        let pressure = coefficients(pressure_totals(model, loads, flight, cg));
        let trefftz_coefficients = coefficients(trefftz.totals);
        let selected = match config.forces.force_type.method() {
            ForceMethod::KuttaJoukowski => kutta_joukowski,
            ForceMethod::PressureIntegration => pressure,
            ForceMethod::Trefftz => trefftz_coefficients,
        };

        let mirrored = matches!(model.symmetry, Some(SymmetryPlane::X | SymmetryPlane::Y));
        let wetted = model.wetted_area() * if mirrored { 2.0 } else { 1.0 };
        let cdo = if reference.sref > 0.0 {
            schlichting_skin_friction(flight.reynolds) * wetted / reference.sref
        } else {
            0.0
        };

        let mut cp_min = f64::INFINITY;
        let mut cp_max = f64::NEG_INFINITY;
        let mut q_max = 0.0_f64;
        let v_inf_sqr = flight.velocity * flight.velocity;
        for i in loaded(model) {
            let upper = loads.cp[i] - 0.5 * loads.delta_cp[i];
            let lower = loads.cp[i] + 0.5 * loads.delta_cp[i];
            cp_min = cp_min.min(upper.min(lower));
            cp_max = cp_max.max(upper.max(lower));
            if v_inf_sqr > 0.0 {
                q_max = q_max.max(loads.loop_velocity[i].length_sqr() / v_inf_sqr);
            }
        }
        if !cp_min.is_finite() {
            cp_min = 0.0;
            cp_max = 0.0;
        }

        let span = span_loads(model, loads, &trefftz.downwash, flight, reference);
        let clmax = config
            .forces
            .clmax_2d
            .map(|limit| limit_clmax(&span, limit, reference, mirrored));

        Self {
            kutta_joukowski,
            pressure,
            trefftz: trefftz_coefficients,
            selected,
            cdo,
            cp_min,
            cp_max,
            q_max,
            span_loads: span,
            clmax,
        }
    }
}
