//! Spanwise load distribution and section lift limiting
//!
//! Each vortex sheet is cut into stations between consecutive trailing-edge
//! nodes. A loaded loop of the sheet's surface belongs to the station whose
//! span interval contains its control point.

use serde::Serialize;

use crate::core::config::{FlightCondition, ReferenceValues};
use crate::core::forces::SurfaceLoads;
use crate::core::model::VortexLatticeModel;
use crate::core::types::{LoopId, Vec3};

/// Loads of one spanwise strip
#[derive(Debug, Clone, Serialize)]
pub struct SpanStation {
    /// Span coordinate of the strip centre along the sheet axis
    pub span: f64,
    pub width: f64,
    pub leading_edge: Vec3,
    pub chord: f64,
    pub area: f64,
    pub force: Vec3,
    pub cl: f64,
    pub cd: f64,
    pub cs: f64,
    /// Pitching moment about the strip quarter chord
    pub cm: f64,
    /// Local chord loading `cl c / cref`
    pub ccl: f64,
    /// Far-wake induced velocity behind the strip
    pub induced_velocity: Vec3,
    /// Induced angle of attack in degrees
    pub induced_angle_deg: f64,
}

/// Stations of one vortex sheet ordered by span coordinate
#[derive(Debug, Clone, Serialize)]
pub struct SpanLoad {
    pub sheet: String,
    pub stations: Vec<SpanStation>,
}

#[derive(Default)]
struct StationAccumulator {
    loops: Vec<usize>,
    force: Vec3,
    area: f64,
    x_min: f64,
    x_max: f64,
    leading_edge: Vec3,
}

/// Span loads of every sheet
pub fn span_loads(
    model: &VortexLatticeModel,
    loads: &SurfaceLoads,
    downwash: &[Vec3],
    flight: &FlightCondition,
    reference: &ReferenceValues,
) -> Vec<SpanLoad> {
    let q = flight.dynamic_pressure();
    let lift = flight.lift_direction();
    let drag = flight.direction();
    let side = flight.side_direction();

    model
        .sheets
        .iter()
        .map(|sheet| {
            let origin = model.lines[sheet.lines[0].index()].points[0];
            let coords: Vec<f64> = sheet
                .lines
                .iter()
                .map(|&l| (model.lines[l.index()].points[0] - origin).dot(&sheet.span_axis))
                .collect();
            let mut acc: Vec<StationAccumulator> = (0..coords.len().saturating_sub(1))
                .map(|_| StationAccumulator {
                    x_min: f64::INFINITY,
                    x_max: f64::NEG_INFINITY,
                    ..Default::default()
                })
                .collect();

            for (i, l) in model.loops.iter().enumerate() {
                if l.surface != sheet.surface || !model.is_loaded(LoopId(i)) {
                    continue;
                }
                let s = (l.control_point - origin).dot(&sheet.span_axis);
                let Some(k) = coords
                    .windows(2)
                    .position(|w| s >= w[0].min(w[1]) && s <= w[0].max(w[1]))
                else {
                    continue;
                };
                let a = &mut acc[k];
                a.loops.push(i);
                a.force += loads.loop_forces[i];
                a.area += l.area;
                for &n in &l.nodes {
                    let p = model.node(n);
                    if p.x < a.x_min {
                        a.x_min = p.x;
                        a.leading_edge = p;
                    }
                    a.x_max = a.x_max.max(p.x);
                }
            }

            let mut stations: Vec<SpanStation> = acc
                .into_iter()
                .enumerate()
                .filter(|(_, a)| !a.loops.is_empty())
                .map(|(k, a)| {
                    let chord = a.x_max - a.x_min;
                    let scale = if q > 0.0 && a.area > 0.0 { 1.0 / (q * a.area) } else { 0.0 };
                    let quarter = a.leading_edge + Vec3::new(0.25 * chord, 0.0, 0.0);
                    let moment: f64 = a
                        .loops
                        .iter()
                        .map(|&i| {
                            (model.loops[i].control_point - quarter)
                                .cross(&loads.loop_forces[i])
                                .dot(&sheet.span_axis)
                        })
                        .sum();
                    let cl = a.force.dot(&lift) * scale;

                    let edge = sheet.te_edges[k];
                    let behind: Vec<Vec3> = model
                        .horseshoes
                        .iter()
                        .zip(downwash)
                        .filter(|(h, _)| h.edge == edge)
                        .map(|(_, w)| *w)
                        .collect();
                    let induced_velocity = if behind.is_empty() {
                        Vec3::zero()
                    } else {
                        behind.iter().copied().sum::<Vec3>() / behind.len() as f64
                    };
                    let induced_angle_deg = if flight.velocity > 0.0 {
                        (-induced_velocity.dot(&lift)).atan2(flight.velocity).to_degrees()
                    } else {
                        0.0
                    };

                    SpanStation {
                        span: 0.5 * (coords[k] + coords[k + 1]),
                        width: (coords[k + 1] - coords[k]).abs(),
                        leading_edge: a.leading_edge,
                        chord,
                        area: a.area,
                        force: a.force,
                        cl,
                        cd: a.force.dot(&drag) * scale,
                        cs: a.force.dot(&side) * scale,
                        cm: if chord > 0.0 { moment * scale / chord } else { 0.0 },
                        ccl: cl * chord / reference.cref,
                        induced_velocity,
                        induced_angle_deg,
                    }
                })
                .collect();
            stations.sort_by(|a, b| a.span.total_cmp(&b.span));

            SpanLoad {
                sheet: sheet.name.clone(),
                stations,
            }
        })
        .collect()
}

/// Outcome of section lift limiting
#[derive(Debug, Clone, Serialize)]
pub struct ClmaxResult {
    /// Total lift coefficient after capping and redistribution
    pub cl: f64,
    /// Largest `atan(cl / 2π)` over stations, in degrees
    pub turning_angle_deg: f64,
    pub capped_stations: usize,
    /// Lift coefficient that found no station with margin
    pub dropped_cl: f64,
    /// Limited section cl per sheet and station
    pub section_cl: Vec<Vec<f64>>,
}

/// Cap section lift at `clmax` and move the excess to stations with margin
pub fn limit_clmax(
    loads: &[SpanLoad],
    clmax: f64,
    reference: &ReferenceValues,
    mirrored: bool,
) -> ClmaxResult {
    let stations: Vec<&SpanStation> = loads.iter().flat_map(|s| s.stations.iter()).collect();
    let mut cl: Vec<f64> = stations.iter().map(|s| s.cl).collect();

    // Lift in units of cl * area
    let mut excess = 0.0;
    let mut capped_stations = 0;
    for (c, s) in cl.iter_mut().zip(&stations) {
        if *c > clmax {
            excess += (*c - clmax) * s.area;
            *c = clmax;
            capped_stations += 1;
        }
    }
    let margin: Vec<f64> = cl
        .iter()
        .zip(&stations)
        .map(|(&c, s)| ((clmax - c) * s.area).max(0.0))
        .collect();
    let total_margin: f64 = margin.iter().sum();
    let placed = excess.min(total_margin);
    if placed > 0.0 {
        for ((c, s), m) in cl.iter_mut().zip(&stations).zip(&margin) {
            if s.area > 0.0 {
                *c += placed * m / total_margin / s.area;
            }
        }
    }
    let dropped = excess - placed;
    if dropped > 0.0 {
        log::info!("CLmax limiting dropped lift on {} capped stations", capped_stations);
    }

    let factor = if mirrored { 2.0 } else { 1.0 };
    let sref = if reference.sref > 0.0 { reference.sref } else { 1.0 };
    let lift: f64 = cl.iter().zip(&stations).map(|(&c, s)| c * s.area).sum();
    let turning_angle_deg = cl
        .iter()
        .map(|&c| (c / (2.0 * std::f64::consts::PI)).atan().to_degrees())
        .fold(0.0, f64::max);

    let mut section_cl = Vec::with_capacity(loads.len());
    let mut k = 0;
    for load in loads {
        section_cl.push(cl[k..k + load.stations.len()].to_vec());
        k += load.stations.len();
    }

    ClmaxResult {
        cl: factor * lift / sref,
        turning_angle_deg,
        capped_stations,
        dropped_cl: factor * dropped / sref,
        section_cl,
    }
}
