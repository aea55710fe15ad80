//! Load tables for structural coupling
//!
//! Two fixed-width text tables:
//! - span loads: one block per vortex sheet, one row per strip
//! - panel loads: one row per loop with its control point, normal, area,
//!   pressure coefficients and the pressure force `ΔCp q A n`

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::core::error::Result;
use crate::core::io::status::CaseHeader;
use crate::core::model::VortexLatticeModel;
use crate::core::span_load::SpanLoad;

fn write_case_line<W: Write>(writer: &mut W, header: &CaseHeader) -> std::io::Result<()> {
    writeln!(
        writer,
        "# case {}  Mach {:.4}  AoA {:.4}  Beta {:.4}  Sref {:.6}  Cref {:.6}  Bref {:.6}",
        header.case_id, header.mach, header.alpha_deg, header.beta_deg, header.sref, header.cref, header.bref
    )
}

/// Span load blocks, one per sheet
pub fn write_span_loads<W: Write>(writer: &mut W, header: &CaseHeader, loads: &[SpanLoad]) -> std::io::Result<()> {
    write_case_line(writer, header)?;
    for load in loads {
        writeln!(writer, "# sheet {} ({} stations)", load.sheet, load.stations.len())?;
        writeln!(
            writer,
            "{:>5} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>10}",
            "strip", "span", "chord", "area", "cl", "cd", "cs", "cm", "ccl/cref", "Fz", "alpha_i"
        )?;
        for (k, s) in load.stations.iter().enumerate() {
            writeln!(
                writer,
                "{:>5} {:>12.6} {:>12.6} {:>12.6} {:>12.8} {:>12.8} {:>12.8} {:>12.8} {:>12.8} {:>12.6e} {:>10.4}",
                k + 1,
                s.span,
                s.chord,
                s.area,
                s.cl,
                s.cd,
                s.cs,
                s.cm,
                s.ccl,
                s.force.z,
                s.induced_angle_deg
            )?;
        }
    }
    Ok(())
}

/// Per-loop pressure loads at the control points
pub fn write_panel_loads<W: Write>(
    writer: &mut W,
    header: &CaseHeader,
    model: &VortexLatticeModel,
    dynamic_pressure: f64,
) -> std::io::Result<()> {
    write_case_line(writer, header)?;
    writeln!(writer, "# {} loops, q = {:.6e}", model.num_loops(), dynamic_pressure)?;
    writeln!(
        writer,
        "{:>6} {:>4} {:>13} {:>13} {:>13} {:>10} {:>10} {:>10} {:>12} {:>13} {:>12} {:>12} {:>13} {:>13} {:>13}",
        "loop", "surf", "x", "y", "z", "nx", "ny", "nz", "area", "gamma", "cp", "dcp", "Fx", "Fy", "Fz"
    )?;
    for (i, l) in model.loops.iter().enumerate() {
        let force = l.normal * (l.delta_cp * dynamic_pressure * l.area);
        let p = l.control_point;
        writeln!(
            writer,
            "{:>6} {:>4} {:>13.6e} {:>13.6e} {:>13.6e} {:>10.6} {:>10.6} {:>10.6} {:>12.6e} {:>13.6e} {:>12.6} {:>12.6} {:>13.6e} {:>13.6e} {:>13.6e}",
            i,
            l.surface,
            p.x,
            p.y,
            p.z,
            l.normal.x,
            l.normal.y,
            l.normal.z,
            l.area,
            l.circulation,
            l.cp,
            l.delta_cp,
            force.x,
            force.y,
            force.z
        )?;
    }
    Ok(())
}

pub fn save_span_loads<P: AsRef<Path>>(path: P, header: &CaseHeader, loads: &[SpanLoad]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    write_span_loads(&mut writer, header, loads)?;
    writer.flush()?;
    log::info!("Saved span loads to {}", path.as_ref().display());
    Ok(())
}

pub fn save_panel_loads<P: AsRef<Path>>(
    path: P,
    header: &CaseHeader,
    model: &VortexLatticeModel,
    dynamic_pressure: f64,
) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    write_panel_loads(&mut writer, header, model, dynamic_pressure)?;
    writer.flush()?;
    log::info!("Saved panel loads to {}", path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CaseConfig;
    use crate::core::mesh::{WingSpec, rectangular_wing};
    use crate::core::span_load::SpanStation;
    use crate::core::types::{SymmetryPlane, Vec3};
    use approx::assert_relative_eq;

    fn station(span: f64, cl: f64) -> SpanStation {
        SpanStation {
            span,
            width: 0.25,
            leading_edge: Vec3::new(0.0, span, 0.0),
            chord: 1.0,
            area: 0.25,
            force: Vec3::new(0.0, 0.0, 0.5 * cl),
            cl,
            cd: 0.01,
            cs: 0.0,
            cm: -0.02,
            ccl: cl,
            induced_velocity: Vec3::zero(),
            induced_angle_deg: -1.5,
        }
    }

    #[test]
    fn test_span_load_table() {
        let header = CaseHeader::from_config(&CaseConfig::default());
        let loads = vec![SpanLoad {
            sheet: "wing".into(),
            stations: vec![station(0.125, 0.42), station(0.375, 0.31)],
        }];
        let mut out = Vec::new();
        write_span_loads(&mut out, &header, &loads).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[1].starts_with("# sheet wing (2 stations)"));
        assert!(lines[3].contains("0.42000000"));
        assert!(lines[4].trim_start().starts_with('2'));
    }

    #[test]
    fn test_panel_forces_follow_loading() {
        let mesh = rectangular_wing(&WingSpec {
            n_chord: 2,
            n_span: 2,
            ..Default::default()
        });
        let mut model = VortexLatticeModel::from_mesh(&mesh, Some(SymmetryPlane::Y), Vec::new()).unwrap();
        for l in &mut model.loops {
            l.delta_cp = 2.0;
        }
        let header = CaseHeader::from_config(&CaseConfig::default());
        let mut out = Vec::new();
        write_panel_loads(&mut out, &header, &model, 3.0).unwrap();
        let text = String::from_utf8(out).unwrap();
        let rows: Vec<&str> = text.lines().skip(3).collect();
        assert_eq!(rows.len(), 4);

        // Flat plate, normals +z: Fz = dcp q A on every row
        let total: f64 = rows
            .iter()
            .map(|r| r.split_whitespace().last().unwrap().parse::<f64>().unwrap())
            .sum();
        let area: f64 = model.loops.iter().map(|l| l.area).sum();
        assert_relative_eq!(total, 2.0 * 3.0 * area, max_relative = 1e-6);
    }
}
