//! Binary restart file
//!
//! ## Layout (little-endian)
//!
//! ```text
//! magic          8 bytes  "VLMRST01"
//! case id        u32 length + UTF-8 bytes
//! loops          u64 count, then f64 circulation per loop
//! lines          u64 count, then per line: u64 node count, 3 x f64 per node
//! wake iteration u64
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::core::types::Vec3;

/// File signature
pub const RESTART_MAGIC: &[u8; 8] = b"VLMRST01";

/// Counts above this are treated as corruption rather than allocated
const MAX_RECORDS: u64 = 1 << 32;

/// Restart problems, all fatal
#[derive(Error, Debug)]
pub enum RestartError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a restart file (bad magic)")]
    BadMagic,

    #[error("Restart file belongs to case '{found}', expected '{expected}'")]
    CaseId { expected: String, found: String },

    #[error("Restart file has {found} {what}, the model has {expected}")]
    Mismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Corrupt restart file: {0}")]
    Corrupt(String),
}

/// Persisted solver state
#[derive(Debug, Clone, PartialEq)]
pub struct RestartData {
    pub case_id: String,
    pub circulation: Vec<f64>,
    /// Node positions per trailing line
    pub wake: Vec<Vec<Vec3>>,
    /// Relaxation cycles already performed
    pub wake_iteration: usize,
}

impl RestartData {
    /// Check the record against the running case
    pub fn check(&self, case_id: &str, num_loops: usize, num_lines: usize) -> Result<(), RestartError> {
        if self.case_id != case_id {
            return Err(RestartError::CaseId {
                expected: case_id.to_string(),
                found: self.case_id.clone(),
            });
        }
        if self.circulation.len() != num_loops {
            return Err(RestartError::Mismatch {
                what: "loops",
                expected: num_loops,
                found: self.circulation.len(),
            });
        }
        if self.wake.len() != num_lines {
            return Err(RestartError::Mismatch {
                what: "trailing lines",
                expected: num_lines,
                found: self.wake.len(),
            });
        }
        if let Some(k) = self.circulation.iter().position(|g| !g.is_finite()) {
            return Err(RestartError::Corrupt(format!(
                "circulation of loop {} is {}",
                k, self.circulation[k]
            )));
        }
        if let Some(l) = self.wake.iter().position(|line| line.iter().any(|p| !p.is_finite())) {
            return Err(RestartError::Corrupt(format!("trailing line {} has a non-finite node", l)));
        }
        Ok(())
    }
}

/// Serialize a restart record
pub fn write_restart<W: Write>(writer: &mut W, data: &RestartData) -> Result<(), RestartError> {
    writer.write_all(RESTART_MAGIC)?;
    let id = data.case_id.as_bytes();
    writer.write_u32::<LittleEndian>(id.len() as u32)?;
    writer.write_all(id)?;

    writer.write_u64::<LittleEndian>(data.circulation.len() as u64)?;
    for &g in &data.circulation {
        writer.write_f64::<LittleEndian>(g)?;
    }

    writer.write_u64::<LittleEndian>(data.wake.len() as u64)?;
    for line in &data.wake {
        writer.write_u64::<LittleEndian>(line.len() as u64)?;
        for p in line {
            writer.write_f64::<LittleEndian>(p.x)?;
            writer.write_f64::<LittleEndian>(p.y)?;
            writer.write_f64::<LittleEndian>(p.z)?;
        }
    }
    writer.write_u64::<LittleEndian>(data.wake_iteration as u64)?;
    Ok(())
}

fn read_count<R: Read>(reader: &mut R, what: &str) -> Result<usize, RestartError> {
    let n = reader.read_u64::<LittleEndian>()?;
    if n > MAX_RECORDS {
        return Err(RestartError::Corrupt(format!("{} count {} is implausible", what, n)));
    }
    Ok(n as usize)
}

/// Deserialize a restart record
pub fn read_restart<R: Read>(reader: &mut R) -> Result<RestartData, RestartError> {
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if &magic != RESTART_MAGIC {
        return Err(RestartError::BadMagic);
    }

    let id_len = reader.read_u32::<LittleEndian>()? as usize;
    let mut id = vec![0u8; id_len];
    reader.read_exact(&mut id)?;
    let case_id = String::from_utf8(id).map_err(|e| RestartError::Corrupt(e.to_string()))?;

    let num_loops = read_count(reader, "loop")?;
    let mut circulation = Vec::with_capacity(num_loops.min(1 << 20));
    for _ in 0..num_loops {
        circulation.push(reader.read_f64::<LittleEndian>()?);
    }

    let num_lines = read_count(reader, "line")?;
    let mut wake = Vec::with_capacity(num_lines.min(1 << 20));
    for _ in 0..num_lines {
        let n = read_count(reader, "wake node")?;
        let mut line = Vec::with_capacity(n.min(1 << 20));
        for _ in 0..n {
            let x = reader.read_f64::<LittleEndian>()?;
            let y = reader.read_f64::<LittleEndian>()?;
            let z = reader.read_f64::<LittleEndian>()?;
            line.push(Vec3::new(x, y, z));
        }
        wake.push(line);
    }
    let wake_iteration = reader.read_u64::<LittleEndian>()? as usize;

    Ok(RestartData {
        case_id,
        circulation,
        wake,
        wake_iteration,
    })
}

/// Write a restart file
pub fn save_restart<P: AsRef<Path>>(path: P, data: &RestartData) -> Result<(), RestartError> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    write_restart(&mut writer, data)?;
    writer.flush()?;
    log::info!("Saved restart file {}", path.as_ref().display());
    Ok(())
}

/// Read a restart file
pub fn load_restart<P: AsRef<Path>>(path: P) -> Result<RestartData, RestartError> {
    let mut reader = BufReader::new(File::open(path.as_ref())?);
    let data = read_restart(&mut reader)?;
    log::info!(
        "Loaded restart file {} (case '{}', {} loops, {} lines)",
        path.as_ref().display(),
        data.case_id,
        data.circulation.len(),
        data.wake.len()
    );
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> RestartData {
        RestartData {
            case_id: "wing".into(),
            circulation: vec![-0.1, 0.25, 1.0 / 3.0],
            wake: vec![
                vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.1)],
                vec![Vec3::new(1.0, 0.5, 0.0), Vec3::new(2.5, 0.5, -0.1), Vec3::new(4.0, 0.5, 0.0)],
            ],
            wake_iteration: 3,
        }
    }

    #[test]
    fn test_roundtrip_is_exact() {
        let data = sample();
        let mut buf = Vec::new();
        write_restart(&mut buf, &data).unwrap();
        assert_eq!(&buf[..8], RESTART_MAGIC);
        let back = read_restart(&mut Cursor::new(buf)).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_bad_magic() {
        let mut buf = Vec::new();
        write_restart(&mut buf, &sample()).unwrap();
        buf[0] = b'X';
        assert!(matches!(
            read_restart(&mut Cursor::new(buf)),
            Err(RestartError::BadMagic)
        ));
    }

    #[test]
    fn test_truncated_file() {
        let mut buf = Vec::new();
        write_restart(&mut buf, &sample()).unwrap();
        buf.truncate(buf.len() - 5);
        assert!(matches!(read_restart(&mut Cursor::new(buf)), Err(RestartError::Io(_))));
    }

    #[test]
    fn test_check() {
        let data = sample();
        assert!(data.check("wing", 3, 2).is_ok());
        assert!(matches!(data.check("tail", 3, 2), Err(RestartError::CaseId { .. })));
        assert!(matches!(
            data.check("wing", 4, 2),
            Err(RestartError::Mismatch { what: "loops", .. })
        ));
        assert!(matches!(
            data.check("wing", 3, 1),
            Err(RestartError::Mismatch { what: "trailing lines", .. })
        ));
    }

    #[test]
    fn test_check_rejects_non_finite_values() {
        let mut data = sample();
        data.circulation[1] = f64::NAN;
        assert!(matches!(data.check("wing", 3, 2), Err(RestartError::Corrupt(_))));

        let mut data = sample();
        data.circulation[2] = f64::INFINITY;
        assert!(matches!(data.check("wing", 3, 2), Err(RestartError::Corrupt(_))));

        let mut data = sample();
        data.wake[1][2].z = f64::NAN;
        assert!(matches!(data.check("wing", 3, 2), Err(RestartError::Corrupt(_))));
    }
}
