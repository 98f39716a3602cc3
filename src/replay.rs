//! Sensor replay from JSON lines.
//!
//! Each line is one frame: an object mapping node paths to attribute
//! objects.
//!
//! ```text
//! {"/sensors/imu": {"timestamp": 12.34, "p_rad_sec": 0.01}, "/task": {"is_airborne": true}}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use crate::bus::PropertyTree;
use crate::config::import_json_value;
use crate::error::{FlightError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

pub struct ReplayReader<R: BufRead> {
    reader: R,
    line: String,
    line_no: usize,
    frames: usize,
}

impl ReplayReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            FlightError::Config(format!("Failed to open replay file {:?}: {}", path, e))
        })?;
        debug!("replaying {:?}", path);
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> ReplayReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            line_no: 0,
            frames: 0,
        }
    }

    /// Frames applied so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Read the next frame and write it onto the bus.
    ///
    /// Returns `Ok(false)` at end of input.
    pub fn apply_next(&mut self, tree: &mut PropertyTree) -> Result<bool> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(false);
            }
            self.line_no += 1;
            let text = self.line.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            let frame: serde_json::Value = serde_json::from_str(text).map_err(|e| {
                FlightError::Config(format!("replay line {}: {}", self.line_no, e))
            })?;
            let serde_json::Value::Object(nodes) = frame else {
                return Err(FlightError::Config(format!(
                    "replay line {}: frame is not an object",
                    self.line_no
                )));
            };
            for (path, attrs) in &nodes {
                let node = tree.node(path)?;
                import_json_value(tree, node, attrs)
                    .map_err(|e| e.with_context(format!("replay line {}", self.line_no)))?;
            }
            self.frames += 1;
            return Ok(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;

    const LOG: &str = r#"
# two frames
{"/sensors/imu": {"timestamp": 0.02, "q_rad_sec": 0.1}, "/task": {"is_airborne": false}}

{"/sensors/imu": {"timestamp": 0.04}}
"#;

    #[test]
    fn test_frames_applied_in_order() {
        let mut tree = PropertyTree::new();
        let mut replay = ReplayReader::new(Cursor::new(LOG));

        assert!(replay.apply_next(&mut tree).unwrap());
        assert_eq!(tree.get_f64_at("/sensors/imu", "timestamp"), 0.02);
        assert_eq!(tree.get_f64_at("/sensors/imu", "q_rad_sec"), 0.1);
        assert!(!tree.get_bool_at("/task", "is_airborne"));

        assert!(replay.apply_next(&mut tree).unwrap());
        assert_eq!(tree.get_f64_at("/sensors/imu", "timestamp"), 0.04);
        // untouched attributes keep their last value
        assert_eq!(tree.get_f64_at("/sensors/imu", "q_rad_sec"), 0.1);

        assert!(!replay.apply_next(&mut tree).unwrap());
        assert_eq!(replay.frames(), 2);
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let mut tree = PropertyTree::new();
        let mut replay = ReplayReader::new(Cursor::new("{\"/a\": {\"x\": 1}}\n[1, 2]\n"));
        assert!(replay.apply_next(&mut tree).unwrap());
        let err = replay.apply_next(&mut tree).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_open_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"/sensors/gps\": {{\"vn_ms\": 3.5}}}}").unwrap();
        let mut tree = PropertyTree::new();
        let mut replay = ReplayReader::open(file.path()).unwrap();
        assert!(replay.apply_next(&mut tree).unwrap());
        assert_eq!(tree.get_f64_at("/sensors/gps", "vn_ms"), 3.5);
    }

    #[test]
    fn test_missing_file() {
        assert!(ReplayReader::open("/nonexistent/replay.jsonl").is_err());
    }
}
