//! Master switch and flight-mode handling.
//!
//! Runs ahead of the pipeline each tick. A mode change while engaged
//! rewrites `/autopilot/locks`, which is what component enable gates test.

use crate::bus::{PropId, PropertyTree};
use crate::error::PathError;
use crate::telemetry::Telemetry;

/// Attitude limits applied to the hold targets when entering `cas`.
const CAS_ROLL_LIMIT_DEG: f64 = 45.0;
const CAS_PITCH_LIMIT_DEG: f64 = 15.0;

/// Lock values for `roll`, `yaw`, `altitude`, `speed`, `pitch`.
type LockRow = [&'static str; 5];

const LOCK_NAMES: [&str; 5] = ["roll", "yaw", "altitude", "speed", "pitch"];
const ALL_CLEAR: LockRow = ["", "", "", "", ""];

/// Lock settings for a named mode, `None` for modes we do not know.
pub fn lock_table(mode: &str) -> Option<LockRow> {
    let row = match mode {
        "inactive" => ALL_CLEAR,
        "basic" => ["aileron", "autocoord", "", "", "elevator"],
        "roll" => ["aileron", "", "", "", ""],
        "roll+pitch" => ["aileron", "", "", "", "elevator"],
        "basic+alt+speed" => ["aileron", "autocoord", "throttle", "pitch", "elevator"],
        "cas" => ["aileron", "", "", "", "elevator"],
        _ => return None,
    };
    Some(row)
}

#[derive(Debug, Clone)]
struct ModeProps {
    master_switch: PropId,
    mode: PropId,
    locks: [PropId; 5],
    pointing_lock: PropId,
    lookat_mode: PropId,
    vector: [PropId; 3],
    roll_deg: PropId,
    pitch_deg: PropId,
    target_roll_deg: PropId,
    target_pitch_base_deg: PropId,
}

#[derive(Debug, Clone)]
pub struct FlightModes {
    props: ModeProps,
    last_master: bool,
    last_mode: String,
}

impl FlightModes {
    pub fn bind(tree: &mut PropertyTree) -> Result<Self, PathError> {
        let locks = tree.node("/autopilot/locks")?;
        let vector = tree.node("/pointing/vector")?;
        let props = ModeProps {
            master_switch: tree.resolve("/autopilot/master_switch")?,
            mode: tree.resolve("/autopilot/mode")?,
            locks: [
                tree.prop(locks, LOCK_NAMES[0])?,
                tree.prop(locks, LOCK_NAMES[1])?,
                tree.prop(locks, LOCK_NAMES[2])?,
                tree.prop(locks, LOCK_NAMES[3])?,
                tree.prop(locks, LOCK_NAMES[4])?,
            ],
            pointing_lock: tree.prop(locks, "pointing")?,
            lookat_mode: tree.resolve("/pointing/lookat_mode")?,
            vector: [
                tree.prop(vector, "north")?,
                tree.prop(vector, "east")?,
                tree.prop(vector, "down")?,
            ],
            roll_deg: tree.resolve("/orientation/roll_deg")?,
            pitch_deg: tree.resolve("/orientation/pitch_deg")?,
            target_roll_deg: tree.resolve("/autopilot/targets/roll_deg")?,
            target_pitch_base_deg: tree.resolve("/autopilot/targets/target_pitch_base_deg")?,
        };
        Ok(Self {
            props,
            last_master: false,
            last_mode: String::new(),
        })
    }

    pub fn engaged(&self) -> bool {
        self.last_master
    }

    /// Mode last acted on while engaged, empty when disengaged.
    pub fn mode(&self) -> &str {
        &self.last_mode
    }

    pub fn update(&mut self, tree: &mut PropertyTree, telemetry: &mut Telemetry) {
        let p = &self.props;
        let master = tree.get_bool(p.master_switch);
        if master != self.last_master {
            let state = if master { "autopilot" } else { "manual flight" };
            telemetry.event("control", &format!("master switch = {}", state));
            self.last_master = master;
        }

        let mode = tree.get_string(p.mode);
        if master {
            if mode != self.last_mode {
                telemetry.event("control", &format!("mode change = {}", mode));
                self.enter_mode(tree, &mode);
            }
            self.last_mode = mode;
        } else {
            if !mode.is_empty() {
                self.write_locks(tree, ALL_CLEAR);
                tree.set(self.props.pointing_lock, "");
            }
            self.last_mode.clear();
        }
    }

    fn enter_mode(&self, tree: &mut PropertyTree, mode: &str) {
        let p = &self.props;
        tree.set(p.pointing_lock, "on");
        tree.set(p.lookat_mode, "ned-vector");
        tree.set_f64(p.vector[0], 0.0);
        tree.set_f64(p.vector[1], 0.0);
        tree.set_f64(p.vector[2], 1.0);

        let Some(row) = lock_table(mode) else {
            return;
        };
        self.write_locks(tree, row);

        if mode == "cas" {
            let roll = tree
                .get_f64(p.roll_deg)
                .clamp(-CAS_ROLL_LIMIT_DEG, CAS_ROLL_LIMIT_DEG);
            let pitch = tree
                .get_f64(p.pitch_deg)
                .clamp(-CAS_PITCH_LIMIT_DEG, CAS_PITCH_LIMIT_DEG);
            tree.set_f64(p.target_roll_deg, roll);
            tree.set_f64(p.target_pitch_base_deg, pitch);
        }
    }

    fn write_locks(&self, tree: &mut PropertyTree, row: LockRow) {
        for (prop, value) in self.props.locks.iter().zip(row) {
            tree.set(*prop, value);
        }
    }
}
