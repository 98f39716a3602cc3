//! The per-tick control task: modes, pipeline, then throttled telemetry.

use crate::bus::{NodeId, PropId, PropertyTree};
use crate::config::export_json;
use crate::control::modes::FlightModes;
use crate::control::pipeline::ControlPipeline;
use crate::error::Result;
use crate::telemetry::{GatePair, Telemetry, TelemetryFrame, TickProfile, SLOW_UPDATE};
use tracing::{info, trace};

/// Rate gate key under `/config/remote_link` and `/config/logging`.
pub const AUTOPILOT_SKIP: &str = "autopilot_skip";

#[derive(Debug, Clone)]
struct TaskProps {
    timestamp: PropId,
    master_switch: PropId,
    mode: PropId,
    wp_counter: PropId,
    locks: NodeId,
    targets: NodeId,
}

impl TaskProps {
    fn bind(tree: &mut PropertyTree) -> Result<Self> {
        Ok(Self {
            timestamp: tree.resolve("/sensors/imu/timestamp")?,
            master_switch: tree.resolve("/autopilot/master_switch")?,
            mode: tree.resolve("/autopilot/mode")?,
            wp_counter: tree.resolve("/comms/remote_link/wp_counter")?,
            locks: tree.node("/autopilot/locks")?,
            targets: tree.node("/autopilot/targets")?,
        })
    }
}

#[derive(Debug)]
pub struct ControlTask {
    modes: FlightModes,
    pipeline: ControlPipeline,
    gates: GatePair,
    profile: TickProfile,
    props: TaskProps,
}

impl ControlTask {
    /// Bind bus handles, read gate intervals and build the pipeline.
    pub fn init(tree: &mut PropertyTree, telemetry: &mut Telemetry) -> Result<Self> {
        let modes = FlightModes::bind(tree)?;
        let props = TaskProps::bind(tree)?;
        let gates = GatePair::from_config(tree, AUTOPILOT_SKIP);

        let mut task = Self {
            modes,
            pipeline: ControlPipeline::new(),
            gates,
            profile: TickProfile::new("control"),
            props,
        };
        task.build_pipeline(tree, telemetry)?;
        info!("Autopilot initialized with {} stages", task.pipeline.len());
        Ok(task)
    }

    /// Re-read the autopilot configuration and reset every stage.
    ///
    /// Mode tracking and gate counters are left alone.
    pub fn reinit(&mut self, tree: &mut PropertyTree, telemetry: &mut Telemetry) -> Result<()> {
        self.build_pipeline(tree, telemetry)
    }

    fn build_pipeline(&mut self, tree: &mut PropertyTree, telemetry: &mut Telemetry) -> Result<()> {
        self.pipeline.build(tree)?;
        if let Some(node) = tree.find_node(self.pipeline.config_path()) {
            telemetry.logging.send(&TelemetryFrame::Config {
                name: "autopilot".to_string(),
                body: export_json(tree, node),
            });
        }
        Ok(())
    }

    pub fn pipeline(&self) -> &ControlPipeline {
        &self.pipeline
    }

    pub fn modes(&self) -> &FlightModes {
        &self.modes
    }

    pub fn gates(&self) -> &GatePair {
        &self.gates
    }

    pub fn profile(&self) -> &TickProfile {
        &self.profile
    }

    pub fn update(&mut self, tree: &mut PropertyTree, telemetry: &mut Telemetry, dt: f64) {
        self.profile.start();

        self.modes.update(tree, telemetry);

        // stages run in manual flight too so they track the pilot's inputs
        self.pipeline.update(tree, dt);

        let (send_remote_link, send_logging) = self.gates.poll();
        if send_remote_link || send_logging {
            let frame = self.snapshot(tree);
            if send_remote_link {
                telemetry.remote_link.send(&frame);
                let counter = tree.get_i64(self.props.wp_counter);
                tree.set(self.props.wp_counter, counter + 1);
            }
            if send_logging {
                telemetry.logging.send(&frame);
            }
            trace!(
                "autopilot frame: remote_link={} logging={}",
                send_remote_link,
                send_logging
            );
        }
        self.gates.tick();

        if self.profile.stop().is_some_and(|e| e > SLOW_UPDATE) {
            telemetry.event("control", &self.profile.slow_message());
        }
    }

    fn snapshot(&self, tree: &PropertyTree) -> TelemetryFrame {
        let p = &self.props;
        TelemetryFrame::Autopilot {
            timestamp: tree.get_f64(p.timestamp),
            master_switch: tree.get_bool(p.master_switch),
            mode: tree.get_string(p.mode),
            locks: export_json(tree, p.locks),
            targets: export_json(tree, p.targets),
        }
    }
}
