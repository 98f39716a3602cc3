//! The flight core: one bus, one fusion orchestrator, one control task.
//!
//! Everything runs on the caller's thread. `tick` runs fusion and then
//! control to completion; rebuilds happen only between ticks because they
//! need `&mut self`.

use crate::bus::PropertyTree;
use crate::control::ControlTask;
use crate::error::Result;
use crate::fusion::{BackendRegistry, FusionOrchestrator};
use crate::telemetry::Telemetry;
use tracing::info;

pub struct FlightCore {
    tree: PropertyTree,
    fusion: FusionOrchestrator,
    control: ControlTask,
    telemetry: Telemetry,
    ticks: u64,
}

impl std::fmt::Debug for FlightCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightCore")
            .field("fusion", &self.fusion)
            .field("stages", &self.control.pipeline().names())
            .field("ticks", &self.ticks)
            .finish()
    }
}

impl FlightCore {
    /// Build with the built-in navigation backends.
    pub fn new(tree: PropertyTree, telemetry: Telemetry) -> Result<Self> {
        Self::with_registry(tree, telemetry, &BackendRegistry::with_builtins())
    }

    pub fn with_registry(
        mut tree: PropertyTree,
        mut telemetry: Telemetry,
        registry: &BackendRegistry,
    ) -> Result<Self> {
        let fusion = FusionOrchestrator::build(&mut tree, registry)?;
        let control = ControlTask::init(&mut tree, &mut telemetry)?;
        info!(
            "flight core ready: {} filter section(s), {} control stage(s)",
            fusion.len(),
            control.pipeline().len()
        );
        Ok(Self {
            tree,
            fusion,
            control,
            telemetry,
            ticks: 0,
        })
    }

    /// One scheduler pass. Returns whether the primary estimate was fresh.
    pub fn tick(&mut self, dt: f64) -> bool {
        let fresh = self.fusion.update(&mut self.tree, &mut self.telemetry);
        self.control
            .update(&mut self.tree, &mut self.telemetry, dt);
        self.ticks += 1;
        fresh
    }

    /// Rebuild the control pipeline from the current `/config/autopilot`.
    pub fn reinit_control(&mut self) -> Result<()> {
        self.control.reinit(&mut self.tree, &mut self.telemetry)
    }

    /// Close backends and flush sinks.
    pub fn close(&mut self) {
        self.fusion.close(&mut self.tree);
        self.telemetry.flush();
        info!("flight core closed after {} ticks", self.ticks);
    }

    pub fn tree(&self) -> &PropertyTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut PropertyTree {
        &mut self.tree
    }

    pub fn telemetry_mut(&mut self) -> &mut Telemetry {
        &mut self.telemetry
    }

    pub fn fusion(&self) -> &FusionOrchestrator {
        &self.fusion
    }

    pub fn control(&self) -> &ControlTask {
        &self.control
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Profile summaries for shutdown logging.
    pub fn profile_summaries(&self) -> [String; 2] {
        [
            self.fusion.profile().summary(),
            self.control.profile().summary(),
        ]
    }
}
