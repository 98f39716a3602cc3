//! Drives the configured navigation backends once per sensor tick and
//! republishes the primary estimate as the canonical fused state.
//!
//! Sections live under `/config/filters`, one child per backend:
//!
//! ```toml
//! [filters]
//! ground_track_source = "filter"   # or "gnss"
//!
//! [[filters.filter]]
//! module = "mirror"
//! enable = true
//! source = "/sensors/ins"
//! ```
//!
//! The first enabled section is the primary; only its fresh estimates feed
//! the derived quantities and advance the rate gates.

use crate::bus::{NodeId, PropId, PropertyTree};
use crate::config::export_json;
use crate::error::{BuildError, Result};
use crate::fusion::backend::{BackendRegistry, NavBackend};
use crate::fusion::derived::{compass_deg, euler_rates, AirData, GroundReference, WindEstimator};
use crate::telemetry::{GatePair, Telemetry, TelemetryFrame, TickProfile, SLOW_UPDATE};
use crate::types::METER_TO_FEET;
use tracing::{debug, info, trace, warn};

pub const FILTERS_CONFIG: &str = "/config/filters";

/// Rate gate key under `/config/remote_link` and `/config/logging`.
pub const FILTER_SKIP: &str = "filter_skip";

/// Step used when the IMU clock jumps backwards or by more than a second.
const FALLBACK_DT: f64 = 0.01;

/// Where published ground track and ground speed come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackSource {
    #[default]
    Filter,
    Gnss,
}

impl TrackSource {
    pub fn from_config_name(name: &str) -> Option<Self> {
        match name {
            "" | "filter" => Some(TrackSource::Filter),
            "gnss" | "gps" => Some(TrackSource::Gnss),
            _ => None,
        }
    }
}

/// Handles into one backend's output node.
#[derive(Debug, Clone)]
struct EstimateProps {
    roll_deg: PropId,
    pitch_deg: PropId,
    heading_deg: PropId,
    latitude_deg: PropId,
    longitude_deg: PropId,
    altitude_m: PropId,
    altitude_ft: PropId,
    vn_ms: PropId,
    ve_ms: PropId,
    vd_ms: PropId,
    timestamp: PropId,
    navigation: PropId,
    groundtrack_deg: PropId,
    groundspeed_ms: PropId,
    vertical_speed_fps: PropId,
}

impl EstimateProps {
    fn bind(tree: &mut PropertyTree, node: NodeId) -> Result<Self> {
        Ok(Self {
            roll_deg: tree.prop(node, "roll_deg")?,
            pitch_deg: tree.prop(node, "pitch_deg")?,
            heading_deg: tree.prop(node, "heading_deg")?,
            latitude_deg: tree.prop(node, "latitude_deg")?,
            longitude_deg: tree.prop(node, "longitude_deg")?,
            altitude_m: tree.prop(node, "altitude_m")?,
            altitude_ft: tree.prop(node, "altitude_ft")?,
            vn_ms: tree.prop(node, "vn_ms")?,
            ve_ms: tree.prop(node, "ve_ms")?,
            vd_ms: tree.prop(node, "vd_ms")?,
            timestamp: tree.prop(node, "timestamp")?,
            navigation: tree.prop(node, "navigation")?,
            groundtrack_deg: tree.prop(node, "groundtrack_deg")?,
            groundspeed_ms: tree.prop(node, "groundspeed_ms")?,
            vertical_speed_fps: tree.prop(node, "vertical_speed_fps")?,
        })
    }
}

/// Handles for everything the orchestrator reads or publishes.
#[derive(Debug, Clone)]
struct FusionProps {
    imu_timestamp: PropId,
    imu_p: PropId,
    imu_q: PropId,
    imu_r: PropId,
    gps_vn: PropId,
    gps_ve: PropId,
    airspeed_kt: PropId,
    is_airborne: PropId,

    roll_deg: PropId,
    pitch_deg: PropId,
    heading_deg: PropId,
    phi_dot: PropId,
    the_dot: PropId,
    psi_dot: PropId,
    groundtrack_deg: PropId,
    groundtrack_est_deg: PropId,

    latitude_deg: PropId,
    longitude_deg: PropId,
    pos_altitude_m: PropId,
    pos_altitude_ft: PropId,
    pos_agl_m: PropId,
    pos_agl_ft: PropId,
    pos_ground_m: PropId,

    filt_altitude_m: PropId,
    filt_altitude_ft: PropId,
    filt_ground_m: PropId,
    filt_agl_m: PropId,
    filt_agl_ft: PropId,

    vn_ms: PropId,
    ve_ms: PropId,
    vd_ms: PropId,
    groundspeed_ms: PropId,
    groundspeed_est_ms: PropId,
    vertical_speed_fps: PropId,

    filters_timestamp: PropId,
    status_navigation: PropId,

    wind_speed_kt: PropId,
    wind_dir_deg: PropId,
    wind_east_mps: PropId,
    wind_north_mps: PropId,
    true_airspeed_kt: PropId,
    true_heading_deg: PropId,
    true_airspeed_east_mps: PropId,
    true_airspeed_north_mps: PropId,
    pitot_scale_factor: PropId,
}

impl FusionProps {
    fn bind(tree: &mut PropertyTree) -> Result<Self> {
        let imu = tree.node("/sensors/imu")?;
        let gps = tree.node("/sensors/gps")?;
        let orient = tree.node("/orientation")?;
        let pos = tree.node("/position")?;
        let pos_filter = tree.node("/position/filter")?;
        let vel = tree.node("/velocity")?;
        let wind = tree.node("/filters/wind")?;
        Ok(Self {
            imu_timestamp: tree.prop(imu, "timestamp")?,
            imu_p: tree.prop(imu, "p_rad_sec")?,
            imu_q: tree.prop(imu, "q_rad_sec")?,
            imu_r: tree.prop(imu, "r_rad_sec")?,
            gps_vn: tree.prop(gps, "vn_ms")?,
            gps_ve: tree.prop(gps, "ve_ms")?,
            airspeed_kt: tree.resolve("/sensors/airdata/airspeed_kt")?,
            is_airborne: tree.resolve("/task/is_airborne")?,

            roll_deg: tree.prop(orient, "roll_deg")?,
            pitch_deg: tree.prop(orient, "pitch_deg")?,
            heading_deg: tree.prop(orient, "heading_deg")?,
            phi_dot: tree.prop(orient, "phi_dot_rad_sec")?,
            the_dot: tree.prop(orient, "the_dot_rad_sec")?,
            psi_dot: tree.prop(orient, "psi_dot_rad_sec")?,
            groundtrack_deg: tree.prop(orient, "groundtrack_deg")?,
            groundtrack_est_deg: tree.prop(orient, "groundtrack_est_deg")?,

            latitude_deg: tree.prop(pos, "latitude_deg")?,
            longitude_deg: tree.prop(pos, "longitude_deg")?,
            pos_altitude_m: tree.prop(pos, "altitude_m")?,
            pos_altitude_ft: tree.prop(pos, "altitude_ft")?,
            pos_agl_m: tree.prop(pos, "altitude_agl_m")?,
            pos_agl_ft: tree.prop(pos, "altitude_agl_ft")?,
            pos_ground_m: tree.prop(pos, "altitude_ground_m")?,

            filt_altitude_m: tree.prop(pos_filter, "altitude_m")?,
            filt_altitude_ft: tree.prop(pos_filter, "altitude_ft")?,
            filt_ground_m: tree.prop(pos_filter, "altitude_ground_m")?,
            filt_agl_m: tree.prop(pos_filter, "altitude_agl_m")?,
            filt_agl_ft: tree.prop(pos_filter, "altitude_agl_ft")?,

            vn_ms: tree.prop(vel, "vn_ms")?,
            ve_ms: tree.prop(vel, "ve_ms")?,
            vd_ms: tree.prop(vel, "vd_ms")?,
            groundspeed_ms: tree.prop(vel, "groundspeed_ms")?,
            groundspeed_est_ms: tree.prop(vel, "groundspeed_est_ms")?,
            vertical_speed_fps: tree.prop(vel, "vertical_speed_fps")?,

            filters_timestamp: tree.resolve("/filters/timestamp")?,
            status_navigation: tree.resolve("/status/navigation")?,

            wind_speed_kt: tree.prop(wind, "wind_speed_kt")?,
            wind_dir_deg: tree.prop(wind, "wind_dir_deg")?,
            wind_east_mps: tree.prop(wind, "wind_east_mps")?,
            wind_north_mps: tree.prop(wind, "wind_north_mps")?,
            true_airspeed_kt: tree.prop(wind, "true_airspeed_kt")?,
            true_heading_deg: tree.prop(wind, "true_heading_deg")?,
            true_airspeed_east_mps: tree.prop(wind, "true_airspeed_east_mps")?,
            true_airspeed_north_mps: tree.prop(wind, "true_airspeed_north_mps")?,
            pitot_scale_factor: tree.prop(wind, "pitot_scale_factor")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionState {
    Idle,
    Running,
    Failed,
}

struct Section {
    index: usize,
    module: String,
    config: NodeId,
    enable: PropId,
    output: NodeId,
    estimate: EstimateProps,
    backend: Box<dyn NavBackend>,
    state: SectionState,
}

impl Section {
    /// Initialize on first use. Returns false if the backend is unusable.
    fn ensure_running(&mut self, tree: &mut PropertyTree, telemetry: &mut Telemetry) -> bool {
        match self.state {
            SectionState::Running => true,
            SectionState::Failed => false,
            SectionState::Idle => {
                match self.backend.init(tree, self.output, self.config) {
                    Ok(()) => {
                        info!(
                            "filter: {} = {} -> {}",
                            self.index,
                            self.module,
                            tree.node_path(self.output)
                        );
                        self.state = SectionState::Running;
                        true
                    }
                    Err(e) => {
                        warn!("filter {} ({}) failed to start: {}", self.index, self.module, e);
                        telemetry.event(
                            "filter",
                            &format!("{} init failed: {}", self.module, e),
                        );
                        self.state = SectionState::Failed;
                        false
                    }
                }
            }
        }
    }
}

pub struct FusionOrchestrator {
    sections: Vec<Section>,
    props: FusionProps,
    track_source: TrackSource,
    ground: GroundReference,
    wind: WindEstimator,
    gates: GatePair,
    profile: TickProfile,
    last_imu_time: f64,
}

impl std::fmt::Debug for FusionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FusionOrchestrator")
            .field("sections", &self.modules())
            .field("track_source", &self.track_source)
            .field("gates", &self.gates)
            .finish()
    }
}

impl FusionOrchestrator {
    /// Read `/config/filters` and construct (but do not start) every section.
    pub fn build(tree: &mut PropertyTree, registry: &BackendRegistry) -> Result<Self> {
        let props = FusionProps::bind(tree)?;
        tree.set_f64(props.pitot_scale_factor, 1.0);

        let gates = GatePair::from_config(tree, FILTER_SKIP);
        let config = tree.node(FILTERS_CONFIG)?;

        let policy = tree
            .find_prop(config, "ground_track_source")
            .map(|p| tree.get_string(p))
            .unwrap_or_default();
        let track_source = TrackSource::from_config_name(&policy).unwrap_or_else(|| {
            warn!("unknown ground_track_source '{}', using filter", policy);
            TrackSource::Filter
        });

        let children: Vec<NodeId> = tree.children(config).map(|n| n.id).collect();
        info!("Found {} filter sections", children.len());

        let mut sections = Vec::with_capacity(children.len());
        for (index, node) in children.into_iter().enumerate() {
            let module = tree
                .find_prop(node, "module")
                .map(|p| tree.get_string(p))
                .unwrap_or_default();
            let backend = registry.create(&module).ok_or_else(|| BuildError::UnknownBackend {
                section: tree.node_path(node).to_string(),
                module: module.clone(),
            })?;
            let enable = tree.prop(node, "enable")?;
            let output = tree.node(&format!("/filters/filter[{}]", index))?;
            let estimate = EstimateProps::bind(tree, output)?;
            debug!("filter section {}: {}", index, module);
            sections.push(Section {
                index,
                module,
                config: node,
                enable,
                output,
                estimate,
                backend,
                state: SectionState::Idle,
            });
        }

        Ok(Self {
            sections,
            props,
            track_source,
            ground: GroundReference::new(),
            wind: WindEstimator::new(),
            gates,
            profile: TickProfile::new("filter"),
            last_imu_time: 0.0,
        })
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn modules(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.module.as_str()).collect()
    }

    pub fn track_source(&self) -> TrackSource {
        self.track_source
    }

    pub fn gates(&self) -> &GatePair {
        &self.gates
    }

    pub fn profile(&self) -> &TickProfile {
        &self.profile
    }

    pub fn pitot_scale(&self) -> f64 {
        self.wind.pitot_scale()
    }

    /// One sensor tick. Returns whether the primary produced a fresh estimate.
    pub fn update(&mut self, tree: &mut PropertyTree, telemetry: &mut Telemetry) -> bool {
        self.profile.start();

        let imu_time = tree.get_f64(self.props.imu_timestamp);
        let imu_dt = sensor_dt(imu_time, self.last_imu_time);

        let mut primary_fresh = false;
        let mut primary_seen = false;

        for section in &mut self.sections {
            if !tree.get_bool(section.enable) {
                continue;
            }
            let is_primary = !primary_seen;
            primary_seen = true;

            let fresh = section.ensure_running(tree, telemetry) && section.backend.update(tree);
            if is_primary {
                primary_fresh = fresh;
                if fresh {
                    derive_and_publish(
                        tree,
                        &self.props,
                        &section.estimate,
                        self.track_source,
                        &mut self.ground,
                        &mut self.wind,
                        imu_dt,
                    );
                }
            }

            let (send_remote_link, send_logging) = self.gates.poll();
            if send_remote_link || send_logging {
                let frame = TelemetryFrame::Filter {
                    index: section.index,
                    estimate: export_json(tree, section.output),
                };
                if send_remote_link {
                    telemetry.remote_link.send(&frame);
                }
                if send_logging {
                    telemetry.logging.send(&frame);
                }
            }
        }

        if self.profile.stop().is_some_and(|e| e > SLOW_UPDATE) {
            telemetry.event("filter", &self.profile.slow_message());
        }

        if primary_fresh {
            self.gates.tick();
        }
        self.last_imu_time = imu_time;

        trace!("fusion tick dt={:.4} fresh={}", imu_dt, primary_fresh);
        primary_fresh
    }

    /// Close every backend that was started.
    pub fn close(&mut self, tree: &mut PropertyTree) {
        for section in &mut self.sections {
            if section.state == SectionState::Running {
                section.backend.close(tree);
                section.state = SectionState::Idle;
                debug!("filter {} ({}) closed", section.index, section.backend.name());
            }
        }
    }
}

/// Step between IMU samples, replaced by a nominal value when the clock
/// jumped (e.g. the system time was changed underneath us).
pub fn sensor_dt(now: f64, last: f64) -> f64 {
    let dt = now - last;
    if (0.0..=1.0).contains(&dt) {
        dt
    } else {
        FALLBACK_DT
    }
}

fn derive_and_publish(
    tree: &mut PropertyTree,
    p: &FusionProps,
    est: &EstimateProps,
    track_source: TrackSource,
    ground: &mut GroundReference,
    wind: &mut WindEstimator,
    dt: f64,
) {
    let airborne = tree.get_bool(p.is_airborne);

    // euler rates
    let roll_deg = tree.get_f64(est.roll_deg);
    let pitch_deg = tree.get_f64(est.pitch_deg);
    if let Some(rates) = euler_rates(
        roll_deg,
        pitch_deg,
        tree.get_f64(p.imu_p),
        tree.get_f64(p.imu_q),
        tree.get_f64(p.imu_r),
    ) {
        tree.set_f64(p.phi_dot, rates.phi_dot);
        tree.set_f64(p.the_dot, rates.the_dot);
        tree.set_f64(p.psi_dot, rates.psi_dot);
    }

    // ground reference
    let altitude_m = tree.get_f64(est.altitude_m);
    let g = ground.update(altitude_m, airborne, dt);
    if let Some(ground_m) = g.ground_m {
        tree.set_f64(p.filt_ground_m, ground_m);
    }
    tree.set_f64(p.filt_agl_m, g.agl_m);
    tree.set_f64(p.filt_agl_ft, g.agl_m * METER_TO_FEET);

    // wind, in flight only
    if airborne {
        let w = wind.update(
            AirData {
                airspeed_kt: tree.get_f64(p.airspeed_kt),
                heading_deg: tree.get_f64(est.heading_deg),
                vn_ms: tree.get_f64(est.vn_ms),
                ve_ms: tree.get_f64(est.ve_ms),
            },
            dt,
        );
        tree.set_f64(p.wind_speed_kt, w.wind_speed_kt);
        tree.set_f64(p.wind_dir_deg, w.wind_dir_deg);
        tree.set_f64(p.wind_east_mps, w.wind_east_mps);
        tree.set_f64(p.wind_north_mps, w.wind_north_mps);
        tree.set_f64(p.true_airspeed_kt, w.true_airspeed_kt);
        tree.set_f64(p.true_heading_deg, w.true_heading_deg);
        tree.set_f64(p.true_airspeed_east_mps, w.true_airspeed_east_mps);
        tree.set_f64(p.true_airspeed_north_mps, w.true_airspeed_north_mps);
        tree.set_f64(p.pitot_scale_factor, w.pitot_scale_factor);
        tree.set_f64(p.groundspeed_est_ms, w.groundspeed_est_ms);
        tree.set_f64(p.groundtrack_est_deg, w.groundtrack_est_deg);
    }

    // fused state
    tree.set_f64(p.roll_deg, roll_deg);
    tree.set_f64(p.pitch_deg, pitch_deg);
    tree.set_f64(p.heading_deg, tree.get_f64(est.heading_deg));
    tree.set_f64(p.latitude_deg, tree.get_f64(est.latitude_deg));
    tree.set_f64(p.longitude_deg, tree.get_f64(est.longitude_deg));
    tree.set_f64(p.filt_altitude_m, altitude_m);
    tree.set_f64(p.filt_altitude_ft, tree.get_f64(est.altitude_ft));
    tree.set_f64(p.vn_ms, tree.get_f64(est.vn_ms));
    tree.set_f64(p.ve_ms, tree.get_f64(est.ve_ms));
    tree.set_f64(p.vd_ms, tree.get_f64(est.vd_ms));
    tree.set_f64(p.filters_timestamp, tree.get_f64(est.timestamp));
    let navigation = tree.get_string(est.navigation);
    tree.set(p.status_navigation, navigation);

    match track_source {
        TrackSource::Filter => {
            tree.set_f64(p.groundtrack_deg, tree.get_f64(est.groundtrack_deg));
            tree.set_f64(p.groundspeed_ms, tree.get_f64(est.groundspeed_ms));
        }
        TrackSource::Gnss => {
            let vn = tree.get_f64(p.gps_vn);
            let ve = tree.get_f64(p.gps_ve);
            tree.set_f64(p.groundtrack_deg, compass_deg(ve, vn));
            tree.set_f64(p.groundspeed_ms, ve.hypot(vn));
        }
    }
    tree.set_f64(p.vertical_speed_fps, tree.get_f64(est.vertical_speed_fps));

    // official altitudes follow the filter solution
    tree.set_f64(p.pos_altitude_m, tree.get_f64(p.filt_altitude_m));
    tree.set_f64(p.pos_altitude_ft, tree.get_f64(p.filt_altitude_ft));
    tree.set_f64(p.pos_agl_m, tree.get_f64(p.filt_agl_m));
    tree.set_f64(p.pos_agl_ft, tree.get_f64(p.filt_agl_ft));
    tree.set_f64(p.pos_ground_m, tree.get_f64(p.filt_ground_m));
}
