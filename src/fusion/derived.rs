//! Quantities derived from the primary navigation estimate.
//!
//! Pure math over plain numbers; the orchestrator does the bus plumbing.

use crate::fusion::lowpass::LowPassFilter;
use crate::types::{wrap_degrees, KT_TO_MPS, MPS_TO_KT};
use std::f64::consts::FRAC_PI_2;

/// Euler rates are undefined this close to +/-90 degrees pitch.
pub const GIMBAL_MARGIN_RAD: f64 = 1e-5;

const GROUND_TIME_FACTOR: f64 = 30.0;
const WIND_TIME_FACTOR: f64 = 60.0;
const PITOT_TIME_FACTOR: f64 = 30.0;

/// Bounds on a single pitot scale correction.
pub const PITOT_SCALE_MIN: f64 = 0.75;
pub const PITOT_SCALE_MAX: f64 = 1.25;

/// Below this indicated airspeed no pitot correction is attempted.
const MIN_PITOT_AIRSPEED_KT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EulerRates {
    pub phi_dot: f64,
    pub the_dot: f64,
    pub psi_dot: f64,
}

/// Body rates (rad/s) to Euler angle rates, given attitude in degrees.
///
/// Returns `None` near the pitch singularity.
pub fn euler_rates(roll_deg: f64, pitch_deg: f64, p: f64, q: f64, r: f64) -> Option<EulerRates> {
    let phi = roll_deg.to_radians();
    let the = pitch_deg.to_radians();
    if !(FRAC_PI_2 - the.abs() > GIMBAL_MARGIN_RAD) {
        return None;
    }
    let (sin_phi, cos_phi) = phi.sin_cos();
    let tan_the = the.tan();
    let cos_the = the.cos();
    Some(EulerRates {
        phi_dot: p + q * sin_phi * tan_the + r * cos_phi * tan_the,
        the_dot: q * cos_phi - r * sin_phi,
        psi_dot: q * sin_phi / cos_the + r * cos_phi / cos_the,
    })
}

/// Compass direction (degrees, 0 = north) of an east/north vector.
pub fn compass_deg(east: f64, north: f64) -> f64 {
    wrap_degrees(90.0 - north.atan2(east).to_degrees())
}

/// Ground altitude latched on first use and tracked while on the ground.
#[derive(Debug, Clone)]
pub struct GroundReference {
    filter: LowPassFilter,
    calibrated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundUpdate {
    /// Set only while on the ground.
    pub ground_m: Option<f64>,
    pub agl_m: f64,
}

impl Default for GroundReference {
    fn default() -> Self {
        Self::new()
    }
}

impl GroundReference {
    pub fn new() -> Self {
        Self {
            filter: LowPassFilter::new(GROUND_TIME_FACTOR),
            calibrated: false,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn ground_m(&self) -> f64 {
        self.filter.value()
    }

    pub fn update(&mut self, altitude_m: f64, airborne: bool, dt: f64) -> GroundUpdate {
        if !self.calibrated {
            self.calibrated = true;
            self.filter.init(altitude_m);
        }
        let ground_m = if airborne {
            None
        } else {
            Some(self.filter.update(altitude_m, dt))
        };
        GroundUpdate {
            ground_m,
            agl_m: altitude_m - self.filter.value(),
        }
    }
}

/// Per-tick inputs to the wind estimator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AirData {
    pub airspeed_kt: f64,
    pub heading_deg: f64,
    pub vn_ms: f64,
    pub ve_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindEstimate {
    pub wind_speed_kt: f64,
    pub wind_dir_deg: f64,
    pub wind_east_mps: f64,
    pub wind_north_mps: f64,
    pub true_airspeed_kt: f64,
    pub true_heading_deg: f64,
    pub true_airspeed_east_mps: f64,
    pub true_airspeed_north_mps: f64,
    pub pitot_scale_factor: f64,
    pub groundspeed_est_ms: f64,
    pub groundtrack_est_deg: f64,
}

/// Wind and pitot scale estimator.
///
/// The pitot scale computed on one tick feeds the airspeed used on the
/// next; the per-tick clamp keeps that loop bounded.
#[derive(Debug, Clone)]
pub struct WindEstimator {
    we: LowPassFilter,
    wn: LowPassFilter,
    pitot: LowPassFilter,
}

impl Default for WindEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl WindEstimator {
    pub fn new() -> Self {
        let mut pitot = LowPassFilter::new(PITOT_TIME_FACTOR);
        pitot.init(1.0);
        Self {
            we: LowPassFilter::new(WIND_TIME_FACTOR),
            wn: LowPassFilter::new(WIND_TIME_FACTOR),
            pitot,
        }
    }

    pub fn pitot_scale(&self) -> f64 {
        self.pitot.value()
    }

    pub fn update(&mut self, air: AirData, dt: f64) -> WindEstimate {
        let psi = FRAC_PI_2 - air.heading_deg.to_radians();
        let air_mps = air.airspeed_kt * self.pitot.value() * KT_TO_MPS;
        let ue = psi.cos() * air_mps;
        let un = psi.sin() * air_mps;

        let we = self.we.update(ue - air.ve_ms, dt);
        let wn = self.wn.update(un - air.vn_ms, dt);

        let true_e = we + air.ve_ms;
        let true_n = wn + air.vn_ms;
        let true_airspeed_kt = true_e.hypot(true_n) * MPS_TO_KT;

        let mut ps = 1.0;
        if air.airspeed_kt > MIN_PITOT_AIRSPEED_KT {
            ps = (true_airspeed_kt / air.airspeed_kt).clamp(PITOT_SCALE_MIN, PITOT_SCALE_MAX);
        }
        let pitot_scale_factor = self.pitot.update(ps, dt);

        let ve_est = ue - we;
        let vn_est = un - wn;

        WindEstimate {
            wind_speed_kt: we.hypot(wn) * MPS_TO_KT,
            wind_dir_deg: compass_deg(we, wn),
            wind_east_mps: we,
            wind_north_mps: wn,
            true_airspeed_kt,
            true_heading_deg: compass_deg(true_e, true_n),
            true_airspeed_east_mps: true_e,
            true_airspeed_north_mps: true_n,
            pitot_scale_factor,
            groundspeed_est_ms: ve_est.hypot(vn_est),
            groundtrack_est_deg: compass_deg(ve_est, vn_est),
        }
    }
}
