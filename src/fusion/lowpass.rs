//! First-order low-pass filter with a time-factor weighting.

/// `value += w * (raw - value)` with `w = dt / time_factor`, capped at 1.
///
/// A non-positive time factor passes the input straight through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowPassFilter {
    time_factor: f64,
    value: f64,
}

impl LowPassFilter {
    pub fn new(time_factor: f64) -> Self {
        Self {
            time_factor,
            value: 0.0,
        }
    }

    pub fn init(&mut self, value: f64) {
        self.value = value;
    }

    pub fn update(&mut self, raw: f64, dt: f64) -> f64 {
        let weight = if self.time_factor > 0.0 {
            (dt / self.time_factor).min(1.0)
        } else {
            1.0
        };
        self.value = (1.0 - weight) * self.value + weight * raw;
        self.value
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn time_factor(&self) -> f64 {
        self.time_factor
    }
}
