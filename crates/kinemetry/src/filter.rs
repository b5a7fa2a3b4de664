//! One-Euro speed-adaptive smoothing.
//!
//! Pose landmarks jitter at rest but must not lag during fast motion.
//! The One-Euro filter adapts its cutoff to the signal's speed: low
//! cutoff (heavy smoothing) when slow, high cutoff (light smoothing)
//! when fast. Applied in two places with different tunings: raw
//! landmark coordinates before frame construction, and computed joint
//! angles after measurement.

use std::collections::HashMap;
use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::math::Vec3;
use crate::pose::PoseFrame;

// ── Core filter ─────────────────────────────────────────────────────

/// Tuning for one [`OneEuroFilter`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FilterParams {
    /// Baseline cutoff frequency (Hz). Lower = smoother at rest.
    pub min_cutoff: f64,
    /// Speed coefficient. Higher = less lag during fast motion.
    pub beta: f64,
    /// Cutoff for the derivative low-pass (Hz).
    pub d_cutoff: f64,
}

impl FilterParams {
    /// Tuning for landmark coordinates in normalized image units.
    pub fn landmark() -> Self {
        FilterParams {
            min_cutoff: 1.0,
            beta: 0.007,
            d_cutoff: 1.0,
        }
    }

    /// Tuning for joint angles in degrees. Angles move through a much
    /// larger numeric range than normalized coordinates, so beta is
    /// scaled down to keep the adaptive term in a comparable regime.
    pub fn angle() -> Self {
        FilterParams {
            min_cutoff: 0.5,
            beta: 0.002,
            d_cutoff: 1.0,
        }
    }
}

/// Scalar One-Euro filter.
#[derive(Debug, Clone)]
pub struct OneEuroFilter {
    params: FilterParams,
    x_prev: f64,
    dx_prev: f64,
    t_prev: f64,
    initialized: bool,
}

fn smoothing_factor(dt: f64, cutoff: f64) -> f64 {
    let r = TAU * cutoff * dt;
    r / (r + 1.0)
}

impl OneEuroFilter {
    pub fn new(params: FilterParams) -> Self {
        OneEuroFilter {
            params,
            x_prev: 0.0,
            dx_prev: 0.0,
            t_prev: 0.0,
            initialized: false,
        }
    }

    /// Filter one sample taken at stream time `t_s`.
    ///
    /// The first sample passes through untouched. Non-increasing
    /// timestamps return the previous output rather than dividing by a
    /// zero or negative dt.
    pub fn filter(&mut self, x: f64, t_s: f64) -> f64 {
        if !self.initialized {
            self.x_prev = x;
            self.dx_prev = 0.0;
            self.t_prev = t_s;
            self.initialized = true;
            return x;
        }

        let dt = t_s - self.t_prev;
        if dt <= 0.0 {
            return self.x_prev;
        }

        let dx = (x - self.x_prev) / dt;
        let a_d = smoothing_factor(dt, self.params.d_cutoff);
        let dx_hat = a_d * dx + (1.0 - a_d) * self.dx_prev;

        let cutoff = self.params.min_cutoff + self.params.beta * dx_hat.abs();
        let a = smoothing_factor(dt, cutoff);
        let x_hat = a * x + (1.0 - a) * self.x_prev;

        self.x_prev = x_hat;
        self.dx_prev = dx_hat;
        self.t_prev = t_s;
        x_hat
    }

    pub fn reset(&mut self) {
        self.initialized = false;
        self.x_prev = 0.0;
        self.dx_prev = 0.0;
        self.t_prev = 0.0;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

// ── Landmark smoothing ──────────────────────────────────────────────

/// Per-coordinate One-Euro smoothing over a whole pose frame.
///
/// Landmarks below the visibility floor pass through unfiltered and
/// have their filter state reset, so a landmark that reappears after
/// occlusion does not get dragged toward its stale pre-occlusion
/// position.
#[derive(Debug)]
pub struct LandmarkSmoother {
    params: FilterParams,
    visibility_floor: f64,
    filters: HashMap<String, [OneEuroFilter; 3]>,
}

impl LandmarkSmoother {
    pub fn new(params: FilterParams, visibility_floor: f64) -> Self {
        LandmarkSmoother {
            params,
            visibility_floor,
            filters: HashMap::new(),
        }
    }

    /// Smooth every sufficiently-visible landmark, returning a new
    /// frame. The input frame is left untouched.
    pub fn smooth(&mut self, frame: &PoseFrame) -> PoseFrame {
        let mut out = frame.clone();
        for lm in &mut out.landmarks {
            if lm.visibility < self.visibility_floor {
                if let Some(f) = self.filters.get_mut(&lm.name) {
                    for axis in f.iter_mut() {
                        axis.reset();
                    }
                }
                continue;
            }
            let filters = self
                .filters
                .entry(lm.name.clone())
                .or_insert_with(|| {
                    [
                        OneEuroFilter::new(self.params),
                        OneEuroFilter::new(self.params),
                        OneEuroFilter::new(self.params),
                    ]
                });
            lm.position = Vec3::new(
                filters[0].filter(lm.position.x, frame.timestamp_s),
                filters[1].filter(lm.position.y, frame.timestamp_s),
                filters[2].filter(lm.position.z, frame.timestamp_s),
            );
        }
        out
    }

    pub fn reset(&mut self) {
        self.filters.clear();
    }
}

// ── Angle smoothing ─────────────────────────────────────────────────

/// One-Euro smoothing for named joint angles.
///
/// Measured angles live in [0, 180]; a joint oscillating near either
/// end of that range produces sawtooth raw values that a naive filter
/// would smear across the fold. Deltas are unwrapped onto a continuous
/// axis before filtering and folded back afterwards.
#[derive(Debug)]
pub struct AngleSmoother {
    params: FilterParams,
    states: HashMap<String, AngleState>,
}

#[derive(Debug)]
struct AngleState {
    filter: OneEuroFilter,
    raw_prev: f64,
    unwrapped_prev: f64,
}

fn fold_to_measured_range(a: f64) -> f64 {
    let a = a.rem_euclid(360.0);
    if a > 180.0 {
        360.0 - a
    } else {
        a
    }
}

impl AngleSmoother {
    pub fn new(params: FilterParams) -> Self {
        AngleSmoother {
            params,
            states: HashMap::new(),
        }
    }

    /// Smooth one raw angle sample for `joint` at stream time `t_s`.
    pub fn smooth(&mut self, joint: &str, angle_deg: f64, t_s: f64) -> f64 {
        let state = self
            .states
            .entry(joint.to_string())
            .or_insert_with(|| AngleState {
                filter: OneEuroFilter::new(self.params),
                raw_prev: angle_deg,
                unwrapped_prev: angle_deg,
            });

        let mut delta = angle_deg - state.raw_prev;
        if delta > 90.0 {
            delta -= 180.0;
        } else if delta < -90.0 {
            delta += 180.0;
        }
        let unwrapped = state.unwrapped_prev + delta;

        let filtered = state.filter.filter(unwrapped, t_s);
        state.raw_prev = angle_deg;
        state.unwrapped_prev = unwrapped;
        fold_to_measured_range(filtered)
    }

    pub fn reset(&mut self, joint: &str) {
        self.states.remove(joint);
    }

    pub fn reset_all(&mut self) {
        self.states.clear();
    }
}
