//! Goniometer tuning.

use crate::cache::CacheConfig;
use crate::filter::FilterParams;
use crate::schema::PoseSchema;

/// All knobs of the angle engine. The defaults are tuned for 30-60 fps
/// pose streams in normalized or metric coordinates.
#[derive(Debug, Clone)]
pub struct GoniometerConfig {
    /// Landmarks below this visibility make a measurement an error
    /// instead of a guess.
    pub min_visibility: f64,
    /// Rolling-mean window applied to raw angles before the adaptive
    /// filter. 1 disables the window.
    pub history_window: usize,
    /// Master switch for angle smoothing.
    pub smoothing_enabled: bool,
    pub angle_filter: FilterParams,
    /// Anterior rotation of the scapular plane from coronal, degrees.
    pub scapular_offset_deg: f64,
    /// Confidence multiplier applied when the camera viewpoint
    /// forecloses the measurement plane (or depth is missing for
    /// transverse measurements).
    pub view_demotion_factor: f64,
    pub view_gating_enabled: bool,
    pub cache: CacheConfig,
}

impl Default for GoniometerConfig {
    fn default() -> Self {
        GoniometerConfig {
            min_visibility: 0.5,
            history_window: 5,
            smoothing_enabled: true,
            angle_filter: FilterParams::angle(),
            scapular_offset_deg: 35.0,
            view_demotion_factor: 0.5,
            view_gating_enabled: true,
            cache: CacheConfig::default(),
        }
    }
}

impl GoniometerConfig {
    /// Defaults with the visibility gate taken from the schema's own
    /// recommended threshold.
    pub fn for_schema(schema: &PoseSchema) -> Self {
        GoniometerConfig {
            min_visibility: schema.default_visibility_threshold,
            ..GoniometerConfig::default()
        }
    }
}
