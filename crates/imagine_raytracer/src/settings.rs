//! Render configuration.
//!
//! All sample budgets are derived from these settings once, in
//! `DirectIllumination::initialise`, never per pixel.

use serde::{Deserialize, Serialize};

use crate::{Colour, RenderError, RenderResult};

/// How lights are chosen and sampled at each shading point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightSamplingType {
    /// Every light, each with its own sample count.
    #[default]
    Full,
    /// Every light, with the light sample budget split evenly between them.
    FullSplit,
    /// One light picked uniformly at random.
    UniformSingle,
    /// `light_samples` lights picked uniformly at random, with replacement.
    UniformMultiple,
    /// One light picked proportionally to its intensity.
    Weighted,
    /// One light picked proportionally to its unshadowed contribution at the
    /// shading point.
    RadianceWeighted,
}

/// Settings for a render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    /// Tile edge length in pixels
    pub tile_size: u32,
    /// Worker threads, 0 = one per logical core
    pub threads: usize,
    /// Run Initial/Draft passes before the full quality passes
    pub progressive: bool,
    /// Progressive renders repeat the last quality pass this many times,
    /// adding each repeat into the image
    pub progressive_iterations: u32,

    /// Antialiasing samples per axis (n gives n*n samples per pixel)
    pub antialiasing_samples: u32,

    /// Ambient occlusion samples per axis (n gives n*n occlusion rays)
    pub ambient_occlusion_samples: u32,
    /// Maximum occlusion distance, 0 = unbounded
    pub ambient_occlusion_distance: f32,
    /// Output the occlusion term only
    pub ambient_only: bool,
    /// Add an occlusion-attenuated ambient term to shading
    pub ambient_occlusion: bool,
    pub ambient_colour: [f32; 3],

    /// Diffuse reflection rays per hit, 0 disables diffuse bounces
    pub diffuse_reflection_samples: u32,

    pub light_sampling: LightSamplingType,
    /// Light sample budget used by FullSplit and UniformMultiple
    pub light_samples: u32,

    pub max_depth_overall: u32,
    pub max_depth_diffuse: u32,
    pub max_depth_reflection: u32,
    pub max_depth_refraction: u32,
    /// Paths whose importance falls below this are terminated
    pub min_importance: f32,

    /// Base epsilon for spawned rays, scaled by each hit's intersection error
    pub ray_epsilon: f32,
    pub seed: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            tile_size: 32,
            threads: 0,
            progressive: false,
            progressive_iterations: 1,
            antialiasing_samples: 3,
            ambient_occlusion_samples: 5,
            ambient_occlusion_distance: 0.0,
            ambient_only: false,
            ambient_occlusion: false,
            ambient_colour: [0.1, 0.1, 0.1],
            diffuse_reflection_samples: 0,
            light_sampling: LightSamplingType::Full,
            light_samples: 4,
            max_depth_overall: 4,
            max_depth_diffuse: 1,
            max_depth_reflection: 3,
            max_depth_refraction: 4,
            min_importance: 0.001,
            ray_epsilon: 0.0001,
            seed: 0,
        }
    }
}

impl RenderSettings {
    /// Upper bound for the per-axis sample counts, which are squared.
    pub const MAX_SAMPLES_PER_AXIS: u32 = 1024;

    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> RenderResult<Self> {
        let settings: RenderSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that would only fail once rendering has started.
    pub fn validate(&self) -> RenderResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidImageSize {
                width: self.width,
                height: self.height,
            });
        }
        if self.tile_size == 0 {
            return Err(RenderError::InvalidSetting("tile_size must be non-zero".into()));
        }
        if self.antialiasing_samples == 0 {
            return Err(RenderError::InvalidSampleCount {
                name: "antialiasing_samples",
                value: 0,
            });
        }
        if self.antialiasing_samples > Self::MAX_SAMPLES_PER_AXIS {
            return Err(RenderError::InvalidSampleCount {
                name: "antialiasing_samples",
                value: self.antialiasing_samples,
            });
        }
        if self.ambient_occlusion_samples > Self::MAX_SAMPLES_PER_AXIS {
            return Err(RenderError::InvalidSampleCount {
                name: "ambient_occlusion_samples",
                value: self.ambient_occlusion_samples,
            });
        }
        if (self.ambient_occlusion || self.ambient_only) && self.ambient_occlusion_samples == 0 {
            return Err(RenderError::InvalidSampleCount {
                name: "ambient_occlusion_samples",
                value: 0,
            });
        }
        if self.progressive_iterations == 0 {
            return Err(RenderError::InvalidSampleCount {
                name: "progressive_iterations",
                value: 0,
            });
        }
        if self.light_samples == 0 {
            return Err(RenderError::InvalidSampleCount {
                name: "light_samples",
                value: 0,
            });
        }
        if !(self.ray_epsilon > 0.0) {
            return Err(RenderError::InvalidSetting(format!(
                "ray_epsilon must be positive, got {}",
                self.ray_epsilon
            )));
        }
        if self.ambient_occlusion_distance < 0.0 {
            return Err(RenderError::InvalidSetting(
                "ambient_occlusion_distance must not be negative".into(),
            ));
        }
        Ok(())
    }

    pub fn ambient_colour(&self) -> Colour {
        Colour::from_array(self.ambient_colour)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(RenderSettings::default().validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let settings = RenderSettings::from_json(
            r#"{ "width": 64, "height": 32, "light_sampling": "radiance_weighted" }"#,
        )
        .unwrap();

        assert_eq!(settings.width, 64);
        assert_eq!(settings.height, 32);
        assert_eq!(settings.light_sampling, LightSamplingType::RadianceWeighted);
        assert_eq!(settings.tile_size, RenderSettings::default().tile_size);
    }

    #[test]
    fn test_zero_sample_counts_rejected() {
        let settings = RenderSettings {
            antialiasing_samples: 0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(RenderError::InvalidSampleCount { name: "antialiasing_samples", .. })
        ));

        let settings = RenderSettings {
            ambient_occlusion: true,
            ambient_occlusion_samples: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_oversized_sample_counts_rejected() {
        let settings = RenderSettings {
            antialiasing_samples: 70_000,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(RenderError::InvalidSampleCount {
                name: "antialiasing_samples",
                value: 70_000
            })
        ));

        let settings = RenderSettings {
            ambient_occlusion_samples: RenderSettings::MAX_SAMPLES_PER_AXIS + 1,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(RenderError::InvalidSampleCount { name: "ambient_occlusion_samples", .. })
        ));

        let settings = RenderSettings {
            antialiasing_samples: RenderSettings::MAX_SAMPLES_PER_AXIS,
            ..Default::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            RenderSettings::from_json("{ width: }"),
            Err(RenderError::Config(_))
        ));
    }
}
