//! Configuration module - environment variable parsing

use std::env;
use std::str::FromStr;

/// Highest simulation rate accepted; the fixed step must stay well above zero
pub const MAX_FPS: u32 = 1000;

/// Engine configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Ticks between snapshots sent by the authority
    pub packet_period_frames: u32,
    /// Ticks between input frame flushes on the client
    pub input_gathering_period_frames: u32,
    /// Target simulation rate
    pub fps: u32,
    /// Upper bound on simulation steps run for a single wall-clock frame
    pub max_catch_up_steps: u32,
    /// Input frames kept while the transport is unavailable
    pub input_buffer_capacity: usize,
    /// Queued input frames per object before the authority catches up in one step
    pub max_input_backlog: usize,
    /// Test every projectile instead of stopping at the first one past the target
    pub hit_test_exhaustive: bool,

    /// Seed for spawn placement
    pub spawn_seed: u64,
    /// Radius around the origin used to scatter spawns (0 = default spawn transform)
    pub spawn_radius: f32,

    /// Fraction of the prediction error corrected per snapshot
    pub reconcile_blend: f32,
    /// Prediction error above which the player's ship is snapped
    pub reconcile_snap_distance: f32,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Number of loopback clients started by the demo binary
    pub demo_clients: usize,
    /// How long the demo runs before shutting down
    pub demo_duration_secs: u64,
    /// Probability that the demo transport drops an outbound message
    pub demo_packet_loss: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            packet_period_frames: 3,
            input_gathering_period_frames: 2,
            fps: 60,
            max_catch_up_steps: 5,
            input_buffer_capacity: 120,
            max_input_backlog: 8,
            hit_test_exhaustive: false,
            spawn_seed: 0x5EED,
            spawn_radius: 0.0,
            reconcile_blend: 0.35,
            reconcile_snap_distance: 4.0,
            log_level: "info".to_string(),
            demo_clients: 2,
            demo_duration_secs: 10,
            demo_packet_loss: 0.0,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            packet_period_frames: parse_var("PACKET_PERIOD_FRAMES", defaults.packet_period_frames)?,
            input_gathering_period_frames: parse_var(
                "INPUT_GATHERING_PERIOD_FRAMES",
                defaults.input_gathering_period_frames,
            )?,
            fps: parse_var("FPS", defaults.fps)?,
            max_catch_up_steps: parse_var("MAX_CATCH_UP_STEPS", defaults.max_catch_up_steps)?,
            input_buffer_capacity: parse_var("INPUT_BUFFER_CAPACITY", defaults.input_buffer_capacity)?,
            max_input_backlog: parse_var("MAX_INPUT_BACKLOG", defaults.max_input_backlog)?,
            hit_test_exhaustive: parse_var("HIT_TEST_EXHAUSTIVE", defaults.hit_test_exhaustive)?,

            spawn_seed: parse_var("SPAWN_SEED", defaults.spawn_seed)?,
            spawn_radius: parse_var("SPAWN_RADIUS", defaults.spawn_radius)?,

            reconcile_blend: parse_var("RECONCILE_BLEND", defaults.reconcile_blend)?,
            reconcile_snap_distance: parse_var(
                "RECONCILE_SNAP_DISTANCE",
                defaults.reconcile_snap_distance,
            )?,

            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),

            demo_clients: parse_var("DEMO_CLIENTS", defaults.demo_clients)?,
            demo_duration_secs: parse_var("DEMO_DURATION_SECS", defaults.demo_duration_secs)?,
            demo_packet_loss: parse_var("DEMO_PACKET_LOSS", defaults.demo_packet_loss)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the simulation cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("PACKET_PERIOD_FRAMES", self.packet_period_frames),
            ("INPUT_GATHERING_PERIOD_FRAMES", self.input_gathering_period_frames),
            ("FPS", self.fps),
            ("MAX_CATCH_UP_STEPS", self.max_catch_up_steps),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    name,
                    value: value.to_string(),
                });
            }
        }
        if self.fps > MAX_FPS {
            return Err(ConfigError::Invalid {
                name: "FPS",
                value: self.fps.to_string(),
            });
        }
        let distances = [
            ("SPAWN_RADIUS", self.spawn_radius),
            ("RECONCILE_SNAP_DISTANCE", self.reconcile_snap_distance),
        ];
        for (name, value) in distances {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid {
                    name,
                    value: value.to_string(),
                });
            }
        }
        if self.input_buffer_capacity == 0 {
            return Err(ConfigError::Invalid {
                name: "INPUT_BUFFER_CAPACITY",
                value: "0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.reconcile_blend) {
            return Err(ConfigError::Invalid {
                name: "RECONCILE_BLEND",
                value: self.reconcile_blend.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.demo_packet_loss) {
            return Err(ConfigError::Invalid {
                name: "DEMO_PACKET_LOSS",
                value: self.demo_packet_loss.to_string(),
            });
        }
        Ok(())
    }

    /// Fixed simulation step in seconds
    pub fn timestep_secs(&self) -> f32 {
        1.0 / self.fps as f32
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!((config.timestep_secs() - 1.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn zero_fps_is_rejected() {
        let config = Config {
            fps: 0,
            ..Config::default()
        };
        match config.validate() {
            Err(ConfigError::Invalid { name, .. }) => assert_eq!(name, "FPS"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn fps_above_cap_is_rejected() {
        let config = Config {
            fps: MAX_FPS + 1,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { name: "FPS", .. })
        ));
        assert!(Config { fps: MAX_FPS, ..Config::default() }.validate().is_ok());
    }

    #[test]
    fn non_finite_or_negative_distances_are_rejected() {
        for radius in [f32::NAN, f32::INFINITY, -1.0] {
            let config = Config {
                spawn_radius: radius,
                ..Config::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::Invalid { name: "SPAWN_RADIUS", .. })
            ));
        }
        let config = Config {
            reconcile_snap_distance: f32::NAN,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { name: "RECONCILE_SNAP_DISTANCE", .. })
        ));
    }

    #[test]
    fn blend_outside_unit_range_is_rejected() {
        let config = Config {
            reconcile_blend: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
