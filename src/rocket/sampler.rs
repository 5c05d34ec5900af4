//! Initial State Sampler (C2): produces a randomized but bounded initial
//! rocket state from configured ranges.

use rand::Rng;

use crate::config::ConfigView;
use super::RocketState;

#[derive(Debug, Clone, Copy)]
pub struct SamplerConfig {
    pub x: (f64, f64),
    pub y: (f64, f64),
    pub vx: (f64, f64),
    pub vy: (f64, f64),
    pub ax: (f64, f64),
    pub ay: (f64, f64),
    pub angle: (f64, f64),
    pub angular_velocity: (f64, f64),
    pub dry_mass: (f64, f64),
    pub fuel_mass: (f64, f64),
}

impl SamplerConfig {
    pub fn from_config(cfg: &ConfigView) -> anyhow::Result<Self> {
        Ok(Self {
            x: cfg.require_pair("rocket.position_limits.x")?,
            y: cfg.require_pair("rocket.position_limits.y")?,
            vx: cfg.require_pair("rocket.velocity_limits.vx")?,
            vy: cfg.require_pair("rocket.velocity_limits.vy")?,
            ax: cfg.require_pair("rocket.acceleration_limits.ax")?,
            ay: cfg.require_pair("rocket.acceleration_limits.ay")?,
            angle: cfg.require_pair("rocket.attitude_limits.angle")?,
            angular_velocity: cfg.require_pair("rocket.attitude_limits.angular_velocity")?,
            dry_mass: cfg.require_pair("rocket.mass_limits.dry_mass")?,
            fuel_mass: cfg.require_pair("rocket.mass_limits.fuel_mass")?,
        })
    }
}

fn sample<R: Rng + ?Sized>(rng: &mut R, range: (f64, f64)) -> f64 {
    rng.random_range(range.0..=range.1)
}

/// Draws a bounded initial state. `ax`/`ay`/`angular_acceleration` are
/// sampled directly rather than derived, matching the original sampler's
/// `get_initial_state`; [`super::Rocket::reset`] overwrites them with
/// physically-consistent values before the first Verlet step anyway.
pub fn sample_initial_state<R: Rng + ?Sized>(rng: &mut R, cfg: &SamplerConfig) -> RocketState {
    RocketState {
        x: sample(rng, cfg.x),
        y: sample(rng, cfg.y),
        vx: sample(rng, cfg.vx),
        vy: sample(rng, cfg.vy),
        ax: sample(rng, cfg.ax),
        ay: sample(rng, cfg.ay),
        angle: sample(rng, cfg.angle),
        angular_velocity: sample(rng, cfg.angular_velocity),
        angular_acceleration: 0.0,
        mass: sample(rng, cfg.dry_mass),
        fuel_mass: sample(rng, cfg.fuel_mass),
    }
}
