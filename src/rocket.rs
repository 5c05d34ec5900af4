//! Rocket (C4): stateful per-rocket object owning current and previous
//! state, stepping one Verlet integration given an [`Action`].

mod sampler;
pub use sampler::{SamplerConfig, sample_initial_state};

use rand::Rng;
use serde::Serialize;

use crate::error::RocketFault;
use crate::physics::{self, PhysicsConfig};

/// SI units throughout: meters, m/s, m/s^2, degrees, deg/s, kg.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RocketState {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub ax: f64,
    pub ay: f64,
    pub angle: f64,
    pub angular_velocity: f64,
    pub angular_acceleration: f64,
    pub mass: f64,
    pub fuel_mass: f64,
}

impl RocketState {
    pub fn total_mass(&self) -> f64 {
        self.mass + self.fuel_mass
    }

    pub fn speed(&self) -> f64 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }

    pub fn relative_angle(&self) -> f64 {
        self.angle.abs()
    }
}

/// [`RocketState`] plus the derived fields computed only on export, each
/// rounded to 3 decimals, matching `get_state()` in the original design.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RocketStateExport {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub ax: f64,
    pub ay: f64,
    pub angle: f64,
    pub angular_velocity: f64,
    pub angular_acceleration: f64,
    pub mass: f64,
    pub fuel_mass: f64,
    pub speed: f64,
    pub relative_angle: f64,
    pub total_mass: f64,
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

impl From<&RocketState> for RocketStateExport {
    fn from(s: &RocketState) -> Self {
        Self {
            x: round3(s.x),
            y: round3(s.y),
            vx: round3(s.vx),
            vy: round3(s.vy),
            ax: round3(s.ax),
            ay: round3(s.ay),
            angle: round3(s.angle),
            angular_velocity: round3(s.angular_velocity),
            angular_acceleration: round3(s.angular_acceleration),
            mass: round3(s.mass),
            fuel_mass: round3(s.fuel_mass),
            speed: round3(s.speed()),
            relative_angle: round3(s.relative_angle()),
            total_mass: round3(s.total_mass()),
        }
    }
}

/// Operator/policy control input, clamped on ingress.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Action {
    pub throttle: f64,
    pub cold_gas: f64,
}

impl Action {
    pub fn new(throttle: f64, cold_gas: f64) -> Self {
        Self {
            throttle: throttle.clamp(0.0, 1.0),
            cold_gas: cold_gas.clamp(-1.0, 1.0),
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

pub struct Rocket {
    current: RocketState,
    previous: RocketState,
    first_step: bool,
    physics: PhysicsConfig,
    sampler: SamplerConfig,
    dt: f64,
}

impl Rocket {
    pub fn new<R: Rng + ?Sized>(
        rng: &mut R,
        physics: PhysicsConfig,
        sampler: SamplerConfig,
        dt: f64,
    ) -> Self {
        let current = sample_initial_state(rng, &sampler);
        let previous = back_integrate(&physics, &current, dt);
        Self {
            current,
            previous,
            first_step: true,
            physics,
            sampler,
            dt,
        }
    }

    pub fn state(&self) -> &RocketState {
        &self.current
    }

    pub fn get_state(&self) -> RocketStateExport {
        RocketStateExport::from(&self.current)
    }

    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.current = sample_initial_state(rng, &self.sampler);
        self.previous = back_integrate(&self.physics, &self.current, self.dt);
        self.first_step = true;
    }

    /// Returns `Ok(())` on a normal (possibly degenerate-and-skipped) step,
    /// `Err(RocketFault::Fatal)` if the integration produced a non-finite
    /// value — the caller marks this rocket done with a large penalty.
    pub fn step(&mut self, action: Action) -> Result<(), RocketFault> {
        let mut throttle = action.throttle.clamp(0.0, 1.0);
        let cold_gas = action.cold_gas.clamp(-1.0, 1.0);

        if self.current.fuel_mass <= 0.0 {
            throttle = 0.0;
            self.current.fuel_mass = 0.0;
        }

        let total_mass = self.current.mass + self.current.fuel_mass;
        if total_mass <= 1e-6 {
            return Err(RocketFault::Degenerate);
        }

        let net_force = physics::net_force(
            &self.physics,
            total_mass,
            throttle,
            self.current.angle,
            (self.current.vx, self.current.vy),
        );
        let (ax, ay) = physics::linear_accel(net_force, total_mass);
        self.current.ax = ax;
        self.current.ay = ay;
        self.current.angular_acceleration =
            physics::angular_accel(&self.physics, cold_gas, total_mass);

        let next = physics::step_verlet(&self.physics, &self.current, &self.previous, self.dt);
        if !next.x.is_finite() || !next.y.is_finite() || !next.angle.is_finite() {
            return Err(RocketFault::Fatal);
        }

        self.previous = self.current;
        self.current = next;
        self.current.fuel_mass =
            (self.current.fuel_mass - physics::fuel_consumed(&self.physics, throttle, self.dt))
                .max(0.0);
        self.first_step = false;
        Ok(())
    }

    pub fn first_step(&self) -> bool {
        self.first_step
    }
}

/// Back-integrates a previous state consistent with zero control input, so
/// the first Verlet step behaves like a single Euler step.
fn back_integrate(cfg: &PhysicsConfig, current: &RocketState, dt: f64) -> RocketState {
    let total_mass = current.mass + current.fuel_mass;
    let (ax, ay) = if total_mass <= 1e-6 {
        (0.0, 0.0)
    } else {
        let force = physics::net_force(
            cfg,
            total_mass,
            0.0,
            current.angle,
            (current.vx, current.vy),
        );
        physics::linear_accel(force, total_mass)
    };
    let angular_acceleration = if total_mass <= 1e-6 {
        0.0
    } else {
        physics::angular_accel(cfg, 0.0, total_mass)
    };

    let mut previous = *current;
    previous.x = current.x - current.vx * dt + 0.5 * ax * dt * dt;
    previous.y = current.y - current.vy * dt + 0.5 * ay * dt * dt;
    previous.angle = physics::normalize_angle(
        current.angle - current.angular_velocity * dt + 0.5 * angular_acceleration * dt * dt,
    );
    previous.ax = ax;
    previous.ay = ay;
    previous.angular_acceleration = angular_acceleration;
    previous.vx = current.vx - ax * dt;
    previous.vy = current.vy - ay * dt;
    previous.angular_velocity = current.angular_velocity - angular_acceleration * dt;
    previous
}
