//! Pure, stateless rigid-body dynamics for a single rocket (C3).
//!
//! Every function here takes an immutable [`PhysicsConfig`] and plain
//! numbers; nothing in this module owns state or touches configuration
//! globally. `Rocket` (in [`crate::rocket`]) is the only stateful caller.

use crate::config::ConfigView;
use crate::rocket::RocketState;

#[derive(Debug, Clone, Copy)]
pub struct PhysicsConfig {
    pub gravity: f64,
    pub thrust_power: f64,
    pub cold_gas_thrust_power: f64,
    pub fuel_consumption_rate: f64,
    pub air_density: f64,
    pub drag_coefficient: f64,
    pub reference_area: f64,
    pub rocket_radius: f64,
    pub cold_gas_moment_arm: f64,
    pub angular_damping: f64,
}

impl PhysicsConfig {
    pub fn from_config(cfg: &ConfigView) -> anyhow::Result<Self> {
        Ok(Self {
            gravity: cfg.require_f64("environment.gravity")?,
            thrust_power: cfg.require_f64("rocket.thrust_power")?,
            cold_gas_thrust_power: cfg.require_f64("rocket.cold_gas_thrust_power")?,
            fuel_consumption_rate: cfg.require_f64("rocket.fuel_consumption_rate")?,
            air_density: cfg.require_f64("environment.air_density")?,
            drag_coefficient: cfg.require_f64("rocket.drag_coefficient")?,
            reference_area: cfg.require_f64("rocket.reference_area")?,
            rocket_radius: cfg.require_f64("rocket.radius")?,
            cold_gas_moment_arm: cfg.require_f64("rocket.cold_gas_moment_arm")?,
            angular_damping: cfg.require_f64("rocket.angular_damping")?,
        })
    }
}

/// `(0, m*g)`, with `g` negative.
pub fn gravity_force(cfg: &PhysicsConfig, mass: f64) -> (f64, f64) {
    (0.0, mass * cfg.gravity)
}

/// Thrust acts along the rocket's longitudinal axis; `angle_deg` is tilt
/// from vertical, positive tilted right.
pub fn thrust_force(cfg: &PhysicsConfig, throttle: f64, angle_deg: f64) -> (f64, f64) {
    let throttle = throttle.clamp(0.0, 1.0);
    if throttle <= 1e-6 {
        return (0.0, 0.0);
    }
    let magnitude = throttle * cfg.thrust_power;
    let angle_rad = angle_deg.to_radians();
    (magnitude * angle_rad.sin(), magnitude * angle_rad.cos())
}

/// Quadratic drag opposing the velocity vector. Zero below the `|v|^2`
/// noise floor to avoid a divide-by-zero when normalizing direction.
pub fn drag_force(cfg: &PhysicsConfig, vx: f64, vy: f64) -> (f64, f64) {
    let speed_sq = vx * vx + vy * vy;
    if speed_sq < 1e-9 {
        return (0.0, 0.0);
    }
    let speed = speed_sq.sqrt();
    let magnitude = 0.5 * cfg.air_density * cfg.drag_coefficient * cfg.reference_area * speed_sq;
    (-magnitude * vx / speed, -magnitude * vy / speed)
}

pub fn net_force(
    cfg: &PhysicsConfig,
    mass: f64,
    throttle: f64,
    angle_deg: f64,
    velocity: (f64, f64),
) -> (f64, f64) {
    let (gx, gy) = gravity_force(cfg, mass);
    let (tx, ty) = thrust_force(cfg, throttle, angle_deg);
    let (dx, dy) = drag_force(cfg, velocity.0, velocity.1);
    (gx + tx + dx, gy + ty + dy)
}

pub fn linear_accel(force: (f64, f64), mass: f64) -> (f64, f64) {
    if mass <= 1e-6 {
        return (0.0, 0.0);
    }
    (force.0 / mass, force.1 / mass)
}

/// Solid-cylinder moment of inertia `I = 0.5*m*r^2`; torque from the cold
/// gas thrusters acting at `cold_gas_moment_arm`. Returns degrees/s^2.
pub fn angular_accel(cfg: &PhysicsConfig, cold_gas: f64, total_mass: f64) -> f64 {
    let cold_gas = cold_gas.clamp(-1.0, 1.0);
    if total_mass <= 1e-6 || cfg.rocket_radius <= 1e-6 {
        return 0.0;
    }
    let moment_of_inertia = 0.5 * total_mass * cfg.rocket_radius * cfg.rocket_radius;
    if moment_of_inertia < 1e-6 {
        return 0.0;
    }
    let torque = cfg.cold_gas_thrust_power * cold_gas * cfg.cold_gas_moment_arm;
    (torque / moment_of_inertia).to_degrees()
}

/// Normalizes to `[-180, 180)`.
pub fn normalize_angle(deg: f64) -> f64 {
    let wrapped = ((deg % 360.0) + 360.0) % 360.0;
    if wrapped >= 180.0 { wrapped - 360.0 } else { wrapped }
}

pub fn fuel_consumed(cfg: &PhysicsConfig, throttle: f64, dt: f64) -> f64 {
    (throttle.clamp(0.0, 1.0) * cfg.fuel_consumption_rate * dt).max(0.0)
}

/// Position Verlet for x/y, damped position Verlet for angle, forward
/// difference for both velocities. `current` must already have `ax`, `ay`
/// and `angular_acceleration` populated from forces evaluated *at* `current`.
pub fn step_verlet(
    cfg: &PhysicsConfig,
    current: &RocketState,
    previous: &RocketState,
    dt: f64,
) -> RocketState {
    let mut next = current.clone();

    next.x = 2.0 * current.x - previous.x + current.ax * dt * dt;
    next.y = 2.0 * current.y - previous.y + current.ay * dt * dt;
    next.vx = (next.x - current.x) / dt;
    next.vy = (next.y - current.y) / dt;

    let damping_factor = (1.0 - cfg.angular_damping * dt).max(0.0);
    let angle_change_damped = (current.angle - previous.angle) * damping_factor;
    next.angle = current.angle + angle_change_damped + current.angular_acceleration * dt * dt;
    next.angular_velocity = (next.angle - current.angle) / dt;
    next.angle = normalize_angle(next.angle);

    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cfg() -> PhysicsConfig {
        PhysicsConfig {
            gravity: -9.81,
            thrust_power: 45_000.0,
            cold_gas_thrust_power: 880.0,
            fuel_consumption_rate: 15.0,
            air_density: 1.225,
            drag_coefficient: 0.8,
            reference_area: 10.8,
            rocket_radius: 1.85,
            cold_gas_moment_arm: 1.85,
            angular_damping: 0.05,
        }
    }

    #[test]
    fn zero_throttle_gives_zero_thrust() {
        assert_eq!(thrust_force(&cfg(), 0.0, 0.0), (0.0, 0.0));
        assert_eq!(thrust_force(&cfg(), 1e-7, 10.0), (0.0, 0.0));
    }

    #[test]
    fn upright_thrust_is_purely_vertical() {
        let (fx, fy) = thrust_force(&cfg(), 1.0, 0.0);
        assert_relative_eq!(fx, 0.0, epsilon = 1e-9);
        assert_relative_eq!(fy, cfg().thrust_power);
    }

    #[test]
    fn drag_below_noise_floor_is_zero() {
        assert_eq!(drag_force(&cfg(), 1e-5, 1e-5), (0.0, 0.0));
    }

    #[test]
    fn drag_opposes_velocity() {
        let (dx, dy) = drag_force(&cfg(), 10.0, 0.0);
        assert!(dx < 0.0);
        assert_eq!(dy, 0.0);
    }

    #[test]
    fn normalize_angle_wraps_into_range() {
        assert_relative_eq!(normalize_angle(0.0), 0.0);
        assert_relative_eq!(normalize_angle(180.0), -180.0);
        assert_relative_eq!(normalize_angle(-180.0), -180.0);
        assert_relative_eq!(normalize_angle(350.0), -10.0);
        assert_relative_eq!(normalize_angle(-350.0), 10.0);
        assert_relative_eq!(normalize_angle(720.5), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn degenerate_mass_gives_zero_accel() {
        assert_eq!(linear_accel((100.0, 100.0), 0.0), (0.0, 0.0));
        assert_eq!(angular_accel(&cfg(), 1.0, 0.0), 0.0);
    }

    #[test]
    fn fuel_consumption_is_nonnegative_and_monotonic_in_throttle() {
        let low = fuel_consumed(&cfg(), 0.2, 0.1);
        let high = fuel_consumed(&cfg(), 0.8, 0.1);
        assert!(low >= 0.0);
        assert!(high > low);
    }
}
