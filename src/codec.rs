//! Binary Telemetry Codec (C8): frames per-tick rocket state into the
//! fixed-width wire format, grounded field-for-field on the original
//! `BinaryProtocol`.

const MESSAGE_TYPE_TELEMETRY: u8 = 1;
const FIELDS_PER_ROCKET: usize = 16;
const BYTES_PER_ROCKET: usize = FIELDS_PER_ROCKET * 4;

/// One rocket's worth of telemetry for a single tick, in exact wire order:
/// `x, y, vx, vy, ax, ay, angle, angularVelocity, angularAcceleration,
/// mass, fuelMass, reward, throttle, coldGas, landingCode, isActive`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryRecord {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub ax: f32,
    pub ay: f32,
    pub angle: f32,
    pub angular_velocity: f32,
    pub angular_acceleration: f32,
    pub mass: f32,
    pub fuel_mass: f32,
    pub reward: f32,
    pub throttle: f32,
    pub cold_gas: f32,
    pub landing_code: f32,
    pub is_active: f32,
}

impl TelemetryRecord {
    /// An inactive-rocket frame: kinematics zeroed, reward NaN, actions
    /// zero, landing code taken from the final-outcomes cache (or 0).
    pub fn inactive(cached_landing_code: u8) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            ax: 0.0,
            ay: 0.0,
            angle: 0.0,
            angular_velocity: 0.0,
            angular_acceleration: 0.0,
            mass: 0.0,
            fuel_mass: 0.0,
            reward: f32::NAN,
            throttle: 0.0,
            cold_gas: 0.0,
            landing_code: cached_landing_code as f32,
            is_active: 0.0,
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        for field in [
            self.x,
            self.y,
            self.vx,
            self.vy,
            self.ax,
            self.ay,
            self.angle,
            self.angular_velocity,
            self.angular_acceleration,
            self.mass,
            self.fuel_mass,
            self.reward,
            self.throttle,
            self.cold_gas,
            self.landing_code,
            self.is_active,
        ] {
            out.extend_from_slice(&field.to_le_bytes());
        }
    }

    fn read_from(bytes: &[u8]) -> Self {
        let f = |i: usize| f32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
        Self {
            x: f(0),
            y: f(1),
            vx: f(2),
            vy: f(3),
            ax: f(4),
            ay: f(5),
            angle: f(6),
            angular_velocity: f(7),
            angular_acceleration: f(8),
            mass: f(9),
            fuel_mass: f(10),
            reward: f(11),
            throttle: f(12),
            cold_gas: f(13),
            landing_code: f(14),
            is_active: f(15),
        }
    }
}

/// Encodes a full telemetry frame: `1 + records.len()*64` bytes.
pub fn encode_frame(records: &[TelemetryRecord]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + records.len() * BYTES_PER_ROCKET);
    out.push(MESSAGE_TYPE_TELEMETRY);
    for record in records {
        record.write_to(&mut out);
    }
    out
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame too short: {0} bytes")]
    TooShort(usize),
    #[error("unexpected message type: {0}")]
    WrongMessageType(u8),
    #[error("payload length {payload_len} is not a multiple of {BYTES_PER_ROCKET}")]
    MisalignedPayload { payload_len: usize },
}

/// Decodes a telemetry frame produced by [`encode_frame`].
pub fn decode_frame(bytes: &[u8]) -> Result<Vec<TelemetryRecord>, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::TooShort(bytes.len()));
    }
    if bytes[0] != MESSAGE_TYPE_TELEMETRY {
        return Err(DecodeError::WrongMessageType(bytes[0]));
    }
    let payload = &bytes[1..];
    if payload.len() % BYTES_PER_ROCKET != 0 {
        return Err(DecodeError::MisalignedPayload {
            payload_len: payload.len(),
        });
    }
    Ok(payload
        .chunks_exact(BYTES_PER_ROCKET)
        .map(TelemetryRecord::read_from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_record() -> TelemetryRecord {
        TelemetryRecord {
            x: 1.0,
            y: 200.5,
            vx: -1.5,
            vy: -4.0,
            ax: 0.0,
            ay: -9.81,
            angle: 2.0,
            angular_velocity: 0.1,
            angular_acceleration: 0.0,
            mass: 1000.0,
            fuel_mass: 50.0,
            reward: 0.25,
            throttle: 0.6,
            cold_gas: -0.1,
            landing_code: 0.0,
            is_active: 1.0,
        }
    }

    #[test]
    fn round_trip_preserves_active_record_exactly() {
        let record = active_record();
        let bytes = encode_frame(&[record]);
        assert_eq!(bytes.len(), 1 + BYTES_PER_ROCKET);
        assert_eq!(bytes[0], 1);
        let decoded = decode_frame(&bytes).unwrap();
        assert_eq!(decoded, vec![record]);
    }

    #[test]
    fn inactive_record_decodes_to_zeros_and_nan_reward() {
        let record = TelemetryRecord::inactive(4);
        let bytes = encode_frame(&[record]);
        let decoded = decode_frame(&bytes).unwrap();
        let d = decoded[0];
        assert_eq!(d.x, 0.0);
        assert_eq!(d.throttle, 0.0);
        assert_eq!(d.cold_gas, 0.0);
        assert_eq!(d.is_active, 0.0);
        assert_eq!(d.landing_code, 4.0);
        assert!(d.reward.is_nan());
    }

    #[test]
    fn three_rocket_frame_has_expected_length_and_message_type() {
        let records = vec![active_record(), TelemetryRecord::inactive(0), TelemetryRecord::inactive(2)];
        let bytes = encode_frame(&records);
        assert_eq!(bytes.len(), 1 + 3 * BYTES_PER_ROCKET);
        assert_eq!(bytes.len(), 193);
        assert_eq!(bytes[0], 1);
        let decoded = decode_frame(&bytes).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[1].is_active, 0.0);
        assert!(decoded[1].reward.is_nan());
        assert_eq!(decoded[2].landing_code, 2.0);
    }

    #[test]
    fn rejects_wrong_message_type() {
        let mut bytes = encode_frame(&[active_record()]);
        bytes[0] = 9;
        assert_eq!(decode_frame(&bytes), Err(DecodeError::WrongMessageType(9)));
    }

    #[test]
    fn rejects_misaligned_payload() {
        let mut bytes = encode_frame(&[active_record()]);
        bytes.pop();
        assert!(matches!(
            decode_frame(&bytes),
            Err(DecodeError::MisalignedPayload { .. })
        ));
    }

    #[test]
    fn rejects_empty_buffer() {
        assert_eq!(decode_frame(&[]), Err(DecodeError::TooShort(0)));
    }
}
