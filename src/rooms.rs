use crate::models::{DeviceReading, PowerThresholds, RoomState, RoomStatus};

/// Label put on rooms in the alert band. It only says "something draws a
/// lot", it does not identify an appliance.
pub const HIGH_POWER_DEVICE_LABEL: &str = "High Power Device";

/// Room statuses for `readings` using the default power bands.
pub fn normalize(readings: &[DeviceReading]) -> Vec<RoomStatus> {
    normalize_with(readings, &PowerThresholds::default())
}

/// One `RoomStatus` per reading, in input order.
pub fn normalize_with(readings: &[DeviceReading], thresholds: &PowerThresholds) -> Vec<RoomStatus> {
    readings
        .iter()
        .map(|reading| room_status(reading, thresholds))
        .collect()
}

pub fn room_status(reading: &DeviceReading, thresholds: &PowerThresholds) -> RoomStatus {
    let power = reading.current_power;
    let status = classify(power, thresholds);

    RoomStatus {
        id: reading.id.clone(),
        number: reading.room_number.clone(),
        status,
        current_usage: usage_kw(power),
        percentage: capacity_percentage(power, thresholds.capacity_watts),
        detected_device: (status == RoomState::Alert).then(|| HIGH_POWER_DEVICE_LABEL.to_owned()),
        warning_count: u32::from(power > thresholds.warning_watts),
    }
}

pub fn classify(power: f64, thresholds: &PowerThresholds) -> RoomState {
    if power > thresholds.alert_watts {
        RoomState::Alert
    } else if power > thresholds.warning_watts {
        RoomState::Warning
    } else {
        RoomState::Normal
    }
}

/// Watts → kW rounded to one decimal.
fn usage_kw(power: f64) -> f64 {
    (power / 1000.0 * 10.0).round() / 10.0
}

fn capacity_percentage(power: f64, capacity: f64) -> u8 {
    let pct = (power / capacity * 100.0).round();
    if pct.is_nan() {
        return 0;
    }
    pct.clamp(0.0, 100.0) as u8
}
