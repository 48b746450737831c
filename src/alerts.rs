use chrono::{DateTime, Utc};

use crate::models::{AlertType, DeviceAlert, DeviceReading, PowerThresholds, Severity};

pub const OFFLINE_MESSAGE: &str = "Device is offline";
pub const UNAUTHORIZED_DEVICE_MESSAGE: &str = "Possible unauthorized high-power device detected";

/// Alerts for `readings` using the default power bands, stamped with the
/// current time.
pub fn detect(readings: &[DeviceReading]) -> Vec<DeviceAlert> {
    detect_with(readings, &PowerThresholds::default(), Utc::now())
}

/// Evaluate every reading independently; a device can raise several alerts
/// at once. Stateless: the full set is rebuilt on every call and `now` is
/// used as the timestamp of each alert.
pub fn detect_with(
    readings: &[DeviceReading],
    thresholds: &PowerThresholds,
    now: DateTime<Utc>,
) -> Vec<DeviceAlert> {
    readings
        .iter()
        .flat_map(|reading| device_alerts(reading, thresholds, now))
        .collect()
}

fn device_alerts(
    reading: &DeviceReading,
    thresholds: &PowerThresholds,
    now: DateTime<Utc>,
) -> Vec<DeviceAlert> {
    let power = reading.current_power;
    let critical = power > thresholds.critical_watts;
    let alert = |alert_type: AlertType, message: String, severity: Severity| DeviceAlert {
        device_id: reading.id.clone(),
        room_number: reading.room_number.clone(),
        alert_type,
        message,
        timestamp: now,
        severity,
    };

    let mut alerts = Vec::new();

    if power > thresholds.alert_watts {
        alerts.push(alert(
            AlertType::HighPower,
            format!("High power usage detected: {:.2}kW", power / 1000.0),
            if critical { Severity::High } else { Severity::Medium },
        ));
    }

    if !reading.online {
        alerts.push(alert(AlertType::Offline, OFFLINE_MESSAGE.to_owned(), Severity::Medium));
    }

    if critical {
        alerts.push(alert(
            AlertType::UnauthorizedDevice,
            UNAUTHORIZED_DEVICE_MESSAGE.to_owned(),
            Severity::High,
        ));
    }

    alerts
}
