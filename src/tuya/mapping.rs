use chrono::{DateTime, Utc};

use crate::models::{DeviceReading, PowerReading};

use super::models::{DeviceDto, DeviceProperty, DpValue, LogEntry};

pub const UNKNOWN_ROOM: &str = "Unknown Room";

/// DP code that drives the plug relay.
pub const SWITCH_CODE: &str = "switch_1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadingField {
    PowerState,
    CurrentPower,
    Voltage,
    Current,
    TotalEnergy,
}

/// Data-point codes the plugs report, and where each one lands.
const STATUS_CODES: &[(&str, ReadingField)] = &[
    (SWITCH_CODE, ReadingField::PowerState),
    ("cur_power", ReadingField::CurrentPower),
    ("cur_voltage", ReadingField::Voltage),
    ("cur_current", ReadingField::Current),
    ("add_ele", ReadingField::TotalEnergy),
];

/// Electrical part of a reading, with every field defaulted.
#[derive(Debug, Default, Clone, PartialEq)]
struct Telemetry {
    power_state: bool,
    current_power: f64,
    voltage: f64,
    current: f64,
    total_energy: f64,
}

impl Telemetry {
    /// First occurrence of each known code wins; unknown codes are ignored.
    fn from_properties(props: &[DeviceProperty]) -> Self {
        let mut telemetry = Telemetry::default();
        for &(code, field) in STATUS_CODES {
            let value = props
                .iter()
                .find(|p| p.code == code)
                .and_then(|p| p.value.as_ref());
            if let Some(value) = value {
                telemetry.apply(field, value);
            }
        }
        telemetry
    }

    fn apply(&mut self, field: ReadingField, value: &DpValue) {
        let number = || value.as_f64().unwrap_or(0.0).max(0.0);
        match field {
            ReadingField::PowerState => self.power_state = value.as_bool().unwrap_or(false),
            ReadingField::CurrentPower => self.current_power = number(),
            ReadingField::Voltage => self.voltage = number(),
            ReadingField::Current => self.current = number(),
            ReadingField::TotalEnergy => self.total_energy = number(),
        }
    }
}

/// Build a reading from a device object.
///
/// `requested_id` is set for single-device lookups and always wins over the
/// payload id (the status endpoint does not always echo it). The room label
/// comes from the provider's name only, never from the placeholder name.
pub fn device_reading(
    device: DeviceDto,
    requested_id: Option<&str>,
    now: DateTime<Utc>,
) -> DeviceReading {
    let room_number = room_label(device.name.as_deref().unwrap_or_default());
    let id = match requested_id {
        Some(id) => id.to_owned(),
        None => device.id.unwrap_or_default(),
    };
    let name = match device.name {
        Some(name) => name,
        None if requested_id.is_some() => format!("Device {id}"),
        None => String::new(),
    };
    let telemetry = Telemetry::from_properties(device.status.as_deref().unwrap_or_default());

    DeviceReading {
        room_number,
        id,
        name,
        online: device.online.unwrap_or(false),
        power_state: telemetry.power_state,
        current_power: telemetry.current_power,
        voltage: telemetry.voltage,
        current: telemetry.current,
        total_energy: telemetry.total_energy,
        last_update: now,
    }
}

/// Build a history entry from a log record. Only power is reported by the
/// log endpoint.
pub fn power_reading(device_id: &str, entry: &LogEntry) -> PowerReading {
    let timestamp = DateTime::from_timestamp_millis(entry.event_time.unwrap_or(0))
        .unwrap_or(DateTime::UNIX_EPOCH);
    let power = entry
        .value
        .as_ref()
        .and_then(DpValue::as_f64)
        .unwrap_or(0.0)
        .max(0.0);

    PowerReading {
        device_id: device_id.to_owned(),
        timestamp,
        power,
        voltage: None,
        current: None,
        energy: None,
    }
}

/// Derive a room label from a device name.
///
/// `"Room 203 Plug"` → `"Room 203"` (the word "room", any spacing, then
/// digits, case-insensitive); otherwise the first run of three digits, so
/// `"Plug-104"` → `"Room 104"`; otherwise `"Unknown Room"`.
pub fn room_label(name: &str) -> String {
    number_after_room_keyword(name)
        .or_else(|| first_three_digits(name))
        .map(|n| format!("Room {n}"))
        .unwrap_or_else(|| UNKNOWN_ROOM.to_owned())
}

fn number_after_room_keyword(name: &str) -> Option<&str> {
    name.char_indices().find_map(|(i, _)| {
        let keyword = name.get(i..i + 4)?;
        if !keyword.eq_ignore_ascii_case("room") {
            return None;
        }
        let rest = name[i + 4..].trim_start();
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .map_or(rest, |end| &rest[..end]);
        (!digits.is_empty()).then_some(digits)
    })
}

fn first_three_digits(name: &str) -> Option<&str> {
    name.as_bytes()
        .windows(3)
        .position(|w| w.iter().all(u8::is_ascii_digit))
        .map(|i| &name[i..i + 3])
}
