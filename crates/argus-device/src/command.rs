// argus-device/src/command.rs
use argus_camera::Property;
use crossbeam_channel::Sender;
use std::fmt;
use std::time::Duration;

/// Loosely typed command payload.
///
/// Callers (HTTP handlers, scripts) hand over whatever they parsed;
/// the loop coerces it and never rejects a command for a bad value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Numeric view; anything unusable becomes `0.0`.
    pub fn as_f64(&self) -> f64 {
        let v = match self {
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Text(s) => s.trim().parse().unwrap_or(0.0),
            Value::None => 0.0,
        };
        if v.is_finite() {
            v
        } else {
            0.0
        }
    }

    /// Boolean view; anything unusable becomes `false`.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "on" | "yes"),
            Value::None => false,
        }
    }

    /// Positive duration in seconds, or `None` if the payload has none
    /// or it does not fit a `Duration`.
    pub fn as_duration(&self) -> Option<Duration> {
        let secs = match self {
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::Text(s) => s.trim().parse().ok()?,
            Value::Bool(_) | Value::None => return None,
        };
        if secs <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(secs).ok()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        Value::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Duration> for Value {
    fn from(d: Duration) -> Self {
        Value::Float(d.as_secs_f64())
    }
}

/// A request for the device loop.  Consumed exactly once.
#[derive(Debug)]
pub enum Command {
    /// Read a property.  The value is sent on `reply` when present;
    /// the loop never blocks on it.
    GetProperty {
        property: Property,
        reply: Option<Sender<Option<f64>>>,
    },
    SetProperty { property: Property, value: Value },
    HideAll(Value),
    StartRecording { duration: Value },
    StopRecording,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    GetProperty,
    SetProperty,
    HideAll,
    StartRecording,
    StopRecording,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::GetProperty { .. } => CommandKind::GetProperty,
            Command::SetProperty { .. } => CommandKind::SetProperty,
            Command::HideAll(_) => CommandKind::HideAll,
            Command::StartRecording { .. } => CommandKind::StartRecording,
            Command::StopRecording => CommandKind::StopRecording,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CommandKind::GetProperty => "Get",
            CommandKind::SetProperty => "Set",
            CommandKind::HideAll => "HideAll",
            CommandKind::StartRecording => "RecordStart",
            CommandKind::StopRecording => "RecordStop",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_coercion_defaults_to_zero() {
        assert_eq!(Value::from(3).as_f64(), 3.0);
        assert_eq!(Value::from(0.25).as_f64(), 0.25);
        assert_eq!(Value::from(" 12.5 ").as_f64(), 12.5);
        assert_eq!(Value::from("bright").as_f64(), 0.0);
        assert_eq!(Value::None.as_f64(), 0.0);
        assert_eq!(Value::Float(f64::NAN).as_f64(), 0.0);
        assert_eq!(Value::from(true).as_f64(), 1.0);
    }

    #[test]
    fn bool_coercion() {
        assert!(Value::from(true).as_bool());
        assert!(Value::from("on").as_bool());
        assert!(Value::from(1).as_bool());
        assert!(!Value::from("maybe").as_bool());
        assert!(!Value::None.as_bool());
    }

    #[test]
    fn durations_must_be_positive() {
        assert_eq!(Value::from(2).as_duration(), Some(Duration::from_secs(2)));
        assert_eq!(Value::from("0.5").as_duration(), Some(Duration::from_millis(500)));
        assert_eq!(Value::from(0).as_duration(), None);
        assert_eq!(Value::from(-3).as_duration(), None);
        assert_eq!(Value::from("soon").as_duration(), None);
        assert_eq!(Value::None.as_duration(), None);
    }

    #[test]
    fn oversized_durations_are_rejected() {
        assert_eq!(Value::Float(1e30).as_duration(), None);
        assert_eq!(Value::Float(f64::INFINITY).as_duration(), None);
        assert_eq!(Value::Float(f64::NAN).as_duration(), None);
        assert_eq!(Value::from("1e25").as_duration(), None);
        let big = Duration::from_secs(10_000_000_000_000_000_000);
        assert!(Value::from(big).as_duration().is_some());
    }

    #[test]
    fn kinds_have_log_names() {
        assert_eq!(Command::StopRecording.kind().to_string(), "RecordStop");
        let cmd = Command::HideAll(Value::from(true));
        assert_eq!(cmd.kind(), CommandKind::HideAll);
    }
}
