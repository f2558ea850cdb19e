//! FPP payload schema and validation.
//!
//! FPP reports most numbers as strings ("seconds_played": "42") and uses
//! empty strings for "nothing playing". The raw structs accept both shapes;
//! [`parse_status`] turns them into a validated [`DeviceStatus`] or a
//! [`DeviceError::Malformed`], never a partially-filled value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::device::error::{DeviceError, DeviceResult};

/// Validated device state from `/api/fppd/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    /// Player status, e.g. "idle", "playing", "stopped".
    pub status: String,
    pub current_sequence: Option<String>,
    pub current_playlist: Option<String>,
    pub playlist_index: Option<u32>,
    pub playlist_count: Option<u32>,
    pub seconds_played: Option<u64>,
    pub seconds_remaining: Option<u64>,
    pub volume: Option<u8>,
    pub mode: Option<String>,
    /// Seconds since fppd started.
    pub uptime: Option<u64>,
}

impl DeviceStatus {
    /// Placeholder used before the device has ever answered.
    pub fn unknown() -> Self {
        Self {
            status: "unknown".to_string(),
            current_sequence: None,
            current_playlist: None,
            playlist_index: None,
            playlist_count: None,
            seconds_played: None,
            seconds_remaining: None,
            volume: None,
            mode: None,
            uptime: None,
        }
    }

    /// Name of the playlist currently running, if any.
    pub fn active_playlist(&self) -> Option<&str> {
        if self.status == "idle" || self.status == "unknown" {
            return None;
        }
        self.current_playlist.as_deref()
    }
}

/// Number that FPP may send as a JSON number or a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Lenient {
    Int(u64),
    Float(f64),
    Text(String),
}

impl Lenient {
    /// `Ok(None)` for an empty string, an error for anything non-numeric.
    fn to_u64(&self, field: &str) -> DeviceResult<Option<u64>> {
        match self {
            Lenient::Int(n) => Ok(Some(*n)),
            Lenient::Float(f) if f.is_finite() && *f >= 0.0 => Ok(Some(f.trunc() as u64)),
            Lenient::Float(f) => Err(DeviceError::Malformed(format!("{} out of range: {}", field, f))),
            Lenient::Text(s) if s.trim().is_empty() => Ok(None),
            Lenient::Text(s) => s
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| DeviceError::Malformed(format!("{} is not a number: '{}'", field, s))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPlaylist {
    playlist: Option<String>,
    index: Option<Lenient>,
    count: Option<Lenient>,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    status_name: Option<String>,
    current_sequence: Option<String>,
    current_playlist: Option<RawPlaylist>,
    seconds_played: Option<Lenient>,
    seconds_remaining: Option<Lenient>,
    volume: Option<Lenient>,
    mode_name: Option<String>,
    #[serde(rename = "uptimeTotalSeconds", alias = "uptimeSeconds")]
    uptime: Option<Lenient>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn optional_u64(value: &Option<Lenient>, field: &str) -> DeviceResult<Option<u64>> {
    match value {
        Some(v) => v.to_u64(field),
        None => Ok(None),
    }
}

fn optional_u32(value: &Option<Lenient>, field: &str) -> DeviceResult<Option<u32>> {
    optional_u64(value, field)?
        .map(|n| u32::try_from(n).map_err(|_| DeviceError::Malformed(format!("{} too large", field))))
        .transpose()
}

/// Parse and validate a status body.
pub fn parse_status(body: &[u8]) -> DeviceResult<DeviceStatus> {
    let raw: RawStatus =
        serde_json::from_slice(body).map_err(|e| DeviceError::Malformed(e.to_string()))?;

    let status = non_empty(raw.status_name)
        .ok_or_else(|| DeviceError::Malformed("missing status_name".to_string()))?;

    let volume = match optional_u64(&raw.volume, "volume")? {
        Some(v) if v > 100 => {
            return Err(DeviceError::Malformed(format!("volume out of range: {}", v)));
        }
        other => other.map(|v| v as u8),
    };

    let (current_playlist, playlist_index, playlist_count) = match &raw.current_playlist {
        Some(p) => (
            non_empty(p.playlist.clone()),
            optional_u32(&p.index, "current_playlist.index")?,
            optional_u32(&p.count, "current_playlist.count")?,
        ),
        None => (None, None, None),
    };

    Ok(DeviceStatus {
        status,
        current_sequence: non_empty(raw.current_sequence),
        current_playlist,
        playlist_index,
        playlist_count,
        seconds_played: optional_u64(&raw.seconds_played, "seconds_played")?,
        seconds_remaining: optional_u64(&raw.seconds_remaining, "seconds_remaining")?,
        volume,
        mode: non_empty(raw.mode_name),
        uptime: optional_u64(&raw.uptime, "uptimeTotalSeconds")?,
    })
}

/// Parse a playlist body. The payload is kept whole; it only has to be a
/// JSON object.
pub fn parse_playlist(body: &[u8]) -> DeviceResult<Value> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| DeviceError::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(DeviceError::Malformed("playlist payload is not an object".to_string()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYING: &str = r#"{
        "fppd": "running",
        "status": 1,
        "status_name": "playing",
        "mode_name": "player",
        "current_sequence": "Wizards in Winter.fseq",
        "current_playlist": {"playlist": "Christmas Main", "index": "3", "count": "12", "type": "sequence"},
        "seconds_played": "42",
        "seconds_remaining": "138",
        "volume": 70,
        "uptimeTotalSeconds": 86400
    }"#;

    #[test]
    fn test_parses_string_numbers() {
        let status = parse_status(PLAYING.as_bytes()).unwrap();
        assert_eq!(status.status, "playing");
        assert_eq!(status.current_sequence.as_deref(), Some("Wizards in Winter.fseq"));
        assert_eq!(status.current_playlist.as_deref(), Some("Christmas Main"));
        assert_eq!(status.playlist_index, Some(3));
        assert_eq!(status.playlist_count, Some(12));
        assert_eq!(status.seconds_played, Some(42));
        assert_eq!(status.seconds_remaining, Some(138));
        assert_eq!(status.volume, Some(70));
        assert_eq!(status.mode.as_deref(), Some("player"));
        assert_eq!(status.uptime, Some(86_400));
        assert_eq!(status.active_playlist(), Some("Christmas Main"));
    }

    #[test]
    fn test_idle_has_no_active_playlist() {
        let body = r#"{"status_name": "idle", "current_sequence": "",
            "current_playlist": {"playlist": "", "index": "0", "count": "0"}}"#;
        let status = parse_status(body.as_bytes()).unwrap();
        assert_eq!(status.current_sequence, None);
        assert_eq!(status.current_playlist, None);
        assert_eq!(status.active_playlist(), None);
    }

    #[test]
    fn test_rejects_non_json() {
        let err = parse_status(b"<html>502 Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, DeviceError::Malformed(_)));
    }

    #[test]
    fn test_rejects_missing_status() {
        let err = parse_status(br#"{"volume": 50}"#).unwrap_err();
        assert_eq!(err, DeviceError::Malformed("missing status_name".into()));
    }

    #[test]
    fn test_rejects_bad_numbers() {
        let body = r#"{"status_name": "playing", "seconds_played": "soon"}"#;
        assert!(matches!(parse_status(body.as_bytes()), Err(DeviceError::Malformed(_))));

        let body = r#"{"status_name": "playing", "volume": 250}"#;
        assert!(matches!(parse_status(body.as_bytes()), Err(DeviceError::Malformed(_))));
    }

    #[test]
    fn test_playlist_must_be_object() {
        assert!(parse_playlist(br#"{"name": "Main", "mainPlaylist": []}"#).is_ok());
        assert!(matches!(parse_playlist(b"[1, 2]"), Err(DeviceError::Malformed(_))));
    }
}
