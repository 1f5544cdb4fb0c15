//! Inter-process communication between tempo and tempoctl
//!
//! We use Unix domain sockets for local IPC. Every message is a single line
//! of JSON; the server answers each command with exactly one response and
//! closes the connection.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Commands that tempoctl can send to tempo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Start,
    Pause,
    Toggle,
    Skip,
    /// Restart the current phase from its full duration
    Reset,
    /// Back to the first work phase with zero completed sessions
    ResetAll,
    Status,
    Presets,
    ApplyPreset { label: String },
    Preferences,
    SetPreference { field: PreferenceField, value: String },
}

/// Responses from tempo back to tempoctl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Ok,
    Status(TimerStatus),
    Presets(Vec<PresetInfo>),
    Preferences(PreferencesInfo),
    Error(String),
}

/// One segment of the work/break cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Work,
    Break,
    LongBreak,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Work => "Work",
            Phase::Break => "Break",
            Phase::LongBreak => "Long Break",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerStatus {
    pub phase: Phase,
    pub seconds_remaining: u32,
    pub total_seconds: u32,
    pub is_running: bool,
    pub completed_work_sessions: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetInfo {
    pub label: String,
    pub work_minutes: u32,
    pub break_minutes: u32,
    pub long_break_minutes: u32,
    pub long_break_every: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferencesInfo {
    pub work_minutes: u32,
    pub break_minutes: u32,
    pub long_break_minutes: u32,
    pub long_break_every: u32,
    pub auto_start_next: bool,
    pub notifications_enabled: bool,
}

/// A user-editable preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceField {
    WorkMinutes,
    BreakMinutes,
    LongBreakMinutes,
    LongBreakEvery,
    AutoStartNext,
    NotificationsEnabled,
}

impl PreferenceField {
    pub const ALL: [PreferenceField; 6] = [
        PreferenceField::WorkMinutes,
        PreferenceField::BreakMinutes,
        PreferenceField::LongBreakMinutes,
        PreferenceField::LongBreakEvery,
        PreferenceField::AutoStartNext,
        PreferenceField::NotificationsEnabled,
    ];

    /// Key used on the wire and in the preferences record.
    pub fn key(self) -> &'static str {
        match self {
            PreferenceField::WorkMinutes => "work_minutes",
            PreferenceField::BreakMinutes => "break_minutes",
            PreferenceField::LongBreakMinutes => "long_break_minutes",
            PreferenceField::LongBreakEvery => "long_break_every",
            PreferenceField::AutoStartNext => "auto_start_next",
            PreferenceField::NotificationsEnabled => "notifications_enabled",
        }
    }

    pub fn is_flag(self) -> bool {
        matches!(
            self,
            PreferenceField::AutoStartNext | PreferenceField::NotificationsEnabled
        )
    }
}

impl fmt::Display for PreferenceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for PreferenceField {
    type Err = IpcError;

    /// Accepts both `work_minutes` and `work-minutes`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_").to_ascii_lowercase();
        PreferenceField::ALL
            .into_iter()
            .find(|field| field.key() == normalized)
            .ok_or_else(|| IpcError::UnknownField(s.to_string()))
    }
}

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection refused - is tempo running?")]
    ConnectionRefused,

    #[error("Connection closed before a message arrived")]
    Closed,

    #[error("Unknown preference field: {0}")]
    UnknownField(String),
}

pub const SOCKET_PATH: &str = "/tmp/tempo.sock";

/// Socket location, overridable through `TEMPO_SOCKET`.
pub fn socket_path() -> PathBuf {
    std::env::var_os("TEMPO_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(SOCKET_PATH))
}

/// Write one message as a JSON line.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), IpcError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut bytes = serde_json::to_vec(message)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one JSON line. Fails with [`IpcError::Closed`] on EOF.
pub async fn read_message<R, T>(reader: &mut R) -> Result<T, IpcError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(IpcError::Closed);
    }
    Ok(serde_json::from_str(line.trim_end())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[test]
    fn field_names_accept_dashes_and_case() {
        assert_eq!(
            "long-break-every".parse::<PreferenceField>().unwrap(),
            PreferenceField::LongBreakEvery
        );
        assert_eq!(
            " Work_Minutes ".parse::<PreferenceField>().unwrap(),
            PreferenceField::WorkMinutes
        );
        assert!(matches!(
            "volume".parse::<PreferenceField>(),
            Err(IpcError::UnknownField(_))
        ));
    }

    #[test]
    fn phase_serializes_in_snake_case() {
        assert_eq!(
            serde_json::to_string(&Phase::LongBreak).unwrap(),
            "\"long_break\""
        );
    }

    #[tokio::test]
    async fn messages_are_newline_delimited() {
        let mut buf = Vec::new();
        write_message(&mut buf, &Command::Skip).await.unwrap();
        write_message(&mut buf, &Command::ApplyPreset { label: "Deep Work".into() })
            .await
            .unwrap();
        assert_eq!(buf.iter().filter(|&&b| b == b'\n').count(), 2);

        let mut reader = BufReader::new(buf.as_slice());
        let first: Command = read_message(&mut reader).await.unwrap();
        let second: Command = read_message(&mut reader).await.unwrap();
        assert_eq!(first, Command::Skip);
        assert_eq!(second, Command::ApplyPreset { label: "Deep Work".into() });
        assert!(matches!(
            read_message::<_, Command>(&mut reader).await,
            Err(IpcError::Closed)
        ));
    }
}
