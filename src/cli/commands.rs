//! CLI command implementations
//!
//! Each invocation follows the same lifecycle: load config, open the
//! ledger, run exactly one operation, close the ledger, print the result.

use std::fs;
use std::path::Path;

use base64::Engine;
use chrono::{DateTime, SecondsFormat};
use serde_json::{json, Value};

use crate::cache::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::observability::{log_event_with_fields, Event};
use crate::store::{EventSummary, LedgerStore};

use super::args::Command;
use super::errors::CliResult;
use super::io::write_response;

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(&cli.global.config, cli.command)
}

/// Open the ledger, run one command, close the ledger and print the result.
pub fn run_command(config_path: &Path, cmd: Command) -> CliResult<()> {
    let config = LedgerConfig::load(config_path)?;
    let config_display = config_path.display().to_string();
    log_event_with_fields(Event::ConfigLoaded, &[("config", &config_display)]);

    let db_display = config.db_path.display().to_string();
    let store = LedgerStore::open_with(config)?;
    log_event_with_fields(Event::StoreOpened, &[("db_path", &db_display)]);

    let name = command_name(&cmd);
    let result = execute(&store, cmd);

    store.close();
    log_event_with_fields(Event::StoreClosed, &[("db_path", &db_display)]);

    match result {
        Ok(data) => {
            log_event_with_fields(Event::CommandComplete, &[("command", name)]);
            write_response(data)
        }
        Err(e) => {
            log_event_with_fields(
                Event::CommandFailed,
                &[("command", name), ("code", e.code_str())],
            );
            Err(e)
        }
    }
}

fn command_name(cmd: &Command) -> &'static str {
    match cmd {
        Command::Put { .. } => "put",
        Command::Get { .. } => "get",
        Command::Delete { .. } => "delete",
        Command::Scan { .. } => "scan",
        Command::History { .. } => "history",
        Command::Range { .. } => "range",
        Command::Metrics => "metrics",
        Command::Audit { .. } => "audit",
        Command::Beacon => "beacon",
        Command::VerifyBeacon { .. } => "verify-beacon",
    }
}

/// Run one command against an open store and build its JSON result.
pub fn execute(store: &LedgerStore, cmd: Command) -> CliResult<Value> {
    match cmd {
        Command::Put {
            key,
            zone,
            value,
            file,
        } => {
            let payload = match (value, file) {
                (_, Some(path)) => fs::read(&path)?,
                (Some(value), None) => value.into_bytes(),
                (None, None) => Vec::new(),
            };
            let receipt = store.put(&key, &zone, &payload)?;
            Ok(json!({
                "key": key,
                "zone": zone,
                "event_sequence": receipt.event_sequence,
                "pulse_time": receipt.pulse_time,
                "pulse_time_utc": utc(receipt.pulse_time),
                "integrity_proof": receipt.integrity_proof,
            }))
        }

        Command::Get { key } => match store.get(&key)? {
            Some(record) => Ok(json!({
                "key": key,
                "zone": record.zone,
                "pulse_time": record.pulse_time,
                "pulse_time_utc": utc(record.pulse_time),
                "payload_base64": base64::engine::general_purpose::STANDARD.encode(&record.payload),
                "text": String::from_utf8(record.payload).ok(),
            })),
            None => Ok(Value::Null),
        },

        Command::Delete { key } => {
            let deleted = store.delete(&key)?;
            Ok(json!({ "key": key, "deleted": deleted }))
        }

        Command::Scan { zone, limit } => {
            let entries = store.scan(&zone, limit)?;
            Ok(serde_json::to_value(entries)?)
        }

        Command::History { key } => Ok(summaries(store.history(&key)?)),

        Command::Range { start, end, all } => {
            let end = end.unwrap_or_else(|| SystemClock.now());
            Ok(summaries(store.range_query(start, end, !all)?))
        }

        Command::Metrics => Ok(serde_json::to_value(store.metrics()?)?),

        Command::Audit { event_sequence } => {
            let report = store.audit(event_sequence)?;
            if !report.is_intact() {
                let seq = event_sequence.to_string();
                log_event_with_fields(
                    Event::IntegrityMismatch,
                    &[("event_sequence", &seq), ("key", &report.key)],
                );
            }
            let intact = report.is_intact();
            let mut value = serde_json::to_value(report)?;
            value["intact"] = json!(intact);
            Ok(value)
        }

        Command::Beacon => match store.record_beacon()? {
            Some(beacon) => {
                let range = format!("{}..={}", beacon.range_start, beacon.range_end);
                log_event_with_fields(
                    Event::BeaconRecorded,
                    &[("range", &range), ("root", &beacon.merkle_root)],
                );
                Ok(serde_json::to_value(beacon)?)
            }
            None => Ok(Value::Null),
        },

        Command::VerifyBeacon { beacon_id } => {
            let verification = store.verify_beacon(beacon_id)?;
            let intact = verification.is_intact();
            if !intact {
                let id = beacon_id.to_string();
                log_event_with_fields(Event::IntegrityMismatch, &[("beacon_id", &id)]);
            }
            let mut value = serde_json::to_value(verification)?;
            value["intact"] = json!(intact);
            Ok(value)
        }
    }
}

fn summaries(events: Vec<EventSummary>) -> Value {
    Value::Array(
        events
            .into_iter()
            .map(|event| {
                json!({
                    "event_sequence": event.event_sequence,
                    "key": event.key,
                    "zone": event.zone,
                    "pulse_time": event.pulse_time,
                    "pulse_time_utc": utc(event.pulse_time),
                    "integrity_proof": event.integrity_proof,
                    "event_type": event.event_type().as_str(),
                    "is_active": event.is_active(),
                    "kind": event.kind,
                })
            })
            .collect(),
    )
}

/// RFC 3339 rendering of a pulse time, or null when out of range.
fn utc(pulse_time: f64) -> Option<String> {
    let secs = pulse_time.floor();
    let nanos = ((pulse_time - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Micros, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> LedgerStore {
        LedgerStore::open_with(LedgerConfig::new(dir.path().join("cli.db"))).unwrap()
    }

    fn put(store: &LedgerStore, key: &str, value: &str) -> Value {
        execute(
            store,
            Command::Put {
                key: key.to_string(),
                zone: "z1".to_string(),
                value: Some(value.to_string()),
                file: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_put_then_get_json() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let receipt = put(&store, "alpha", "hello");
        assert_eq!(receipt["event_sequence"], 1);

        let got = execute(&store, Command::Get { key: "alpha".into() }).unwrap();
        assert_eq!(got["zone"], "z1");
        assert_eq!(got["text"], "hello");
        assert_eq!(got["payload_base64"], "aGVsbG8=");
    }

    #[test]
    fn test_get_missing_is_null() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let got = execute(&store, Command::Get { key: "ghost".into() }).unwrap();
        assert!(got.is_null());
    }

    #[test]
    fn test_history_lists_kinds() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        put(&store, "alpha", "v1");
        put(&store, "alpha", "v2");
        execute(&store, Command::Delete { key: "alpha".into() }).unwrap();

        let history = execute(&store, Command::History { key: "alpha".into() }).unwrap();
        let kinds: Vec<&str> = history
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["kind"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, ["SUPERSEDED", "SUPERSEDED", "TOMBSTONE"]);
    }

    #[test]
    fn test_audit_reports_intact() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        put(&store, "alpha", "hello");
        let report = execute(&store, Command::Audit { event_sequence: 1 }).unwrap();
        assert_eq!(report["intact"], true);
    }

    #[test]
    fn test_missing_beacon_is_ledger_error() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let err = execute(&store, Command::VerifyBeacon { beacon_id: 9 }).unwrap_err();
        assert_eq!(err.code_str(), "LEDGER_KEY_NOT_FOUND");
    }

    #[test]
    fn test_failure_is_returned_not_printed() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent.json");
        let err = run_command(&missing, Command::Metrics).unwrap_err();
        assert_eq!(err.code_str(), "LEDGER_CONFIG_INVALID");
        assert!(err.to_string().starts_with("LEDGER_CONFIG_INVALID: "));
    }

    #[test]
    fn test_utc_rendering() {
        assert_eq!(
            utc(0.5).as_deref(),
            Some("1970-01-01T00:00:00.500000Z")
        );
    }
}
