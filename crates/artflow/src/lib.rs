//! artflow monitor helpers
//!
//! The `artflow-monitor` binary joins an Art-Net network with the configured
//! ports and prints every engine event to stdout as one JSON object per line.

use std::io::{self, Write};
use std::path::Path;
use std::thread;

use anyhow::Context;
use artflow_net::{ArtNetConfig, EngineEvent};
use crossbeam_channel::Receiver;

// Re-export for convenience
pub use anyhow::Result;

/// Config file used when none is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "artflow.toml";

/// Load `path`, falling back to defaults if the file does not exist.
/// A file that exists but does not parse is an error. The defaults leave
/// `unicast_ip` unset, which the runtime refuses to start with.
pub fn load_config(path: &Path) -> Result<ArtNetConfig> {
    if !path.exists() {
        tracing::warn!(
            "Config file {} not found, using defaults",
            path.display()
        );
        return Ok(ArtNetConfig::default());
    }
    ArtNetConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

/// One JSON line for an event
pub fn event_line(event: &EngineEvent) -> Result<String> {
    Ok(serde_json::to_string(event)?)
}

/// Print events to `out` until the channel disconnects
pub fn print_events<W: Write>(events: Receiver<EngineEvent>, mut out: W) -> Result<()> {
    for event in events {
        writeln!(out, "{}", event_line(&event)?)?;
        out.flush()?;
    }
    Ok(())
}

/// Print events to stdout on a background thread. Each line takes the
/// stdout lock on its own, so several printers can share it.
pub fn spawn_event_printer(events: Receiver<EngineEvent>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        if let Err(e) = print_events(events, io::stdout()) {
            tracing::warn!("Event printer stopped: {}", e);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, ArtNetConfig::default());
    }

    #[test]
    fn test_broken_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artflow.toml");
        std::fs::write(&path, "poll_interval_ms = \"soon\"").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_print_events() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(EngineEvent::NodeLost {
            ip: Ipv4Addr::new(2, 0, 0, 1),
        })
        .unwrap();
        tx.send(EngineEvent::NodeDiscovered {
            ip: Ipv4Addr::new(2, 0, 0, 2),
            short_name: "bravo".to_string(),
            long_name: "Bravo".to_string(),
        })
        .unwrap();
        drop(tx);

        let mut out = Vec::new();
        print_events(rx, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"event":"node_lost","ip":"2.0.0.1"}"#);
        assert!(lines[1].contains(r#""short_name":"bravo""#));
    }
}
