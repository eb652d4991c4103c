//! Bus log export.
//!
//! Serializes the ring log snapshot as pretty-printed JSON — the
//! interface report generators consume.

use std::io::Write;
use std::path::Path;

use tracing::info;
use vvb_sim::Bus;

/// Write the current ring log snapshot to `path` as JSON.
pub fn export_log(bus: &Bus, path: &Path) -> std::io::Result<()> {
    let snapshot = bus.log().snapshot();
    let json = serde_json::to_string_pretty(&snapshot)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let mut file = std::fs::File::create(path)?;
    file.write_all(json.as_bytes())?;
    info!(path = %path.display(), records = snapshot.len(), "bus log exported");
    Ok(())
}
