use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
    Error, Result,
    schema::{ChannelMap, RelayConfig},
    validate::{Severity, validate_settings},
};

/// Load the identity → destination map from a JSON object file.
pub fn load_channel_map(path: &Path) -> Result<ChannelMap> {
    let raw = read(path)?;
    let map = parse_channel_map(&raw, path)?;
    debug!(path = %path.display(), identities = map.len(), "loaded channel map");
    Ok(map)
}

/// Parse a channel map from its JSON text. `path` is only used in errors.
pub fn parse_channel_map(raw: &str, path: &Path) -> Result<ChannelMap> {
    let entries: BTreeMap<String, String> =
        serde_json::from_str(raw).map_err(|e| Error::parse(path, e))?;
    let map = ChannelMap::from_entries(entries)?;
    if map.is_empty() {
        return Err(Error::invalid(format!(
            "{} does not track any identity",
            path.display()
        )));
    }
    Ok(map)
}

/// Load tunables from a TOML file, or the defaults when no path is given.
pub fn load_settings(path: Option<&Path>) -> Result<RelayConfig> {
    let Some(path) = path else {
        debug!("no settings file given, using defaults");
        return Ok(RelayConfig::default());
    };
    let raw = read(path)?;
    parse_settings(&raw, path)
}

/// Parse and validate tunables from TOML text.
///
/// Validation errors are fatal; warnings are logged and otherwise ignored.
pub fn parse_settings(raw: &str, path: &Path) -> Result<RelayConfig> {
    let config: RelayConfig = toml::from_str(raw).map_err(|e| Error::parse(path, e))?;

    let result = validate_settings(&config);
    for diag in result.diagnostics.iter().filter(|d| d.severity == Severity::Warning) {
        warn!(path = %path.display(), field = %diag.path, "{}", diag.message);
    }
    if let Some(first) = result
        .diagnostics
        .iter()
        .find(|d| d.severity == Severity::Error)
    {
        return Err(Error::invalid(format!("{}: {}", first.path, first.message)));
    }

    Ok(config)
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: PathBuf::from(path),
        source,
    })
}
