//! Opaque agent persistence and settings files.
//!
//! Save files are bincode-encoded snapshots of the whole agent; no wire
//! compatibility is promised across versions. Settings files are
//! human-editable JSON.

use std::io::prelude::*;
use std::path::Path;
use std::time::Instant;

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::agent::AgentSettings;
use crate::error::XcsError;

macro_rules! bincode_options {
    () => {{
        bincode::DefaultOptions::new()
    }};
}

/// Serialize a value into the given file.
pub fn save<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<(), XcsError> {
    let start_time = Instant::now();

    let encoded: Vec<u8> = bincode_options!().serialize(value)?;
    let mut file = std::fs::File::create(&path)?;
    file.write_all(&encoded[..])?;

    log::info!(
        "Saved {} bytes to {} in {:.4} seconds.",
        encoded.len(),
        path.as_ref().to_string_lossy(),
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}

/// Deserialize a value from the given file.
pub fn load<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, XcsError> {
    let start_time = Instant::now();

    let mut file = std::fs::File::open(&path)?;
    let mut encoded: Vec<u8> = Vec::new();
    file.read_to_end(&mut encoded)?;
    let decoded = bincode_options!().deserialize(&encoded[..])?;

    log::info!(
        "Loaded {} bytes from {} in {:.4} seconds.",
        encoded.len(),
        path.as_ref().to_string_lossy(),
        start_time.elapsed().as_secs_f64()
    );

    Ok(decoded)
}

/// Read agent settings from a JSON file.
pub fn read_settings<P: AsRef<Path>>(path: P) -> Result<AgentSettings, XcsError> {
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn settings_parse_with_field_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"OnPolicy": {{"max_population_size": 20, "history_length": 4}}}}"#
        )
        .unwrap();

        let settings = read_settings(file.path()).unwrap();
        let AgentSettings::OnPolicy(settings) = settings else {
            panic!("expected the on-policy variant");
        };
        assert_eq!(settings.max_population_size, 20);
        assert_eq!(settings.history_length, 4);
        assert_eq!(settings.initial_exploration, 0.25);
        assert_eq!(settings.exploration_floor, 0.1);
        assert_eq!(settings.discount, 0.71);
    }

    #[test]
    fn replay_settings_default_when_absent() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"ExperienceReplay": {{"xcs": {{"max_population_size": 50, "history_length": 3}}}}}}"#
        )
        .unwrap();

        let settings = read_settings(file.path()).unwrap();
        let AgentSettings::ExperienceReplay(settings) = settings else {
            panic!("expected the experience-replay variant");
        };
        assert_eq!(settings.replay.capacity, 5000);
        assert_eq!(settings.replay.batch, 2000);
        assert!(!settings.replay.on_policy);
    }

    #[test]
    fn malformed_settings_surface_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            read_settings(file.path()),
            Err(XcsError::Settings(_))
        ));
    }
}
