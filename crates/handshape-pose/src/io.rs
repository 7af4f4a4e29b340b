use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{PoseConfiguration, PoseError};

/// On-disk layout: parallel arrays of targets, weights and optional identifiers.
#[derive(Serialize, Deserialize)]
struct PoseConfigurationDocument {
    targets: Vec<Vec3>,
    weights: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identifiers: Option<Vec<String>>,
}

impl From<&PoseConfiguration> for PoseConfigurationDocument {
    fn from(config: &PoseConfiguration) -> Self {
        Self {
            targets: config.targets().to_vec(),
            weights: config.weights().to_vec(),
            identifiers: config.identifiers().map(<[String]>::to_vec),
        }
    }
}

impl TryFrom<PoseConfigurationDocument> for PoseConfiguration {
    type Error = PoseError;

    fn try_from(doc: PoseConfigurationDocument) -> Result<Self, Self::Error> {
        let config = PoseConfiguration::new(doc.targets, doc.weights)?;
        match doc.identifiers {
            Some(ids) => config.with_identifiers(ids),
            None => Ok(config),
        }
    }
}

/// Serializes a configuration to a pretty-printed JSON string.
pub fn to_json_string(config: &PoseConfiguration) -> Result<String, PoseError> {
    Ok(serde_json::to_string_pretty(&PoseConfigurationDocument::from(
        config,
    ))?)
}

/// Parses a configuration from a JSON string.
///
/// # Errors
///
/// Fails on malformed JSON or when the arrays have different lengths.
pub fn from_json_str(json: &str) -> Result<PoseConfiguration, PoseError> {
    let doc: PoseConfigurationDocument = serde_json::from_str(json)?;
    doc.try_into()
}

/// Writes a configuration to a JSON file, replacing any existing file.
pub fn save_json(path: impl AsRef<Path>, config: &PoseConfiguration) -> Result<(), PoseError> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(&mut writer, &PoseConfigurationDocument::from(config))?;
    writer.flush()?;
    log::debug!(
        "saved pose configuration with {} targets to {}",
        config.len(),
        path.as_ref().display()
    );
    Ok(())
}

/// Reads a configuration from a JSON file.
pub fn load_json(path: impl AsRef<Path>) -> Result<PoseConfiguration, PoseError> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let doc: PoseConfigurationDocument = serde_json::from_reader(reader)?;
    doc.try_into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_layout() -> Result<(), PoseError> {
        let config = PoseConfiguration::new(vec![Vec3::new(1.0, 2.0, 3.0)], vec![0.5])?;
        let value: serde_json::Value = serde_json::from_str(&to_json_string(&config)?)?;
        assert_eq!(value["targets"][0], serde_json::json!([1.0, 2.0, 3.0]));
        assert_eq!(value["weights"][0], serde_json::json!(0.5));
        assert!(value.get("identifiers").is_none());
        Ok(())
    }

    #[test]
    fn test_string_round_trip_with_identifiers() -> Result<(), PoseError> {
        let config = PoseConfiguration::new(vec![Vec3::new(0.1, -0.2, 0.3), Vec3::Y], vec![1.0, 0.25])?
            .with_identifiers(vec!["wrist".into(), "index_tip".into()])?;
        let parsed = from_json_str(&to_json_string(&config)?)?;
        assert_eq!(parsed, config);
        Ok(())
    }

    #[test]
    fn test_rejects_mismatched_arrays() {
        let json = r#"{"targets": [[0.0, 0.0, 0.0]], "weights": [1.0, 2.0]}"#;
        assert!(matches!(
            from_json_str(json),
            Err(PoseError::MismatchedWeights { .. })
        ));

        let json = r#"{"targets": [[0.0, 0.0, 0.0]], "weights": [1.0], "identifiers": []}"#;
        assert!(matches!(
            from_json_str(json),
            Err(PoseError::MismatchedIdentifiers { .. })
        ));

        assert!(matches!(
            from_json_str("{\"targets\": 3}"),
            Err(PoseError::Serialization(_))
        ));
    }
}
