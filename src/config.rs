use crate::{animation::TaskMode, arm_error::ArmError, import::ImportOptions};
use log::info;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

const fn default_looping() -> bool {
    true
}

const fn default_speed() -> f32 {
    1.0
}

/// One clip in a task, named as it is in the clip store
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct StackConfig {
    pub clip: String,
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

/// One task. Without a mode, one clip plays as a clip and more clips blend
/// along x.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct TaskConfig {
    #[serde(default)]
    pub mode: Option<TaskMode>,
    #[serde(default = "default_looping")]
    pub looping: bool,
    pub clips: Vec<StackConfig>,
}

/// Tasks and import options for a character
///
/// ```yaml
/// import:
///   swizzle: true
/// tasks:
///   - clips:
///       - clip: idle
///   - looping: true
///     clips:
///       - { clip: walk, x: 0.0 }
///       - { clip: run, x: 1.5, speed: 1.2 }
/// ```
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Default)]
pub struct CharacterConfig {
    #[serde(default)]
    pub import: ImportOptions,
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

impl CharacterConfig {
    /// Parses a YAML document
    ///
    /// # Errors
    /// Returns `ArmError::SerdeYamlError` for malformed YAML.
    pub fn from_yaml(text: &str) -> Result<Self, ArmError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Reads a YAML file
    ///
    /// # Errors
    /// Returns `ArmError::StdIoError` if the file can not be read and
    /// `ArmError::SerdeYamlError` for malformed YAML.
    pub fn load(path: &Path) -> Result<Self, ArmError> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_yaml(&text)?;
        info!("{:?} has {} tasks", path, config.tasks.len());
        Ok(config)
    }

    /// Writes the configuration as YAML
    ///
    /// # Errors
    /// Returns `ArmError::SerdeYamlError` if serialization fails.
    pub fn to_yaml(&self) -> Result<String, ArmError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::CharacterConfig;
    use crate::{animation::TaskMode, arm_error::ArmError};

    #[test]
    fn parse() {
        let yaml = "
import:
  swizzle: true
  scale: 0.01
tasks:
  - clips:
      - clip: idle
  - mode: one_d
    looping: false
    clips:
      - { clip: walk, x: 0.0 }
      - { clip: run, x: 1.5, speed: 1.2 }
";
        let config = CharacterConfig::from_yaml(yaml).unwrap();
        assert!(config.import.swizzle);
        assert!(config.import.single_input);
        assert!((config.import.scale - 0.01).abs() < f32::EPSILON);
        assert_eq!(config.tasks.len(), 2);

        let idle = &config.tasks[0];
        assert_eq!(idle.mode, None);
        assert!(idle.looping);
        assert!((idle.clips[0].speed - 1.0).abs() < f32::EPSILON);

        let blend = &config.tasks[1];
        assert_eq!(blend.mode, Some(TaskMode::OneD));
        assert!(!blend.looping);
        assert_eq!(blend.clips[1].clip, "run");
        assert!((blend.clips[1].x - 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = CharacterConfig::from_yaml("{}").unwrap();
        assert_eq!(config, CharacterConfig::default());
    }

    #[test]
    fn round_trip() {
        let config = CharacterConfig::from_yaml(
            "tasks: [{ mode: two_d, clips: [{ clip: aim, y: 1.0 }] }]",
        )
        .unwrap();
        let text = config.to_yaml().unwrap();
        assert_eq!(CharacterConfig::from_yaml(&text).unwrap(), config);
    }

    #[test]
    fn bad_yaml() {
        let r = CharacterConfig::from_yaml("tasks: [{ clips: 3 }]");
        assert!(matches!(r, Err(ArmError::SerdeYamlError(_))));
    }
}
