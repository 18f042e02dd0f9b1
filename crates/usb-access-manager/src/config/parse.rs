use std::path::Path;

use super::Config;
use thiserror::Error;
use tokio::{fs, io};
use tracing::{event, Level};

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ConfigFormat {
  Json,
  Yaml,
  Toml,
  Auto,
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("Invalid config file extension when using auto format: {0}")]
  InvalidExtension(String),

  #[error("Config file does not have a file extension, and format is set to auto")]
  MissingExtension,

  #[error("Failed to parse config file")]
  ParseError(#[from] FormatError),

  #[error(transparent)]
  Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum FormatError {
  #[error(transparent)]
  JsonError(#[from] serde_json::Error),

  #[error(transparent)]
  YamlError(#[from] serde_yaml::Error),

  #[error(transparent)]
  TomlError(#[from] toml::de::Error),
}

trait ConfigParser {
  fn parse_config(content: &[u8]) -> Result<Config, FormatError>;
}

struct Json;
impl ConfigParser for Json {
  fn parse_config(content: &[u8]) -> Result<Config, FormatError> {
    Ok(serde_json::from_slice(content)?)
  }
}

struct Yaml;
impl ConfigParser for Yaml {
  fn parse_config(content: &[u8]) -> Result<Config, FormatError> {
    Ok(serde_yaml::from_slice(content)?)
  }
}

struct Toml;
impl ConfigParser for Toml {
  fn parse_config(content: &[u8]) -> Result<Config, FormatError> {
    Ok(toml::from_slice(content)?)
  }
}

fn parse(file: &Path, format: ConfigFormat, content: &[u8]) -> Result<Config, ConfigError> {
  match format {
    ConfigFormat::Json => Ok(Json::parse_config(content)?),
    ConfigFormat::Yaml => Ok(Yaml::parse_config(content)?),
    ConfigFormat::Toml => Ok(Toml::parse_config(content)?),
    ConfigFormat::Auto => match file.extension().and_then(|e| e.to_str()) {
      Some("toml") => Ok(Toml::parse_config(content)?),
      Some("yaml") | Some("yml") => Ok(Yaml::parse_config(content)?),
      Some("json") => Ok(Json::parse_config(content)?),
      Some(other) => Err(ConfigError::InvalidExtension(other.into())),
      None => Err(ConfigError::MissingExtension),
    },
  }
}

pub(super) async fn read_config(
  file: impl AsRef<Path>,
  format: ConfigFormat,
) -> Result<Config, ConfigError> {
  let file = file.as_ref();
  let result = match fs::read(file).await {
    Ok(content) => parse(file, format, &content),
    Err(e) => Err(e.into()),
  };

  match result {
    Ok(config) => {
      event!(
        target: "usb-access-manager",
        Level::INFO,
        applications.len = config.applications().len(),
        "Loaded configuration"
      );
      Ok(config)
    }
    Err(error) => {
      event!(target: "usb-access-manager", Level::ERROR, ?error, path = %file.display(), "Failed to read config file");
      Err(error)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use peripheral_access::{Filter, PackageName, Uid};
  use tempfile::TempDir;

  fn check(config: &Config) {
    let apps = config.applications();
    assert_eq!(apps.len(), 2);

    assert_eq!(apps[0].package, PackageName::new("com.android.mtp"));
    assert_eq!(apps[0].uid, Uid(1000));
    assert!(apps[0].system);
    match &apps[0].filters[..] {
      [Filter::Device(f)] => {
        assert_eq!(f.vendor_id, None);
        assert_eq!(f.class, Some(6));
      }
      other => panic!("unexpected filters {:?}", other),
    }

    assert_eq!(apps[1].package, PackageName::new("com.example.kit"));
    assert!(!apps[1].system);
    match &apps[1].filters[..] {
      [Filter::Accessory(f)] => {
        assert_eq!(f.model.as_deref(), Some("DemoKit"));
        assert_eq!(f.accessory_type.as_deref(), Some("board"));
        assert_eq!(f.version, None);
      }
      other => panic!("unexpected filters {:?}", other),
    }
  }

  const JSON: &str = r#"{
    "applications": [
      { "package": "com.android.mtp", "uid": 1000, "system": true,
        "filters": [{ "kind": "device", "class": 6 }] },
      { "package": "com.example.kit", "uid": 10003,
        "filters": [{ "kind": "accessory", "model": "DemoKit", "type": "board" }] }
    ]
  }"#;

  const YAML: &str = r#"
applications:
  - package: com.android.mtp
    uid: 1000
    system: true
    filters:
      - kind: device
        class: 6
  - package: com.example.kit
    uid: 10003
    filters:
      - kind: accessory
        model: DemoKit
        type: board
"#;

  const TOML: &str = r#"
[[applications]]
package = "com.android.mtp"
uid = 1000
system = true

[[applications.filters]]
kind = "device"
class = 6

[[applications]]
package = "com.example.kit"
uid = 10003

[[applications.filters]]
kind = "accessory"
model = "DemoKit"
type = "board"
"#;

  #[test]
  fn parses_every_format() {
    check(&Json::parse_config(JSON.as_bytes()).unwrap());
    check(&Yaml::parse_config(YAML.as_bytes()).unwrap());
    check(&Toml::parse_config(TOML.as_bytes()).unwrap());
  }

  #[test]
  fn auto_format_uses_extension() {
    check(&parse(Path::new("apps.yml"), ConfigFormat::Auto, YAML.as_bytes()).unwrap());
    check(&parse(Path::new("apps.toml"), ConfigFormat::Auto, TOML.as_bytes()).unwrap());

    assert!(matches!(
      parse(Path::new("apps.ini"), ConfigFormat::Auto, JSON.as_bytes()),
      Err(ConfigError::InvalidExtension(ext)) if ext == "ini"
    ));
    assert!(matches!(
      parse(Path::new("apps"), ConfigFormat::Auto, JSON.as_bytes()),
      Err(ConfigError::MissingExtension)
    ));
  }

  #[test]
  fn rejects_unknown_filter_kind() {
    let json = br#"{ "applications": [{ "package": "a", "uid": 1, "filters": [{ "kind": "printer" }] }] }"#;
    assert!(matches!(
      Json::parse_config(json),
      Err(FormatError::JsonError(_))
    ));
  }

  #[tokio::test]
  async fn reads_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("applications.json");
    std::fs::write(&path, JSON).unwrap();

    check(&read_config(&path, ConfigFormat::Auto).await.unwrap());
    assert!(matches!(
      read_config(dir.path().join("missing.json"), ConfigFormat::Auto).await,
      Err(ConfigError::Io(_))
    ));
  }
}
