use crate::config;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Debug, PartialEq, Clone, Copy)]
pub enum LogFormat {
  Pretty,
  Json,
}

#[derive(ValueEnum, Debug, PartialEq, Clone, Copy)]
pub enum ConfigFormat {
  Json,
  Yaml,
  Toml,
  Auto,
}

impl From<ConfigFormat> for config::ConfigFormat {
  fn from(f: ConfigFormat) -> Self {
    match f {
      ConfigFormat::Json => config::ConfigFormat::Json,
      ConfigFormat::Yaml => config::ConfigFormat::Yaml,
      ConfigFormat::Toml => config::ConfigFormat::Toml,
      ConfigFormat::Auto => config::ConfigFormat::Auto,
    }
  }
}

#[derive(Parser, Debug)]
#[command(about = "Grants USB peripherals to the applications that handle them")]
pub struct Args {
  /// Log output format
  #[arg(
    value_enum,
    long = "log-format",
    short = 'f',
    env = "LOG_FORMAT",
    default_value = "pretty"
  )]
  pub log_format: LogFormat,

  /// Config file format
  #[arg(
    value_enum,
    long = "config-format",
    short = 't',
    env = "CONFIG_FILE_FORMAT",
    default_value = "auto"
  )]
  pub config_format: ConfigFormat,

  /// Application catalog path
  #[arg(long = "config", short = 'c', env = "CONFIG_FILE")]
  pub config_file: PathBuf,

  /// Where remembered default applications are stored
  #[arg(
    long = "settings-file",
    short = 's',
    env = "SETTINGS_FILE",
    default_value = "/var/lib/usb-access-manager/usb_device_manager.xml"
  )]
  pub settings_file: PathBuf,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults() {
    let args = Args::try_parse_from(["usb-access-manager", "-c", "/etc/usb/apps.yaml"]).unwrap();

    assert_eq!(args.log_format, LogFormat::Pretty);
    assert_eq!(args.config_format, ConfigFormat::Auto);
    assert_eq!(args.config_file, PathBuf::from("/etc/usb/apps.yaml"));
    assert_eq!(
      args.settings_file,
      PathBuf::from("/var/lib/usb-access-manager/usb_device_manager.xml")
    );
  }

  #[test]
  fn explicit_flags() {
    let args = Args::try_parse_from([
      "usb-access-manager",
      "--log-format",
      "json",
      "-t",
      "toml",
      "--config",
      "apps.conf",
      "-s",
      "/tmp/settings.xml",
    ])
    .unwrap();

    assert_eq!(args.log_format, LogFormat::Json);
    assert_eq!(args.config_format, ConfigFormat::Toml);
    assert_eq!(args.settings_file, PathBuf::from("/tmp/settings.xml"));
  }
}
