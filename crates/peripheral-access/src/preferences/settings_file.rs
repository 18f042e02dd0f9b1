use super::{codec, PersistenceError, PreferenceEntry};
use std::{
  fs::{self, File},
  io::{self, Write},
  path::{Path, PathBuf},
};

/// The well-known file holding the preference table.
#[derive(Debug, Clone)]
pub struct SettingsFile {
  path: PathBuf,
}

impl SettingsFile {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn temporary_path(&self) -> PathBuf {
    let mut name = self.path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    self.path.with_file_name(name)
  }

  /// `Ok(None)` when the file does not exist yet.
  pub(super) fn load(&self) -> Result<Option<Vec<PreferenceEntry>>, PersistenceError> {
    let content = match fs::read(&self.path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(e.into()),
    };

    codec::read(&content).map(Some)
  }

  /// Writes next to the settings file and renames over it, so a failed
  /// write never leaves a truncated document behind.
  pub(super) fn save(&self, entries: &[PreferenceEntry]) -> Result<(), PersistenceError> {
    let content = codec::write(entries)?;
    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent)?;
    }

    let temporary = self.temporary_path();
    let result = write_synced(&temporary, &content).and_then(|()| fs::rename(&temporary, &self.path));
    if let Err(error) = result {
      let _ = fs::remove_file(&temporary);
      return Err(error.into());
    }

    Ok(())
  }

  pub(super) fn discard(&self) -> io::Result<()> {
    match fs::remove_file(&self.path) {
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      result => result,
    }
  }
}

fn write_synced(path: &Path, content: &[u8]) -> io::Result<()> {
  let mut file = File::create(path)?;
  file.write_all(content)?;
  file.sync_all()
}
