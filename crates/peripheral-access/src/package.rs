use lasso::{Spur, ThreadedRodeo};
use once_cell::sync::Lazy;
use serde::{
  de::{Error, Visitor},
  Deserialize, Deserializer, Serialize, Serializer,
};
use std::{borrow::Borrow, fmt, hash, ops::Deref};

static PACKAGE_NAMES: Lazy<ThreadedRodeo> = Lazy::new(ThreadedRodeo::default);

/// Name of an installed application package, e.g. `com.example.app`.
///
/// Package names repeat across preference entries, candidate lists and
/// permission requests, so they are interned once and passed around by copy.
#[repr(transparent)]
#[derive(Clone, Copy)]
pub struct PackageName(Spur);

impl PackageName {
  pub fn new(name: impl AsRef<str>) -> PackageName {
    PackageName(PACKAGE_NAMES.get_or_intern(name))
  }

  /// The name if it was interned before. Never interns.
  pub fn lookup(name: &str) -> Option<PackageName> {
    PACKAGE_NAMES.get(name).map(PackageName)
  }

  #[inline(always)]
  pub fn as_str(&self) -> &str {
    PACKAGE_NAMES.resolve(&self.0)
  }
}

impl Deref for PackageName {
  type Target = str;

  fn deref(&self) -> &str {
    self.as_str()
  }
}

impl PartialEq for PackageName {
  fn eq(&self, other: &PackageName) -> bool {
    self.0 == other.0
  }
}

impl Eq for PackageName {}

impl PartialEq<str> for PackageName {
  fn eq(&self, other: &str) -> bool {
    self.as_str() == other
  }
}

impl<'a> PartialEq<&'a str> for PackageName {
  fn eq(&self, other: &&'a str) -> bool {
    self.as_str() == *other
  }
}

impl PartialOrd for PackageName {
  fn partial_cmp(&self, other: &PackageName) -> Option<std::cmp::Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for PackageName {
  fn cmp(&self, other: &PackageName) -> std::cmp::Ordering {
    self.as_str().cmp(other.as_str())
  }
}

impl hash::Hash for PackageName {
  fn hash<H: hash::Hasher>(&self, hasher: &mut H) {
    self.as_str().hash(hasher)
  }
}

impl Borrow<str> for PackageName {
  fn borrow(&self) -> &str {
    self.as_str()
  }
}

impl fmt::Debug for PackageName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(self.as_str(), f)
  }
}

impl fmt::Display for PackageName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl<'a> From<&'a str> for PackageName {
  fn from(name: &'a str) -> Self {
    Self::new(name)
  }
}

impl From<String> for PackageName {
  fn from(name: String) -> Self {
    Self::new(name)
  }
}

impl Serialize for PackageName {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    serializer.serialize_str(self.as_str())
  }
}

struct PackageNameVisitor;
impl<'de> Visitor<'de> for PackageNameVisitor {
  type Value = PackageName;

  fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
    formatter.write_str("a package name")
  }

  fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
  where
    E: Error,
  {
    if v.is_empty() {
      return Err(E::invalid_length(0, &self));
    }

    Ok(PackageName::new(v))
  }
}

impl<'de> Deserialize<'de> for PackageName {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    deserializer.deserialize_str(PackageNameVisitor)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_test::{assert_de_tokens_error, assert_tokens, Token};

  #[test]
  fn interned_names_compare_by_value() {
    let a = PackageName::new("com.example.app");
    let b = PackageName::from(String::from("com.example.app"));
    assert_eq!(a, b);
    assert_eq!(a, "com.example.app");
    assert_ne!(a, PackageName::new("com.example.other"));
  }

  #[test]
  fn package_name_serde() {
    assert_tokens(
      &PackageName::new("com.example.app"),
      &[Token::Str("com.example.app")],
    );
  }

  #[test]
  fn empty_package_name_is_rejected() {
    assert_de_tokens_error::<PackageName>(
      &[Token::Str("")],
      "invalid length 0, expected a package name",
    );
  }
}
