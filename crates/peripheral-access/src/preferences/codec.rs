//! XML form of the preference table.
//!
//! ```xml
//! <?xml version="1.0" encoding="utf-8" standalone="yes"?>
//! <settings>
//!   <preference package="com.example.app">
//!     <usb-device vendor-id="6353" product-id="20193" class="255" subclass="66" protocol="1"/>
//!   </preference>
//!   <preference package="com.example.other">
//!     <usb-accessory manufacturer="Google, Inc." model="DemoKit" type="board" version="1.0"/>
//!   </preference>
//! </settings>
//! ```
//!
//! Wildcard fields are left out. Unknown elements and attributes are ignored.

use super::{PersistenceError, PreferenceEntry};
use crate::{
  filter::{AccessoryFilter, DeviceFilter, Filter},
  package::PackageName,
};
use quick_xml::{
  events::{BytesDecl, BytesEnd, BytesStart, Event},
  Reader, Writer,
};
use std::str::FromStr;

const SETTINGS: &str = "settings";
const PREFERENCE: &str = "preference";
const PACKAGE: &str = "package";
const USB_DEVICE: &str = "usb-device";
const USB_ACCESSORY: &str = "usb-accessory";

const VENDOR_ID: &str = "vendor-id";
const PRODUCT_ID: &str = "product-id";
const CLASS: &str = "class";
const SUBCLASS: &str = "subclass";
const PROTOCOL: &str = "protocol";

const MANUFACTURER: &str = "manufacturer";
const MODEL: &str = "model";
const TYPE: &str = "type";
const VERSION: &str = "version";

#[derive(Default)]
struct PartialEntry {
  package: Option<PackageName>,
  filter: Option<Filter>,
  /// Whether the first child element was seen
  decided: bool,
}

pub(super) fn read(content: &[u8]) -> Result<Vec<PreferenceEntry>, PersistenceError> {
  let mut reader = Reader::from_reader(content);
  reader.trim_text(true);

  let mut entries = Vec::new();
  let mut current: Option<PartialEntry> = None;
  let mut buf = Vec::new();
  loop {
    match reader.read_event_into(&mut buf)? {
      Event::Start(e) if e.name().as_ref() == PREFERENCE.as_bytes() => {
        current = Some(PartialEntry {
          package: read_package(&e)?,
          filter: None,
          decided: false,
        });
      }

      Event::End(e) if e.name().as_ref() == PREFERENCE.as_bytes() => {
        match current.take() {
          Some(PartialEntry {
            package: Some(package),
            filter: Some(filter),
            ..
          }) => entries.push(PreferenceEntry { filter, package }),
          _ => {
            tracing::event!(target: "peripheral-access", tracing::Level::DEBUG, "skipping incomplete preference");
          }
        }
      }

      Event::Start(e) | Event::Empty(e) => {
        // only the first child of a preference can be its filter
        if let Some(entry) = current.as_mut().filter(|c| !c.decided) {
          entry.decided = true;
          entry.filter = match e.name().as_ref() {
            name if name == USB_DEVICE.as_bytes() => Some(Filter::Device(read_device_filter(&e)?)),
            name if name == USB_ACCESSORY.as_bytes() => {
              Some(Filter::Accessory(read_accessory_filter(&e)?))
            }
            _ => None,
          };
        }
      }

      Event::Eof => break,
      _ => {}
    }

    buf.clear();
  }

  Ok(entries)
}

fn read_package(element: &BytesStart<'_>) -> Result<Option<PackageName>, PersistenceError> {
  for attribute in element.attributes() {
    let attribute = attribute?;
    if attribute.key.as_ref() == PACKAGE.as_bytes() {
      let value = attribute.unescape_value()?;
      if !value.is_empty() {
        return Ok(Some(PackageName::new(&*value)));
      }
    }
  }

  Ok(None)
}

/// `-1` is the legacy spelling of a wildcard.
fn parse_number<T: FromStr>(name: &'static str, value: &str) -> Result<Option<T>, PersistenceError> {
  let value = value.trim();
  if value == "-1" {
    return Ok(None);
  }

  value
    .parse()
    .map(Some)
    .map_err(|_| PersistenceError::InvalidAttribute {
      name,
      value: value.into(),
    })
}

fn read_device_filter(element: &BytesStart<'_>) -> Result<DeviceFilter, PersistenceError> {
  let mut filter = DeviceFilter::default();
  for attribute in element.attributes() {
    let attribute = attribute?;
    let value = attribute.unescape_value()?;
    match attribute.key.as_ref() {
      k if k == VENDOR_ID.as_bytes() => filter.vendor_id = parse_number(VENDOR_ID, &value)?,
      k if k == PRODUCT_ID.as_bytes() => filter.product_id = parse_number(PRODUCT_ID, &value)?,
      k if k == CLASS.as_bytes() => filter.class = parse_number(CLASS, &value)?,
      k if k == SUBCLASS.as_bytes() => filter.subclass = parse_number(SUBCLASS, &value)?,
      k if k == PROTOCOL.as_bytes() => filter.protocol = parse_number(PROTOCOL, &value)?,
      _ => {}
    }
  }

  Ok(filter)
}

fn read_accessory_filter(element: &BytesStart<'_>) -> Result<AccessoryFilter, PersistenceError> {
  let mut filter = AccessoryFilter::default();
  for attribute in element.attributes() {
    let attribute = attribute?;
    let value = Some(attribute.unescape_value()?.into_owned());
    match attribute.key.as_ref() {
      k if k == MANUFACTURER.as_bytes() => filter.manufacturer = value,
      k if k == MODEL.as_bytes() => filter.model = value,
      k if k == TYPE.as_bytes() => filter.accessory_type = value,
      k if k == VERSION.as_bytes() => filter.version = value,
      _ => {}
    }
  }

  Ok(filter)
}

fn push_number<T: ToString>(element: &mut BytesStart<'_>, name: &str, value: Option<T>) {
  if let Some(value) = value {
    element.push_attribute((name, value.to_string().as_str()));
  }
}

fn push_string(element: &mut BytesStart<'_>, name: &str, value: &Option<String>) {
  if let Some(value) = value {
    element.push_attribute((name, value.as_str()));
  }
}

fn filter_element(filter: &Filter) -> BytesStart<'static> {
  match filter {
    Filter::Device(f) => {
      let mut element = BytesStart::new(USB_DEVICE);
      push_number(&mut element, VENDOR_ID, f.vendor_id);
      push_number(&mut element, PRODUCT_ID, f.product_id);
      push_number(&mut element, CLASS, f.class);
      push_number(&mut element, SUBCLASS, f.subclass);
      push_number(&mut element, PROTOCOL, f.protocol);
      element
    }
    Filter::Accessory(f) => {
      let mut element = BytesStart::new(USB_ACCESSORY);
      push_string(&mut element, MANUFACTURER, &f.manufacturer);
      push_string(&mut element, MODEL, &f.model);
      push_string(&mut element, TYPE, &f.accessory_type);
      push_string(&mut element, VERSION, &f.version);
      element
    }
  }
}

/// Serializes the table, device preferences first.
pub(super) fn write(entries: &[PreferenceEntry]) -> Result<Vec<u8>, PersistenceError> {
  let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
  writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), Some("yes"))))?;
  writer.write_event(Event::Start(BytesStart::new(SETTINGS)))?;

  let devices = entries.iter().filter(|e| matches!(e.filter, Filter::Device(_)));
  let accessories = entries
    .iter()
    .filter(|e| matches!(e.filter, Filter::Accessory(_)));
  for entry in devices.chain(accessories) {
    let mut preference = BytesStart::new(PREFERENCE);
    preference.push_attribute((PACKAGE, entry.package.as_str()));
    writer.write_event(Event::Start(preference))?;
    writer.write_event(Event::Empty(filter_element(&entry.filter)))?;
    writer.write_event(Event::End(BytesEnd::new(PREFERENCE)))?;
  }

  writer.write_event(Event::End(BytesEnd::new(SETTINGS)))?;
  Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(package: &str, filter: impl Into<Filter>) -> PreferenceEntry {
    PreferenceEntry {
      filter: filter.into(),
      package: PackageName::new(package),
    }
  }

  fn device_filter() -> DeviceFilter {
    DeviceFilter {
      vendor_id: Some(0x18d1),
      product_id: Some(0x4ee1),
      class: Some(255),
      subclass: Some(66),
      protocol: Some(1),
    }
  }

  #[test]
  fn writes_devices_before_accessories() {
    let entries = vec![
      entry(
        "com.example.other",
        AccessoryFilter {
          manufacturer: Some("Google, Inc.".into()),
          model: Some("DemoKit".into()),
          accessory_type: Some("board".into()),
          version: Some("1.0".into()),
        },
      ),
      entry("com.example.app", device_filter()),
    ];

    let xml = String::from_utf8(write(&entries).unwrap()).unwrap();
    let expected = r#"<?xml version="1.0" encoding="utf-8" standalone="yes"?>
<settings>
  <preference package="com.example.app">
    <usb-device vendor-id="6353" product-id="20193" class="255" subclass="66" protocol="1"/>
  </preference>
  <preference package="com.example.other">
    <usb-accessory manufacturer="Google, Inc." model="DemoKit" type="board" version="1.0"/>
  </preference>
</settings>"#;
    assert_eq!(xml, expected);
  }

  #[test]
  fn wildcards_are_omitted() {
    let entries = vec![entry(
      "com.example.app",
      DeviceFilter {
        vendor_id: Some(0x18d1),
        product_id: Some(0x4ee1),
        ..Default::default()
      },
    )];

    let xml = String::from_utf8(write(&entries).unwrap()).unwrap();
    assert!(xml.contains(r#"<usb-device vendor-id="6353" product-id="20193"/>"#));
  }

  #[test]
  fn concrete_entries_round_trip() {
    let entries = vec![
      entry("com.example.app", device_filter()),
      entry(
        "com.example.other",
        DeviceFilter {
          vendor_id: Some(0x05ac),
          ..device_filter()
        },
      ),
    ];

    let read_back = read(&write(&entries).unwrap()).unwrap();
    assert_eq!(read_back.len(), 2);
    for (a, b) in entries.iter().zip(&read_back) {
      assert_eq!(a.filter, b.filter);
      assert_eq!(a.package, b.package);
    }
  }

  #[test]
  fn reads_legacy_wildcards_and_skips_unknown_content() {
    let xml = br#"<?xml version='1.0' encoding='utf-8' standalone='yes' ?>
<settings version="2">
  <comment>ignored</comment>
  <preference package="com.example.app" extra="1">
    <usb-device vendor-id="6353" product-id="-1" serial="x"/>
    <usb-accessory manufacturer="ignored"/>
  </preference>
  <preference package="com.example.lost"/>
  <preference>
    <usb-device vendor-id="1"/>
  </preference>
</settings>"#;

    let entries = read(xml).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].package, "com.example.app");
    match &entries[0].filter {
      Filter::Device(f) => {
        assert_eq!(f.vendor_id, Some(6353));
        assert_eq!(f.product_id, None);
        assert_eq!(f.class, None);
      }
      other => panic!("unexpected filter {}", other),
    }
  }

  #[test]
  fn filter_must_be_first_child() {
    let xml = br#"<settings>
  <preference package="com.example.wrapped">
    <group><usb-device vendor-id="1" product-id="2"/></group>
  </preference>
  <preference package="com.example.late">
    <comment/>
    <usb-device vendor-id="1" product-id="2"/>
  </preference>
  <preference package="com.example.app">
    <usb-accessory model="DemoKit"/>
  </preference>
</settings>"#;

    let entries = read(xml).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].package, "com.example.app");
    assert!(matches!(entries[0].filter, Filter::Accessory(_)));
  }

  #[test]
  fn rejects_non_numeric_device_fields() {
    let xml = br#"<settings><preference package="a"><usb-device class="usb"/></preference></settings>"#;
    assert!(matches!(
      read(xml),
      Err(PersistenceError::InvalidAttribute { name: CLASS, .. })
    ));
  }

  #[test]
  fn rejects_mismatched_tags() {
    let xml = br#"<settings><preference package="a"></settings>"#;
    assert!(read(xml).is_err());
  }

  #[test]
  fn empty_document_has_no_entries() {
    assert!(read(b"").unwrap().is_empty());
  }
}
