//! `META-INF/container.xml`.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::util::{decode_text, local_name, strip_bom};

pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Package document location used when the container does not name one.
pub const DEFAULT_PACKAGE_PATH: &str = "OEBPS/content.opf";

/// The `full-path` of the first rootfile, if the container is readable and
/// names one.
pub fn parse_container(bytes: &[u8]) -> Option<String> {
    let content = decode_text(strip_bom(bytes), None);
    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name(e.name().as_ref()) == b"rootfile" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"full-path" {
                        let value = String::from_utf8_lossy(&attr.value).trim().to_string();
                        if !value.is_empty() {
                            return Some(value);
                        }
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Container pointing at the package document at `package_path`.
pub fn container_xml(package_path: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="{package_path}" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#
    )
}
