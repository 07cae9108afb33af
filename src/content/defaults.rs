//! Default content bundled into the binary, used for seeding.

use lazy_static::lazy_static;
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::SectionName;

const DEFAULT_CONTENT: &str = include_str!("default_content.json");

lazy_static! {
    static ref DEFAULTS: HashMap<String, Map<String, Value>> =
        serde_json::from_str(DEFAULT_CONTENT).unwrap_or_else(|e| {
            tracing::error!(error = %e, "bundled default content is not valid JSON");
            HashMap::new()
        });
}

/// Default payload for `section`, if the bundle has one.
pub fn default_payload(section: SectionName) -> Option<Map<String, Value>> {
    DEFAULTS.get(section.as_str()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_covers_every_section() {
        for section in SectionName::ALL {
            assert!(
                default_payload(section).is_some(),
                "missing default for {}",
                section
            );
        }
    }

    #[test]
    fn test_bundle_has_no_unknown_sections() {
        for key in DEFAULTS.keys() {
            assert!(key.parse::<SectionName>().is_ok(), "unexpected key {}", key);
        }
    }
}
