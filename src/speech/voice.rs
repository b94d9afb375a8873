//! Synthesis voice selection
//!
//! The voice catalog arrives asynchronously from the hosting platform; this
//! module holds the pure preference heuristic so it can be tested without any
//! platform dependency.

use regex::Regex;
use serde::Deserialize;

/// Name fragments that mark a preferred voice within the target dialect
const PREFERRED_NAME_PATTERN: &str = "(?i)female|fiona|susan|sarah|libby|emily";

/// One entry in a platform voice catalog
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisVoice {
    /// Provider voice identifier
    #[serde(alias = "voice_id")]
    pub id: String,

    /// Display name
    pub name: String,

    /// BCP 47 language tag (e.g. "en-GB")
    #[serde(default)]
    pub language: String,
}

/// The voice currently selected for synthesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceProfile {
    /// Provider voice identifier
    pub id: String,

    /// Display name (shown by the rendering layer)
    pub name: String,

    /// BCP 47 language tag
    pub language: String,
}

impl From<&SynthesisVoice> for VoiceProfile {
    fn from(voice: &SynthesisVoice) -> Self {
        Self {
            id: voice.id.clone(),
            name: voice.name.clone(),
            language: voice.language.clone(),
        }
    }
}

/// Pick the preferred voice from a catalog for a language hint
///
/// Preference ladder: a voice matching the hinted dialect whose name suggests
/// the calibrated persona, then any voice matching the language or region,
/// then none (provider default).
#[must_use]
pub fn select_preferred_voice(
    catalog: &[SynthesisVoice],
    language_hint: &str,
) -> Option<VoiceProfile> {
    let hint = normalize_tag(language_hint);
    let name_pattern = Regex::new(PREFERRED_NAME_PATTERN).ok()?;

    if let Some(voice) = catalog
        .iter()
        .find(|v| normalize_tag(&v.language) == hint && name_pattern.is_match(&v.name))
    {
        return Some(voice.into());
    }

    // Fall back to any voice sharing the primary language or the region subtag.
    let mut subtags = hint.split('-');
    let primary = subtags.next().unwrap_or_default();
    let region = subtags.next().unwrap_or_default();

    catalog
        .iter()
        .find(|v| {
            let tag = normalize_tag(&v.language);
            !primary.is_empty() && tag.starts_with(primary)
                || !region.is_empty() && tag.ends_with(region)
        })
        .map(Into::into)
}

/// Normalize a language tag for comparison ("en_GB" and "EN-gb" both match)
fn normalize_tag(tag: &str) -> String {
    tag.trim().replace('_', "-").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(id: &str, name: &str, language: &str) -> SynthesisVoice {
        SynthesisVoice {
            id: id.to_string(),
            name: name.to_string(),
            language: language.to_string(),
        }
    }

    #[test]
    fn prefers_dialect_with_name_match() {
        let catalog = vec![
            voice("v1", "Daniel", "en-GB"),
            voice("v2", "Libby", "en-GB"),
            voice("v3", "Samantha", "en-US"),
        ];

        let selected = select_preferred_voice(&catalog, "en-GB").unwrap();
        assert_eq!(selected.id, "v2");
        assert_eq!(selected.name, "Libby");
    }

    #[test]
    fn underscore_tags_match() {
        let catalog = vec![voice("v1", "Fiona", "en_GB")];

        let selected = select_preferred_voice(&catalog, "en-GB").unwrap();
        assert_eq!(selected.name, "Fiona");
    }

    #[test]
    fn falls_back_to_language_match() {
        let catalog = vec![
            voice("v1", "Thomas", "fr-FR"),
            voice("v2", "Daniel", "en-AU"),
        ];

        // No name match in the dialect; any English voice will do.
        let selected = select_preferred_voice(&catalog, "en-GB").unwrap();
        assert_eq!(selected.id, "v2");
    }

    #[test]
    fn falls_back_to_region_match() {
        let catalog = vec![voice("v1", "Gwyneth", "cy-GB")];

        let selected = select_preferred_voice(&catalog, "en-GB").unwrap();
        assert_eq!(selected.id, "v1");
    }

    #[test]
    fn none_when_catalog_has_no_match() {
        let catalog = vec![voice("v1", "Kyoko", "ja-JP")];
        assert!(select_preferred_voice(&catalog, "en-GB").is_none());
    }

    #[test]
    fn none_on_empty_catalog() {
        assert!(select_preferred_voice(&[], "en-GB").is_none());
    }

    #[test]
    fn name_heuristic_is_case_insensitive() {
        let catalog = vec![voice("v1", "SARAH (premium)", "en-GB")];

        let selected = select_preferred_voice(&catalog, "en-gb").unwrap();
        assert_eq!(selected.id, "v1");
    }
}
