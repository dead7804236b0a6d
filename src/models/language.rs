//! Languages and site sections.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Content language of a stored row.
///
/// `Da` is the canonical source, `Kl` the Greenlandic mirror and `En` the
/// machine-translated variant derived from `Da`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Da,
    Kl,
    En,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Da, Language::Kl, Language::En];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Da => "da",
            Self::Kl => "kl",
            Self::En => "en",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "da" | "dk" => Some(Self::Da),
            "kl" => Some(Self::Kl),
            "en" => Some(Self::En),
            _ => None,
        }
    }

    /// Languages that are crawled from an upstream host (EN is derived).
    pub fn is_crawlable(&self) -> bool {
        !matches!(self, Self::En)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upstream site sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Home,
    Erhverv,
    Samfund,
    Kultur,
    Sport,
    Podcasti,
    Job,
}

impl Section {
    /// Sections walked by a full crawl, in crawl order.
    pub const CRAWLABLE: [Section; 6] = [
        Section::Home,
        Section::Erhverv,
        Section::Samfund,
        Section::Kultur,
        Section::Sport,
        Section::Podcasti,
    ];

    /// Sections backed by a seeded category row.
    pub const CATEGORIES: [Section; 6] = [
        Section::Erhverv,
        Section::Samfund,
        Section::Kultur,
        Section::Sport,
        Section::Podcasti,
        Section::Job,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Erhverv => "erhverv",
            Self::Samfund => "samfund",
            Self::Kultur => "kultur",
            Self::Sport => "sport",
            Self::Podcasti => "podcasti",
            Self::Job => "job",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "home" => Some(Self::Home),
            "erhverv" => Some(Self::Erhverv),
            "samfund" => Some(Self::Samfund),
            "kultur" => Some(Self::Kultur),
            "sport" => Some(Self::Sport),
            "podcasti" => Some(Self::Podcasti),
            "job" => Some(Self::Job),
            _ => None,
        }
    }

    /// Path of the section listing relative to the site root.
    pub fn path(&self) -> String {
        match self {
            Self::Home => "/".to_string(),
            other => format!("/{}", other.as_str()),
        }
    }

    /// Display name used when seeding categories.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Home => "Forside",
            Self::Erhverv => "Erhverv",
            Self::Samfund => "Samfund",
            Self::Kultur => "Kultur",
            Self::Sport => "Sport",
            Self::Podcasti => "Podcasti",
            Self::Job => "Job",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_roundtrip() {
        for lang in Language::ALL {
            assert_eq!(Language::from_str(lang.as_str()), Some(lang));
        }
        assert_eq!(Language::from_str("DK"), Some(Language::Da));
        assert_eq!(Language::from_str("de"), None);
        assert!(!Language::En.is_crawlable());
    }

    #[test]
    fn test_section_path() {
        assert_eq!(Section::Home.path(), "/");
        assert_eq!(Section::Samfund.path(), "/samfund");
        assert_eq!(Section::from_str("Kultur"), Some(Section::Kultur));
        assert_eq!(Section::from_str("nyheder"), None);
    }
}
