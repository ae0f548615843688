//! JSON configuration of the download/extraction APIs.
//!
//! A config file is an object of named sections (e.g. `"ModisAPI-MOD04_L2"`),
//! each carrying credentials, an API link and request defaults.
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::core::dates::parse_date;
use crate::error::{Error, Result};
use crate::types::BoundingBox;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Corner {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BoxDefaults {
    pub bottom_left: Corner,
    pub top_right: Corner,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimeDefaults {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Defaults {
    #[serde(rename = "box")]
    pub bbox: Option<BoxDefaults>,
    /// GeoJSON area, used when no box is given
    pub area: Option<serde_json::Value>,
    pub time: Option<TimeDefaults>,
    pub product_type: Option<String>,
    pub collection: Option<String>,
    pub platform_name: Option<String>,
}

/// `{"type": "file", "path": ...}` or inline `user`/`password`/`api_key`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CredentialSource {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub path: Option<PathBuf>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub user: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Section {
    pub credentials: Option<CredentialSource>,
    pub api_link: Option<String>,
    #[serde(default, alias = "default")]
    pub defaults: Defaults,
}

/// One named section of a config file
#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    /// Directory of the config file; relative credential paths resolve against it
    pub base_dir: PathBuf,
    pub section: Section,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P, section: &str) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut sections: HashMap<String, serde_json::Value> = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{} is not a JSON object of sections: {e}", path.display())))?;
        let raw = sections.remove(section).ok_or_else(|| {
            let mut known: Vec<&String> = sections.keys().collect();
            known.sort();
            Error::Config(format!(
                "section `{section}` not found in {} (available: {known:?})",
                path.display()
            ))
        })?;
        let parsed: Section = serde_json::from_value(raw)
            .map_err(|e| Error::Config(format!("section `{section}`: {e}")))?;
        debug!("Loaded config section {} from {:?}", section, path);

        Ok(Self {
            name: section.to_string(),
            base_dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            section: parsed,
        })
    }

    pub fn defaults(&self) -> &Defaults {
        &self.section.defaults
    }

    pub fn api_link(&self) -> Option<&str> {
        self.section.api_link.as_deref()
    }

    /// Resolve credentials, reading the referenced file for `"type": "file"`
    pub fn credentials(&self) -> Result<Credentials> {
        let source = self
            .section
            .credentials
            .as_ref()
            .ok_or_else(|| Error::Config(format!("section `{}` has no credentials", self.name)))?;

        if source.kind.as_deref() != Some("file") {
            return Ok(Credentials {
                user: source.user.clone(),
                password: source.password.clone(),
                api_key: source.api_key.clone(),
            });
        }

        let path = source
            .path
            .as_ref()
            .ok_or_else(|| Error::Config("file credentials without `path`".to_string()))?;
        let path = if path.is_relative() {
            self.base_dir.join(path)
        } else {
            path.clone()
        };
        let text = fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("cannot read credentials {}: {e}", path.display()))
        })?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("malformed credentials {}: {e}", path.display())))
    }

    /// Default bounding box: `box` corners, else the envelope of `area`
    pub fn bbox(&self) -> Result<BoundingBox> {
        let defaults = self.defaults();
        if let Some(b) = &defaults.bbox {
            return BoundingBox::from_corners(
                b.bottom_left.latitude,
                b.bottom_left.longitude,
                b.top_right.latitude,
                b.top_right.longitude,
            );
        }
        if let Some(area) = &defaults.area {
            return BoundingBox::from_geojson(area);
        }
        Err(Error::Config(format!(
            "section `{}` defines neither a box nor an area",
            self.name
        )))
    }

    pub fn date_range(&self) -> Result<(NaiveDate, NaiveDate)> {
        let time = self
            .defaults()
            .time
            .as_ref()
            .ok_or_else(|| Error::Config(format!("section `{}` has no time range", self.name)))?;
        Ok((parse_date(&time.start)?, parse_date(&time.end)?))
    }
}
