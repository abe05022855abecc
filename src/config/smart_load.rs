use figment::providers::{Data, Format, Json, Toml, Yaml};
use figment::value::{Dict, Map};
use figment::{Error, Metadata, Profile, Provider};
use std::path::Path;

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Toml,
    Json,
    Yaml,
}

impl FileFormat {
    /// Format implied by a file extension, if recognized
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// Provider for an explicitly named config file
///
/// The format follows the extension; unknown extensions are read as TOML.
pub fn auto<P: AsRef<Path>>(path: P) -> SmartProvider {
    let path = path.as_ref();
    match FileFormat::from_path(path) {
        Some(FileFormat::Json) => SmartProvider::Json(Json::file(path)),
        Some(FileFormat::Yaml) => SmartProvider::Yaml(Yaml::file(path)),
        Some(FileFormat::Toml) => SmartProvider::Toml(Toml::file(path)),
        None => {
            tracing::debug!("Unknown config extension for {}, reading as TOML", path.display());
            SmartProvider::Toml(Toml::file(path))
        }
    }
}

/// One of the file providers, picked at runtime
pub enum SmartProvider {
    Toml(Data<Toml>),
    Json(Data<Json>),
    Yaml(Data<Yaml>),
}

impl Provider for SmartProvider {
    fn metadata(&self) -> Metadata {
        match self {
            SmartProvider::Toml(p) => p.metadata(),
            SmartProvider::Json(p) => p.metadata(),
            SmartProvider::Yaml(p) => p.metadata(),
        }
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        match self {
            SmartProvider::Toml(p) => p.data(),
            SmartProvider::Json(p) => p.data(),
            SmartProvider::Yaml(p) => p.data(),
        }
    }
}
