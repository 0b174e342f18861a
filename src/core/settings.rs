//! Settings document (`settings.json`) and credential lookup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Which backend produces embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Local,
    #[default]
    LmStudio,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Local => "local",
            ProviderKind::LmStudio => "lmstudio",
            ProviderKind::Gemini => "gemini",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Models selectable for the in-process provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LocalModel {
    #[default]
    #[serde(rename = "minilm")]
    MiniLm,
    #[serde(rename = "gemma-300m")]
    Gemma300m,
    #[serde(rename = "qwen-0.6b")]
    Qwen0_6b,
    #[serde(rename = "qwen-8b")]
    Qwen8b,
}

impl LocalModel {
    pub const ALL: [LocalModel; 4] = [
        LocalModel::MiniLm,
        LocalModel::Gemma300m,
        LocalModel::Qwen0_6b,
        LocalModel::Qwen8b,
    ];

    /// Settings name of the model
    pub fn as_str(&self) -> &'static str {
        match self {
            LocalModel::MiniLm => "minilm",
            LocalModel::Gemma300m => "gemma-300m",
            LocalModel::Qwen0_6b => "qwen-0.6b",
            LocalModel::Qwen8b => "qwen-8b",
        }
    }

    /// Name of the ONNX model actually loaded for this choice
    pub fn backend_name(&self) -> &'static str {
        match self {
            LocalModel::MiniLm => "all-MiniLM-L6-v2",
            LocalModel::Gemma300m => "bge-small-en-v1.5",
            LocalModel::Qwen0_6b => "gte-base-en-v1.5",
            LocalModel::Qwen8b => "gte-large-en-v1.5",
        }
    }
}

/// Which book field(s) are embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextColumn {
    #[default]
    Description,
    Title,
    TitleDescription,
}

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_true")]
    pub ml_enabled: bool,
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default)]
    pub local_model: LocalModel,

    #[serde(default = "default_books_path")]
    pub books_path: PathBuf,
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    #[serde(default = "default_api_key_path")]
    pub api_key_path: PathBuf,

    #[serde(default = "default_lmstudio_url")]
    pub lmstudio_url: String,
    #[serde(default = "default_lmstudio_model")]
    pub lmstudio_model: String,
    #[serde(default = "default_gemini_url")]
    pub gemini_url: String,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    #[serde(default)]
    pub text_column: TextColumn,
    #[serde(default)]
    pub lowercase_text: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub batch_delay_seconds: u64,
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Directory relative paths resolve against
    #[serde(skip)]
    base_dir: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_books_path() -> PathBuf {
    PathBuf::from("books.csv")
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("cache/embeddings.db")
}

fn default_api_key_path() -> PathBuf {
    PathBuf::from("api_key.txt")
}

fn default_lmstudio_url() -> String {
    "http://localhost:1234/v1".to_string()
}

fn default_lmstudio_model() -> String {
    "text-embedding-nomic-embed-text-v1.5".to_string()
}

fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_model() -> String {
    "gemini-embedding-001".to_string()
}

fn default_batch_size() -> usize {
    512
}

fn default_parallelism() -> usize {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ml_enabled: true,
            provider: ProviderKind::default(),
            local_model: LocalModel::default(),
            books_path: default_books_path(),
            cache_path: default_cache_path(),
            api_key_path: default_api_key_path(),
            lmstudio_url: default_lmstudio_url(),
            lmstudio_model: default_lmstudio_model(),
            gemini_url: default_gemini_url(),
            gemini_model: default_gemini_model(),
            text_column: TextColumn::default(),
            lowercase_text: false,
            batch_size: default_batch_size(),
            batch_delay_seconds: 0,
            parallelism: default_parallelism(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigParseError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::from_json_str(&content, base_dir)
    }

    /// Load `path` if given, otherwise `./settings.json` when present,
    /// otherwise built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default_path = Path::new(DEFAULT_SETTINGS_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    tracing::debug!("no {} found, using defaults", DEFAULT_SETTINGS_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_json_str(content: &str, base_dir: PathBuf) -> Result<Self> {
        let mut settings: Settings = serde_json::from_str(content)
            .map_err(|e| Error::ConfigParseError(e.to_string()))?;
        settings.base_dir = base_dir;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::ConfigParseError("batch_size must be at least 1".into()));
        }
        if self.parallelism == 0 {
            return Err(Error::ConfigParseError("parallelism must be at least 1".into()));
        }
        Ok(())
    }

    pub fn with_base_dir(mut self, base_dir: PathBuf) -> Self {
        self.base_dir = base_dir;
        self
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn books_path(&self) -> PathBuf {
        self.resolve(&self.books_path)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.resolve(&self.cache_path)
    }

    pub fn api_key_path(&self) -> PathBuf {
        self.resolve(&self.api_key_path)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_secs(self.batch_delay_seconds)
    }

    /// Stable identifier of the configured embedding space.
    ///
    /// Cache entries are keyed by it, so switching provider, model or text
    /// preprocessing never mixes vectors from different spaces.
    pub fn model_id(&self) -> String {
        let base = match self.provider {
            ProviderKind::Local => format!("local/{}", self.local_model.backend_name()),
            ProviderKind::LmStudio => format!("lmstudio/{}", self.lmstudio_model),
            ProviderKind::Gemini => format!("gemini/{}", self.gemini_model),
        };
        if self.lowercase_text {
            format!("{}+lower", base)
        } else {
            base
        }
    }

    /// API key for the hosted provider. The environment wins over the file.
    pub fn read_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Some(key);
            }
        }
        let key = std::fs::read_to_string(self.api_key_path()).ok()?;
        let key = key.trim();
        (!key.is_empty()).then(|| key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let settings = Settings::from_json_str("{}", PathBuf::from("/data")).unwrap();
        assert!(settings.ml_enabled);
        assert_eq!(settings.provider, ProviderKind::LmStudio);
        assert_eq!(settings.local_model, LocalModel::MiniLm);
        assert_eq!(settings.batch_size, 512);
        assert_eq!(settings.books_path(), PathBuf::from("/data/books.csv"));
        assert_eq!(settings.cache_path(), PathBuf::from("/data/cache/embeddings.db"));
    }

    #[test]
    fn test_enum_values() {
        let json = r#"{"ml_enabled": false, "provider": "local", "local_model": "qwen-0.6b"}"#;
        let settings = Settings::from_json_str(json, PathBuf::from(".")).unwrap();
        assert!(!settings.ml_enabled);
        assert_eq!(settings.provider, ProviderKind::Local);
        assert_eq!(settings.local_model, LocalModel::Qwen0_6b);
    }

    #[test]
    fn test_rejects_unknown_values() {
        let bad_provider = r#"{"provider": "openai"}"#;
        assert!(matches!(
            Settings::from_json_str(bad_provider, PathBuf::from(".")),
            Err(Error::ConfigParseError(_))
        ));

        let unknown_key = r#"{"ml": true}"#;
        assert!(matches!(
            Settings::from_json_str(unknown_key, PathBuf::from(".")),
            Err(Error::ConfigParseError(_))
        ));

        let zero_batch = r#"{"batch_size": 0}"#;
        assert!(matches!(
            Settings::from_json_str(zero_batch, PathBuf::from(".")),
            Err(Error::ConfigParseError(_))
        ));

        assert!(matches!(
            Settings::from_json_str("not json", PathBuf::from(".")),
            Err(Error::ConfigParseError(_))
        ));
    }

    #[test]
    fn test_absolute_paths_kept() {
        let json = r#"{"books_path": "/srv/books.csv"}"#;
        let settings = Settings::from_json_str(json, PathBuf::from("/data")).unwrap();
        assert_eq!(settings.books_path(), PathBuf::from("/srv/books.csv"));
    }

    #[test]
    fn test_model_id() {
        let mut settings = Settings::default();
        assert_eq!(
            settings.model_id(),
            "lmstudio/text-embedding-nomic-embed-text-v1.5"
        );

        settings.provider = ProviderKind::Local;
        settings.local_model = LocalModel::Gemma300m;
        assert_eq!(settings.model_id(), "local/bge-small-en-v1.5");

        settings.lowercase_text = true;
        assert_eq!(settings.model_id(), "local/bge-small-en-v1.5+lower");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = Settings::load(Path::new("/nonexistent/settings.json"));
        assert!(matches!(result, Err(Error::ConfigParseError(_))));
    }
}
