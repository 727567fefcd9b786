use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_DATABASE: &str = "stories.db";

pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not found in environment variables")]
    MissingCredential(&'static str),

    #[error("{0} must be set for this backend")]
    MissingSetting(&'static str),

    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Which completion backend serves the generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Hosted Gemini `generateContent` endpoint.
    Gemini,
    /// In-process GGUF model (requires the `local` feature).
    Local,
}

/// Settings for one story generator, read from the environment.
///
/// | Env Var             | Default                                      |
/// |---------------------|----------------------------------------------|
/// | `GEMINI_API_KEY`    | required for `gemini`                        |
/// | `STORY_MODEL`       | `gemini-1.5-flash-latest`, required for `local` |
/// | `STORY_TEMPERATURE` | `0.7`                                        |
/// | `STORY_BACKEND`     | `gemini`                                     |
/// | `GEMINI_BASE_URL`   | Google v1beta endpoint                       |
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub backend: Backend,
    /// Model name for Gemini, or a path to a `.gguf` file for the local backend.
    pub model: String,
    /// Empty for the local backend.
    pub api_key: String,
    pub temperature: f32,
    pub base_url: String,
}

impl GeneratorConfig {
    /// Read the process environment. The binary loads `.env` once at startup.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup. Fails before anything
    /// touches the network when the credential is missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("STORY_BACKEND").as_deref().map(str::trim) {
            None | Some("") | Some("gemini") => Backend::Gemini,
            Some("local") => Backend::Local,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "STORY_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let api_key = lookup(API_KEY_VAR)
            .map(|k| k.trim().to_string())
            .unwrap_or_default();
        if backend == Backend::Gemini && api_key.is_empty() {
            return Err(ConfigError::MissingCredential(API_KEY_VAR));
        }

        let temperature = match lookup("STORY_TEMPERATURE") {
            Some(raw) => raw.trim().parse::<f32>().map_err(|_| ConfigError::Invalid {
                var: "STORY_TEMPERATURE",
                value: raw.clone(),
            })?,
            None => DEFAULT_TEMPERATURE,
        };

        // The Gemini model name has a default; a GGUF path cannot.
        let model = match (lookup("STORY_MODEL").filter(|m| !m.trim().is_empty()), backend) {
            (Some(model), _) => model,
            (None, Backend::Gemini) => DEFAULT_MODEL.into(),
            (None, Backend::Local) => return Err(ConfigError::MissingSetting("STORY_MODEL")),
        };

        let base_url = lookup("GEMINI_BASE_URL")
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.into());

        Ok(Self {
            backend,
            model,
            api_key,
            temperature,
            base_url,
        })
    }
}

/// SQLite file the binary stores stories in (`STORY_DATABASE`).
pub fn database_path() -> String {
    std::env::var("STORY_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.into())
}
