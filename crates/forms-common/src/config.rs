use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConfigError, FormsError};

/// Location the rule engine loads custom functions from when the form
/// definition does not name one.
pub const DEFAULT_CUSTOM_FUNCTIONS_PATH: &str = "../functions.js";

/// Rule engine worker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Base URL of the forms data service used for prefill
    pub data_base_url: Url,
    /// Custom functions module used when the definition has no `customFunctionsPath`
    pub custom_functions_path: String,
    /// Code base path custom function modules are resolved against
    pub code_base_path: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            data_base_url: Url::parse("http://localhost/").expect("static URL is valid"),
            custom_functions_path: DEFAULT_CUSTOM_FUNCTIONS_PATH.to_string(),
            code_base_path: None,
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `FORMS_DATA_BASE_URL`: Origin of the forms data service (e.g., `https://author.example.com`)
    ///
    /// Optional env vars:
    /// - `FORMS_CUSTOM_FUNCTIONS_PATH`: Fallback custom functions module (default: ../functions.js)
    /// - `FORMS_CODE_BASE_PATH`: Base path for resolving custom function modules
    pub fn from_env() -> Result<Self, FormsError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`WorkerConfig::from_env`], reading variables through `var`.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, FormsError> {
        let url_str = var("FORMS_DATA_BASE_URL").ok_or(ConfigError::MissingEnv {
            var: "FORMS_DATA_BASE_URL",
        })?;
        let data_base_url = parse_url(&url_str)?;

        let custom_functions_path = var("FORMS_CUSTOM_FUNCTIONS_PATH")
            .unwrap_or_else(|| DEFAULT_CUSTOM_FUNCTIONS_PATH.to_string());
        let code_base_path = var("FORMS_CODE_BASE_PATH");

        Ok(Self {
            data_base_url,
            custom_functions_path,
            code_base_path,
        })
    }

    /// Configuration for a worker started from the page at `context_url`.
    ///
    /// Prefill data is served from the same origin as the form page.
    pub fn for_context(context_url: &str) -> Result<Self, FormsError> {
        let url = parse_url(context_url)?;
        let origin = url.origin().ascii_serialization();
        let data_base_url = parse_url(&format!("{origin}/"))?;
        Ok(Self {
            data_base_url,
            ..Self::default()
        })
    }

    pub fn with_code_base_path(mut self, code_base_path: Option<String>) -> Self {
        self.code_base_path = code_base_path;
        self
    }
}

fn parse_url(url: &str) -> Result<Url, ConfigError> {
    Url::parse(url).map_err(|e| ConfigError::UrlParse {
        url: url.to_string(),
        message: e.to_string(),
    })
}
