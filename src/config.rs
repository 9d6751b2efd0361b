//! Runtime configuration loaded from environment variables.
//!
//! Credentials are optional at startup. A missing key only turns into an error
//! when the provider that needs it is actually invoked.

use serde::Serialize;
use std::path::PathBuf;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEEPSEEK_API_BASE: &str = "https://api.deepseek.com/v1";
pub const SEMANTIC_SCHOLAR_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";
pub const SCOPUS_API_BASE: &str = "https://api.elsevier.com/content/search/scopus";
pub const SCHOLAR_BASE: &str = "https://scholar.google.com";

/// Model used when a request does not name one
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Default location of the document template
pub const DEFAULT_TEMPLATE_PATH: &str = "templates/latex_template.tex";

/// Environment variable names for every credential the service knows about
pub const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";
pub const DEEPSEEK_KEY_VAR: &str = "DEEPSEEK_API_KEY";
pub const SEMANTIC_SCHOLAR_KEY_VAR: &str = "SEMANTIC_SCHOLAR_API_KEY";
pub const SCOPUS_KEY_VAR: &str = "SCOPUS_API_KEY";

/// Service settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    pub deepseek_api_key: Option<String>,
    pub semantic_scholar_api_key: Option<String>,
    pub scopus_api_key: Option<String>,
    pub openai_base_url: String,
    pub deepseek_base_url: String,
    pub semantic_scholar_base_url: String,
    pub scopus_base_url: String,
    pub scholar_base_url: String,
    /// Outbound proxy for the Scholar scraper (e.g. "http://127.0.0.1:7890")
    pub scholar_proxy: Option<String>,
    pub template_path: PathBuf,
    pub default_model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            deepseek_api_key: None,
            semantic_scholar_api_key: None,
            scopus_api_key: None,
            openai_base_url: OPENAI_API_BASE.to_string(),
            deepseek_base_url: DEEPSEEK_API_BASE.to_string(),
            semantic_scholar_base_url: SEMANTIC_SCHOLAR_API_BASE.to_string(),
            scopus_base_url: SCOPUS_API_BASE.to_string(),
            scholar_base_url: SCHOLAR_BASE.to_string(),
            scholar_proxy: None,
            template_path: PathBuf::from(DEFAULT_TEMPLATE_PATH),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl Settings {
    /// Build settings from the process environment.
    ///
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        Self {
            openai_api_key: get(OPENAI_KEY_VAR),
            deepseek_api_key: get(DEEPSEEK_KEY_VAR),
            semantic_scholar_api_key: get(SEMANTIC_SCHOLAR_KEY_VAR),
            scopus_api_key: get(SCOPUS_KEY_VAR),
            openai_base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            deepseek_base_url: get("DEEPSEEK_BASE_URL").unwrap_or(defaults.deepseek_base_url),
            semantic_scholar_base_url: get("SEMANTIC_SCHOLAR_BASE_URL")
                .unwrap_or(defaults.semantic_scholar_base_url),
            scopus_base_url: get("SCOPUS_BASE_URL").unwrap_or(defaults.scopus_base_url),
            scholar_base_url: get("SCHOLAR_BASE_URL").unwrap_or(defaults.scholar_base_url),
            scholar_proxy: get("SCHOLAR_PROXY"),
            template_path: get("SLR_TEMPLATE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.template_path),
            default_model: get("SLR_DEFAULT_MODEL").unwrap_or(defaults.default_model),
        }
    }

    /// Diagnostic view of every credential, with the secret masked.
    pub fn credential_status(&self) -> Vec<CredentialStatus> {
        [
            ("OpenAI", OPENAI_KEY_VAR, &self.openai_api_key),
            ("DeepSeek", DEEPSEEK_KEY_VAR, &self.deepseek_api_key),
            ("Semantic Scholar", SEMANTIC_SCHOLAR_KEY_VAR, &self.semantic_scholar_api_key),
            ("Scopus", SCOPUS_KEY_VAR, &self.scopus_api_key),
        ]
        .into_iter()
        .map(|(name, env_var, value)| CredentialStatus {
            name,
            env_var,
            configured: value.is_some(),
            preview: value.as_deref().map(mask_secret),
        })
        .collect()
    }
}

/// Presence of one credential
#[derive(Debug, Clone, Serialize)]
pub struct CredentialStatus {
    pub name: &'static str,
    pub env_var: &'static str,
    pub configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

/// Keep the first and last four characters of a secret, hide the rest.
fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
