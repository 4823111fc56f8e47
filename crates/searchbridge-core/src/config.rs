use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Options for one search provider instance.
///
/// `scope` prefixes every logical index name (`{scope}-{document_type}`);
/// `root_dir` is the directory index directories are created under.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchOptions {
    pub scope: String,
    pub root_dir: PathBuf,
}

impl SearchOptions {
    pub fn new(scope: impl Into<String>, root_dir: impl Into<PathBuf>) -> Self {
        Self { scope: scope.into(), root_dir: root_dir.into() }
    }

    /// Scope for one document type. A single fixed scope today; the hook
    /// exists so callers can route document types to separate scopes.
    pub fn scope_for(&self, _document_type: &str) -> &str {
        &self.scope
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    /// Merge `config.toml` from the working directory, the
    /// `RUST_ENV`-specific overlay, and `SEARCH_*` environment variables.
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(".", &env_name)
    }

    /// Same merge order, with the config directory and environment name
    /// given explicitly.
    pub fn load_for_env(dir: impl AsRef<Path>, env_name: &str) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        let mut figment = Figment::new().merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => {
                figment = figment.merge(Toml::file(dir.join("config.dev.toml")));
            }
            "prod" | "production" => {
                figment = figment.merge(Toml::file(dir.join("config.prod.toml")));
            }
            "test" | "testing" => {
                figment = figment.merge(Toml::file(dir.join("config.test.toml")));
            }
            _ => {}
        }
        figment = figment.merge(Env::prefixed("SEARCH_"));

        Ok(Self { figment })
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Search options from the `search` section, with the index root
    /// expanded (`~`, `${VAR}`).
    pub fn search_options(&self) -> anyhow::Result<SearchOptions> {
        let scope: String = self.get("search.scope")?;
        let root: String = self.get("search.root_dir")?;
        Ok(SearchOptions::new(scope, expand_path(root)))
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_plain_path_is_identity() {
        assert_eq!(expand_path("/var/lib/search"), PathBuf::from("/var/lib/search"));
    }

    #[test]
    fn scope_is_shared_across_document_types() {
        let options = SearchOptions::new("test-core", "/tmp/idx");
        assert_eq!(options.scope_for("item"), "test-core");
        assert_eq!(options.scope_for("order"), "test-core");
    }
}
