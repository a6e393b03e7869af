//! Workspace configuration.
//!
//! Lives at `.flotilla/config.toml` under the workspace root. The token may
//! be kept out of the file entirely and supplied through `FLOTILLA_TOKEN`,
//! which always wins over the stored value.

use std::fs;
use std::path::{Path, PathBuf};

use flotilla_remote::{ProviderKind, ProviderSettings, Repository};
use serde::{Deserialize, Serialize};

use crate::error::{FleetError, FleetResult};

/// Environment variable overriding the stored token.
pub const TOKEN_ENV: &str = "FLOTILLA_TOKEN";

/// Protocol used for cloning and for remote git operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloneProtocol {
    #[default]
    Ssh,
    Https,
}

/// How requests against the provider REST API are authorized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthMode {
    /// Personal access token, sent per provider convention.
    #[default]
    #[serde(rename = "pat")]
    Pat,
    /// Bearer token minted by the platform CLI (Azure-like back-ends).
    #[serde(rename = "az-cli")]
    AzCli,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetConfig {
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// One of `github`, `gitlab`, `azure`; validated at resolution time.
    pub kind: String,
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Remote groups this workspace administers.
    #[serde(default)]
    pub group_ids: Vec<String>,
    #[serde(default)]
    pub include_archived: bool,
    #[serde(default)]
    pub clone_protocol: CloneProtocol,
    /// Inject the token into git network operations (HTTPS only).
    #[serde(default)]
    pub use_token_for_operations: bool,
    #[serde(default)]
    pub auth_mode: AuthMode,
    /// Lower-case remote names and turn spaces into dashes for local folders.
    #[serde(default)]
    pub normalize_names: bool,
}

impl FleetConfig {
    pub fn path(workspace: &Path) -> PathBuf {
        workspace.join(".flotilla").join("config.toml")
    }

    /// Directory holding the executable action scripts run by `exec`.
    pub fn actions_root(workspace: &Path) -> PathBuf {
        workspace.join(".flotilla").join("actions")
    }

    pub fn load(workspace: &Path) -> FleetResult<Self> {
        let path = Self::path(workspace);
        let raw = fs::read_to_string(&path).map_err(|_| {
            FleetError::Config(format!(
                "no configuration at {}; run 'flotilla init' first",
                path.display()
            ))
        })?;
        let mut config: FleetConfig = toml::from_str(&raw)
            .map_err(|e| FleetError::Config(format!("cannot parse {}: {e}", path.display())))?;

        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.is_empty() {
                config.provider.token = Some(token);
            }
        }

        Ok(config)
    }

    pub fn save(&self, workspace: &Path) -> FleetResult<()> {
        let path = Self::path(workspace);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let raw = toml::to_string_pretty(self)
            .map_err(|e| FleetError::Config(format!("cannot serialize configuration: {e}")))?;
        fs::write(&path, raw)?;
        Ok(())
    }

    pub fn provider_kind(&self) -> FleetResult<ProviderKind> {
        ProviderKind::parse(&self.provider.kind).ok_or_else(|| {
            FleetError::Config(format!("invalid provider kind '{}'", self.provider.kind))
        })
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            base_url: self.provider.base_url.clone(),
            token: self.provider.token.clone().unwrap_or_default(),
            include_archived: self.provider.include_archived,
            normalize_names: self.provider.normalize_names,
            delegated_auth: self.provider.auth_mode == AuthMode::AzCli,
        }
    }

    /// Clone URL for a repository under the configured protocol.
    pub fn clone_url<'a>(&self, repository: &'a Repository) -> &'a str {
        match self.provider.clone_protocol {
            CloneProtocol::Ssh => &repository.ssh_url,
            CloneProtocol::Https => &repository.http_url,
        }
    }

    /// Token to inject into git network operations, when configured.
    /// Requires the HTTPS protocol; SSH operations authenticate on their own.
    pub fn operation_token(&self) -> Option<&str> {
        if self.provider.clone_protocol != CloneProtocol::Https
            || !self.provider.use_token_for_operations
        {
            return None;
        }
        self.provider.token.as_deref().filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FleetConfig {
        FleetConfig {
            provider: ProviderConfig {
                kind: "gitlab".to_string(),
                base_url: "https://gitlab.example.com".to_string(),
                token: Some("secret".to_string()),
                group_ids: vec!["42".to_string()],
                include_archived: false,
                clone_protocol: CloneProtocol::Https,
                use_token_for_operations: true,
                auth_mode: AuthMode::Pat,
                normalize_names: true,
            },
        }
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample();
        config.save(dir.path()).unwrap();

        let loaded = FleetConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.provider.kind, "gitlab");
        assert_eq!(loaded.provider.group_ids, vec!["42".to_string()]);
        assert_eq!(loaded.provider.clone_protocol, CloneProtocol::Https);
        assert!(loaded.provider.use_token_for_operations);
    }

    #[test]
    fn test_load_missing_file_points_at_init() {
        let dir = tempfile::tempdir().unwrap();
        let err = FleetConfig::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("flotilla init"));
    }

    #[test]
    fn test_invalid_kind_fails_at_resolution() {
        let mut config = sample();
        config.provider.kind = "subversion".to_string();
        let err = config.provider_kind().unwrap_err();
        assert!(err.to_string().contains("subversion"));
    }

    #[test]
    fn test_invalid_clone_protocol_fails_at_parse() {
        let raw = "[provider]\nkind = \"github\"\nbase_url = \"x\"\nclone_protocol = \"ftp\"\n";
        let err = toml::from_str::<FleetConfig>(raw).unwrap_err();
        assert!(err.to_string().contains("ftp"));
    }

    #[test]
    fn test_operation_token_requires_https_and_flag() {
        let mut config = sample();
        assert_eq!(config.operation_token(), Some("secret"));

        config.provider.clone_protocol = CloneProtocol::Ssh;
        assert_eq!(config.operation_token(), None);

        config.provider.clone_protocol = CloneProtocol::Https;
        config.provider.use_token_for_operations = false;
        assert_eq!(config.operation_token(), None);
    }

    #[test]
    fn test_settings_carry_delegated_auth() {
        let mut config = sample();
        config.provider.auth_mode = AuthMode::AzCli;
        assert!(config.provider_settings().delegated_auth);
        assert!(config.provider_settings().normalize_names);
    }
}
