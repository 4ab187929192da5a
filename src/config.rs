// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the deployment definition that sitedeploy uses to
//! locate the project's artifacts and the host's service manager directories.
//! File I/O is left to the caller to figure out.
//!
//! Every field has a default. An empty definition describes the fixed layout
//! the tool was built around: the `vehiculos` service and site living under
//! `/opt/vehiculos`, installed into the stock Debian systemd and nginx
//! directories.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Deployment definition layout.
///
/// # General Layout
///
/// A deployment definition is composed of three tables: `project`, `host`,
/// and `tools`. The project table names the service and site to deploy and
/// where their sources live. The host table says where the service managers
/// expect installed files. The tools table names the control binaries to
/// invoke.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeployDefinition {
    /// Project being deployed.
    pub project: ProjectSettings,

    /// Host directories managed by systemd and nginx.
    pub host: HostLayout,

    /// Control binaries for systemd and nginx.
    pub tools: ToolSettings,
}

impl DeployDefinition {
    /// Check that names can be used as file stems, and that host directories
    /// are absolute.
    ///
    /// Site links point into `sites_available`, and a relative target would
    /// resolve against `sites_enabled` instead.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::InvalidName`] if either name is empty, or
    ///   contains a path separator.
    /// - Return [`ConfigError::RelativeHostDir`] if any host directory is
    ///   relative.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("project.service", &self.project.service),
            ("project.site", &self.project.site),
        ] {
            if value.is_empty() || value.contains('/') || value == "." || value == ".." {
                return Err(ConfigError::InvalidName {
                    field,
                    value: value.clone(),
                });
            }
        }

        for (field, path) in [
            ("host.unit_dir", &self.host.unit_dir),
            ("host.sites_available", &self.host.sites_available),
            ("host.sites_enabled", &self.host.sites_enabled),
        ] {
            if path.is_relative() {
                return Err(ConfigError::RelativeHostDir {
                    field,
                    path: path.clone(),
                });
            }
        }

        Ok(())
    }
}

impl FromStr for DeployDefinition {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut definition: DeployDefinition =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        definition.project.dir = ProjectDir::new(expand(definition.project.dir.as_path())?);
        definition.host.unit_dir = expand(&definition.host.unit_dir)?;
        definition.host.sites_available = expand(&definition.host.sites_available)?;
        definition.host.sites_enabled = expand(&definition.host.sites_enabled)?;
        definition.tools.systemctl = expand(&definition.tools.systemctl)?;
        definition.tools.nginx = expand(&definition.tools.nginx)?;

        definition.validate()?;

        Ok(definition)
    }
}

impl Display for DeployDefinition {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Project settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Root of the project checkout holding the `deploy/` sources.
    pub dir: ProjectDir,

    /// Service name, used as the unit file stem.
    pub service: String,

    /// Site name, used as the nginx config file stem.
    pub site: String,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            dir: ProjectDir::default(),
            service: "vehiculos".into(),
            site: "vehiculos".into(),
        }
    }
}

/// Host directories owned by the service managers.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HostLayout {
    /// Directory systemd loads administrator unit files from.
    pub unit_dir: PathBuf,

    /// Directory holding every known nginx site config.
    pub sites_available: PathBuf,

    /// Directory holding links to the active nginx site configs.
    pub sites_enabled: PathBuf,
}

impl Default for HostLayout {
    fn default() -> Self {
        Self {
            unit_dir: "/etc/systemd/system".into(),
            sites_available: "/etc/nginx/sites-available".into(),
            sites_enabled: "/etc/nginx/sites-enabled".into(),
        }
    }
}

/// Control binaries.
///
/// Bare names are looked up through `$PATH`.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Service manager control binary.
    pub systemctl: PathBuf,

    /// Web server binary, used for syntax tests.
    pub nginx: PathBuf,

    /// Unit name of the web server itself.
    pub nginx_unit: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            systemctl: "systemctl".into(),
            nginx: "nginx".into(),
            nginx_unit: "nginx".into(),
        }
    }
}

/// Path to the project being deployed.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ProjectDir(PathBuf);

impl ProjectDir {
    /// Construct new project directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Treat project directory as [`Path`] slice.
    pub fn as_path(&self) -> &Path {
        self.0.as_path()
    }
}

impl Default for ProjectDir {
    fn default() -> Self {
        Self::new("/opt/vehiculos")
    }
}

impl Display for ProjectDir {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_path().to_string_lossy().as_ref())
    }
}

fn expand(path: &Path) -> Result<PathBuf> {
    let expanded = shellexpand::full(path.to_string_lossy().as_ref())
        .map_err(ConfigError::ShellExpansion)?
        .into_owned();

    Ok(PathBuf::from(expanded))
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Name cannot be used as a file stem.
    #[error("{field} must be a plain file stem, got {value:?}")]
    InvalidName { field: &'static str, value: String },

    /// Host directory must be an absolute path.
    #[error("{field} must be an absolute path, got {:?}", path.display())]
    RelativeHostDir { field: &'static str, path: PathBuf },
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
