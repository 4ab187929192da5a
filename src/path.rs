// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine every path the deployment reads from, or writes to. Paths are
//! computed once from a [`DeployDefinition`], and nothing here checks whether
//! they actually exist.
//!
//! # Layout
//!
//! | Path | Location |
//! |---|---|
//! | service unit source | `<project>/deploy/systemd/<service>.service` |
//! | service unit destination | `<unit_dir>/<service>.service` |
//! | site config source | `<project>/deploy/nginx/<site>.conf` |
//! | site config available | `<sites_available>/<site>.conf` |
//! | site config enabled | `<sites_enabled>/<site>.conf` |
//! | environment file | `<project>/.env` |

use crate::config::DeployDefinition;

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};

/// Resolved deployment paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitePaths {
    pub project_dir: PathBuf,
    pub service_source: PathBuf,
    pub service_dest: PathBuf,
    pub site_source: PathBuf,
    pub site_available: PathBuf,
    pub site_enabled: PathBuf,
    pub env_file: PathBuf,
}

impl SitePaths {
    /// Resolve all deployment paths from a deployment definition.
    pub fn resolve(definition: &DeployDefinition) -> Self {
        let project_dir = definition.project.dir.as_path().to_path_buf();
        let unit_file = format!("{}.service", definition.project.service);
        let site_file = format!("{}.conf", definition.project.site);
        let deploy_dir = project_dir.join("deploy");

        Self {
            service_source: deploy_dir.join("systemd").join(&unit_file),
            service_dest: definition.host.unit_dir.join(&unit_file),
            site_source: deploy_dir.join("nginx").join(&site_file),
            site_available: definition.host.sites_available.join(&site_file),
            site_enabled: definition.host.sites_enabled.join(&site_file),
            env_file: project_dir.join(".env"),
            project_dir,
        }
    }
}

impl Display for SitePaths {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        writeln!(fmt, "project:        {}", self.project_dir.display())?;
        writeln!(fmt, "unit source:    {}", self.service_source.display())?;
        writeln!(fmt, "unit installed: {}", self.service_dest.display())?;
        writeln!(fmt, "site source:    {}", self.site_source.display())?;
        writeln!(fmt, "site available: {}", self.site_available.display())?;
        writeln!(fmt, "site enabled:   {}", self.site_enabled.display())?;
        write!(fmt, "env file:       {}", self.env_file.display())
    }
}
