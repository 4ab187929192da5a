// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Deployment pipeline.
//!
//! A deployment installs one systemd service unit and one nginx site for a
//! project, then has both service managers pick up the new configuration.
//!
//! # Pipeline
//!
//! Deployment first runs its preconditions, in order, stopping at the first
//! failure:
//!
//! 1. Service unit source must be a regular file.
//! 2. Site config source must be a regular file.
//! 3. Environment file should exist. A missing one only produces a warning,
//!    because the service falls back to its defaults without it.
//! 4. Process must run as the superuser.
//!
//! Nothing on the host is touched until every precondition passes. After that
//! the [`Step`]s run in their fixed order, and the first failing step aborts
//! the whole run. Nothing is rolled back, so a failure late in the pipeline
//! leaves earlier steps applied. Notably, a broken site config is copied into
//! place but nginx is never reloaded with it.
//!
//! # Site Activation
//!
//! Sites follow the nginx available/enabled convention. The config is always
//! copied into `sites-available`, but the link in `sites-enabled` is only
//! created when nothing occupies that path yet. An existing link or file is
//! left exactly as it is, even if it points somewhere else.

pub mod host;
pub mod install;

use crate::{
    config::DeployDefinition,
    deploy::{
        host::{HostControl, SystemHost},
        install::LinkOutcome,
    },
    path::SitePaths,
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};
use tracing::{debug, info, instrument, warn};

/// Named deployment step, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    InstallUnit,
    ReloadUnits,
    StartService,
    InstallSite,
    EnableSite,
    TestSiteConfig,
    ReloadWebServer,
}

impl Step {
    /// Every step in the order the pipeline runs them.
    pub const ALL: [Step; 7] = [
        Step::InstallUnit,
        Step::ReloadUnits,
        Step::StartService,
        Step::InstallSite,
        Step::EnableSite,
        Step::TestSiteConfig,
        Step::ReloadWebServer,
    ];

    /// Short human-readable description.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::InstallUnit => "install service unit",
            Self::ReloadUnits => "reload systemd units",
            Self::StartService => "enable and restart service",
            Self::InstallSite => "install nginx site config",
            Self::EnableSite => "enable nginx site",
            Self::TestSiteConfig => "test nginx configuration",
            Self::ReloadWebServer => "reload nginx",
        }
    }
}

impl Display for Step {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.describe())
    }
}

/// Artifact the deployment cannot run without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    ServiceUnit,
    SiteConfig,
}

impl Display for Artifact {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::ServiceUnit => fmt.write_str("service unit"),
            Self::SiteConfig => fmt.write_str("nginx site config"),
        }
    }
}

/// Result of a passing precondition check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preflight {
    pub env_file_present: bool,
    pub privileged: bool,
}

/// Result of a successful deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployReport {
    pub env_file_present: bool,
    pub site_link: LinkOutcome,
}

/// Deploys one service and one site onto the local host.
#[derive(Debug)]
pub struct Deployer<H = SystemHost>
where
    H: HostControl,
{
    paths: SitePaths,
    unit: String,
    host: H,
}

impl Deployer<SystemHost> {
    /// Construct deployer that drives the real host.
    pub fn system(definition: &DeployDefinition) -> Self {
        Self::new(definition, SystemHost::new(definition.tools.clone()))
    }
}

impl<H> Deployer<H>
where
    H: HostControl,
{
    /// Construct new deployer.
    pub fn new(definition: &DeployDefinition, host: H) -> Self {
        Self {
            paths: SitePaths::resolve(definition),
            unit: format!("{}.service", definition.project.service),
            host,
        }
    }

    /// Resolved deployment paths.
    pub fn paths(&self) -> &SitePaths {
        &self.paths
    }

    /// Host this deployer drives.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Inspect every precondition without touching the host.
    ///
    /// Unlike [`Deployer::preflight`], lacking privilege is reported rather
    /// than treated as a failure.
    ///
    /// # Errors
    ///
    /// - Return [`DeployError::MissingArtifact`] if the service unit or site
    ///   config source is not a regular file.
    #[instrument(skip(self), level = "debug")]
    pub fn check(&self) -> Result<Preflight> {
        for (artifact, path) in [
            (Artifact::ServiceUnit, &self.paths.service_source),
            (Artifact::SiteConfig, &self.paths.site_source),
        ] {
            if !install::is_regular_file(path) {
                return Err(DeployError::MissingArtifact {
                    artifact,
                    path: path.clone(),
                });
            }
            debug!("found {artifact} at {:?}", path.display());
        }

        let env_file_present = install::is_regular_file(&self.paths.env_file);
        if !env_file_present {
            warn!(
                "no environment file at {:?}, service will run on its defaults",
                self.paths.env_file.display()
            );
        }

        Ok(Preflight {
            env_file_present,
            privileged: self.host.is_privileged(),
        })
    }

    /// Run every precondition without touching the host.
    ///
    /// # Errors
    ///
    /// - Return any error of [`Deployer::check`].
    /// - Return [`DeployError::NotPrivileged`] if not running as superuser.
    pub fn preflight(&self) -> Result<Preflight> {
        let preflight = self.check()?;
        if !preflight.privileged {
            return Err(DeployError::NotPrivileged);
        }

        Ok(preflight)
    }

    /// Run the full deployment.
    ///
    /// # Errors
    ///
    /// - Return any error of [`Deployer::preflight`].
    /// - Return [`DeployError::Step`] naming the first step that failed.
    #[instrument(skip(self), fields(unit = %self.unit), level = "debug")]
    pub fn deploy(&self) -> Result<DeployReport> {
        let preflight = self.preflight()?;
        let paths = &self.paths;

        self.run_step(Step::InstallUnit, || {
            Ok(install::install_file(&paths.service_source, &paths.service_dest)?)
        })?;
        self.run_step(Step::ReloadUnits, || Ok(self.host.reload_units()?))?;
        self.run_step(Step::StartService, || {
            Ok(self.host.enable_and_restart(&self.unit)?)
        })?;

        self.run_step(Step::InstallSite, || {
            Ok(install::install_file(&paths.site_source, &paths.site_available)?)
        })?;
        let site_link = self.run_step(Step::EnableSite, || {
            Ok(install::link_if_absent(&paths.site_available, &paths.site_enabled)?)
        })?;
        if site_link == LinkOutcome::Kept {
            info!(
                "{:?} already exists, leaving it untouched",
                paths.site_enabled.display()
            );
        }

        let output = self.run_step(Step::TestSiteConfig, || Ok(self.host.test_web_config()?))?;
        if !output.is_empty() {
            debug!("{output}");
        }
        self.run_step(Step::ReloadWebServer, || Ok(self.host.reload_web_server()?))?;

        info!("deployed {} and nginx site {:?}", self.unit, paths.site_available.display());

        Ok(DeployReport {
            env_file_present: preflight.env_file_present,
            site_link,
        })
    }

    fn run_step<T, F>(&self, step: Step, action: F) -> Result<T>
    where
        F: FnOnce() -> Result<T, StepError>,
    {
        info!("{step}");
        action().map_err(|source| DeployError::Step { step, source })
    }
}

/// Failure inside a single deployment step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Install(#[from] install::Error),

    #[error(transparent)]
    Host(#[from] host::Error),
}

/// Deployment error types.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Required source artifact has not been built or placed yet.
    #[error("{artifact} not found at {:?}", path.display())]
    MissingArtifact { artifact: Artifact, path: PathBuf },

    /// Process lacks the privilege to write system directories and control
    /// system services.
    #[error("deployment must run as root, re-run with sudo")]
    NotPrivileged,

    /// Step of the pipeline failed.
    #[error("failed to {step}")]
    Step {
        step: Step,
        #[source]
        source: StepError,
    },
}

impl DeployError {
    /// Step that failed, if the pipeline got past its preconditions.
    pub fn failed_step(&self) -> Option<Step> {
        match self {
            Self::Step { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = DeployError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use simple_test_case::test_case;

    struct Unprivileged;

    impl HostControl for Unprivileged {
        fn is_privileged(&self) -> bool {
            false
        }

        fn reload_units(&self) -> host::Result<()> {
            unreachable!("host must not be touched without privilege")
        }

        fn enable_and_restart(&self, _unit: &str) -> host::Result<()> {
            unreachable!("host must not be touched without privilege")
        }

        fn test_web_config(&self) -> host::Result<String> {
            unreachable!("host must not be touched without privilege")
        }

        fn reload_web_server(&self) -> host::Result<()> {
            unreachable!("host must not be touched without privilege")
        }
    }

    #[test_case(Step::InstallUnit, "failed to install service unit"; "install unit")]
    #[test_case(Step::TestSiteConfig, "failed to test nginx configuration"; "config test")]
    #[test_case(Step::ReloadWebServer, "failed to reload nginx"; "reload")]
    #[test]
    fn step_error_names_step(step: Step, expect: &str) {
        use pretty_assertions::assert_eq;

        let error = DeployError::Step {
            step,
            source: StepError::Host(host::Error::Failed {
                command: "nginx -t".into(),
                code: Some(1),
                message: String::new(),
            }),
        };

        assert_eq!(error.to_string(), expect);
        assert_eq!(error.failed_step(), Some(step));
    }

    #[test]
    fn steps_run_units_before_site() {
        let service = Step::ALL.iter().position(|step| *step == Step::StartService);
        let site = Step::ALL.iter().position(|step| *step == Step::InstallSite);
        assert!(service.is_some() && service < site);
        assert_eq!(Step::ALL.last(), Some(&Step::ReloadWebServer));
    }

    #[sealed_test]
    fn check_reports_missing_privilege() -> anyhow::Result<()> {
        let mut definition = DeployDefinition::default();
        definition.project.dir = crate::config::ProjectDir::new(std::env::current_dir()?);
        let deployer = Deployer::new(&definition, Unprivileged);
        std::fs::create_dir_all(deployer.paths().service_source.parent().unwrap())?;
        std::fs::create_dir_all(deployer.paths().site_source.parent().unwrap())?;
        std::fs::write(&deployer.paths().service_source, "[Service]\n")?;
        std::fs::write(&deployer.paths().site_source, "server {}\n")?;

        let result = deployer.check()?;
        assert_eq!(
            result,
            Preflight {
                env_file_present: false,
                privileged: false,
            }
        );
        assert!(matches!(deployer.preflight(), Err(DeployError::NotPrivileged)));

        Ok(())
    }

    #[test]
    fn missing_sources_reported_before_privilege() {
        let mut definition = DeployDefinition::default();
        definition.project.dir = crate::config::ProjectDir::new("/nonexistent/sitedeploy-project");

        let deployer = Deployer::new(&definition, Unprivileged);
        let result = deployer.deploy();
        match result {
            Err(DeployError::MissingArtifact { artifact, path }) => {
                assert_eq!(artifact, Artifact::ServiceUnit);
                assert_eq!(path, deployer.paths().service_source);
            }
            other => panic!("expected missing service unit, got {other:?}"),
        }
    }
}
