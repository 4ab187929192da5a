// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Deploy one web application onto the local host.
//!
//! Sitedeploy installs a project's systemd service unit and nginx site
//! config into the host's service manager directories, then has systemd and
//! nginx pick up the new configuration.
//!
//! The work is a fixed pipeline of named steps, see [`deploy`]. Paths come
//! from a [`DeployDefinition`], see [`config`] and [`path`].

pub mod config;
pub mod deploy;
pub mod path;

pub use config::DeployDefinition;
pub use deploy::{DeployError, DeployReport, Deployer, Step};
pub use path::SitePaths;
