// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Host service manager control.
//!
//! systemd and nginx are treated as black boxes driven through their usual
//! control commands. [`HostControl`] is the seam between the deployment
//! pipeline and the host, [`SystemHost`] is the implementation that actually
//! shells out.

use crate::config::ToolSettings;

use std::{ffi::OsStr, process::Command};
use tracing::{debug, instrument};

/// Control over the host's privilege level and service managers.
pub trait HostControl {
    /// Whether the current process runs as the superuser.
    fn is_privileged(&self) -> bool;

    /// Make the service manager reread its unit files.
    fn reload_units(&self) -> Result<()>;

    /// Enable unit at boot, then (re)start it right away.
    fn enable_and_restart(&self, unit: &str) -> Result<()>;

    /// Validate the full web server configuration, all enabled sites included.
    ///
    /// Returns the tool's diagnostic output on success.
    fn test_web_config(&self) -> Result<String>;

    /// Gracefully reload the web server's configuration.
    fn reload_web_server(&self) -> Result<()>;
}

/// Host control through `systemctl` and `nginx`.
#[derive(Debug, Clone)]
pub struct SystemHost {
    tools: ToolSettings,
}

impl SystemHost {
    pub fn new(tools: ToolSettings) -> Self {
        Self { tools }
    }

    fn systemctl(&self, args: &[&str]) -> Result<String> {
        syscall_non_interactive(&self.tools.systemctl, args)
    }
}

impl HostControl for SystemHost {
    fn is_privileged(&self) -> bool {
        unsafe { libc::geteuid() == 0 }
    }

    #[instrument(skip(self), level = "debug")]
    fn reload_units(&self) -> Result<()> {
        self.systemctl(&["daemon-reload"])?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn enable_and_restart(&self, unit: &str) -> Result<()> {
        self.systemctl(&["enable", unit])?;
        self.systemctl(&["restart", unit])?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn test_web_config(&self) -> Result<String> {
        syscall_non_interactive(&self.tools.nginx, ["-t"])
    }

    #[instrument(skip(self), level = "debug")]
    fn reload_web_server(&self) -> Result<()> {
        self.systemctl(&["reload", self.tools.nginx_unit.as_str()])?;
        Ok(())
    }
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<String> {
    let mut command = Command::new(cmd.as_ref());
    command.args(args);
    let display = command_display(&command);
    let shown = &display;
    debug!("running {shown}");

    let output = command.output().map_err(|err| Error::Spawn {
        source: err,
        command: display.clone(),
    })?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(format!("stdout: {stdout}").as_str());
    }

    if !stderr.is_empty() {
        message.push_str(format!("stderr: {stderr}").as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    let message = message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message);

    if !output.status.success() {
        return Err(Error::Failed {
            command: display,
            code: output.status.code(),
            message,
        });
    }

    Ok(message)
}

fn command_display(command: &Command) -> String {
    let mut display = command.get_program().to_string_lossy().into_owned();
    for arg in command.get_args() {
        display.push(' ');
        display.push_str(&arg.to_string_lossy());
    }

    display
}

/// Host control error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Command could not be started at all.
    #[error("failed to run {command:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        command: String,
    },

    /// Command ran but reported failure.
    #[error("command {command:?} failed ({}):\n{message}", exit_label(code))]
    Failed {
        command: String,
        code: Option<i32>,
        message: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".into(),
    }
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::{
        fs,
        os::unix::fs::PermissionsExt,
        path::{Path, PathBuf},
    };

    // Stand-in binary that appends its arguments to `calls.log`.
    fn stub_tool(name: &str, body: &str) -> anyhow::Result<PathBuf> {
        let dir = std::env::current_dir()?;
        let path = dir.join(name);
        let log = dir.join("calls.log");
        fs::write(
            &path,
            format!(
                "#!/bin/sh\necho \"{name} $*\" >> '{}'\n{body}\n",
                log.display()
            ),
        )?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;

        Ok(path)
    }

    fn calls() -> anyhow::Result<Vec<String>> {
        Ok(fs::read_to_string("calls.log")?
            .lines()
            .map(str::to_owned)
            .collect())
    }

    fn host(systemctl: &Path, nginx: &Path) -> SystemHost {
        SystemHost::new(ToolSettings {
            systemctl: systemctl.to_path_buf(),
            nginx: nginx.to_path_buf(),
            nginx_unit: "nginx".into(),
        })
    }

    #[sealed_test]
    fn system_host_drives_systemctl() -> anyhow::Result<()> {
        let systemctl = stub_tool("systemctl", "exit 0")?;
        let nginx = stub_tool("nginx", "exit 0")?;
        let host = host(&systemctl, &nginx);

        host.reload_units()?;
        host.enable_and_restart("vehiculos.service")?;
        host.reload_web_server()?;

        assert_eq!(
            calls()?,
            vec![
                "systemctl daemon-reload",
                "systemctl enable vehiculos.service",
                "systemctl restart vehiculos.service",
                "systemctl reload nginx",
            ]
        );

        Ok(())
    }

    #[sealed_test]
    fn system_host_reports_config_test_output() -> anyhow::Result<()> {
        let systemctl = stub_tool("systemctl", "exit 0")?;
        let nginx = stub_tool("nginx", "echo 'syntax is ok' >&2\nexit 0")?;

        let output = host(&systemctl, &nginx).test_web_config()?;
        assert_eq!(output, "stderr: syntax is ok");
        assert_eq!(calls()?, vec!["nginx -t"]);

        Ok(())
    }

    #[sealed_test]
    fn system_host_config_test_failure() -> anyhow::Result<()> {
        let systemctl = stub_tool("systemctl", "exit 0")?;
        let nginx = stub_tool("nginx", "echo 'unexpected \"}\"' >&2\nexit 1")?;

        let result = host(&systemctl, &nginx).test_web_config();
        match result {
            Err(Error::Failed { code, message, .. }) => {
                assert_eq!(code, Some(1));
                assert_eq!(message, "stderr: unexpected \"}\"");
            }
            other => panic!("expected config test failure, got {other:?}"),
        }

        Ok(())
    }

    #[sealed_test]
    fn system_host_stops_on_enable_failure() -> anyhow::Result<()> {
        let systemctl = stub_tool("systemctl", "[ \"$1\" = enable ] && exit 3\nexit 0")?;
        let nginx = stub_tool("nginx", "exit 0")?;

        let result = host(&systemctl, &nginx).enable_and_restart("vehiculos.service");
        assert!(matches!(result, Err(Error::Failed { code: Some(3), .. })));
        assert_eq!(calls()?, vec!["systemctl enable vehiculos.service"]);

        Ok(())
    }

    #[sealed_test]
    fn system_host_missing_binary() {
        let host = host(Path::new("./no-such-systemctl"), Path::new("./no-such-nginx"));
        let result = host.reload_units();
        assert!(matches!(result, Err(Error::Spawn { .. })));
    }
}
