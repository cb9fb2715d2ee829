//! Starts a browser for an agent profile with remote debugging enabled

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::config::{AgentProfile, LaunchSettings};
use crate::{Error, Result};

pub struct BrowserLauncher {
    binary: String,
    user_data_dir: PathBuf,
}

impl BrowserLauncher {
    /// Profiles live under `settings.user_data_dir`, resolved against `cwd`
    pub fn new(settings: &LaunchSettings, cwd: &Path) -> Self {
        Self {
            binary: settings.binary.clone(),
            user_data_dir: cwd.join(&settings.user_data_dir),
        }
    }

    pub fn from_current_dir(settings: &LaunchSettings) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Ok(Self::new(settings, &cwd))
    }

    pub fn args(&self, profile: &AgentProfile) -> Vec<String> {
        vec![
            format!("--remote-debugging-port={}", profile.port),
            format!("--user-data-dir={}", self.user_data_dir.display()),
            format!("--profile-directory={}", profile.profile),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--new-window".to_string(),
        ]
    }

    /// Spawn the browser. Its output is inherited, and the process keeps
    /// running after the agent exits.
    pub fn launch(&self, profile: &AgentProfile) -> Result<Child> {
        info!(binary = %self.binary, profile = %profile.profile, port = profile.port, "Launching browser");

        let mut child = Command::new(&self.binary)
            .args(self.args(profile))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(false)
            .spawn()
            .map_err(|e| Error::Config(format!("Could not start {}: {}", self.binary, e)))?;

        if let Ok(Some(status)) = child.try_wait() {
            warn!(%status, "Browser exited immediately");
        }
        Ok(child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_for_profile() {
        let settings = LaunchSettings::default();
        let launcher = BrowserLauncher::new(&settings, Path::new("/work"));
        let profile = AgentProfile {
            id: "Smith".to_string(),
            profile: "Profile Smith".to_string(),
            port: 9223,
            directive: String::new(),
            invested: 100.0,
        };

        assert_eq!(
            launcher.args(&profile),
            vec![
                "--remote-debugging-port=9223",
                "--user-data-dir=/work/chrome-profile-data",
                "--profile-directory=Profile Smith",
                "--no-first-run",
                "--no-default-browser-check",
                "--new-window",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_config_error() {
        let settings = LaunchSettings {
            binary: "/nonexistent/browser-binary".to_string(),
            ..Default::default()
        };
        let launcher = BrowserLauncher::new(&settings, Path::new("/tmp"));
        let profile = AgentProfile {
            id: "Scully".to_string(),
            profile: "Profile Scully".to_string(),
            port: 9224,
            directive: String::new(),
            invested: 100.0,
        };

        assert!(matches!(launcher.launch(&profile), Err(Error::Config(_))));
    }
}
