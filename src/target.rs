use std::path::PathBuf;

use crate::operator::OperatorError;

/// Where commands execute: the local machine, or a remote host reached over
/// an authenticated SSH session. Built once per invocation from CLI flags and
/// immutable afterwards.
#[derive(Clone, Debug)]
pub struct Target {
    pub local: bool,
    pub addr: String,
    pub user: String,
    pub key: Option<PathBuf>,
    pub sudo: bool,
}

impl Target {
    /// Validate the flag combination before any session is opened.
    pub fn validate(&self) -> Result<(), OperatorError> {
        if !self.local && self.addr.is_empty() {
            return Err(OperatorError::Configuration(
                "required ssh-target-addr flag is missing".to_string(),
            ));
        }
        Ok(())
    }

    /// Remote socket address, with the default SSH port appended when the
    /// flag value did not carry one.
    pub fn socket_addr(&self) -> String {
        if self.addr.contains(':') {
            self.addr.clone()
        } else {
            format!("{}:22", self.addr)
        }
    }

    /// Privilege escalation prefix for provisioning commands. The choice is
    /// made here, never inside an operator.
    pub fn sudo_prefix(&self) -> &'static str {
        if self.sudo { "sudo " } else { "" }
    }
}

/// Expand a leading `~` in a user-supplied path against $HOME.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}
