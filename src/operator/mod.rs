//! The command operator abstraction: a uniform contract for running shell
//! commands and transferring files, whether the target is this machine or a
//! remote host over SSH.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::Result;
use tracing::warn;

use crate::target::Target;

pub mod local;
pub mod remote;

pub use local::LocalOperator;
pub use remote::RemoteOperator;

/// Operator failures, grouped by the phase that produced them. No variant is
/// ever retried internally; a single attempt is made per call.
#[derive(Debug, thiserror::Error)]
pub enum OperatorError {
    /// Bad or missing input, detected before any session opens.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// No authentication method succeeded for the remote target.
    #[error("ssh authentication failed for {user}@{addr}: {reason}")]
    Authentication {
        user: String,
        addr: String,
        reason: String,
    },

    /// The network-level session could not be established.
    #[error("unable to connect to {addr}")]
    Connection {
        addr: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A file could not be written to the target, or its permission bits
    /// could not be set.
    #[error("upload to {path} failed")]
    Upload {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The local source of an upload does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited non-zero. Combined stdout and stderr is
    /// preserved for diagnostics.
    #[error("command exited with status {status}: {output}")]
    Execution { status: i32, output: String },

    /// The command could not be run at all because the channel failed.
    #[error("command channel failed")]
    Channel(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Uniform command-execution and file-transfer contract shared by the local
/// and remote implementations. Workflows are written once against this trait.
pub trait CommandOperator {
    /// Run a shell command on the target, returning combined stdout+stderr.
    /// On a non-zero exit the output travels inside the error instead.
    fn execute(&self, command: &str) -> Result<String, OperatorError>;

    /// Stream `source` to `remote_path` on the target, then apply the octal
    /// permission `mode` (e.g. "0640"). The payload is never buffered whole.
    fn upload(
        &self,
        source: &mut dyn Read,
        remote_path: &str,
        mode: &str,
    ) -> Result<(), OperatorError>;

    /// Open a local file and upload it. Fails before any channel activity
    /// when the file is missing or unreadable.
    fn upload_file(
        &self,
        local_path: &Path,
        remote_path: &str,
        mode: &str,
    ) -> Result<(), OperatorError> {
        let mut file = File::open(local_path).map_err(|source| OperatorError::FileNotFound {
            path: local_path.display().to_string(),
            source,
        })?;
        self.upload(&mut file, remote_path, mode)
    }
}

/// Resolve the target into exactly one operator implementation and run the
/// workflow callback against it. A remote session is torn down when the
/// callback returns, on every exit path.
pub fn with_operator<F>(target: &Target, callback: F) -> Result<()>
where
    F: FnOnce(&dyn CommandOperator) -> Result<()>,
{
    target.validate()?;

    if target.local {
        callback(&LocalOperator)
    } else {
        let operator = RemoteOperator::connect(target)?;
        callback(&operator)
    }
}

/// A uniquely-named temporary directory on the target holding uploaded
/// artifacts for one workflow invocation. Removal is forced and recursive,
/// scheduled at construction so it runs on every exit path.
pub struct Workspace<'a> {
    operator: &'a dyn CommandOperator,
    path: String,
}

impl<'a> Workspace<'a> {
    /// Create `/tmp/<name>.<suffix>/config` on the target. The removal guard
    /// exists before `mkdir` runs, so even a failed creation is followed by
    /// the harmless best-effort cleanup.
    pub fn create(
        operator: &'a dyn CommandOperator,
        name: &str,
    ) -> Result<Workspace<'a>, OperatorError> {
        let workspace = Workspace {
            operator,
            path: format!("/tmp/{}.{}", name, crate::random_suffix(6)),
        };
        workspace
            .operator
            .execute(&format!("mkdir -p {}/config", workspace.path))?;
        Ok(workspace)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path of a file inside the workspace.
    pub fn file(&self, name: &str) -> String {
        format!("{}/{}", self.path, name)
    }
}

impl Drop for Workspace<'_> {
    fn drop(&mut self) {
        if let Err(error) = self.operator.execute(&format!("rm -rf {}", self.path)) {
            warn!(%error, path = %self.path, "failed to remove workspace");
        }
    }
}

/// Single-quote a value for safe inclusion in a shell command line.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Parse an octal mode string like "0755" into permission bits.
pub(crate) fn parse_mode(mode: &str) -> Result<u32, OperatorError> {
    u32::from_str_radix(mode, 8)
        .map_err(|_| OperatorError::Configuration(format!("invalid file mode: {mode}")))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;

    /// Every call a workflow makes, in order.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Execute(String),
        Upload {
            remote_path: String,
            mode: String,
            contents: String,
        },
    }

    /// Records operator calls so workflow sequences can be asserted without
    /// touching a real target.
    #[derive(Default)]
    pub struct RecordingOperator {
        pub calls: RefCell<Vec<Call>>,
        /// Commands containing this substring fail with an execution error.
        pub fail_on: Option<&'static str>,
    }

    impl RecordingOperator {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        pub fn executed(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .filter_map(|call| match call {
                    Call::Execute(command) => Some(command.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl CommandOperator for RecordingOperator {
        fn execute(&self, command: &str) -> Result<String, OperatorError> {
            self.calls
                .borrow_mut()
                .push(Call::Execute(command.to_string()));
            match self.fail_on {
                Some(needle) if command.contains(needle) => Err(OperatorError::Execution {
                    status: 1,
                    output: String::new(),
                }),
                _ => Ok(String::new()),
            }
        }

        fn upload(
            &self,
            source: &mut dyn Read,
            remote_path: &str,
            mode: &str,
        ) -> Result<(), OperatorError> {
            let mut contents = String::new();
            source
                .read_to_string(&mut contents)
                .map_err(|source| OperatorError::Upload {
                    path: remote_path.to_string(),
                    source: Box::new(source),
                })?;
            self.calls.borrow_mut().push(Call::Upload {
                remote_path: remote_path.to_string(),
                mode: mode.to_string(),
                contents,
            });
            Ok(())
        }
    }
}
