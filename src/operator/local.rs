use std::fs;
use std::io::{self, Read};
use std::os::unix::fs::PermissionsExt;
use std::process::Command;

use tracing::debug;

use super::{CommandOperator, OperatorError, parse_mode};

/// Runs commands through the local shell and copies uploads directly on the
/// local filesystem. No network is involved; failures are plain OS errors.
pub struct LocalOperator;

impl CommandOperator for LocalOperator {
    fn execute(&self, command: &str) -> Result<String, OperatorError> {
        debug!(command, "executing on local shell");

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .map_err(|error| OperatorError::Channel(Box::new(error)))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(combined)
        } else {
            Err(OperatorError::Execution {
                status: output.status.code().unwrap_or(-1),
                output: combined,
            })
        }
    }

    fn upload(
        &self,
        source: &mut dyn Read,
        remote_path: &str,
        mode: &str,
    ) -> Result<(), OperatorError> {
        let mode = parse_mode(mode)?;
        debug!(remote_path, "copying on local filesystem");

        copy_stream(source, remote_path, mode).map_err(|source| OperatorError::Upload {
            path: remote_path.to_string(),
            source: Box::new(source),
        })
    }
}

fn copy_stream(source: &mut dyn Read, path: &str, mode: u32) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    io::copy(source, &mut file)?;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_execute_combined_output() {
        let output = LocalOperator.execute("echo out; echo err >&2").unwrap();

        assert!(output.contains("out"));
        assert!(output.contains("err"));
    }

    #[test]
    fn test_execute_failure_keeps_output() {
        let result = LocalOperator.execute("echo ran; exit 1");

        match result {
            Err(OperatorError::Execution { status, output }) => {
                assert_eq!(status, 1);
                assert!(output.contains("ran"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_upload_sets_mode() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("install.sh");

        LocalOperator
            .upload(
                &mut "#!/bin/sh\n".as_bytes(),
                dest.to_str().unwrap(),
                "0755",
            )
            .unwrap();

        let metadata = fs::metadata(&dest).unwrap();
        assert_eq!(metadata.permissions().mode() & 0o777, 0o755);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "#!/bin/sh\n");
    }

    #[test]
    fn test_upload_file_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("consul.hcl");

        let result = LocalOperator.upload_file(
            Path::new("/nonexistent/consul.hcl"),
            dest.to_str().unwrap(),
            "0640",
        );

        assert!(matches!(result, Err(OperatorError::FileNotFound { .. })));
        assert!(!dest.exists());
    }

    #[test]
    fn test_upload_unwritable_destination() {
        let result = LocalOperator.upload(
            &mut "data".as_bytes(),
            "/nonexistent-dir/consul.hcl",
            "0640",
        );

        assert!(matches!(result, Err(OperatorError::Upload { .. })));
    }
}
