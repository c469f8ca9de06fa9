use std::io::Read;
use std::net::TcpStream;
use std::path::Path;

use ssh2::{FileStat, OpenFlags, OpenType, Session, Sftp};
use tracing::{debug, info};

use super::{CommandOperator, OperatorError, parse_mode};
use crate::target::Target;

/// An authenticated SSH session to the target host. One session serves every
/// command and upload of a single workflow invocation; commands each open a
/// fresh logical channel over it, uploads go through a shared SFTP
/// subchannel. Dropping the operator closes both.
pub struct RemoteOperator {
    session: Session,
    sftp: Sftp,
}

impl RemoteOperator {
    /// Connect and authenticate against the target, preferring an explicit
    /// private key, then the SSH agent, then an interactive password prompt.
    pub fn connect(target: &Target) -> Result<RemoteOperator, OperatorError> {
        let addr = target.socket_addr();
        debug!("trying ssh: {}@{}", target.user, addr);

        let stream = TcpStream::connect(&addr).map_err(|source| OperatorError::Connection {
            addr: addr.clone(),
            source: Box::new(source),
        })?;

        let mut session = Session::new().map_err(|source| OperatorError::Connection {
            addr: addr.clone(),
            source: Box::new(source),
        })?;
        session.set_tcp_stream(stream);
        session
            .handshake()
            .map_err(|source| OperatorError::Connection {
                addr: addr.clone(),
                source: Box::new(source),
            })?;

        authenticate(&session, target, &addr)?;

        // Provisioning scripts can run for minutes without channel traffic
        session.set_keepalive(true, 30);

        let sftp = session.sftp().map_err(|source| OperatorError::Connection {
            addr: addr.clone(),
            source: Box::new(source),
        })?;

        info!("Established SSH connection to {}", addr);
        Ok(RemoteOperator { session, sftp })
    }
}

fn authenticate(session: &Session, target: &Target, addr: &str) -> Result<(), OperatorError> {
    if let Some(key) = &target.key {
        session
            .userauth_pubkey_file(&target.user, None, key, None)
            .map_err(|error| OperatorError::Authentication {
                user: target.user.clone(),
                addr: addr.to_string(),
                reason: error.to_string(),
            })?;
    } else if session.userauth_agent(&target.user).is_err() {
        let password = dialoguer::Password::new()
            .with_prompt(format!("{}@{}'s password", target.user, addr))
            .interact()
            .map_err(|error| OperatorError::Authentication {
                user: target.user.clone(),
                addr: addr.to_string(),
                reason: error.to_string(),
            })?;
        session
            .userauth_password(&target.user, &password)
            .map_err(|error| OperatorError::Authentication {
                user: target.user.clone(),
                addr: addr.to_string(),
                reason: error.to_string(),
            })?;
    }

    if !session.authenticated() {
        return Err(OperatorError::Authentication {
            user: target.user.clone(),
            addr: addr.to_string(),
            reason: "no authentication method succeeded".to_string(),
        });
    }
    Ok(())
}

impl CommandOperator for RemoteOperator {
    fn execute(&self, command: &str) -> Result<String, OperatorError> {
        debug!(command, "executing over ssh");

        let (status, output) =
            run_channel(&self.session, command).map_err(OperatorError::Channel)?;

        if status == 0 {
            Ok(output)
        } else {
            Err(OperatorError::Execution { status, output })
        }
    }

    fn upload(
        &self,
        source: &mut dyn Read,
        remote_path: &str,
        mode: &str,
    ) -> Result<(), OperatorError> {
        let mode = parse_mode(mode)?;
        debug!(remote_path, "uploading over sftp");

        write_remote(&self.sftp, source, remote_path, mode).map_err(|source| {
            OperatorError::Upload {
                path: remote_path.to_string(),
                source,
            }
        })
    }
}

impl Drop for RemoteOperator {
    fn drop(&mut self) {
        debug!("closing ssh session");
        let _ = self
            .session
            .disconnect(None, "provisioning finished", None);
    }
}

type ChannelError = Box<dyn std::error::Error + Send + Sync>;

/// Open a logical channel, run the command and collect combined output plus
/// the remote exit status.
fn run_channel(session: &Session, command: &str) -> Result<(i32, String), ChannelError> {
    let mut channel = session.channel_session()?;
    channel.exec(command)?;

    let mut output = String::new();
    channel.read_to_string(&mut output)?;
    channel.stderr().read_to_string(&mut output)?;

    channel.wait_close()?;
    Ok((channel.exit_status()?, output))
}

/// Stream the source to the destination and apply the permission bits through
/// the transfer protocol itself.
fn write_remote(
    sftp: &Sftp,
    source: &mut dyn Read,
    path: &str,
    mode: u32,
) -> Result<(), ChannelError> {
    let mut remote = sftp.open_mode(
        Path::new(path),
        OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
        mode as i32,
        OpenType::File,
    )?;
    std::io::copy(source, &mut remote)?;
    drop(remote);

    // open_mode only applies the mode to newly created files
    sftp.setstat(
        Path::new(path),
        FileStat {
            size: None,
            uid: None,
            gid: None,
            perm: Some(mode),
            atime: None,
            mtime: None,
        },
    )?;
    Ok(())
}
