use std::path::PathBuf;

use crate::target::{Target, expand_home};

pub mod boundary;
pub mod consul;
pub mod nomad;
pub mod vault;

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Commands {
    /// Install or uninstall a Consul agent
    Consul {
        #[clap(subcommand)]
        command: consul::ConsulCommands,
    },

    /// Install or uninstall a Nomad agent
    Nomad {
        #[clap(subcommand)]
        command: nomad::NomadCommands,
    },

    /// Install or uninstall a Vault server
    Vault {
        #[clap(subcommand)]
        command: vault::VaultCommands,
    },

    /// Install or uninstall a Boundary controller or worker
    Boundary {
        #[clap(subcommand)]
        command: boundary::BoundaryCommands,
    },
}

/// Flags identifying where commands run, shared by every workflow subcommand.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Provision this machine instead of a remote host
    #[clap(long, num_args = 0)]
    pub local: bool,

    /// Remote host address, with an optional port
    #[clap(long)]
    pub ssh_target_addr: Option<String>,

    /// Username for the SSH connection
    #[clap(long)]
    pub ssh_target_user: Option<String>,

    /// Path to a private key for the SSH connection
    #[clap(long)]
    pub ssh_target_key: Option<String>,

    /// Prefix provisioning commands with sudo on the target
    #[clap(long, num_args = 0)]
    pub sudo: bool,
}

impl TargetArgs {
    /// Build the immutable target for this invocation.
    pub fn resolve(&self) -> Target {
        Target {
            local: self.local,
            addr: self.ssh_target_addr.clone().unwrap_or_default(),
            user: self
                .ssh_target_user
                .clone()
                .unwrap_or_else(whoami::username),
            key: self.ssh_target_key.as_deref().map(expand_home),
            sudo: self.sudo,
        }
    }
}

/// Install flags shared by all products.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct PackageArgs {
    /// Upload and use this package instead of downloading
    #[clap(short, long)]
    pub package: Option<String>,

    /// Version to install
    #[clap(short = 'v', long)]
    pub version: Option<String>,

    /// Custom configuration file to upload
    #[clap(short, long)]
    pub config_file: Option<String>,

    /// Additional files, e.g. certificates, to upload
    #[clap(short = 'f', long = "file")]
    pub files: Vec<String>,

    /// Do not enable or start the service after installation
    #[clap(long, num_args = 0)]
    pub skip_enable: bool,

    /// Do not start the service after installation
    #[clap(long, num_args = 0)]
    pub skip_start: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct UninstallArgs {
    #[clap(flatten)]
    pub target: TargetArgs,
}

/// What ends up uploaded as the product's configuration file: either a
/// user-supplied file or text generated from the config flags.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    File(PathBuf),
    Generated(String),
}
