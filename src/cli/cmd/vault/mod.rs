use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{error, info};

use super::{ConfigSource, PackageArgs, TargetArgs, UninstallArgs};
use crate::config::VaultConfig;
use crate::operator::{self, CommandOperator, Workspace, quote};
use crate::release;
use crate::target::{Target, expand_home};

const INSTALL_SCRIPT: &str = include_str!("install.sh");
const UNINSTALL_SCRIPT: &str = include_str!("uninstall.sh");

#[derive(clap::Subcommand, Debug, Clone)]
pub enum VaultCommands {
    /// Install Vault on the target host
    Install(InstallArgs),

    /// Remove Vault from the target host
    Uninstall(UninstallArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct InstallArgs {
    #[clap(flatten)]
    pub target: TargetArgs,

    #[clap(flatten)]
    pub package: PackageArgs,

    /// Full URL at which clients reach this server
    #[clap(long)]
    pub api_addr: Option<String>,

    /// Full URL at which other cluster members reach this server
    #[clap(long)]
    pub cluster_addr: Option<String>,

    /// Address the TCP listener binds to
    #[clap(long, default_value = "0.0.0.0:8200")]
    pub address: String,

    /// Server certificate for TLS on the listener
    #[clap(long)]
    pub cert_file: Option<String>,

    /// Server key for TLS on the listener
    #[clap(long)]
    pub key_file: Option<String>,

    /// Path of the integrated file storage backend
    #[clap(long, default_value = "/opt/vault")]
    pub storage_path: String,

    /// Consul agent address; switches storage to the Consul backend
    #[clap(long)]
    pub consul_addr: Option<String>,

    /// Key-value prefix in Consul where Vault data is stored
    #[clap(long, default_value = "vault/")]
    pub consul_path: String,
}

impl InstallArgs {
    fn config(&self) -> VaultConfig {
        VaultConfig {
            api_addr: self.api_addr.clone().unwrap_or_default(),
            cluster_addr: self.cluster_addr.clone().unwrap_or_default(),
            address: self.address.clone(),
            cert_file: self.cert_file.clone().unwrap_or_default(),
            key_file: self.key_file.clone().unwrap_or_default(),
            storage_path: self.storage_path.clone(),
            consul_addr: self.consul_addr.clone().unwrap_or_default(),
            consul_path: self.consul_path.clone(),
        }
    }
}

pub fn run(cmd: VaultCommands) -> ExitCode {
    let result = match cmd {
        VaultCommands::Install(args) => install(&args),
        VaultCommands::Uninstall(args) => uninstall(&args),
    };

    match result {
        Err(error) => {
            error!(error = ?error, "Provisioning Vault failed");
            ExitCode::FAILURE
        }
        _ => ExitCode::SUCCESS,
    }
}

struct InstallPlan {
    version: String,
    package: Option<PathBuf>,
    config: ConfigSource,
    extra_files: Vec<PathBuf>,
    skip_enable: bool,
    skip_start: bool,
}

impl InstallPlan {
    fn new(args: &InstallArgs) -> Result<InstallPlan> {
        let version = match (&args.package.package, &args.package.version) {
            (None, None) => release::latest_version("vault").context(
                "unable to get latest version number, define a version manually with the --version flag",
            )?,
            (_, version) => version.clone().unwrap_or_default(),
        };

        let config = match &args.package.config_file {
            Some(path) => ConfigSource::File(expand_home(path)),
            None => ConfigSource::Generated(args.config().generate()),
        };

        Ok(InstallPlan {
            version,
            package: args.package.package.as_deref().map(expand_home),
            config,
            extra_files: args.package.files.iter().map(|f| expand_home(f)).collect(),
            skip_enable: args.package.skip_enable,
            skip_start: args.package.skip_start,
        })
    }
}

fn install(args: &InstallArgs) -> Result<()> {
    let target = args.target.resolve();
    let plan = InstallPlan::new(args)?;

    operator::with_operator(&target, |op| install_vault(op, &target, &plan))
}

fn install_vault(op: &dyn CommandOperator, target: &Target, plan: &InstallPlan) -> Result<()> {
    let workspace = Workspace::create(op, "vault-installation")
        .context("failed to create installation workspace")?;

    if let Some(package) = &plan.package {
        info!("Uploading Vault package...");
        op.upload_file(package, &workspace.file("vault.zip"), "0640")
            .context("failed to upload Vault package")?;
    }

    match &plan.config {
        ConfigSource::File(path) => {
            info!("Uploading {} as vault.hcl...", path.display());
            op.upload_file(path, &workspace.file("config/vault.hcl"), "0640")
                .context("failed to upload Vault configuration")?;
        }
        ConfigSource::Generated(text) => {
            info!("Uploading generated Vault configuration...");
            op.upload(
                &mut text.as_bytes(),
                &workspace.file("config/vault.hcl"),
                "0640",
            )
            .context("failed to upload Vault configuration")?;
        }
    }

    for file in &plan.extra_files {
        info!("Uploading {}...", file.display());
        let name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .with_context(|| format!("{} has no file name", file.display()))?;
        op.upload_file(file, &workspace.file(&format!("config/{name}")), "0640")
            .with_context(|| format!("failed to upload {}", file.display()))?;
    }

    op.upload(
        &mut INSTALL_SCRIPT.as_bytes(),
        &workspace.file("install.sh"),
        "0755",
    )
    .context("failed to upload install script")?;

    info!("Installing Vault...");
    let command = format!(
        "cat {dir}/install.sh | {sudo}TMP_DIR={dir_quoted} VAULT_VERSION={version} SKIP_ENABLE={skip_enable} SKIP_START={skip_start} sh -",
        dir = workspace.path(),
        sudo = target.sudo_prefix(),
        dir_quoted = quote(workspace.path()),
        version = quote(&plan.version),
        skip_enable = quote(&plan.skip_enable.to_string()),
        skip_start = quote(&plan.skip_start.to_string()),
    );
    op.execute(&command)
        .context("failed to run the install script")?;

    info!("Done.");
    Ok(())
}

fn uninstall(args: &UninstallArgs) -> Result<()> {
    let target = args.target.resolve();

    operator::with_operator(&target, |op| uninstall_vault(op, &target))
}

fn uninstall_vault(op: &dyn CommandOperator, target: &Target) -> Result<()> {
    let workspace = Workspace::create(op, "vault-uninstallation")
        .context("failed to create uninstallation workspace")?;

    op.upload(
        &mut UNINSTALL_SCRIPT.as_bytes(),
        &workspace.file("uninstall.sh"),
        "0755",
    )
    .context("failed to upload uninstall script")?;

    info!("Uninstalling Vault...");
    op.execute(&format!(
        "cat {}/uninstall.sh | {}sh -",
        workspace.path(),
        target.sudo_prefix()
    ))
    .context("failed to run the uninstall script")?;

    info!("Done.");
    Ok(())
}
