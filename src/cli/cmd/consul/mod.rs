use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{error, info};

use super::{ConfigSource, PackageArgs, TargetArgs, UninstallArgs};
use crate::config::ConsulConfig;
use crate::operator::{self, CommandOperator, Workspace, quote};
use crate::release;
use crate::target::{Target, expand_home};

const INSTALL_SCRIPT: &str = include_str!("install.sh");
const UNINSTALL_SCRIPT: &str = include_str!("uninstall.sh");

#[derive(clap::Subcommand, Debug, Clone)]
pub enum ConsulCommands {
    /// Install Consul on the target host
    Install(InstallArgs),

    /// Remove Consul from the target host
    Uninstall(UninstallArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct InstallArgs {
    #[clap(flatten)]
    pub target: TargetArgs,

    #[clap(flatten)]
    pub package: PackageArgs,

    /// Run the agent in server mode
    #[clap(long, num_args = 0)]
    pub server: bool,

    /// Enable the built-in web UI
    #[clap(long, num_args = 0)]
    pub ui: bool,

    /// Enable Consul Connect
    #[clap(long, num_args = 0)]
    pub connect: bool,

    /// Datacenter of the agent
    #[clap(long, default_value = "dc1")]
    pub datacenter: String,

    /// Address the agent binds to for internal cluster communication
    #[clap(long)]
    pub bind_addr: Option<String>,

    /// Address advertised to other nodes in the cluster
    #[clap(long)]
    pub advertise_addr: Option<String>,

    /// Address the agent binds to for client interfaces
    #[clap(long, default_value = "0.0.0.0")]
    pub client_addr: String,

    /// Number of servers expected before bootstrapping the cluster
    #[clap(long, default_value_t = 1)]
    pub bootstrap_expect: u64,

    /// Agent address to join on start, with retries
    #[clap(long = "retry-join")]
    pub retry_join: Vec<String>,

    /// Gossip encryption key
    #[clap(long)]
    pub encrypt: Option<String>,

    /// CA certificate for TLS
    #[clap(long)]
    pub ca_file: Option<String>,

    /// Server certificate for TLS
    #[clap(long)]
    pub cert_file: Option<String>,

    /// Server key for TLS
    #[clap(long)]
    pub key_file: Option<String>,

    /// Enable the ACL system with a deny-by-default policy
    #[clap(long, num_args = 0)]
    pub acl: bool,

    /// ACL token used for internal agent operations
    #[clap(long)]
    pub agent_token: Option<String>,
}

impl InstallArgs {
    fn config(&self) -> ConsulConfig {
        ConsulConfig {
            server: self.server,
            ui: self.ui,
            connect: self.connect,
            datacenter: self.datacenter.clone(),
            bind_addr: self.bind_addr.clone().unwrap_or_default(),
            advertise_addr: self.advertise_addr.clone().unwrap_or_default(),
            client_addr: self.client_addr.clone(),
            bootstrap_expect: self.bootstrap_expect,
            retry_join: self.retry_join.clone(),
            encrypt: self.encrypt.clone().unwrap_or_default(),
            ca_file: self.ca_file.clone().unwrap_or_default(),
            cert_file: self.cert_file.clone().unwrap_or_default(),
            key_file: self.key_file.clone().unwrap_or_default(),
            acl: self.acl,
            agent_token: self.agent_token.clone().unwrap_or_default(),
        }
    }
}

pub fn run(cmd: ConsulCommands) -> ExitCode {
    let result = match cmd {
        ConsulCommands::Install(args) => install(&args),
        ConsulCommands::Uninstall(args) => uninstall(&args),
    };

    match result {
        Err(error) => {
            error!(error = ?error, "Provisioning Consul failed");
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
            (None, None) => release::latest_version("consul").context(
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

    operator::with_operator(&target, |op| install_consul(op, &target, &plan))
}

fn install_consul(op: &dyn CommandOperator, target: &Target, plan: &InstallPlan) -> Result<()> {
    let workspace = Workspace::create(op, "consul-installation")
        .context("failed to create installation workspace")?;

    if let Some(package) = &plan.package {
        info!("Uploading Consul package...");
        op.upload_file(package, &workspace.file("consul.zip"), "0640")
            .context("failed to upload Consul package")?;
    }

    match &plan.config {
        ConfigSource::File(path) => {
            info!("Uploading {} as consul.hcl...", path.display());
            op.upload_file(path, &workspace.file("config/consul.hcl"), "0640")
                .context("failed to upload Consul configuration")?;
        }
        ConfigSource::Generated(text) => {
            info!("Uploading generated Consul configuration...");
            op.upload(
                &mut text.as_bytes(),
                &workspace.file("config/consul.hcl"),
                "0640",
            )
            .context("failed to upload Consul configuration")?;
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

    info!("Installing Consul...");
    let command = format!(
        "cat {dir}/install.sh | {sudo}TMP_DIR={dir_quoted} CONSUL_VERSION={version} SKIP_ENABLE={skip_enable} SKIP_START={skip_start} sh -",
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

    operator::with_operator(&target, |op| uninstall_consul(op, &target))
}

fn uninstall_consul(op: &dyn CommandOperator, target: &Target) -> Result<()> {
    let workspace = Workspace::create(op, "consul-uninstallation")
        .context("failed to create uninstallation workspace")?;

    op.upload(
        &mut UNINSTALL_SCRIPT.as_bytes(),
        &workspace.file("uninstall.sh"),
        "0755",
    )
    .context("failed to upload uninstall script")?;

    info!("Uninstalling Consul...");
    op.execute(&format!(
        "cat {}/uninstall.sh | {}sh -",
        workspace.path(),
        target.sudo_prefix()
    ))
    .context("failed to run the uninstall script")?;

    info!("Done.");
    Ok(())
}
