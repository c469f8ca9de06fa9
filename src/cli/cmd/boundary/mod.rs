use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{error, info};

use super::{ConfigSource, PackageArgs, TargetArgs, UninstallArgs};
use crate::config::BoundaryConfig;
use crate::operator::{self, CommandOperator, Workspace, quote};
use crate::release;
use crate::target::{Target, expand_home};

const INSTALL_SCRIPT: &str = include_str!("install.sh");
const UNINSTALL_SCRIPT: &str = include_str!("uninstall.sh");

#[derive(clap::Subcommand, Debug, Clone)]
pub enum BoundaryCommands {
    /// Install Boundary on the target host
    Install(InstallArgs),

    /// Remove Boundary from the target host
    Uninstall(UninstallArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct InstallArgs {
    #[clap(flatten)]
    pub target: TargetArgs,

    #[clap(flatten)]
    pub package: PackageArgs,

    /// Initialize the Boundary database
    #[clap(short = 'd', long, num_args = 0)]
    pub init_database: bool,

    /// Unique name of this controller within the cluster
    #[clap(long)]
    pub controller_name: Option<String>,

    /// Unique name of this worker within the cluster
    #[clap(long)]
    pub worker_name: Option<String>,

    /// URL for connecting to Postgres
    #[clap(long)]
    pub db_url: Option<String>,

    /// KEK for the scope-specific KEKs, also called the scope's root key
    #[clap(long)]
    pub root_key: Option<String>,

    /// KMS key shared by the controller and worker to authenticate a worker
    #[clap(long)]
    pub worker_auth_key: Option<String>,

    /// KMS key for rescue and recovery operations
    #[clap(long)]
    pub recovery_key: Option<String>,

    /// Address for the API listener
    #[clap(long, default_value = "0.0.0.0")]
    pub api_addr: String,

    /// Address for the cluster listener
    #[clap(long, default_value = "127.0.0.1")]
    pub cluster_addr: String,

    /// Address for the proxy listener
    #[clap(long, default_value = "0.0.0.0")]
    pub proxy_addr: String,

    /// Public host or IP address at which the controller is reachable by
    /// workers
    #[clap(long)]
    pub public_cluster_addr: Option<String>,

    /// Public host or IP address at which the worker is reachable by clients
    #[clap(long)]
    pub public_addr: Option<String>,

    /// Host or IP address, with an optional port, for reaching controllers
    #[clap(long = "controller", default_value = "127.0.0.1")]
    pub controllers: Vec<String>,
}

impl InstallArgs {
    fn config(&self) -> BoundaryConfig {
        BoundaryConfig {
            controller_name: self.controller_name.clone().unwrap_or_default(),
            worker_name: self.worker_name.clone().unwrap_or_default(),
            database_url: self.db_url.clone().unwrap_or_default(),
            root_key: self.root_key.clone().unwrap_or_default(),
            worker_auth_key: self.worker_auth_key.clone().unwrap_or_default(),
            recovery_key: self.recovery_key.clone().unwrap_or_default(),
            api_address: self.api_addr.clone(),
            cluster_address: self.cluster_addr.clone(),
            proxy_address: self.proxy_addr.clone(),
            public_address: self.public_addr.clone().unwrap_or_default(),
            public_cluster_address: self.public_cluster_addr.clone().unwrap_or_default(),
            controllers: self.controllers.clone(),
        }
    }
}

pub fn run(cmd: BoundaryCommands) -> ExitCode {
    let result = match cmd {
        BoundaryCommands::Install(args) => install(&args),
        BoundaryCommands::Uninstall(args) => uninstall(&args),
    };

    match result {
        Err(error) => {
            error!(error = ?error, "Provisioning Boundary failed");
            ExitCode::FAILURE
        }
        _ => ExitCode::SUCCESS,
    }
}

/// Everything resolved before a session opens: version, artifact paths and
/// the configuration to upload.
struct InstallPlan {
    version: String,
    package: Option<PathBuf>,
    config: ConfigSource,
    extra_files: Vec<PathBuf>,
    init_database: bool,
    skip_enable: bool,
    skip_start: bool,
}

impl InstallPlan {
    fn new(args: &InstallArgs) -> Result<InstallPlan> {
        let version = match (&args.package.package, &args.package.version) {
            (None, None) => release::latest_version("boundary").context(
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
            init_database: args.init_database,
            skip_enable: args.package.skip_enable,
            skip_start: args.package.skip_start,
        })
    }
}

fn install(args: &InstallArgs) -> Result<()> {
    let target = args.target.resolve();
    let plan = InstallPlan::new(args)?;

    operator::with_operator(&target, |op| install_boundary(op, &target, &plan))
}

fn install_boundary(op: &dyn CommandOperator, target: &Target, plan: &InstallPlan) -> Result<()> {
    let workspace = Workspace::create(op, "boundary-installation")
        .context("failed to create installation workspace")?;

    if let Some(package) = &plan.package {
        info!("Uploading Boundary package...");
        op.upload_file(package, &workspace.file("boundary.zip"), "0640")
            .context("failed to upload Boundary package")?;
    }

    match &plan.config {
        ConfigSource::File(path) => {
            info!("Uploading {} as boundary.hcl...", path.display());
            op.upload_file(path, &workspace.file("config/boundary.hcl"), "0640")
                .context("failed to upload Boundary configuration")?;
        }
        ConfigSource::Generated(text) => {
            info!("Uploading generated Boundary configuration...");
            op.upload(
                &mut text.as_bytes(),
                &workspace.file("config/boundary.hcl"),
                "0640",
            )
            .context("failed to upload Boundary configuration")?;
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

    info!("Installing Boundary...");
    let command = format!(
        "cat {dir}/install.sh | {sudo}TMP_DIR={dir_quoted} INIT_DATABASE={init} BOUNDARY_VERSION={version} SKIP_ENABLE={skip_enable} SKIP_START={skip_start} sh -",
        dir = workspace.path(),
        sudo = target.sudo_prefix(),
        dir_quoted = quote(workspace.path()),
        init = quote(&plan.init_database.to_string()),
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

    operator::with_operator(&target, |op| uninstall_boundary(op, &target))
}

fn uninstall_boundary(op: &dyn CommandOperator, target: &Target) -> Result<()> {
    let workspace = Workspace::create(op, "boundary-uninstallation")
        .context("failed to create uninstallation workspace")?;

    op.upload(
        &mut UNINSTALL_SCRIPT.as_bytes(),
        &workspace.file("uninstall.sh"),
        "0755",
    )
    .context("failed to upload uninstall script")?;

    info!("Uninstalling Boundary...");
    op.execute(&format!(
        "cat {}/uninstall.sh | {}sh -",
        workspace.path(),
        target.sudo_prefix()
    ))
    .context("failed to run the uninstall script")?;

    info!("Done.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::testing::{Call, RecordingOperator};

    fn local_target() -> Target {
        Target {
            local: true,
            addr: String::new(),
            user: "root".to_string(),
            key: None,
            sudo: false,
        }
    }

    fn plan(config: ConfigSource) -> InstallPlan {
        InstallPlan {
            version: "0.2.0".to_string(),
            package: None,
            config,
            extra_files: Vec::new(),
            init_database: false,
            skip_enable: true,
            skip_start: true,
        }
    }

    fn workspace_of(call: &Call) -> String {
        match call {
            Call::Execute(command) => {
                assert!(command.starts_with("mkdir -p /tmp/boundary-installation."));
                assert!(command.ends_with("/config"));
                command
                    .trim_start_matches("mkdir -p ")
                    .trim_end_matches("/config")
                    .to_string()
            }
            other => panic!("expected mkdir, got {other:?}"),
        }
    }

    #[test]
    fn test_install_sequence_with_custom_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("custom.hcl");
        std::fs::write(&config_path, "controller {\n}\n").unwrap();

        let op = RecordingOperator::default();
        install_boundary(
            &op,
            &local_target(),
            &plan(ConfigSource::File(config_path)),
        )
        .unwrap();

        let calls = op.calls();
        assert_eq!(calls.len(), 5);
        let dir = workspace_of(&calls[0]);

        assert_eq!(
            calls[1],
            Call::Upload {
                remote_path: format!("{dir}/config/boundary.hcl"),
                mode: "0640".to_string(),
                contents: "controller {\n}\n".to_string(),
            }
        );

        match &calls[2] {
            Call::Upload {
                remote_path,
                mode,
                contents,
            } => {
                assert_eq!(remote_path, &format!("{dir}/install.sh"));
                assert_eq!(mode, "0755");
                assert_eq!(contents, INSTALL_SCRIPT);
            }
            other => panic!("expected script upload, got {other:?}"),
        }

        match &calls[3] {
            Call::Execute(command) => {
                assert!(command.starts_with(&format!("cat {dir}/install.sh | ")));
                assert!(command.contains(&format!("TMP_DIR='{dir}'")));
                assert!(command.contains("INIT_DATABASE='false'"));
                assert!(command.contains("BOUNDARY_VERSION='0.2.0'"));
                assert!(command.contains("SKIP_ENABLE='true'"));
                assert!(command.contains("SKIP_START='true'"));
                assert!(command.ends_with("sh -"));
            }
            other => panic!("expected script execution, got {other:?}"),
        }

        assert_eq!(calls[4], Call::Execute(format!("rm -rf {dir}")));
    }

    #[test]
    fn test_install_uploads_generated_config() {
        let text = BoundaryConfig {
            controller_name: "controller-1".to_string(),
            ..Default::default()
        }
        .generate();

        let op = RecordingOperator::default();
        install_boundary(
            &op,
            &local_target(),
            &plan(ConfigSource::Generated(text.clone())),
        )
        .unwrap();

        let uploaded = op.calls().into_iter().find_map(|call| match call {
            Call::Upload {
                remote_path,
                contents,
                ..
            } if remote_path.ends_with("/config/boundary.hcl") => Some(contents),
            _ => None,
        });
        assert_eq!(uploaded.as_deref(), Some(text.as_str()));
    }

    #[test]
    fn test_failed_script_still_cleans_workspace() {
        let op = RecordingOperator {
            fail_on: Some("install.sh | "),
            ..Default::default()
        };

        let result = install_boundary(
            &op,
            &local_target(),
            &plan(ConfigSource::Generated(String::new())),
        );
        assert!(result.is_err());

        let executed = op.executed();
        assert_eq!(
            executed
                .iter()
                .filter(|command| command.starts_with("rm -rf "))
                .count(),
            1
        );
        assert!(executed.last().unwrap().starts_with("rm -rf "));
    }

    #[test]
    fn test_sudo_target_prefixes_script_invocation() {
        let target = Target {
            sudo: true,
            ..local_target()
        };

        let op = RecordingOperator::default();
        install_boundary(&op, &target, &plan(ConfigSource::Generated(String::new()))).unwrap();

        let script = op
            .executed()
            .into_iter()
            .find(|command| command.contains("install.sh | "))
            .unwrap();
        assert!(script.contains("install.sh | sudo TMP_DIR="));
    }

    #[test]
    fn test_uninstall_sequence() {
        let op = RecordingOperator::default();
        uninstall_boundary(&op, &local_target()).unwrap();

        let calls = op.calls();
        assert_eq!(calls.len(), 4);

        match &calls[1] {
            Call::Upload {
                remote_path, mode, ..
            } => {
                assert!(remote_path.ends_with("/uninstall.sh"));
                assert_eq!(mode, "0755");
            }
            other => panic!("expected script upload, got {other:?}"),
        }

        match &calls[2] {
            Call::Execute(command) => {
                assert!(command.contains("/uninstall.sh | sh -"));
            }
            other => panic!("expected script execution, got {other:?}"),
        }
    }
}
