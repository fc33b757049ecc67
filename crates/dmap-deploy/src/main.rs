use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use dmap_deploy_config::Settings;
use dmap_deploy_core::{DeployOptions, Deployer, VmConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "dmap-deploy", version)]
#[command(about = "DMAP アプリケーションを Ansible コントロールコンテナ経由で VM にデプロイ", long_about = None)]
struct Cli {
    /// VM構成のJSONファイル（形式: {"vm1": ["ip", "username", "service"]}）
    #[arg(long, env = "DMAP_VM_CONFIG", value_name = "PATH")]
    vm_config: Option<PathBuf>,

    /// 接続確認をスキップ
    #[arg(long)]
    skip_connectivity: bool,

    /// Dockerセットアップをスキップ（Dockerインストール済みを前提にする）
    #[arg(long, conflicts_with = "docker_setup_only")]
    skip_docker_setup: bool,

    /// Dockerセットアップのみ実行（サービスはデプロイしない）
    #[arg(long)]
    docker_setup_only: bool,

    /// 既存インベントリで各VMの稼働コンテナを表示するだけ
    #[arg(long, conflicts_with = "docker_setup_only")]
    verify_only: bool,

    /// ワークスペース（Dockerfile, playbook, inventory.yml の置き場所）
    #[arg(long, env = "DMAP_WORKSPACE", value_name = "DIR")]
    workspace: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ステータス表示はstdout、ログはstderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    if cli.verify_only {
        let deployer = Deployer::new(Settings::load(cli.workspace)?);
        return Ok(deployer.verify().await.is_success());
    }

    let vm_config = load_vm_config(cli.vm_config.as_deref())?;
    tracing::debug!("VM config loaded: {} VMs", vm_config.len());
    let deployer = Deployer::new(Settings::load(cli.workspace)?);

    let report = if cli.docker_setup_only {
        deployer.setup_runtime_only(&vm_config).await
    } else {
        let options = DeployOptions {
            skip_connectivity: cli.skip_connectivity,
            install_runtime: !cli.skip_docker_setup,
        };
        deployer.deploy(&vm_config, &options).await
    };

    Ok(report.is_success())
}

/// VM構成を読み込む（未指定ならデフォルト構成）
fn load_vm_config(path: Option<&Path>) -> anyhow::Result<VmConfig> {
    match path {
        Some(path) => VmConfig::load(path)
            .with_context(|| format!("VM設定を読み込めません: {}", path.display())),
        None => {
            println!(
                "{}",
                "デフォルトのVM構成を使用します。--vm-config で構成ファイルを指定できます。"
                    .yellow()
            );
            Ok(VmConfig::default_config())
        }
    }
}
