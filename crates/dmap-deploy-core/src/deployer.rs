//! デプロイフロー
//!
//! BUILD_IMAGE → WRITE_INVENTORY → [TEST_CONNECTIVITY] → CHECK_RUNTIME →
//! [INSTALL_RUNTIME] → RUN_DEPLOY の一直線。どこかで失敗したら残りは実行しない。

use crate::control::ControlCommands;
use crate::error::{DeployError, Result};
use crate::inventory::Inventory;
use crate::model::VmConfig;
use crate::runner::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
use crate::step::{DeployReport, DeployStep, StepLogger};
use colored::Colorize;
use dmap_deploy_config::Settings;

/// deploy フローのオプション
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployOptions {
    /// 接続確認を省略する
    pub skip_connectivity: bool,
    /// Dockerが無いVMがあればセットアップplaybookを流す
    pub install_runtime: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            skip_connectivity: false,
            install_runtime: true,
        }
    }
}

/// コントロールイメージの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    /// 既に存在した（ビルドしていない）
    Present,
    /// 今回ビルドした
    Built,
}

/// 解決済み設定とコマンドランナーを持つデプロイヤー
pub struct Deployer<R = ProcessRunner> {
    settings: Settings,
    runner: R,
}

impl Deployer<ProcessRunner> {
    pub fn new(settings: Settings) -> Self {
        Self::with_runner(settings, ProcessRunner)
    }

    /// 環境変数から設定を解決して作成
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(Settings::load(None)?))
    }
}

impl<R: CommandRunner> Deployer<R> {
    pub fn with_runner(settings: Settings, runner: R) -> Self {
        Self { settings, runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn commands(&self) -> ControlCommands<'_> {
        ControlCommands::new(&self.settings)
    }

    /// 非ゼロ終了をエラーにして実行
    async fn run_checked(&self, step: DeployStep, spec: CommandSpec) -> Result<CommandOutput> {
        let output = self.runner.run(&spec).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(DeployError::CommandFailed {
                step: step.name(),
                code: output.code,
            })
        }
    }

    /// コントロールイメージがローカルにあるか
    ///
    /// 問い合わせ自体の失敗は「無い」扱い。
    pub async fn control_image_exists(&self) -> bool {
        match self.runner.run(&self.commands().image_query()).await {
            Ok(output) => !output.stdout.trim().is_empty(),
            Err(e) => {
                tracing::debug!("image query failed: {}", e);
                false
            }
        }
    }

    /// コントロールイメージを用意する（既にあればビルドしない）
    pub async fn build_control_image(&self) -> Result<ImageStatus> {
        if self.control_image_exists().await {
            return Ok(ImageStatus::Present);
        }

        println!(
            "{}",
            format!(
                "コントロールイメージ '{}' をビルド中...",
                self.settings.control_image
            )
            .blue()
        );
        self.run_checked(DeployStep::BuildImage, self.commands().image_build())
            .await?;
        Ok(ImageStatus::Built)
    }

    /// インベントリを生成してワークスペースに書き出す
    ///
    /// ロールが欠けていればファイルには触れずに失敗する。
    pub fn update_inventory(&self, vm_config: &VmConfig) -> Result<Inventory> {
        let inventory = Inventory::build(vm_config, &self.settings)?;
        inventory.write_to(&self.settings.inventory_path())?;
        Ok(inventory)
    }

    /// 全VMへの疎通確認（ansible ping）
    pub async fn test_connectivity(&self) -> Result<()> {
        let output = self.runner.run(&self.commands().ping()).await?;
        if output.success() {
            return Ok(());
        }

        println!("{}", "接続テストに失敗しました:".red());
        for stream in [&output.stdout, &output.stderr] {
            let text = stream.trim();
            if !text.is_empty() {
                println!("{}", text);
            }
        }
        Err(DeployError::CommandFailed {
            step: DeployStep::TestConnectivity.name(),
            code: output.code,
        })
    }

    /// 全VMでDockerが使えるか
    ///
    /// ホストごとの結果は取らず、コマンド全体の成否だけを見る。
    pub async fn check_runtime(&self) -> bool {
        match self.runner.run(&self.commands().runtime_check()).await {
            Ok(output) => output.success(),
            Err(e) => {
                println!("{} {}", "Docker確認でエラー:".red(), e);
                false
            }
        }
    }

    /// Dockerセットアップplaybookを実行
    pub async fn install_runtime(&self) -> Result<()> {
        self.run_checked(DeployStep::InstallRuntime, self.commands().runtime_install())
            .await?;
        Ok(())
    }

    /// デプロイplaybookを実行
    pub async fn run_deployment(&self) -> Result<()> {
        self.run_checked(DeployStep::RunDeploy, self.commands().deploy())
            .await?;
        Ok(())
    }

    /// 各VMの稼働コンテナを一覧表示（目視確認用）
    pub async fn verify_deployment(&self) -> Result<()> {
        let inventory_path = self.settings.inventory_path();
        if !inventory_path.is_file() {
            return Err(DeployError::InventoryNotFound(inventory_path));
        }
        self.run_checked(DeployStep::Verify, self.commands().verify())
            .await?;
        Ok(())
    }

    /// デプロイフロー全体を実行
    pub async fn deploy(&self, vm_config: &VmConfig, options: &DeployOptions) -> DeployReport {
        println!("{}", "DMAP アプリケーションのデプロイを開始します...".blue().bold());
        println!("{}", "=".repeat(50));

        let mut logger = StepLogger::new();
        self.deploy_steps(vm_config, options, &mut logger).await;

        if logger.all_success() {
            println!();
            println!(
                "{}",
                "✓ DMAP アプリケーションのデプロイが完了しました！"
                    .green()
                    .bold()
            );
        }
        logger.print_summary("DMAP deploy");
        logger.finish()
    }

    /// Dockerセットアップのみ実行（デプロイはしない）
    pub async fn setup_runtime_only(&self, vm_config: &VmConfig) -> DeployReport {
        println!("{}", "Docker セットアップを開始します...".blue().bold());
        println!("{}", "=".repeat(50));

        let mut logger = StepLogger::new();
        let completed = self.prepare(vm_config, true, &mut logger).await && {
            logger.start_step(DeployStep::InstallRuntime);
            record(&mut logger, self.install_runtime().await)
        };

        if completed {
            println!();
            println!("{}", "✓ Docker セットアップが完了しました！".green().bold());
        }
        logger.print_summary("Docker setup");
        logger.finish()
    }

    /// 既存インベントリで稼働確認のみ実行
    pub async fn verify(&self) -> DeployReport {
        let mut logger = StepLogger::new();
        logger.start_step(DeployStep::Verify);
        record(&mut logger, self.verify_deployment().await);
        logger.finish()
    }

    async fn deploy_steps(
        &self,
        vm_config: &VmConfig,
        options: &DeployOptions,
        logger: &mut StepLogger,
    ) {
        if !self
            .prepare(vm_config, !options.skip_connectivity, logger)
            .await
        {
            return;
        }

        logger.start_step(DeployStep::CheckRuntime);
        let available = self.check_runtime().await;
        if available {
            logger.step_success(Some("全VMでDockerが利用可能です"));
        } else {
            logger.step_success(Some("Dockerが利用できないVMがあります"));
        }

        if available {
            logger.skip(DeployStep::InstallRuntime, "インストール済み");
        } else if options.install_runtime {
            logger.start_step(DeployStep::InstallRuntime);
            if !record(logger, self.install_runtime().await) {
                return;
            }
        } else {
            logger.skip(DeployStep::InstallRuntime, "--skip-docker-setup");
            logger.log_warning(
                "Dockerが利用できませんがセットアップはスキップされました。デプロイが失敗する可能性があります",
            );
            tracing::warn!("runtime unavailable and installation skipped, continuing");
        }

        logger.start_step(DeployStep::RunDeploy);
        record(logger, self.run_deployment().await);
    }

    /// イメージ準備 → インベントリ生成 → 接続確認
    async fn prepare(
        &self,
        vm_config: &VmConfig,
        test_connectivity: bool,
        logger: &mut StepLogger,
    ) -> bool {
        logger.start_step(DeployStep::BuildImage);
        match self.build_control_image().await {
            Ok(ImageStatus::Present) => {
                logger.step_success(Some("コントロールイメージは既に存在します"))
            }
            Ok(ImageStatus::Built) => logger.step_success(Some("コントロールイメージをビルドしました")),
            Err(e) => {
                logger.step_failed(&e.to_string());
                return false;
            }
        }

        logger.start_step(DeployStep::WriteInventory);
        match self.update_inventory(vm_config) {
            Ok(_) => {
                for (name, spec) in vm_config.iter() {
                    logger.log_detail(&format!(
                        "{} VM ({}): {} (user: {})",
                        spec.role.title(),
                        name,
                        spec.address,
                        spec.user
                    ));
                }
                let path = self.settings.inventory_path();
                logger.step_success(Some(&format!("{} を更新しました", path.display())));
            }
            Err(e) => {
                logger.step_failed(&e.to_string());
                return false;
            }
        }

        if !test_connectivity {
            logger.skip(DeployStep::TestConnectivity, "--skip-connectivity");
            return true;
        }

        logger.start_step(DeployStep::TestConnectivity);
        match self.test_connectivity().await {
            Ok(()) => {
                logger.step_success(Some("全VMに到達できました"));
                true
            }
            Err(e) => {
                logger.step_failed(&e.to_string());
                false
            }
        }
    }
}

/// 結果をロガーに記録し、成功したかを返す
fn record(logger: &mut StepLogger, result: Result<()>) -> bool {
    match result {
        Ok(()) => {
            logger.step_success(None);
            true
        }
        Err(e) => {
            logger.step_failed(&e.to_string());
            false
        }
    }
}

/// 外部サービスから呼ぶためのエントリポイント
///
/// 設定は環境から解決し、接続確認とDockerセットアップを有効にしてデプロイする。
pub async fn deploy_application(vm_config: &VmConfig) -> bool {
    let deployer = match Deployer::from_env() {
        Ok(deployer) => deployer,
        Err(e) => {
            println!("{} {}", "✗".red().bold(), e);
            return false;
        }
    };

    deployer
        .deploy(vm_config, &DeployOptions::default())
        .await
        .is_success()
}
