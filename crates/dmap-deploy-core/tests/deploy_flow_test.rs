mod common;

use common::{CommandKind, RecordingRunner, TestWorkspace};
use dmap_deploy_core::{
    DeployOptions, DeployStep, ImageStatus, Inventory, Role, StepResult, VmConfig, VmSpec,
};

fn executed_steps(report: &dmap_deploy_core::DeployReport) -> Vec<&'static str> {
    report
        .steps
        .iter()
        .filter(|(_, result)| !result.is_skipped())
        .map(|(step, _)| step.id())
        .collect()
}

/// 全コマンド成功時は build → inventory → 接続確認 → Docker確認 → デプロイ の順に実行される
#[tokio::test]
async fn test_deploy_default_config_end_to_end() {
    let workspace = TestWorkspace::new();
    let deployer = workspace.deployer(RecordingRunner::new());

    let report = deployer
        .deploy(&VmConfig::default_config(), &DeployOptions::default())
        .await;

    assert!(report.is_success());
    assert_eq!(
        executed_steps(&report),
        ["build-image", "inventory", "connectivity", "check-docker", "deploy"]
    );
    assert_eq!(
        deployer.runner().kinds(),
        [
            CommandKind::ImageQuery,
            CommandKind::ImageBuild,
            CommandKind::Ping,
            CommandKind::RuntimeCheck,
            CommandKind::Deploy,
        ]
    );
    assert!(workspace.inventory_path().is_file());
}

/// イメージが既にあればビルドコマンドは実行されない
#[tokio::test]
async fn test_existing_image_skips_build() {
    let workspace = TestWorkspace::new();
    let deployer = workspace.deployer(RecordingRunner::new().with_image_present());

    assert_eq!(
        deployer.build_control_image().await.unwrap(),
        ImageStatus::Present
    );
    assert_eq!(deployer.runner().kinds(), [CommandKind::ImageQuery]);

    let report = deployer
        .deploy(&VmConfig::default_config(), &DeployOptions::default())
        .await;
    assert!(report.is_success());
    assert!(!deployer.runner().kinds().contains(&CommandKind::ImageBuild));
    assert!(matches!(
        report.result(DeployStep::BuildImage),
        Some(StepResult::Success { .. })
    ));
}

/// 接続確認をスキップするとpingは実行されず、インベントリ生成の次がDocker確認になる
#[tokio::test]
async fn test_skip_connectivity() {
    let workspace = TestWorkspace::new();
    let deployer = workspace.deployer(RecordingRunner::new());
    let options = DeployOptions {
        skip_connectivity: true,
        ..Default::default()
    };

    let report = deployer.deploy(&VmConfig::default_config(), &options).await;

    assert!(report.is_success());
    assert!(!deployer.runner().kinds().contains(&CommandKind::Ping));
    assert!(
        report
            .result(DeployStep::TestConnectivity)
            .unwrap()
            .is_skipped()
    );
    assert_eq!(
        executed_steps(&report),
        ["build-image", "inventory", "check-docker", "deploy"]
    );
}

/// Docker無し + セットアップスキップでもデプロイまで進む
#[tokio::test]
async fn test_missing_runtime_with_install_skipped_still_deploys() {
    let workspace = TestWorkspace::new();
    let runner = RecordingRunner::new().exit_code(CommandKind::RuntimeCheck, 2);
    let deployer = workspace.deployer(runner);
    let options = DeployOptions {
        install_runtime: false,
        ..Default::default()
    };

    let report = deployer.deploy(&VmConfig::default_config(), &options).await;

    assert!(report.is_success());
    let kinds = deployer.runner().kinds();
    assert!(!kinds.contains(&CommandKind::RuntimeInstall));
    assert_eq!(kinds.last(), Some(&CommandKind::Deploy));
    assert!(
        report
            .result(DeployStep::InstallRuntime)
            .unwrap()
            .is_skipped()
    );
}

/// Docker無しならセットアップplaybookがデプロイ前に実行される
#[tokio::test]
async fn test_missing_runtime_is_installed_before_deploy() {
    let workspace = TestWorkspace::new();
    let runner = RecordingRunner::new()
        .with_image_present()
        .exit_code(CommandKind::RuntimeCheck, 2);
    let deployer = workspace.deployer(runner);

    let report = deployer
        .deploy(&VmConfig::default_config(), &DeployOptions::default())
        .await;

    assert!(report.is_success());
    assert_eq!(
        deployer.runner().kinds(),
        [
            CommandKind::ImageQuery,
            CommandKind::Ping,
            CommandKind::RuntimeCheck,
            CommandKind::RuntimeInstall,
            CommandKind::Deploy,
        ]
    );
}

/// Docker確認コマンドが起動できなくても「Docker無し」として扱う
#[tokio::test]
async fn test_runtime_check_launch_failure_counts_as_unavailable() {
    let workspace = TestWorkspace::new();
    let runner = RecordingRunner::new().unlaunchable(CommandKind::RuntimeCheck);
    let deployer = workspace.deployer(runner);

    assert!(!deployer.check_runtime().await);

    let report = deployer
        .deploy(&VmConfig::default_config(), &DeployOptions::default())
        .await;
    assert!(report.is_success());
    assert!(deployer.runner().kinds().contains(&CommandKind::RuntimeInstall));
}

/// セットアップ失敗でデプロイは実行されない
#[tokio::test]
async fn test_install_failure_aborts() {
    let workspace = TestWorkspace::new();
    let runner = RecordingRunner::new()
        .exit_code(CommandKind::RuntimeCheck, 2)
        .exit_code(CommandKind::RuntimeInstall, 4);
    let deployer = workspace.deployer(runner);

    let report = deployer
        .deploy(&VmConfig::default_config(), &DeployOptions::default())
        .await;

    assert!(!report.is_success());
    assert_eq!(report.failed_step(), Some(DeployStep::InstallRuntime));
    assert!(!deployer.runner().kinds().contains(&CommandKind::Deploy));
}

/// デプロイplaybookの失敗は終了コード付きで報告される
#[tokio::test]
async fn test_deploy_failure_reports_exit_code() {
    let workspace = TestWorkspace::new();
    let runner = RecordingRunner::new().exit_code(CommandKind::Deploy, 2);
    let deployer = workspace.deployer(runner);

    let report = deployer
        .deploy(&VmConfig::default_config(), &DeployOptions::default())
        .await;

    assert!(!report.is_success());
    match report.result(DeployStep::RunDeploy) {
        Some(StepResult::Failed { error, .. }) => assert!(error.contains("exit code: 2")),
        other => panic!("Expected failed deploy step, got {:?}", other),
    }
}

/// ロールが欠けた設定ではインベントリを書かずに止まる
#[tokio::test]
async fn test_missing_role_writes_nothing() {
    let workspace = TestWorkspace::new();
    let deployer = workspace.deployer(RecordingRunner::new().with_image_present());

    let mut config = VmConfig::new();
    config.insert("vm1", VmSpec::new("10.0.0.1", "ubuntu", Role::Postgres));
    config.insert("vm2", VmSpec::new("10.0.0.2", "ubuntu", Role::Neo4j));
    config.insert("vm3", VmSpec::new("10.0.0.3", "ubuntu", Role::Backend));

    let report = deployer.deploy(&config, &DeployOptions::default()).await;

    assert!(!report.is_success());
    assert_eq!(report.failed_step(), Some(DeployStep::WriteInventory));
    assert!(!workspace.inventory_path().exists());
    assert_eq!(deployer.runner().kinds(), [CommandKind::ImageQuery]);
}

/// 接続確認の失敗で以降のステップは実行されない
#[tokio::test]
async fn test_connectivity_failure_aborts() {
    let workspace = TestWorkspace::new();
    let runner = RecordingRunner::new()
        .with_image_present()
        .exit_code(CommandKind::Ping, 4);
    let deployer = workspace.deployer(runner);

    let report = deployer
        .deploy(&VmConfig::default_config(), &DeployOptions::default())
        .await;

    assert!(!report.is_success());
    assert_eq!(report.failed_step(), Some(DeployStep::TestConnectivity));
    assert_eq!(
        deployer.runner().kinds(),
        [CommandKind::ImageQuery, CommandKind::Ping]
    );
}

/// イメージビルドの失敗でインベントリも生成されない
#[tokio::test]
async fn test_build_failure_aborts() {
    let workspace = TestWorkspace::new();
    let runner = RecordingRunner::new().exit_code(CommandKind::ImageBuild, 1);
    let deployer = workspace.deployer(runner);

    let report = deployer
        .deploy(&VmConfig::default_config(), &DeployOptions::default())
        .await;

    assert!(!report.is_success());
    assert_eq!(report.step_ids(), ["build-image"]);
    assert!(!workspace.inventory_path().exists());
}

/// 生成されたインベントリが入力と一致する
#[tokio::test]
async fn test_written_inventory_matches_input() {
    let workspace = TestWorkspace::new();
    let deployer = workspace.deployer(RecordingRunner::new());
    let config = VmConfig::from_json_str(
        r#"{
            "db-a": ["10.1.0.10", "ubuntu", "postgres"],
            "db-b": ["10.1.0.11", "ec2-user", "neo4j"],
            "mq": ["10.1.0.12", "ubuntu", "kafka"],
            "api": ["10.1.0.13", "admin", "backend"]
        }"#,
    )
    .unwrap();

    deployer.deploy(&config, &DeployOptions::default()).await;

    let written: Inventory =
        serde_yaml::from_str(&std::fs::read_to_string(workspace.inventory_path()).unwrap())
            .unwrap();
    assert_eq!(written.host_count(), 4);
    for (name, spec) in config.iter() {
        let host = &written.hosts(spec.role).unwrap()[name];
        assert_eq!(host.ansible_host, spec.address);
        assert_eq!(host.ansible_user, spec.user);
    }
}

/// Dockerセットアップのみのフローはデプロイplaybookを実行しない
#[tokio::test]
async fn test_setup_runtime_only() {
    let workspace = TestWorkspace::new();
    let deployer = workspace.deployer(RecordingRunner::new());

    let report = deployer
        .setup_runtime_only(&VmConfig::default_config())
        .await;

    assert!(report.is_success());
    assert_eq!(
        deployer.runner().kinds(),
        [
            CommandKind::ImageQuery,
            CommandKind::ImageBuild,
            CommandKind::Ping,
            CommandKind::RuntimeInstall,
        ]
    );
}

/// デプロイフローに稼働確認は含まれない
#[tokio::test]
async fn test_deploy_never_verifies() {
    let workspace = TestWorkspace::new();
    let deployer = workspace.deployer(RecordingRunner::new());

    let report = deployer
        .deploy(&VmConfig::default_config(), &DeployOptions::default())
        .await;

    assert!(report.result(DeployStep::Verify).is_none());
    assert!(!deployer.runner().kinds().contains(&CommandKind::Verify));
}

/// 稼働確認はインベントリが無ければコマンドを実行せずに失敗する
#[tokio::test]
async fn test_verify_requires_inventory() {
    let workspace = TestWorkspace::new();
    let deployer = workspace.deployer(RecordingRunner::new());

    let report = deployer.verify().await;
    assert!(!report.is_success());
    assert!(deployer.runner().calls().is_empty());

    deployer
        .update_inventory(&VmConfig::default_config())
        .unwrap();
    let report = deployer.verify().await;
    assert!(report.is_success());
    assert_eq!(deployer.runner().kinds(), [CommandKind::Verify]);
}
