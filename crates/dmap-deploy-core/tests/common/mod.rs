use async_trait::async_trait;
use dmap_deploy_config::Settings;
use dmap_deploy_core::{CommandOutput, CommandRunner, CommandSpec, DeployError, Deployer};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

/// 外部コマンドの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    ImageQuery,
    ImageBuild,
    Ping,
    RuntimeCheck,
    RuntimeInstall,
    Deploy,
    Verify,
    Other,
}

pub fn classify(spec: &CommandSpec) -> CommandKind {
    let script = spec.args.last().map(String::as_str).unwrap_or("");
    match spec.args.first().map(String::as_str) {
        Some("images") => CommandKind::ImageQuery,
        Some("build") => CommandKind::ImageBuild,
        Some("run") if script.ends_with("-m ping") => CommandKind::Ping,
        Some("run") if script.contains("docker --version") => CommandKind::RuntimeCheck,
        Some("run") if script.ends_with("setup-docker.yml") => CommandKind::RuntimeInstall,
        Some("run") if script.ends_with("deploy-services.yml") => CommandKind::Deploy,
        Some("run") if script.contains("docker ps") => CommandKind::Verify,
        _ => CommandKind::Other,
    }
}

/// 実行されたコマンドを記録し、種類ごとに決めた結果を返すランナー
///
/// デフォルトでは全コマンドが成功し、コントロールイメージは存在しない。
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<CommandSpec>>,
    exit_codes: HashMap<CommandKind, i32>,
    unlaunchable: HashSet<CommandKind>,
    image_present: bool,
}

#[allow(dead_code)]
impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image_present(mut self) -> Self {
        self.image_present = true;
        self
    }

    pub fn exit_code(mut self, kind: CommandKind, code: i32) -> Self {
        self.exit_codes.insert(kind, code);
        self
    }

    pub fn unlaunchable(mut self, kind: CommandKind) -> Self {
        self.unlaunchable.insert(kind);
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<CommandKind> {
        self.calls().iter().map(classify).collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &CommandSpec) -> dmap_deploy_core::Result<CommandOutput> {
        self.calls.lock().unwrap().push(command.clone());

        let kind = classify(command);
        if self.unlaunchable.contains(&kind) {
            return Err(DeployError::Spawn {
                program: command.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            });
        }

        let mut output = CommandOutput::with_code(*self.exit_codes.get(&kind).unwrap_or(&0));
        if kind == CommandKind::ImageQuery && self.image_present {
            output.stdout = "3f1c2a9b7e4d\n".to_string();
        }
        Ok(output)
    }
}

/// テンポラリワークスペースとその設定
pub struct TestWorkspace {
    pub root: TempDir,
    pub settings: Settings,
}

#[allow(dead_code)]
impl TestWorkspace {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let mut settings = Settings::new(root.path(), root.path().join(".ssh"));
        // ホスト環境の認証情報に左右されないようにする
        settings.registry.username.env = "DMAP_TEST_UNSET_USER_5e7".to_string();
        settings.registry.password.env = "DMAP_TEST_UNSET_PASS_5e7".to_string();
        Self { root, settings }
    }

    pub fn deployer(&self, runner: RecordingRunner) -> Deployer<RecordingRunner> {
        Deployer::with_runner(self.settings.clone(), runner)
    }

    pub fn inventory_path(&self) -> PathBuf {
        self.settings.inventory_path()
    }
}
