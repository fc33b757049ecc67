pub mod error;

pub use error::*;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// ワークスペースを示す目印（デプロイ用playbook）
pub const DEPLOY_PLAYBOOK: &str = "deploy-services.yml";
/// Docker セットアップ用playbook
pub const RUNTIME_PLAYBOOK: &str = "setup-docker.yml";
/// 生成されるインベントリのファイル名
pub const INVENTORY_FILE: &str = "inventory.yml";
/// コントロールイメージのデフォルトタグ
pub const DEFAULT_CONTROL_IMAGE: &str = "ansible-control";
/// コンテナエンジンのデフォルト
pub const DEFAULT_CONTAINER_ENGINE: &str = "docker";

/// 環境変数から値を取り、未設定ならデフォルトに落とす変数
///
/// インベントリにはAnsibleの `lookup('env', ...)` 式として書き出される。
/// 解決はコントロールコンテナ内のAnsibleが行う。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvDefault {
    pub env: String,
    pub default: String,
}

impl EnvDefault {
    pub fn new(env: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            env: env.into(),
            default: default.into(),
        }
    }

    /// Ansible の lookup 式
    pub fn ansible_lookup(&self) -> String {
        format!(
            "{{{{ lookup('env', '{}') | default('{}') }}}}",
            self.env, self.default
        )
    }

    /// ホスト側で環境変数が設定されているか
    pub fn is_set(&self) -> bool {
        std::env::var_os(&self.env).is_some()
    }
}

/// レジストリ関連の共有変数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySettings {
    pub registry: String,
    pub repository: String,
    pub username: EnvDefault,
    pub password: EnvDefault,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            registry: "ngdmapo".to_string(),
            repository: "dmap_app_modernization".to_string(),
            username: EnvDefault::new("DOCKER_HUB_USERNAME", "ngdmapo"),
            password: EnvDefault::new("DOCKER_HUB_PASSWORD", ""),
        }
    }
}

/// リモート接続の共有変数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshSettings {
    /// コントロールコンテナ内から見た秘密鍵のパス
    pub private_key_file: String,
    pub common_args: String,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            private_key_file: "~/.ssh/id_rsa".to_string(),
            common_args: "-o StrictHostKeyChecking=no".to_string(),
        }
    }
}

/// デプロイヤーの実行時設定
///
/// 起動時に一度だけ解決し、以降は読み取り専用で使う。
#[derive(Debug, Clone)]
pub struct Settings {
    /// Dockerfile, playbook, 生成インベントリを置くディレクトリ
    pub workspace_dir: PathBuf,
    /// コントロールコンテナに読み取り専用でマウントするSSHディレクトリ
    pub ssh_dir: PathBuf,
    pub container_engine: String,
    pub control_image: String,
    pub inventory_file: String,
    pub deploy_playbook: String,
    pub runtime_playbook: String,
    pub registry: RegistrySettings,
    pub ssh: SshSettings,
    /// `-i -t` を付けてコンテナを起動するか
    pub interactive: bool,
}

impl Settings {
    /// デフォルト値で設定を作成
    pub fn new(workspace_dir: impl Into<PathBuf>, ssh_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace_dir: workspace_dir.into(),
            ssh_dir: ssh_dir.into(),
            container_engine: DEFAULT_CONTAINER_ENGINE.to_string(),
            control_image: DEFAULT_CONTROL_IMAGE.to_string(),
            inventory_file: INVENTORY_FILE.to_string(),
            deploy_playbook: DEPLOY_PLAYBOOK.to_string(),
            runtime_playbook: RUNTIME_PLAYBOOK.to_string(),
            registry: RegistrySettings::default(),
            ssh: SshSettings::default(),
            interactive: false,
        }
    }

    /// 環境変数とオーバーライドから設定を解決
    ///
    /// - ワークスペース: 引数 > DMAP_WORKSPACE > 自動探索
    /// - SSHディレクトリ: DMAP_SSH_DIR > ~/.ssh
    /// - コンテナエンジン: DMAP_CONTAINER_ENGINE > docker
    /// - コントロールイメージ: DMAP_CONTROL_IMAGE > ansible-control
    pub fn load(workspace_override: Option<PathBuf>) -> Result<Self> {
        let workspace_dir = match workspace_override {
            Some(dir) => ensure_dir(dir)?,
            None => find_workspace_dir()?,
        };

        let ssh_dir = match std::env::var_os("DMAP_SSH_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_ssh_dir()?,
        };

        let mut settings = Self::new(workspace_dir, ssh_dir);

        if let Some(engine) = non_empty_env("DMAP_CONTAINER_ENGINE") {
            settings.container_engine = engine;
        }
        if let Some(image) = non_empty_env("DMAP_CONTROL_IMAGE") {
            settings.control_image = image;
        }
        settings.interactive = std::io::stdin().is_terminal();

        tracing::debug!(
            workspace = %settings.workspace_dir.display(),
            ssh_dir = %settings.ssh_dir.display(),
            engine = %settings.container_engine,
            image = %settings.control_image,
            "settings resolved"
        );

        Ok(settings)
    }

    pub fn inventory_path(&self) -> PathBuf {
        self.workspace_dir.join(&self.inventory_file)
    }
}

/// ワークスペースディレクトリを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 DMAP_WORKSPACE (直接パス指定)
/// 2. カレントディレクトリ (deploy-services.yml がある場合)
/// 3. ./ansible/ ディレクトリ (同上)
pub fn find_workspace_dir() -> Result<PathBuf> {
    // 1. 環境変数で直接指定
    if let Some(dir) = std::env::var_os("DMAP_WORKSPACE") {
        return ensure_dir(PathBuf::from(dir));
    }

    let current_dir = std::env::current_dir()?;

    // 2. カレントディレクトリ
    if current_dir.join(DEPLOY_PLAYBOOK).is_file() {
        return Ok(current_dir);
    }

    // 3. ./ansible/
    let ansible_dir = current_dir.join("ansible");
    if ansible_dir.join(DEPLOY_PLAYBOOK).is_file() {
        return Ok(ansible_dir);
    }

    Err(ConfigError::WorkspaceNotFound)
}

/// ~/.ssh
pub fn default_ssh_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".ssh"))
        .ok_or(ConfigError::HomeDirNotFound)
}

fn ensure_dir(dir: PathBuf) -> Result<PathBuf> {
    if !dir.is_dir() {
        return Err(ConfigError::WorkspaceNotDir(dir));
    }
    // コンテナにマウントするため絶対パスにする
    Ok(absolute(&dir)?)
}

fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
