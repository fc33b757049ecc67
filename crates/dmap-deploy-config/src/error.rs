use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("ホームディレクトリが見つかりません（DMAP_SSH_DIR で SSH ディレクトリを直接指定できます）")]
    HomeDirNotFound,

    #[error(
        "ワークスペースが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: deploy-services.yml\n\
        - ./ansible/ ディレクトリ: deploy-services.yml\n\
        または DMAP_WORKSPACE 環境変数 / --workspace で直接指定できます"
    )]
    WorkspaceNotFound,

    #[error("ワークスペースがディレクトリではありません: {0}")]
    WorkspaceNotDir(PathBuf),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
