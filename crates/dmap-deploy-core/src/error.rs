use crate::model::Role;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("ロール '{0}' に割り当てられたVMがありません")]
    MissingRole(Role),

    #[error("VM設定の読み込みに失敗しました: {path}\n理由: {source}")]
    VmConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("VM設定のパースに失敗しました: {0}")]
    VmConfigParse(#[from] serde_json::Error),

    #[error("インベントリの生成に失敗しました: {0}")]
    InventorySerialize(#[from] serde_yaml::Error),

    #[error("インベントリの書き込みに失敗しました: {path}\n理由: {source}")]
    InventoryWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("インベントリがありません: {0}\nヒント: 先にデプロイ（またはDockerセットアップ）を実行してください")]
    InventoryNotFound(PathBuf),

    #[error("'{program}' を起動できませんでした: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{step} が失敗しました (exit code: {})", exit_code_label(.code))]
    CommandFailed {
        step: &'static str,
        code: Option<i32>,
    },

    #[error("設定エラー: {0}")]
    Config(#[from] dmap_deploy_config::ConfigError),
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
