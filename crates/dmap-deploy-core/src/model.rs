//! VM と サービスロールのモデル

use crate::error::{DeployError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// VMに割り当てるサービスロール
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// PostgreSQL
    Postgres,
    /// Neo4j
    Neo4j,
    /// Kafka
    Kafka,
    /// アプリケーションバックエンド
    Backend,
}

impl Role {
    /// インベントリに必須の全ロール
    pub const ALL: [Role; 4] = [Role::Postgres, Role::Neo4j, Role::Kafka, Role::Backend];

    /// インベントリのグループ名
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Neo4j => "neo4j",
            Self::Kafka => "kafka",
            Self::Backend => "backend",
        }
    }

    /// 表示用の名前
    pub fn title(&self) -> &'static str {
        match self {
            Self::Postgres => "Postgres",
            Self::Neo4j => "Neo4J",
            Self::Kafka => "Kafka",
            Self::Backend => "Backend",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("unknown role: {}", s))
    }
}

/// 1台のVMの接続情報とロール
///
/// JSONでは `["ip", "username", "role"]` の3要素配列で表す。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String, Role)", into = "(String, String, Role)")]
pub struct VmSpec {
    pub address: String,
    pub user: String,
    pub role: Role,
}

impl VmSpec {
    pub fn new(address: impl Into<String>, user: impl Into<String>, role: Role) -> Self {
        Self {
            address: address.into(),
            user: user.into(),
            role,
        }
    }
}

impl From<(String, String, Role)> for VmSpec {
    fn from((address, user, role): (String, String, Role)) -> Self {
        Self {
            address,
            user,
            role,
        }
    }
}

impl From<VmSpec> for (String, String, Role) {
    fn from(spec: VmSpec) -> Self {
        (spec.address, spec.user, spec.role)
    }
}

/// VM名 → VmSpec のマッピング
///
/// VM名の順に並ぶ。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VmConfig {
    vms: BTreeMap<String, VmSpec>,
}

impl VmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// `--vm-config` 未指定時に使う4台構成
    pub fn default_config() -> Self {
        let mut config = Self::new();
        config.insert("vm1", VmSpec::new("54.226.239.194", "ubuntu", Role::Postgres));
        config.insert("vm2", VmSpec::new("18.207.127.165", "ubuntu", Role::Neo4j));
        config.insert("vm3", VmSpec::new("3.83.229.79", "ubuntu", Role::Kafka));
        config.insert("vm4", VmSpec::new("54.167.120.93", "ubuntu", Role::Backend));
        config
    }

    /// JSON文字列から読み込む
    ///
    /// 未知のロール名は無視せず、不正な入力として [`DeployError::VmConfigParse`] を返す。
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// JSONファイルから読み込む
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| DeployError::VmConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn insert(&mut self, name: impl Into<String>, spec: VmSpec) -> Option<VmSpec> {
        self.vms.insert(name.into(), spec)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VmSpec)> {
        self.vms.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn len(&self) -> usize {
        self.vms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vms.is_empty()
    }

    /// ロールごとのVMを引く
    ///
    /// 同じロールが複数あれば後勝ち（警告を出す）。
    pub fn by_role(&self) -> BTreeMap<Role, (&str, &VmSpec)> {
        let mut assignments = BTreeMap::new();
        for (name, spec) in self.iter() {
            if let Some((previous, _)) = assignments.insert(spec.role, (name, spec)) {
                tracing::warn!(
                    role = %spec.role,
                    replaced = previous,
                    by = name,
                    "duplicate role assignment, last one wins"
                );
            }
        }
        assignments
    }

    /// 指定ロールのVM
    pub fn host_for(&self, role: Role) -> Result<(&str, &VmSpec)> {
        self.by_role()
            .remove(&role)
            .ok_or(DeployError::MissingRole(role))
    }
}
