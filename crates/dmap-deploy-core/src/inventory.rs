//! Ansible インベントリ生成
//!
//! `all.children.<role>.hosts.<vm>` にホストを、`all.vars` に共有変数を置く。
//! キーはすべてソート順で出力する。

use crate::error::{DeployError, Result};
use crate::model::{Role, VmConfig};
use dmap_deploy_config::Settings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub all: InventoryRoot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRoot {
    /// ロール名 → ホストグループ
    pub children: BTreeMap<String, HostGroup>,
    pub vars: InventoryVars,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostGroup {
    /// VM名 → 接続情報
    pub hosts: BTreeMap<String, HostVars>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostVars {
    pub ansible_host: String,
    pub ansible_user: String,
}

/// 全ホスト共通の変数（フィールドはキー順）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryVars {
    pub ansible_ssh_common_args: String,
    pub ansible_ssh_private_key_file: String,
    pub docker_hub_password: String,
    pub docker_hub_username: String,
    pub docker_registry: String,
    pub docker_repo: String,
}

impl InventoryVars {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            ansible_ssh_common_args: settings.ssh.common_args.clone(),
            ansible_ssh_private_key_file: settings.ssh.private_key_file.clone(),
            docker_hub_password: settings.registry.password.ansible_lookup(),
            docker_hub_username: settings.registry.username.ansible_lookup(),
            docker_registry: settings.registry.registry.clone(),
            docker_repo: settings.registry.repository.clone(),
        }
    }
}

impl Inventory {
    /// VM設定からインベントリを組み立てる
    ///
    /// 4ロールのどれかが欠けていれば `MissingRole` で失敗する。
    pub fn build(vm_config: &VmConfig, settings: &Settings) -> Result<Self> {
        let assignments = vm_config.by_role();

        let mut children = BTreeMap::new();
        for role in Role::ALL {
            let (name, spec) = assignments
                .get(&role)
                .ok_or(DeployError::MissingRole(role))?;

            let mut hosts = BTreeMap::new();
            hosts.insert(
                name.to_string(),
                HostVars {
                    ansible_host: spec.address.clone(),
                    ansible_user: spec.user.clone(),
                },
            );
            children.insert(role.as_str().to_string(), HostGroup { hosts });
        }

        Ok(Self {
            all: InventoryRoot {
                children,
                vars: InventoryVars::from_settings(settings),
            },
        })
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// ファイルに書き出す（既存ファイルは上書き）
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let yaml = self.to_yaml()?;
        std::fs::write(path, yaml).map_err(|source| DeployError::InventoryWrite {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Inventory written: {}", path.display());
        Ok(())
    }

    /// ロールに属するホスト
    pub fn hosts(&self, role: Role) -> Option<&BTreeMap<String, HostVars>> {
        self.all.children.get(role.as_str()).map(|group| &group.hosts)
    }

    /// 全ホスト数
    pub fn host_count(&self) -> usize {
        self.all
            .children
            .values()
            .map(|group| group.hosts.len())
            .sum()
    }
}
