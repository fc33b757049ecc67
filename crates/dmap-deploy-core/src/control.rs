//! Control-container command builder
//!
//! Builds the container-engine command lines used by the deployer: the
//! control-image query and build, and `run` invocations that execute Ansible
//! inside a throwaway control container with the workspace and SSH keys mounted.

use crate::runner::CommandSpec;
use dmap_deploy_config::Settings;

/// Workspace mount point inside the control container
pub const CONTAINER_WORKDIR: &str = "/ansible";
/// Read-only SSH mount point inside the control container
pub const CONTAINER_SSH_MOUNT: &str = "/tmp/ssh";

/// Copies the read-only SSH mount into root's home with sane permissions.
/// Failures are tolerated so Ansible still gets to report the real problem.
const SSH_PRELUDE: &str = "{ cp -r /tmp/ssh /root/.ssh && chmod 700 /root/.ssh && chmod 600 /root/.ssh/*; } 2>/dev/null || true";

/// Shell command run by the runtime availability check on every host
pub const RUNTIME_CHECK: &str = "docker --version && docker compose version";

/// Listing shown by the manual verification step
///
/// Ansible templates ad-hoc arguments with Jinja, so the Go template is kept raw.
pub const CONTAINER_LISTING: &str =
    "{% raw %}docker ps --format 'table {{.Names}}\\t{{.Status}}\\t{{.Ports}}'{% endraw %}";

/// Command builder bound to resolved settings
#[derive(Debug, Clone)]
pub struct ControlCommands<'a> {
    settings: &'a Settings,
}

impl<'a> ControlCommands<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// `<engine> images -q <image>`
    pub fn image_query(&self) -> CommandSpec {
        CommandSpec::new(&self.settings.container_engine)
            .args(["images", "-q"])
            .arg(&self.settings.control_image)
            .captured()
    }

    /// `<engine> build -t <image> .` in the workspace
    pub fn image_build(&self) -> CommandSpec {
        CommandSpec::new(&self.settings.container_engine)
            .args(["build", "-t"])
            .arg(&self.settings.control_image)
            .arg(".")
            .current_dir(&self.settings.workspace_dir)
    }

    /// `ansible all -m ping`
    pub fn ping(&self) -> CommandSpec {
        self.ansible_adhoc("-m ping").captured()
    }

    /// Runtime version probe against all hosts
    pub fn runtime_check(&self) -> CommandSpec {
        self.ansible_adhoc(&format!("-m shell -a \"{}\"", RUNTIME_CHECK))
    }

    /// `ansible-playbook` with the runtime installation playbook
    pub fn runtime_install(&self) -> CommandSpec {
        self.playbook(&self.settings.runtime_playbook)
    }

    /// `ansible-playbook` with the deployment playbook
    pub fn deploy(&self) -> CommandSpec {
        self.playbook(&self.settings.deploy_playbook)
    }

    /// Running containers on every host
    pub fn verify(&self) -> CommandSpec {
        self.ansible_adhoc(&format!("-a \"{}\"", CONTAINER_LISTING))
    }

    fn ansible_adhoc(&self, module_args: &str) -> CommandSpec {
        self.in_control_container(&format!(
            "ansible all -i {} {}",
            self.settings.inventory_file, module_args
        ))
    }

    fn playbook(&self, playbook: &str) -> CommandSpec {
        self.in_control_container(&format!(
            "ansible-playbook -i {} {}",
            self.settings.inventory_file, playbook
        ))
    }

    /// Wraps a shell command in a disposable control-container run
    fn in_control_container(&self, script: &str) -> CommandSpec {
        let settings = self.settings;
        let mut cmd = CommandSpec::new(&settings.container_engine).arg("run");

        if settings.interactive {
            cmd = cmd.args(["-i", "-t"]);
        }

        cmd = cmd
            .arg("--rm")
            .arg("-v")
            .arg(format!(
                "{}:{}",
                settings.workspace_dir.display(),
                CONTAINER_WORKDIR
            ))
            .arg("-v")
            .arg(format!(
                "{}:{}:ro",
                settings.ssh_dir.display(),
                CONTAINER_SSH_MOUNT
            ))
            .args(["-w", CONTAINER_WORKDIR, "--user", "root"]);

        // lookup('env', ...) はコンテナ内で評価されるので、設定済みの認証情報だけ引き継ぐ
        for var in [&settings.registry.username, &settings.registry.password] {
            if var.is_set() {
                cmd = cmd.arg("-e").arg(&var.env);
            }
        }

        cmd.arg(&settings.control_image)
            .args(["bash", "-c"])
            .arg(format!("{} && {}", SSH_PRELUDE, script))
            .current_dir(&settings.workspace_dir)
    }
}
