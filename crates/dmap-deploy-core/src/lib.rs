//! DMAP deployment orchestration
//!
//! Renders an Ansible inventory from a VM-to-role mapping and drives Ansible
//! inside a disposable control container: connectivity check, Docker
//! availability check and installation, and the deployment playbook.
//!
//! # Example
//!
//! ```ignore
//! use dmap_deploy_core::{VmConfig, deploy_application};
//!
//! let vm_config = VmConfig::load("vms.json".as_ref())?;
//! if !deploy_application(&vm_config).await {
//!     eprintln!("deployment failed");
//! }
//! ```

pub mod control;
pub mod deployer;
pub mod error;
pub mod inventory;
pub mod model;
pub mod runner;
pub mod step;

pub use control::ControlCommands;
pub use deployer::{DeployOptions, Deployer, ImageStatus, deploy_application};
pub use error::{DeployError, Result};
pub use inventory::Inventory;
pub use model::{Role, VmConfig, VmSpec};
pub use runner::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
pub use step::{DeployReport, DeployStep, StepResult};
