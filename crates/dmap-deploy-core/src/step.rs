//! デプロイの各ステップと進捗ログ
//!
//! 各ステップの開始・結果・所要時間をタイムスタンプ付きで標準出力に出し、
//! 結果を [`DeployReport`] として返す。

use chrono::Local;
use colored::Colorize;
use std::time::{Duration, Instant};

/// デプロイフローのステップ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStep {
    /// コントロールイメージのビルド
    BuildImage,
    /// インベントリ生成
    WriteInventory,
    /// 接続確認
    TestConnectivity,
    /// Docker確認
    CheckRuntime,
    /// Dockerインストール
    InstallRuntime,
    /// デプロイ
    RunDeploy,
    /// 稼働確認
    Verify,
}

impl DeployStep {
    /// ステップの日本語名
    pub fn name(&self) -> &'static str {
        match self {
            Self::BuildImage => "コントロールイメージ準備",
            Self::WriteInventory => "インベントリ生成",
            Self::TestConnectivity => "接続確認",
            Self::CheckRuntime => "Docker確認",
            Self::InstallRuntime => "Dockerセットアップ",
            Self::RunDeploy => "サービスデプロイ",
            Self::Verify => "稼働確認",
        }
    }

    /// ステップのID
    pub fn id(&self) -> &'static str {
        match self {
            Self::BuildImage => "build-image",
            Self::WriteInventory => "inventory",
            Self::TestConnectivity => "connectivity",
            Self::CheckRuntime => "check-docker",
            Self::InstallRuntime => "setup-docker",
            Self::RunDeploy => "deploy",
            Self::Verify => "verify",
        }
    }
}

/// ステップの実行結果
#[derive(Debug, Clone)]
pub enum StepResult {
    /// 成功
    Success {
        duration: Duration,
        message: Option<String>,
    },
    /// スキップ（設定による省略、既に完了済み等）
    Skipped { reason: String },
    /// 失敗
    Failed { error: String, duration: Duration },
}

impl StepResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Skipped { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    pub fn duration(&self) -> Option<Duration> {
        match self {
            Self::Success { duration, .. } => Some(*duration),
            Self::Failed { duration, .. } => Some(*duration),
            Self::Skipped { .. } => None,
        }
    }
}

/// フロー全体の結果
#[derive(Debug, Clone)]
pub struct DeployReport {
    pub steps: Vec<(DeployStep, StepResult)>,
    pub total: Duration,
}

impl DeployReport {
    /// 全ステップが成功（またはスキップ）したか
    pub fn is_success(&self) -> bool {
        self.steps.iter().all(|(_, result)| result.is_success())
    }

    /// 実行順のステップ
    pub fn step_ids(&self) -> Vec<&'static str> {
        self.steps.iter().map(|(step, _)| step.id()).collect()
    }

    pub fn result(&self, step: DeployStep) -> Option<&StepResult> {
        self.steps
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, result)| result)
    }

    /// 失敗したステップ
    pub fn failed_step(&self) -> Option<DeployStep> {
        self.steps
            .iter()
            .find(|(_, result)| matches!(result, StepResult::Failed { .. }))
            .map(|(step, _)| *step)
    }
}

/// ステップログ出力器
pub struct StepLogger {
    start_time: Instant,
    step_results: Vec<(DeployStep, StepResult)>,
    current_step: Option<(DeployStep, Instant)>,
}

impl StepLogger {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            step_results: Vec::new(),
            current_step: None,
        }
    }

    /// ステップ開始をログ出力
    pub fn start_step(&mut self, step: DeployStep) {
        println!("[{}] {} {}", timestamp().dimmed(), "▶".cyan(), step.name());
        self.current_step = Some((step, Instant::now()));
    }

    /// ステップ成功をログ出力
    pub fn step_success(&mut self, message: Option<&str>) {
        if let Some((step, start)) = self.current_step.take() {
            let duration = start.elapsed();
            let duration_str = format_duration(duration);

            if let Some(msg) = message {
                println!(
                    "[{}] {} {} ({})",
                    timestamp().dimmed(),
                    "✓".green().bold(),
                    msg,
                    duration_str.dimmed()
                );
            } else {
                println!(
                    "[{}] {} {} 完了 ({})",
                    timestamp().dimmed(),
                    "✓".green().bold(),
                    step.name(),
                    duration_str.dimmed()
                );
            }

            self.step_results.push((
                step,
                StepResult::Success {
                    duration,
                    message: message.map(String::from),
                },
            ));
        }
    }

    /// ステップスキップをログ出力
    pub fn step_skipped(&mut self, reason: &str) {
        if let Some((step, _)) = self.current_step.take() {
            println!(
                "[{}] {} {} ({})",
                timestamp().dimmed(),
                "⏭".yellow(),
                step.name(),
                reason.dimmed()
            );

            self.step_results.push((
                step,
                StepResult::Skipped {
                    reason: reason.to_string(),
                },
            ));
        }
    }

    /// 開始せずにスキップしたステップを記録
    pub fn skip(&mut self, step: DeployStep, reason: &str) {
        self.start_step(step);
        self.step_skipped(reason);
    }

    /// ステップ失敗をログ出力
    pub fn step_failed(&mut self, error: &str) {
        if let Some((step, start)) = self.current_step.take() {
            let duration = start.elapsed();

            println!(
                "[{}] {} {}: {}",
                timestamp().dimmed(),
                "✗".red().bold(),
                step.name(),
                error.red()
            );

            self.step_results.push((
                step,
                StepResult::Failed {
                    error: error.to_string(),
                    duration,
                },
            ));
        }
    }

    /// 警告をログ出力
    pub fn log_warning(&self, message: &str) {
        println!(
            "[{}] {} {}",
            timestamp().dimmed(),
            "⚠".yellow(),
            message.yellow()
        );
    }

    /// 詳細メッセージをログ出力
    pub fn log_detail(&self, message: &str) {
        println!("[{}]   → {}", timestamp().dimmed(), message.cyan());
    }

    /// サマリーを出力
    pub fn print_summary(&self, title: &str) {
        let total_duration = self.start_time.elapsed();

        let error_count = self
            .step_results
            .iter()
            .filter(|(_, result)| matches!(result, StepResult::Failed { .. }))
            .count();

        let skipped_count = self
            .step_results
            .iter()
            .filter(|(_, result)| result.is_skipped())
            .count();

        let slowest_step = self
            .step_results
            .iter()
            .filter_map(|(step, result)| result.duration().map(|d| (step, d)))
            .max_by_key(|(_, d)| *d);

        println!();
        println!("{}", "═".repeat(44));
        println!("Summary: {}", title.cyan().bold());
        println!("{}", "─".repeat(44));
        println!("Total time:    {}", format_duration(total_duration).green());

        if let Some((step, duration)) = slowest_step {
            println!(
                "Slowest step:  {} ({})",
                step.name(),
                format_duration(duration)
            );
        }

        println!("Skipped:       {}", skipped_count);

        if error_count > 0 {
            println!("Errors:        {}", error_count.to_string().red().bold());
        } else {
            println!("Errors:        {}", "0".green());
        }
        println!("{}", "═".repeat(44));
    }

    /// 全ステップが成功したか
    pub fn all_success(&self) -> bool {
        self.step_results
            .iter()
            .all(|(_, result)| result.is_success())
    }

    /// 結果を確定する
    pub fn finish(self) -> DeployReport {
        DeployReport {
            steps: self.step_results,
            total: self.start_time.elapsed(),
        }
    }
}

impl Default for StepLogger {
    fn default() -> Self {
        Self::new()
    }
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Duration を読みやすい形式にフォーマット
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        let minutes = total_secs / 60;
        let secs = total_secs % 60;
        format!("{}m {}s", minutes, secs)
    } else if total_secs >= 1 {
        format!("{}.{}s", total_secs, millis / 100)
    } else {
        format!("{}ms", millis)
    }
}
