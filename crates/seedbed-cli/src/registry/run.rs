use std::fs::create_dir_all;
use std::path::PathBuf;
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;

use seedbed_generate::{DatasetReport, UploadReport, write_json_atomic};

use super::RegistryResult;

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub out_dir: PathBuf,
    pub plan_path: PathBuf,
    pub catalog_path: Option<PathBuf>,
    pub seed: Option<u64>,
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
pub struct RunConfig {
    pub run_id: String,
    pub started_at: String,
    pub plan: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub records_dir: PathBuf,
    pub logs_path: PathBuf,
    pub dataset_report_path: PathBuf,
    pub upload_report_path: PathBuf,
}

/// Create `<out>/<timestamp>__run_<id>/` and write its `config.json`.
pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let root = ctx.out_dir.join(format!("{timestamp}__run_{}", ctx.run_id));
    let records_dir = root.join("records");
    create_dir_all(&records_dir)?;

    let config = RunConfig {
        run_id: ctx.run_id.clone(),
        started_at: ctx.started_at.to_rfc3339(),
        plan: ctx.plan_path.display().to_string(),
        catalog: ctx
            .catalog_path
            .as_ref()
            .map(|path| path.display().to_string()),
        seed: ctx.seed,
        git: collect_git_info(),
    };
    write_json_atomic(&root.join("config.json"), &config)?;

    Ok(RunPaths {
        logs_path: root.join("logs.ndjson"),
        dataset_report_path: root.join("dataset_report.json"),
        upload_report_path: root.join("upload_report.json"),
        records_dir,
        root,
    })
}

pub fn write_reports(
    paths: &RunPaths,
    dataset: &DatasetReport,
    upload: &UploadReport,
) -> RegistryResult<()> {
    write_json_atomic(&paths.dataset_report_path, dataset)?;
    write_json_atomic(&paths.upload_report_path, upload)?;
    Ok(())
}

pub fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                None
            }
        })
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}
