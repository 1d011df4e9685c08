//! JSON run artifact writer, modeled on the audit logger's directory and
//! "save after every mutation" discipline: a run's artifact is never left
//! half-written, and a missing run is a caller error, not a silent no-op.

use crate::history::Operation;
use crate::verdict::ExitVerdict;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunArtifact {
    pub run_id: Uuid,
    pub test_run_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub history: Vec<Operation>,
    pub verdict: ExitVerdict,
}

pub struct ArtifactWriter {
    artifact_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
        Self { artifact_dir: artifact_dir.into() }
    }

    /// Write one run's complete history and verdict as a single JSON file
    /// named by its run id. Creates the artifact directory if missing.
    pub fn write_run(&self, run: &RunArtifact) -> Result<PathBuf> {
        fs::create_dir_all(&self.artifact_dir).context("failed to create artifact directory")?;
        let path = self.artifact_dir.join(format!("{}.json", run.run_id));
        let json = serde_json::to_string_pretty(run).context("failed to serialize run artifact")?;
        fs::write(&path, json).with_context(|| format!("failed to write run artifact to {}", path.display()))?;
        Ok(path)
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkers::PipelineVerdict;
    use crate::verdict::VerdictStatus;

    #[test]
    fn write_run_creates_a_readable_json_file() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(tmp.path());
        let run = RunArtifact {
            run_id: Uuid::new_v4(),
            test_run_id: "t1".to_string(),
            started_at: Utc::now(),
            ended_at: Utc::now(),
            history: Vec::new(),
            verdict: ExitVerdict::from_pipeline(PipelineVerdict { pass: true, outcomes: vec![] }, 0, 0, false),
        };

        let path = writer.write_run(&run).unwrap();
        let loaded: RunArtifact = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(loaded.test_run_id, "t1");
        assert_eq!(loaded.verdict.status, VerdictStatus::Pass);
    }
}
