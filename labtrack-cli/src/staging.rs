//! Staged workbook uploads
//!
//! Uploaded files are copied into the staging directory under a random token
//! and described by a JSON sidecar. Staged files survive previews; a commit
//! or an explicit sweep removes them.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sidecar metadata for one staged upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedUpload {
    pub token: String,
    pub file_name: String,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: String,
}

pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        StagingArea { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy a workbook into the staging area and return its token
    pub fn stage(
        &self,
        source: &Path,
        mime_type: impl Into<String>,
        uploaded_by: impl Into<String>,
    ) -> Result<StagedUpload> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create staging dir: {}", self.dir.display()))?;

        let file_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_string());
        let Some(file_name) = file_name else {
            bail!("source path has no usable file name: {}", source.display());
        };

        let token = Uuid::new_v4().to_string();
        fs::copy(source, self.payload_path(&token, &file_name)).with_context(|| {
            format!("Failed to copy {} into the staging area", source.display())
        })?;

        let upload = StagedUpload {
            token: token.clone(),
            file_name,
            mime_type: mime_type.into(),
            uploaded_at: Utc::now(),
            uploaded_by: uploaded_by.into(),
        };
        let sidecar = serde_json::to_string_pretty(&upload)?;
        fs::write(self.sidecar_path(&token), sidecar)
            .with_context(|| format!("Failed to write staging sidecar for {}", token))?;
        log::info!("staged {} as {}", upload.file_name, token);
        Ok(upload)
    }

    /// Look up a staged upload; yields the payload path and its metadata
    pub fn open(&self, token: &str) -> Result<(PathBuf, StagedUpload)> {
        let sidecar = self.sidecar_path(token);
        let content = fs::read_to_string(&sidecar)
            .with_context(|| format!("No staged upload with token {}", token))?;
        let upload: StagedUpload = serde_json::from_str(&content)
            .with_context(|| format!("Corrupt staging sidecar for {}", token))?;
        let payload = self.payload_path(token, &upload.file_name);
        if !payload.exists() {
            bail!("staged payload missing for token {}", token);
        }
        Ok((payload, upload))
    }

    /// Remove one staged upload and its sidecar
    pub fn remove(&self, token: &str) -> Result<()> {
        let (payload, _) = self.open(token)?;
        fs::remove_file(&payload)
            .with_context(|| format!("Failed to remove staged payload {}", payload.display()))?;
        fs::remove_file(self.sidecar_path(token))
            .with_context(|| format!("Failed to remove staging sidecar for {}", token))?;
        log::info!("removed staged upload {}", token);
        Ok(())
    }

    /// All staged uploads, oldest first
    pub fn list(&self) -> Result<Vec<StagedUpload>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut uploads = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read staging dir: {}", self.dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<StagedUpload>(&content) {
                Ok(upload) => uploads.push(upload),
                Err(e) => log::warn!("skipping corrupt sidecar {}: {}", path.display(), e),
            }
        }
        uploads.sort_by_key(|u| u.uploaded_at);
        Ok(uploads)
    }

    /// Remove uploads older than the retention window; yields removed tokens
    pub fn sweep(&self, retention_days: u32) -> Result<Vec<String>> {
        let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);
        let mut removed = Vec::new();
        for upload in self.list()? {
            if upload.uploaded_at < cutoff {
                self.remove(&upload.token)?;
                removed.push(upload.token);
            }
        }
        Ok(removed)
    }

    fn sidecar_path(&self, token: &str) -> PathBuf {
        self.dir.join(format!("{}.json", token))
    }

    fn payload_path(&self, token: &str, file_name: &str) -> PathBuf {
        match Path::new(file_name).extension().and_then(|e| e.to_str()) {
            Some(ext) => self.dir.join(format!("{}.{}", token, ext)),
            None => self.dir.join(token.to_string()),
        }
    }
}
