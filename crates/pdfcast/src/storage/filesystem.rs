use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::StorageError;
use crate::job::{Job, JobId};

/// Filesystem layout for uploads, per-job intermediates and finished videos.
///
/// Every path is derived from the job identifier, so the locations are known
/// before any stage runs and never change afterwards.
#[derive(Debug, Clone)]
pub struct ArtifactStorage {
    upload_directory: PathBuf,
    work_directory: PathBuf,
    output_directory: PathBuf,
    video_base_url: String,
}

impl ArtifactStorage {
    pub fn new<P: AsRef<Path>>(
        upload_directory: P,
        work_directory: P,
        output_directory: P,
        video_base_url: impl Into<String>,
    ) -> Self {
        Self {
            upload_directory: upload_directory.as_ref().to_path_buf(),
            work_directory: work_directory.as_ref().to_path_buf(),
            output_directory: output_directory.as_ref().to_path_buf(),
            video_base_url: video_base_url.into(),
        }
    }

    pub fn upload_directory(&self) -> &Path {
        &self.upload_directory
    }

    pub fn work_directory(&self) -> &Path {
        &self.work_directory
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    /// Creates the three root directories if they are missing.
    pub fn ensure_directories(&self) -> Result<(), StorageError> {
        for dir in [
            &self.upload_directory,
            &self.work_directory,
            &self.output_directory,
        ] {
            std::fs::create_dir_all(dir).map_err(|e| StorageError::CreateDirectory {
                path: dir.clone(),
                source: e,
            })?;
        }
        Ok(())
    }

    pub fn upload_path(&self, job_id: &JobId) -> PathBuf {
        self.upload_directory.join(format!("{}.pdf", job_id))
    }

    pub fn job_work_dir(&self, job_id: &JobId) -> PathBuf {
        self.work_directory.join(job_id.as_str())
    }

    /// Where the render stage writes the finished video.
    pub fn video_path(&self, job_id: &JobId) -> PathBuf {
        self.output_directory.join(format!("{}.mp4", job_id))
    }

    /// Public URL of the finished video. Depends only on the job id.
    pub fn public_url(&self, job_id: &JobId) -> String {
        format!(
            "{}/{}.mp4",
            self.video_base_url.trim_end_matches('/'),
            job_id
        )
    }

    /// Persists uploaded bytes under the job's name. The file is created
    /// exclusively, so an identifier is never written twice.
    pub async fn store_upload(&self, job_id: &JobId, content: &[u8]) -> Result<PathBuf, StorageError> {
        tokio::fs::create_dir_all(&self.upload_directory)
            .await
            .map_err(|e| StorageError::CreateDirectory {
                path: self.upload_directory.clone(),
                source: e,
            })?;

        let path = self.upload_path(job_id);
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| StorageError::WriteFile {
                path: path.clone(),
                source: e,
            })?;

        file.write_all(content)
            .await
            .map_err(|e| StorageError::WriteFile {
                path: path.clone(),
                source: e,
            })?;
        file.flush().await.map_err(|e| StorageError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        log::debug!("Stored upload for job {} ({} bytes)", job_id, content.len());
        Ok(path)
    }

    /// Creates the scratch directory for a job's intermediate artifacts.
    pub async fn prepare_work_dir(&self, job_id: &JobId) -> Result<PathBuf, StorageError> {
        let dir = self.job_work_dir(job_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::CreateDirectory {
                path: dir.clone(),
                source: e,
            })?;
        tokio::fs::create_dir_all(&self.output_directory)
            .await
            .map_err(|e| StorageError::CreateDirectory {
                path: self.output_directory.clone(),
                source: e,
            })?;
        Ok(dir)
    }

    /// Deletes every file belonging to a job. Missing files are ignored.
    pub async fn remove_job_artifacts(&self, job: &Job) -> Result<(), StorageError> {
        remove_file_if_exists(&job.input_ref.path()).await?;
        remove_file_if_exists(&self.video_path(&job.id)).await?;

        let work_dir = self.job_work_dir(&job.id);
        match tokio::fs::remove_dir_all(&work_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(StorageError::Remove {
                    path: work_dir,
                    source: e,
                })
            }
        }

        log::debug!("Removed artifacts of job {}", job.id);
        Ok(())
    }
}

async fn remove_file_if_exists(path: &Path) -> Result<(), StorageError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::Remove {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ArtifactKind, ArtifactRef};
    use tempfile::TempDir;

    fn storage(root: &Path) -> ArtifactStorage {
        ArtifactStorage::new(
            root.join("input"),
            root.join("work"),
            root.join("output"),
            "/videos",
        )
    }

    #[test]
    fn test_paths_derive_from_job_id() {
        let storage = ArtifactStorage::new("/in", "/work", "/out", "/videos/");
        let id = JobId::from("abc");
        assert_eq!(storage.upload_path(&id), PathBuf::from("/in/abc.pdf"));
        assert_eq!(storage.job_work_dir(&id), PathBuf::from("/work/abc"));
        assert_eq!(storage.video_path(&id), PathBuf::from("/out/abc.mp4"));
        assert_eq!(storage.public_url(&id), "/videos/abc.mp4");
    }

    #[test]
    fn test_ensure_directories() {
        let temp = TempDir::new().unwrap();
        let storage = storage(temp.path());
        storage.ensure_directories().unwrap();
        assert!(temp.path().join("input").is_dir());
        assert!(temp.path().join("work").is_dir());
        assert!(temp.path().join("output").is_dir());
    }

    #[tokio::test]
    async fn test_store_upload_writes_bytes() {
        let temp = TempDir::new().unwrap();
        let storage = storage(temp.path());
        let id = JobId::from("job-1");

        let path = storage.store_upload(&id, b"%PDF-1.7 body").await.unwrap();
        assert_eq!(path, temp.path().join("input/job-1.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7 body");
    }

    #[tokio::test]
    async fn test_store_upload_never_overwrites() {
        let temp = TempDir::new().unwrap();
        let storage = storage(temp.path());
        let id = JobId::from("job-1");

        storage.store_upload(&id, b"%PDF first").await.unwrap();
        let err = storage.store_upload(&id, b"%PDF second").await.unwrap_err();
        assert!(matches!(err, StorageError::WriteFile { .. }));
        assert_eq!(
            std::fs::read(storage.upload_path(&id)).unwrap(),
            b"%PDF first"
        );
    }

    #[tokio::test]
    async fn test_remove_job_artifacts() {
        let temp = TempDir::new().unwrap();
        let storage = storage(temp.path());
        let id = JobId::from("job-9");

        let upload = storage.store_upload(&id, b"%PDF").await.unwrap();
        let work = storage.prepare_work_dir(&id).await.unwrap();
        std::fs::write(work.join("summary.txt"), "text").unwrap();
        std::fs::write(storage.video_path(&id), "video").unwrap();

        let job = Job::new(id.clone(), ArtifactRef::from_path(ArtifactKind::Document, &upload));
        storage.remove_job_artifacts(&job).await.unwrap();

        assert!(!upload.exists());
        assert!(!work.exists());
        assert!(!storage.video_path(&id).exists());

        // A second removal finds nothing and still succeeds.
        storage.remove_job_artifacts(&job).await.unwrap();
    }
}
