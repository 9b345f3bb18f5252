//! HuggingFace model downloader
//!
//! Fetches GGUF files from the HuggingFace Hub into the models directory.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::LocateError;

/// A file reference on the Hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuggingFaceUrl {
    pub repo_id: String,
    pub filename: String,
    pub revision: String,
}

/// Turn a repository path into a flat, portable file name
pub fn sanitize_local_filename(filename: &str) -> Result<String, LocateError> {
    let trimmed = filename.trim();
    let no_query = trimmed.split('?').next().unwrap_or(trimmed);
    let no_fragment = no_query.split('#').next().unwrap_or(no_query);
    let flattened = no_fragment
        .trim_start_matches('/')
        .replace('\\', "/")
        .replace('/', "__");

    let mut sanitized: String = flattened
        .chars()
        .map(|ch| {
            if matches!(ch, '<' | '>' | ':' | '"' | '|' | '?' | '*') || ch.is_control() {
                '_'
            } else {
                ch
            }
        })
        .collect();

    while sanitized.ends_with('.') || sanitized.ends_with(' ') {
        sanitized.pop();
    }

    if sanitized.is_empty() {
        return Err(LocateError::InvalidReference(filename.to_string()));
    }
    Ok(sanitized)
}

impl HuggingFaceUrl {
    /// Parse a Hub reference.
    ///
    /// Accepted forms:
    /// - `https://huggingface.co/owner/repo/blob/<rev>/file.gguf`
    /// - `https://huggingface.co/owner/repo/resolve/<rev>/file.gguf`
    /// - `owner/repo/file.gguf`
    /// - `owner/repo`
    pub fn parse(url: &str) -> Result<Self, LocateError> {
        let url = url.trim();
        let url = url.split('?').next().unwrap_or(url);
        let url = url.split('#').next().unwrap_or(url);
        let invalid = || LocateError::InvalidReference(url.to_string());

        let path = url
            .strip_prefix("https://huggingface.co/")
            .or_else(|| url.strip_prefix("http://huggingface.co/"));

        if let Some(path) = path {
            let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
            if parts.len() < 2 {
                return Err(invalid());
            }
            let repo_id = format!("{}/{}", parts[0], parts[1]);

            if let Some(pos) = parts.iter().position(|&p| p == "blob" || p == "resolve") {
                if parts.len() > pos + 2 {
                    return Ok(Self {
                        repo_id,
                        filename: parts[pos + 2..].join("/"),
                        revision: parts[pos + 1].to_string(),
                    });
                }
            }

            return Ok(Self {
                repo_id,
                filename: String::new(),
                revision: "main".to_string(),
            });
        }

        let parts: Vec<&str> = url.split('/').filter(|p| !p.is_empty()).collect();
        if parts.len() < 2 {
            return Err(invalid());
        }
        Ok(Self {
            repo_id: format!("{}/{}", parts[0], parts[1]),
            filename: parts[2..].join("/"),
            revision: "main".to_string(),
        })
    }

    pub fn download_url(&self) -> String {
        format!(
            "https://huggingface.co/{}/resolve/{}/{}",
            self.repo_id, self.revision, self.filename
        )
    }

    /// Where this file lives once downloaded into `models_dir`
    pub fn local_path(&self, models_dir: &Path) -> Result<PathBuf, LocateError> {
        Ok(models_dir.join(sanitize_local_filename(&self.filename)?))
    }
}

/// Download `reference` into `models_dir`, reporting `(downloaded, total)`
/// bytes. An existing non-empty file is reused without touching the network.
pub async fn download_model(
    reference: &HuggingFaceUrl,
    models_dir: &Path,
    progress: impl FnMut(u64, u64) + Send,
) -> Result<PathBuf, LocateError> {
    let reference = if reference.filename.is_empty() {
        let files = list_gguf_files(&reference.repo_id, &reference.revision).await?;
        match files.as_slice() {
            [] => {
                return Err(LocateError::Download(format!(
                    "no GGUF files found in {}",
                    reference.repo_id
                )))
            }
            [only] => HuggingFaceUrl {
                filename: only.clone(),
                ..reference.clone()
            },
            _ => {
                return Err(LocateError::Download(format!(
                    "multiple GGUF files found, specify one of: {}",
                    files.join(", ")
                )))
            }
        }
    } else {
        reference.clone()
    };

    fs::create_dir_all(models_dir)?;
    let output_path = reference.local_path(models_dir)?;
    let temp_path = output_path.with_extension("gguf.tmp");

    if fs::metadata(&output_path).map(|m| m.len() > 0).unwrap_or(false) {
        tracing::info!("Model already exists: {:?}", output_path);
        return Ok(output_path);
    }

    let download_url = reference.download_url();
    tracing::info!("Downloading from: {}", download_url);
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(3600))
        .build()
        .map_err(|e| LocateError::Download(format!("failed to create HTTP client: {e}")))?;

    let mut response = client
        .get(&download_url)
        .header("User-Agent", concat!("pocketchat/", env!("CARGO_PKG_VERSION")))
        .send()
        .await
        .map_err(|e| LocateError::Download(e.to_string()))?;

    if !response.status().is_success() {
        return Err(LocateError::Download(format!(
            "server answered {}",
            response.status()
        )));
    }

    let total_size = response
        .content_length()
        .ok_or_else(|| LocateError::Download("could not determine file size".to_string()))?;
    tracing::info!("File size: {}", format_size(total_size));

    save_download(&mut response, &temp_path, &output_path, total_size, progress).await?;
    tracing::info!("Download complete: {:?}", output_path);
    Ok(output_path)
}

/// A body that arrives in chunks
#[async_trait]
pub(crate) trait ChunkSource: Send {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, LocateError>;
}

#[async_trait]
impl ChunkSource for reqwest::Response {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, LocateError> {
        self.chunk()
            .await
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .map_err(|e| LocateError::Download(e.to_string()))
    }
}

/// Stream `source` into `temp_path`, then move it to `output_path`. The
/// temporary file is removed when anything goes wrong.
pub(crate) async fn save_download<S: ChunkSource>(
    source: &mut S,
    temp_path: &Path,
    output_path: &Path,
    total_size: u64,
    progress: impl FnMut(u64, u64) + Send,
) -> Result<(), LocateError> {
    let written = match write_chunks(source, temp_path, total_size, progress).await {
        Ok(()) => fs::rename(temp_path, output_path).map_err(LocateError::from),
        Err(e) => Err(e),
    };
    if let Err(e) = &written {
        tracing::warn!("Download failed, removing {:?}: {}", temp_path, e);
        if let Err(cleanup) = tokio::fs::remove_file(temp_path).await {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Could not remove {:?}: {}", temp_path, cleanup);
            }
        }
    }
    written
}

async fn write_chunks<S: ChunkSource>(
    source: &mut S,
    temp_path: &Path,
    total_size: u64,
    mut progress: impl FnMut(u64, u64) + Send,
) -> Result<(), LocateError> {
    let mut temp_file = File::create(temp_path).await?;
    let mut downloaded: u64 = 0;
    progress(0, total_size);
    while let Some(chunk) = source.next_chunk().await? {
        temp_file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        progress(downloaded, total_size);
    }
    temp_file.flush().await?;

    if downloaded != total_size {
        return Err(LocateError::Download(format!(
            "incomplete download: got {downloaded} bytes, expected {total_size}"
        )));
    }
    Ok(())
}

async fn list_gguf_files(repo_id: &str, revision: &str) -> Result<Vec<String>, LocateError> {
    let api_url = format!("https://huggingface.co/api/models/{repo_id}/tree/{revision}");
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(|e| LocateError::Download(format!("failed to create HTTP client: {e}")))?;
    let response = client
        .get(&api_url)
        .send()
        .await
        .map_err(|e| LocateError::Download(format!("failed to fetch repo info: {e}")))?;

    if !response.status().is_success() {
        return Err(LocateError::Download(format!("API error: {}", response.status())));
    }

    let files: Vec<FileInfo> = response
        .json()
        .await
        .map_err(|e| LocateError::Download(format!("failed to parse response: {e}")))?;

    Ok(files
        .into_iter()
        .map(|f| f.path)
        .filter(|p| p.ends_with(".gguf"))
        .collect())
}

#[derive(Debug, serde::Deserialize)]
struct FileInfo {
    path: String,
}

/// Human-readable size string
pub fn format_size(bytes: u64) -> String {
    let bytes = bytes as f64;
    if bytes < 1024.0 {
        format!("{} B", bytes as u64)
    } else if bytes < 1024.0 * 1024.0 {
        format!("{:.2} KB", bytes / 1024.0)
    } else if bytes < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.2} MB", bytes / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes / (1024.0 * 1024.0 * 1024.0))
    }
}
