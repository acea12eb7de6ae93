//! Fetching and unpacking test resources into a scratch workspace.

use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use tar::Archive;

use crate::core::error::RecipeError;
use crate::core::recipe::{ArchiveKind, ResourceDescriptor};
use crate::util::config::Config;
use crate::util::hash::verify_sha256;
use crate::util::process::{find_executable, CommandRunner, ProcessBuilder};

/// Default network timeout for resource downloads.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Retrieves the raw bytes behind a URL.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches over HTTP(S) with `reqwest`, and reads `file://` URLs from disk.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    timeout: Duration,
    offline: bool,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        HttpFetcher {
            timeout: DEFAULT_FETCH_TIMEOUT,
            offline: false,
        }
    }
}

impl HttpFetcher {
    pub fn from_config(config: &Config) -> Self {
        HttpFetcher {
            timeout: config
                .net
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_FETCH_TIMEOUT),
            offline: config.net.offline.unwrap_or(false),
        }
    }

    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let parsed = url::Url::parse(url).with_context(|| format!("invalid URL: {}", url))?;

        if parsed.scheme() == "file" {
            let path = parsed
                .to_file_path()
                .map_err(|_| anyhow::anyhow!("invalid file URL: {}", url))?;
            return std::fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()));
        }

        if self.offline {
            bail!("cannot download {} in offline mode", url);
        }

        tracing::info!("Fetching {}", url);
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .context("failed to create HTTP client")?;

        let response = client
            .get(url)
            .send()
            .with_context(|| format!("failed to download {}", url))?;

        if !response.status().is_success() {
            bail!("failed to download {}: HTTP {}", url, response.status());
        }

        let bytes = response
            .bytes()
            .with_context(|| format!("failed to read response body from {}", url))?;
        Ok(bytes.to_vec())
    }
}

/// A resource unpacked into the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPath {
    pub resource: String,
    /// Directory holding the unpacked contents; checks run here
    pub dir: PathBuf,
}

/// Fetches, verifies and unpacks resources.
pub struct ResourceStager<'a> {
    fetcher: &'a dyn Fetcher,
    runner: &'a dyn CommandRunner,
    timeout: Option<Duration>,
}

impl<'a> ResourceStager<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, runner: &'a dyn CommandRunner) -> Self {
        ResourceStager {
            fetcher,
            runner,
            timeout: None,
        }
    }

    /// Timeout for external extraction tools.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Stage `resource` under `workspace/<name>`.
    pub fn stage(
        &self,
        resource: &ResourceDescriptor,
        workspace: &Path,
    ) -> Result<StagedPath, RecipeError> {
        self.stage_inner(resource, workspace)
            .map_err(|e| RecipeError::ResourceStagingFailure {
                resource: resource.name.clone(),
                message: format!("{:#}", e),
            })
    }

    fn stage_inner(&self, resource: &ResourceDescriptor, workspace: &Path) -> Result<StagedPath> {
        if !is_plain_name(&resource.name) {
            bail!("resource name `{}` would leave the workspace", resource.name);
        }
        if resource.archive_kind() != ArchiveKind::TarGz && !is_plain_name(resource.file_name()) {
            bail!("file name `{}` would leave the workspace", resource.file_name());
        }

        let data = self.fetcher.fetch(&resource.url)?;
        verify_sha256(&data, &resource.sha256)
            .with_context(|| format!("while verifying {}", resource.url))?;
        tracing::debug!("resource `{}` verified ({} bytes)", resource.name, data.len());

        let dir = workspace.join(&resource.name);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        match resource.archive_kind() {
            ArchiveKind::TarGz => extract_tar_gz(&data, &dir, resource.strip_prefix.as_deref())?,
            ArchiveKind::Zip => self.extract_zip(&data, resource.file_name(), workspace, &dir)?,
            ArchiveKind::Raw => {
                let dest = dir.join(resource.file_name());
                std::fs::write(&dest, &data)
                    .with_context(|| format!("failed to write {}", dest.display()))?;
            }
        }

        tracing::info!("Staged {} into {}", resource.name, dir.display());
        Ok(StagedPath {
            resource: resource.name.clone(),
            dir,
        })
    }

    fn extract_zip(&self, data: &[u8], file_name: &str, workspace: &Path, dest: &Path) -> Result<()> {
        let unzip = find_executable("unzip").context("`unzip` not found in PATH")?;

        let downloads = workspace.join(".downloads");
        std::fs::create_dir_all(&downloads)?;
        let archive = downloads.join(file_name);
        std::fs::write(&archive, data)
            .with_context(|| format!("failed to write {}", archive.display()))?;

        let cmd = ProcessBuilder::new(unzip)
            .args(["-o", "-q"])
            .arg(&archive)
            .arg("-d")
            .arg(dest);
        let output = self.runner.run(&cmd, self.timeout)?;
        if !output.success() {
            bail!("unzip failed: {}", output.combined().trim());
        }
        Ok(())
    }
}

/// Extract a gzipped tarball into `dest`, optionally dropping a leading
/// directory. Entries that would land outside `dest` are an error.
pub fn extract_tar_gz(data: &[u8], dest: &Path, strip_prefix: Option<&str>) -> Result<()> {
    let mut archive = Archive::new(GzDecoder::new(Cursor::new(data)));
    std::fs::create_dir_all(dest)
        .with_context(|| format!("failed to create {}", dest.display()))?;

    for entry in archive.entries().context("failed to read archive entries")? {
        let mut entry = entry.context("failed to read archive entry")?;
        let path = entry.path().context("invalid entry path")?.into_owned();

        let relative = match strip_prefix {
            Some(prefix) => match path.strip_prefix(prefix.trim_end_matches('/')) {
                Ok(rest) => rest.to_path_buf(),
                Err(_) => path.clone(),
            },
            None => path.clone(),
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        if !is_contained(&relative) {
            bail!("archive entry escapes the workspace: {}", path.display());
        }

        let out = dest.join(&relative);
        match entry.header().entry_type() {
            tar::EntryType::Directory => {
                std::fs::create_dir_all(&out)
                    .with_context(|| format!("failed to create {}", out.display()))?;
            }
            tar::EntryType::Regular | tar::EntryType::Continuous => {
                if let Some(parent) = out.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                entry
                    .unpack(&out)
                    .with_context(|| format!("failed to extract {}", out.display()))?;
            }
            other => {
                tracing::debug!("skipping {:?} entry {}", other, path.display());
            }
        }
    }

    Ok(())
}

/// A relative path with no parent or root components.
fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// A single path component that stays inside whatever it is joined to.
fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    !name.contains('\\')
        && matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none()
}
