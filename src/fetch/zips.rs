// src/fetch/zips.rs

use anyhow::{Context, Result};
use reqwest::Client;
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs,
    sync::{mpsc, Semaphore},
    time::Instant,
};
use tracing::{debug, error, info, instrument, warn};
use url::Url;
use zip::{write::FileOptions, CompressionMethod, ZipArchive, ZipWriter};

use super::quarters::ArchiveLocation;
use crate::config::Workspace;
use crate::error::RetrievalError;

/// Last path segment of `url`, or `fallback` when it has none.
fn file_name_of<'a>(url: &'a Url, fallback: &'a str) -> &'a str {
    url.path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
        .unwrap_or(fallback)
}

/// `path` with `suffix` appended to its file name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// GET `url` into `dest` through a `.part` sibling that is renamed on success.
async fn fetch_to(client: &Client, url: &Url, dest: &Path) -> Result<(), RetrievalError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| RetrievalError::io(parent, e))?;
    }

    let download = |source| RetrievalError::Download {
        url: url.to_string(),
        source,
    };
    let resp = client.get(url.clone()).send().await.map_err(download)?;
    let status = resp.status();
    if !status.is_success() {
        return Err(RetrievalError::Status {
            url: url.to_string(),
            status,
        });
    }
    let bytes = resp.bytes().await.map_err(download)?;

    let part = sibling(dest, ".part");
    if let Err(e) = fs::write(&part, &bytes).await {
        let _ = fs::remove_file(&part).await;
        return Err(RetrievalError::io(&part, e));
    }
    fs::rename(&part, dest)
        .await
        .map_err(|e| RetrievalError::io(dest, e))?;
    debug!(%url, bytes = bytes.len(), path = %dest.display(), "saved");
    Ok(())
}

/// Download the archive at `url` into `dest_dir`, keeping its file name.
/// An archive already present is reused without a request.
pub async fn download_archive(
    client: &Client,
    url: &Url,
    dest_dir: impl AsRef<Path>,
) -> Result<PathBuf, RetrievalError> {
    let dest = dest_dir.as_ref().join(file_name_of(url, "download.zip"));
    if fs::try_exists(&dest).await.unwrap_or(false) {
        info!(path = %dest.display(), "archive already downloaded");
        return Ok(dest);
    }
    fetch_to(client, url, &dest).await?;
    Ok(dest)
}

/// Download `url` to exactly `dest`, replacing any previous copy.
pub async fn download_file(
    client: &Client,
    url: &Url,
    dest: impl AsRef<Path>,
) -> Result<PathBuf, RetrievalError> {
    let dest = dest.as_ref().to_path_buf();
    fetch_to(client, url, &dest).await?;
    Ok(dest)
}

/// Unpack every file entry of `zip_path` into `target_dir`, replacing
/// whatever was there before.
///
/// Entries are written to a `<target>.partial` sibling that is renamed into
/// place once the whole archive is out; on failure it is removed, so
/// `target_dir` only ever holds a complete extraction. Entries whose names
/// would land outside the folder are skipped.
#[instrument(level = "debug", skip_all, fields(path = %zip_path.as_ref().display()))]
pub fn extract_archive(
    zip_path: impl AsRef<Path>,
    target_dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>, RetrievalError> {
    let zip_path = zip_path.as_ref();
    let target_dir = target_dir.as_ref();
    let staging = sibling(target_dir, ".partial");
    if staging.exists() {
        std::fs::remove_dir_all(&staging).map_err(|e| RetrievalError::io(&staging, e))?;
    }

    let relative = match unpack(zip_path, &staging) {
        Ok(files) => files,
        Err(e) => {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(e);
        }
    };

    if target_dir.exists() {
        std::fs::remove_dir_all(target_dir).map_err(|e| RetrievalError::io(target_dir, e))?;
    }
    std::fs::rename(&staging, target_dir).map_err(|e| RetrievalError::io(target_dir, e))?;
    debug!(files = relative.len(), "extracted");
    Ok(relative.into_iter().map(|r| target_dir.join(r)).collect())
}

/// Write every safe entry below `dest`; returns entry paths relative to it.
fn unpack(zip_path: &Path, dest: &Path) -> Result<Vec<PathBuf>, RetrievalError> {
    let zip_err = |source| RetrievalError::Extract {
        path: zip_path.to_path_buf(),
        source,
    };

    let file = File::open(zip_path).map_err(|e| RetrievalError::io(zip_path, e))?;
    let mut archive = ZipArchive::new(file).map_err(zip_err)?;
    std::fs::create_dir_all(dest).map_err(|e| RetrievalError::io(dest, e))?;

    let mut written = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(zip_err)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "skipping entry outside extraction folder");
            continue;
        };
        let out_path = dest.join(&relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| RetrievalError::io(&out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RetrievalError::io(parent, e))?;
        }
        let mut out =
            BufWriter::new(File::create(&out_path).map_err(|e| RetrievalError::io(&out_path, e))?);
        io::copy(&mut entry, &mut out).map_err(|e| RetrievalError::io(&out_path, e))?;
        out.flush().map_err(|e| RetrievalError::io(&out_path, e))?;
        written.push(relative);
    }
    Ok(written)
}

/// Download and extract every archive, at most `concurrency` downloads at a
/// time. Each archive lands in `compress/` and unpacks into
/// `extract/<archive stem>/`. Failures are logged and skipped.
///
/// Returns the extraction folders of the archives that were fully unpacked
/// in this call, sorted. Anything else under `extract/` is not part of the
/// run.
#[instrument(level = "info", skip_all, fields(archives = archives.len()))]
pub async fn retrieve_all(
    client: &Client,
    base: &Url,
    archives: &[ArchiveLocation],
    workspace: &Workspace,
    concurrency: usize,
) -> Vec<PathBuf> {
    let (tx, mut rx) = mpsc::channel::<Result<PathBuf, (String, RetrievalError)>>(100);
    let sem = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(archives.len());

    for loc in archives {
        let url = match loc.url(base) {
            Ok(u) => u,
            Err(e) => {
                error!(archive = %loc.relative_path(), error = %e, "skipping archive");
                continue;
            }
        };
        let client = client.clone();
        let dest_dir = workspace.compress_dir();
        let tx = tx.clone();
        let sem = sem.clone();

        handles.push(tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            info!(%url, "downloading");
            let start = Instant::now();
            let msg = match download_archive(&client, &url, &dest_dir).await {
                Ok(path) => {
                    info!(%url, elapsed = ?start.elapsed(), "downloaded");
                    Ok(path)
                }
                Err(e) => Err((url.to_string(), e)),
            };
            let _ = tx.send(msg).await;
        }));
    }
    // the loop ends once every task has dropped its sender
    drop(tx);

    let mut extracted = Vec::new();
    while let Some(msg) = rx.recv().await {
        let zip_path = match msg {
            Ok(path) => path,
            Err((url, e)) => {
                error!(%url, error = %e, "download failed");
                continue;
            }
        };
        let name = zip_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let stem = zip_path
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_default();
        let target = workspace.extract_dir().join(stem);

        let job = tokio::task::spawn_blocking({
            let zip_path = zip_path.clone();
            let target = target.clone();
            move || extract_archive(&zip_path, &target)
        });
        match job.await {
            Ok(Ok(files)) => {
                info!(archive = %name, files = files.len(), "extracted");
                extracted.push(target);
            }
            Ok(Err(e)) => error!(archive = %name, error = %e, "extract failed"),
            Err(e) => error!(archive = %name, error = %e, "extract task panicked"),
        }
    }

    for h in handles {
        let _ = h.await;
    }
    extracted.sort();
    extracted
}

/// Zip `path` into `<path>.zip` beside it. A file becomes a single entry
/// named after itself; a directory is added recursively.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub fn package_output(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let mut zip_name = path
        .file_name()
        .with_context(|| format!("{:?} has no file name", path))?
        .to_os_string();
    zip_name.push(".zip");
    let zip_path = path.with_file_name(zip_name);

    let entries: Vec<(String, PathBuf)> = if path.is_dir() {
        let pattern = format!("{}/**/*", path.display());
        let mut files = Vec::new();
        for p in glob::glob(&pattern).with_context(|| format!("bad pattern {}", pattern))? {
            let p = p?;
            if p.is_file() {
                let rel = p.strip_prefix(path)?.to_string_lossy().replace('\\', "/");
                files.push((rel, p));
            }
        }
        files
    } else {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        vec![(name, path.to_path_buf())]
    };

    let file =
        File::create(&zip_path).with_context(|| format!("creating {}", zip_path.display()))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options: FileOptions<'_, ()> =
        FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, source) in &entries {
        zip.start_file(name.as_str(), options)?;
        let mut input =
            File::open(source).with_context(|| format!("opening {}", source.display()))?;
        io::copy(&mut input, &mut zip)?;
    }
    zip.finish()?;
    info!(zip = %zip_path.display(), entries = entries.len(), "packaged");
    Ok(zip_path)
}
