// download.rs: Lazy download of the fastText header model.
//
// The model is fetched once and cached at the resolved path. An existing file is trusted
// as-is: no checksum, no freshness check.

use std::fs;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config;
use crate::error::{HeaderError, Result};
use crate::install_paths;

/// Transport used to bring the model archive onto disk.
pub trait ModelFetcher {
    /// Write the full body of `url` to `dest`, creating or truncating it.
    fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Blocking HTTP GET that streams the response body straight to the destination file.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(config::model::DOWNLOAD_TIMEOUT_SECS))
    }
}

impl ModelFetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let download_err = |message: String| HeaderError::Download {
            url: url.to_string(),
            message,
        };

        // ureq reports every status >= 400 as Error::Status.
        let resp = ureq::get(url)
            .timeout(self.timeout)
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => download_err(format!("HTTP {code}")),
                other => download_err(other.to_string()),
            })?;

        let file = fs::File::create(dest)
            .map_err(|e| HeaderError::io(format!("failed to create {}", dest.display()), e))?;
        let written = copy_body(&mut resp.into_reader(), file, url, dest)?;

        log::debug!("Wrote {} bytes to {}", written, dest.display());
        Ok(())
    }
}

/// Stream `reader` into `writer`. Read failures are network errors, write failures are
/// local I/O errors.
fn copy_body<R: Read, W: Write>(reader: &mut R, writer: W, url: &str, dest: &Path) -> Result<u64> {
    let write_err = |e: io::Error| HeaderError::io(format!("failed writing {}", dest.display()), e);
    let mut writer = BufWriter::new(writer);
    let mut buf = vec![0u8; config::model::DOWNLOAD_CHUNK_BYTES];
    let mut written = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(HeaderError::Download {
                    url: url.to_string(),
                    message: format!("failed reading response body: {e}"),
                })
            }
        };
        writer.write_all(&buf[..n]).map_err(write_err)?;
        written += n as u64;
    }
    writer.flush().map_err(write_err)?;
    Ok(written)
}

/// Fail unless `path` names a `.bin.gz` archive. Does no I/O.
pub fn validate_model_file_name(path: &Path) -> Result<()> {
    let ok = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(config::model::MODEL_FILE_SUFFIX));
    if !ok {
        return Err(HeaderError::InvalidArgument(format!(
            "model file expects a {} file, got {}",
            config::model::MODEL_FILE_SUFFIX,
            path.display()
        )));
    }
    Ok(())
}

/// Pick the model path to use: the explicit one if given, else the default cache location.
pub fn resolve_model_path(model_file: Option<&Path>) -> Result<PathBuf> {
    match model_file {
        Some(p) => {
            validate_model_file_name(p)?;
            Ok(p.to_path_buf())
        }
        None => install_paths::default_model_path(),
    }
}

/// Download the header model to `path` unless a file is already there. Returns the path.
pub fn ensure_model_present(path: &Path, fetcher: &dyn ModelFetcher) -> Result<PathBuf> {
    validate_model_file_name(path)?;

    if path.exists() {
        log::debug!("Header model already cached at {}", path.display());
        return Ok(path.to_path_buf());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        install_paths::ensure_dir(parent)?;
    }

    log::info!(
        "Downloading header model from {} to {}",
        config::model::MODEL_REMOTE_URL,
        path.display()
    );

    // Stream into a sibling file, then rename, so an interrupted transfer never
    // leaves a truncated archive at the cached path.
    let part_path = partial_path(path);
    if let Err(e) = fetcher.fetch(config::model::MODEL_REMOTE_URL, &part_path) {
        let _ = fs::remove_file(&part_path);
        return Err(e);
    }

    fs::rename(&part_path, path).map_err(|e| {
        let _ = fs::remove_file(&part_path);
        HeaderError::io(
            format!("failed to rename {} -> {}", part_path.display(), path.display()),
            e,
        )
    })?;

    log::info!("Header model download complete");
    Ok(path.to_path_buf())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(config::model::PARTIAL_SUFFIX);
    PathBuf::from(name)
}
