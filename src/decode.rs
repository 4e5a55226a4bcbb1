use crate::raster::Bitmap;
use base64::Engine;
use std::path::PathBuf;

/// Resolves an image source string into a bitmap. Sources may be `data:`
/// URIs, filesystem paths, or (with the `remote` feature) http(s) URLs.
/// Retry policy is internal to the implementation; the composer only sees
/// one decode attempt per fragment.
pub trait ImageDecoder {
    fn decode(&self, source: &str) -> Result<Bitmap, String>;
}

/// Decoder for embedded data and local files. Relative paths and paths
/// with a leading slash resolve against the configured root directory,
/// the way a public asset folder is served at the site origin.
#[derive(Debug, Clone, Default)]
pub struct LocalDecoder {
    root: Option<PathBuf>,
}

impl LocalDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve_path(&self, source: &str) -> PathBuf {
        let trimmed = source.strip_prefix('/').unwrap_or(source);
        match &self.root {
            Some(root) => root.join(trimmed),
            None => PathBuf::from(source),
        }
    }
}

impl ImageDecoder for LocalDecoder {
    fn decode(&self, source: &str) -> Result<Bitmap, String> {
        if let Some((_, data)) = parse_data_uri(source) {
            return Bitmap::from_bytes(data)
                .ok_or_else(|| "data uri does not decode as an image".to_string());
        }
        let path = self.resolve_path(source);
        let bytes = std::fs::read(&path)
            .map_err(|err| format!("read {}: {}", path.display(), err))?;
        Bitmap::from_bytes(bytes)
            .ok_or_else(|| format!("{} does not decode as an image", path.display()))
    }
}

pub(crate) fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    if !uri.starts_with("data:") {
        return None;
    }
    let (header, data_part) = uri.split_once(',')?;
    let mime = header
        .trim_start_matches("data:")
        .split(';')
        .next()
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains("base64") {
        base64::engine::general_purpose::STANDARD
            .decode(data_part)
            .ok()?
    } else {
        data_part.as_bytes().to_vec()
    };
    Some((mime, data))
}

pub(crate) fn is_remote_source(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Fetching decoder: remote URLs over HTTP with a bounded request timeout,
/// everything else delegated to [`LocalDecoder`]. A failed fetch is retried
/// once with a cache-busting timestamp query parameter before giving up.
#[cfg(feature = "remote")]
pub struct HttpDecoder {
    client: reqwest::blocking::Client,
    local: LocalDecoder,
}

#[cfg(feature = "remote")]
impl HttpDecoder {
    pub fn new() -> Result<Self, String> {
        Self::with_local(LocalDecoder::new())
    }

    pub fn with_local(local: LocalDecoder) -> Result<Self, String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|err| format!("http client: {}", err))?;
        Ok(Self { client, local })
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        let response = self
            .client
            .get(url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|err| format!("fetch {}: {}", url, err))?;
        response
            .bytes()
            .map(|bytes| bytes.to_vec())
            .map_err(|err| format!("fetch {}: {}", url, err))
    }

    fn cache_busted(url: &str) -> String {
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        if url.contains('?') {
            format!("{url}&_={stamp}")
        } else {
            format!("{url}?_={stamp}")
        }
    }
}

#[cfg(feature = "remote")]
impl ImageDecoder for HttpDecoder {
    fn decode(&self, source: &str) -> Result<Bitmap, String> {
        if !is_remote_source(source) {
            return self.local.decode(source);
        }
        let bytes = match self.fetch(source) {
            Ok(bytes) => bytes,
            Err(_) => self.fetch(&Self::cache_busted(source))?,
        };
        Bitmap::from_bytes(bytes)
            .ok_or_else(|| format!("{} does not decode as an image", source))
    }
}
