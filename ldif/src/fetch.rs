//! Dereferencing of `attr:< url` values.
//!
//! The parser only calls a fetcher for schemes on its allow-list.  No
//! timeout or retry is applied here; supply a preconfigured fetcher if
//! that matters.

use std::io;

use url::Url;

/// Supplies the bytes behind a URL-valued attribute.
pub trait UrlFetcher {
    fn fetch(&mut self, url: &Url) -> io::Result<Vec<u8>>;
}

impl<F> UrlFetcher for F
where
    F: FnMut(&Url) -> io::Result<Vec<u8>>,
{
    fn fetch(&mut self, url: &Url) -> io::Result<Vec<u8>> {
        self(url)
    }
}

/// Reads `file://` URLs from the local filesystem and rejects every
/// other scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

impl UrlFetcher for FileFetcher {
    fn fetch(&mut self, url: &Url) -> io::Result<Vec<u8>> {
        if url.scheme() != "file" {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("Unknown URL scheme: {}", url.scheme()),
            ));
        }
        let path = url.to_file_path().map_err(|()| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a local file URL: {}", url),
            )
        })?;
        std::fs::read(path)
    }
}
