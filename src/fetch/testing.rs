//! In-memory [`Transport`] for unit tests

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use futures::StreamExt;

use super::transport::{ArchiveStream, JsonPage, Transport, TransportError};

const CHUNK: usize = 1024;

enum Reply {
    Json(serde_json::Value, Option<String>),
    Body(Vec<u8>),
    Status(u16),
    Stall,
    /// Body plus a declared length that may not match it
    Sized(Vec<u8>, u64),
}

/// Serves canned replies by exact URL; unknown URLs behave like an unreachable host.
#[derive(Default)]
pub(crate) struct FakeTransport {
    json: HashMap<String, Reply>,
    archives: HashMap<String, Reply>,
    probes: HashMap<String, Reply>,
    pub json_calls: AtomicUsize,
    pub open_calls: AtomicUsize,
    pub probe_calls: AtomicUsize,
    pub headers_seen: Mutex<Vec<(String, String)>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(mut self, url: &str, body: serde_json::Value) -> Self {
        self.json.insert(url.to_string(), Reply::Json(body, None));
        self
    }

    pub fn json_page(mut self, url: &str, body: serde_json::Value, next: &str) -> Self {
        self.json
            .insert(url.to_string(), Reply::Json(body, Some(next.to_string())));
        self
    }

    pub fn json_status(mut self, url: &str, status: u16) -> Self {
        self.json.insert(url.to_string(), Reply::Status(status));
        self
    }

    pub fn archive(mut self, url: &str, body: Vec<u8>) -> Self {
        self.archives.insert(url.to_string(), Reply::Body(body));
        self
    }

    pub fn archive_status(mut self, url: &str, status: u16) -> Self {
        self.archives.insert(url.to_string(), Reply::Status(status));
        self
    }

    /// Archive whose `Content-Length` claims `declared` bytes
    pub fn archive_with_length(mut self, url: &str, body: Vec<u8>, declared: u64) -> Self {
        self.archives
            .insert(url.to_string(), Reply::Sized(body, declared));
        self
    }

    /// Archive that sends a couple of bytes and then goes silent
    pub fn stalled_archive(mut self, url: &str) -> Self {
        self.archives.insert(url.to_string(), Reply::Stall);
        self
    }

    pub fn probe_ok(mut self, url: &str) -> Self {
        self.probes.insert(url.to_string(), Reply::Body(Vec::new()));
        self
    }

    pub fn probe_status(mut self, url: &str, status: u16) -> Self {
        self.probes.insert(url.to_string(), Reply::Status(status));
        self
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

fn unreachable(url: &str) -> TransportError {
    TransportError::Request {
        url: url.to_string(),
        message: "connection refused".to_string(),
    }
}

fn status(url: &str, status: u16) -> TransportError {
    TransportError::Status {
        url: url.to_string(),
        status,
    }
}

impl Transport for FakeTransport {
    async fn get_json(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
    ) -> Result<JsonPage, TransportError> {
        self.json_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.headers_seen.lock() {
            seen.extend(headers.iter().map(|(k, v)| (k.to_string(), v.clone())));
        }
        match self.json.get(url) {
            Some(Reply::Json(body, next)) => Ok(JsonPage {
                body: body.clone(),
                next: next.clone(),
            }),
            Some(Reply::Status(code)) => Err(status(url, *code)),
            _ => Err(unreachable(url)),
        }
    }

    async fn probe(&self, url: &str) -> Result<(), TransportError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        match self.probes.get(url) {
            Some(Reply::Status(code)) => Err(status(url, *code)),
            Some(_) => Ok(()),
            None => Err(unreachable(url)),
        }
    }

    async fn open(&self, url: &str) -> Result<ArchiveStream, TransportError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        match self.archives.get(url) {
            Some(Reply::Body(body)) => Ok(chunked(body, body.len() as u64)),
            Some(Reply::Sized(body, declared)) => Ok(chunked(body, *declared)),
            Some(Reply::Stall) => {
                let head = futures::stream::iter([Ok::<_, TransportError>(Bytes::from_static(
                    b"\x1f\x8b",
                ))]);
                Ok(ArchiveStream {
                    content_length: None,
                    body: head.chain(futures::stream::pending()).boxed(),
                })
            }
            Some(Reply::Status(code)) => Err(status(url, *code)),
            _ => Err(unreachable(url)),
        }
    }
}

fn chunked(body: &[u8], content_length: u64) -> ArchiveStream {
    let chunks: Vec<Result<Bytes, TransportError>> = body
        .chunks(CHUNK)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    ArchiveStream {
        content_length: Some(content_length),
        body: futures::stream::iter(chunks).boxed(),
    }
}

/// Build a gzipped tarball whose entries sit under a `wrapper/` directory
pub(crate) fn tarball(wrapper: &str, files: &[(&str, &[u8])]) -> Vec<u8> {
    tarball_with_links(wrapper, files, &[])
}

/// Like [`tarball`], with `(name, target)` symlinks written before the files
pub(crate) fn tarball_with_links(
    wrapper: &str,
    files: &[(&str, &[u8])],
    links: &[(&str, &str)],
) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::GzEncoder;

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let mut dir = tar::Header::new_gnu();
    dir.set_entry_type(tar::EntryType::Directory);
    dir.set_mode(0o755);
    dir.set_size(0);
    builder
        .append_data(&mut dir, format!("{wrapper}/"), std::io::empty())
        .unwrap();

    for (name, target) in links {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_mode(0o777);
        header.set_size(0);
        builder
            .append_link(&mut header, format!("{wrapper}/{name}"), target)
            .unwrap();
    }

    for (name, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_mode(0o644);
        header.set_size(contents.len() as u64);
        builder
            .append_data(&mut header, format!("{wrapper}/{name}"), *contents)
            .unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}

/// Build a zip whose entries sit under a `wrapper/` directory
pub(crate) fn zipball(wrapper: &str, files: &[(&str, &[u8])]) -> Vec<u8> {
    zipball_with_links(wrapper, files, &[])
}

/// Like [`zipball`], with `(name, target)` symlinks written after the files
pub(crate) fn zipball_with_links(
    wrapper: &str,
    files: &[(&str, &[u8])],
    links: &[(&str, &str)],
) -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    writer.add_directory(format!("{wrapper}/"), options).unwrap();
    for (name, contents) in files {
        writer.start_file(format!("{wrapper}/{name}"), options).unwrap();
        writer.write_all(contents).unwrap();
    }
    for (name, target) in links {
        writer
            .add_symlink(format!("{wrapper}/{name}"), *target, options)
            .unwrap();
    }

    writer.finish().unwrap().into_inner()
}
