use std::{
    fs::{self, File},
    io,
    path::Path,
};

use tapfeed_utils::fs::{ensure_dir_exists, temp_sibling};
use tracing::{debug, trace};
use ureq::{
    http::{header::IF_MODIFIED_SINCE, Response, StatusCode},
    Agent, Body,
};
use url::Url;

use crate::{
    error::DownloadError,
    http_client::ClientConfig,
    transport::{DownloadRequest, DownloadStatus, Transport},
    utils::http_date,
};

/// [`Transport`] backed by `ureq`.
///
/// Every call is a single attempt; retrying is left to the caller.
pub struct HttpTransport {
    agent: Agent,
    insecure_agent: Agent,
    retries: u32,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            agent: config.build(),
            insecure_agent: config.build_insecure(),
            retries: config.retries,
        }
    }

    fn get(
        &self,
        url: &str,
        modified_since: Option<std::time::SystemTime>,
        insecure: bool,
    ) -> Result<Response<Body>, DownloadError> {
        Url::parse(url).map_err(|source| {
            DownloadError::InvalidUrl {
                url: url.to_string(),
                source,
            }
        })?;

        let agent = if insecure {
            &self.insecure_agent
        } else {
            &self.agent
        };

        let mut req = agent.get(url);
        if let Some(since) = modified_since {
            req = req.header(IF_MODIFIED_SINCE, http_date(since));
        }

        trace!("GET {}", url);
        req.call().map_err(|err| DownloadError::network(url, err))
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(&ClientConfig::default())
    }
}

impl Transport for HttpTransport {
    fn download(&self, request: &DownloadRequest<'_>) -> Result<DownloadStatus, DownloadError> {
        let resp = self.get(request.url, request.modified_since, request.insecure)?;

        let status = resp.status();
        if status == StatusCode::NOT_MODIFIED {
            debug!("{} not modified", request.url);
            return Ok(DownloadStatus::NotModified);
        }
        if !status.is_success() {
            return Err(DownloadError::HttpError {
                status: status.as_u16(),
                url: request.url.to_string(),
            });
        }

        write_body(resp, request.target)?;
        Ok(DownloadStatus::Downloaded)
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let resp = self.get(url, None, false)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DownloadError::HttpError {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let mut content = Vec::new();
        io::copy(&mut resp.into_body().into_reader(), &mut content)?;
        Ok(content)
    }

    fn retries(&self) -> u32 {
        self.retries
    }
}

/// Streams a response body to a temporary sibling of `target`, then renames it into place.
fn write_body(resp: Response<Body>, target: &Path) -> Result<(), DownloadError> {
    if let Some(parent) = target.parent() {
        ensure_dir_exists(parent)?;
    }

    let tmp_path = temp_sibling(target);
    let result = (|| {
        let mut file = File::create(&tmp_path)?;
        let mut reader = resp.into_body().into_reader();
        let written = io::copy(&mut reader, &mut file)?;
        file.sync_all()?;
        fs::rename(&tmp_path, target)?;
        trace!("wrote {} bytes to {}", written, target.display());
        Ok::<_, io::Error>(())
    })();

    if let Err(err) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        io::{BufRead, BufReader, Write},
        net::TcpListener,
        sync::mpsc,
        thread,
        time::UNIX_EPOCH,
    };

    use super::*;
    use tempfile::tempdir;

    /// Serves exactly one canned HTTP response and reports the request head it received.
    fn serve_once(status_line: &'static str, body: &'static str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut head = String::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                    break;
                }
                head.push_str(&line);
            }
            tx.send(head).unwrap();

            let mut stream = stream;
            write!(
                stream,
                "{status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
            stream.flush().unwrap();
        });

        (format!("http://{addr}"), rx)
    }

    #[test]
    fn test_download_writes_target() {
        let (base, rx) = serve_once("HTTP/1.1 200 OK", r#"{"ok":true}"#);
        let dir = tempdir().unwrap();
        let target = dir.path().join("api").join("formula.json");
        let url = format!("{base}/formula.json");

        let status = HttpTransport::default()
            .download(&DownloadRequest {
                url: &url,
                target: &target,
                modified_since: None,
                insecure: false,
            })
            .unwrap();

        assert_eq!(status, DownloadStatus::Downloaded);
        assert_eq!(fs::read_to_string(&target).unwrap(), r#"{"ok":true}"#);
        assert!(!temp_sibling(&target).exists());
        let head = rx.recv().unwrap().to_lowercase();
        assert!(!head.contains("if-modified-since"));
    }

    #[test]
    fn test_download_not_modified_keeps_target() {
        let (base, rx) = serve_once("HTTP/1.1 304 Not Modified", "");
        let dir = tempdir().unwrap();
        let target = dir.path().join("formula.json");
        fs::write(&target, "[]").unwrap();
        let url = format!("{base}/formula.json");

        let status = HttpTransport::default()
            .download(&DownloadRequest {
                url: &url,
                target: &target,
                modified_since: Some(UNIX_EPOCH),
                insecure: false,
            })
            .unwrap();

        assert_eq!(status, DownloadStatus::NotModified);
        assert_eq!(fs::read_to_string(&target).unwrap(), "[]");
        let head = rx.recv().unwrap().to_lowercase();
        assert!(head.contains("if-modified-since: thu, 01 jan 1970 00:00:00 gmt"));
    }

    #[test]
    fn test_download_http_error_leaves_target() {
        let (base, _rx) = serve_once("HTTP/1.1 404 Not Found", "missing");
        let dir = tempdir().unwrap();
        let target = dir.path().join("formula.json");
        let url = format!("{base}/formula.json");

        let err = HttpTransport::default()
            .download(&DownloadRequest {
                url: &url,
                target: &target,
                modified_since: None,
                insecure: false,
            })
            .unwrap_err();

        assert!(matches!(err, DownloadError::HttpError { status: 404, .. }));
        assert!(!target.exists());
    }

    #[test]
    fn test_fetch_bytes() {
        let (base, _rx) = serve_once("HTTP/1.1 200 OK", "[1,2,3]");
        let body = HttpTransport::default()
            .fetch_bytes(&format!("{base}/numbers.json"))
            .unwrap();
        assert_eq!(body, b"[1,2,3]");
    }

    #[test]
    fn test_invalid_url() {
        let err = HttpTransport::default().fetch_bytes("not a url").unwrap_err();
        assert!(matches!(err, DownloadError::InvalidUrl { .. }));
    }

    #[test]
    fn test_retries_follow_config() {
        let transport = HttpTransport::new(&ClientConfig {
            retries: 5,
            ..ClientConfig::default()
        });
        assert_eq!(transport.retries(), 5);
    }
}
