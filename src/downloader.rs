use crate::error::{Error, Result};
use crate::session::CredentialSource;
use crate::structs::{FileType, HeadResult, Resource};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use regex::Regex;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, DATE,
    LAST_MODIFIED, LOCATION,
};
use reqwest::{redirect, Client, Method, RequestBuilder, StatusCode};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use url::Url;

pub const SHORTCUT_EXTENSION: &str = ".url";

/// What the portal serves, seen from the sync loop.
#[async_trait]
pub trait Remote: Sync {
    /// Headers-only probe. `None` when the server gives no usable answer.
    async fn head(&self, url: &str) -> Option<HeadResult>;

    /// Fetches `url` into `directory`, returning the written path.
    async fn download(&self, url: &str, directory: &Path, fallback_name: &str) -> Result<PathBuf>;

    /// Where `url` redirects to, without following it.
    async fn redirect_target(&self, url: &str) -> Result<String>;
}

pub trait Freshness {
    fn is_stale(&self, remote: &HeadResult, local_modified: Option<SystemTime>) -> bool;
}

/// A local copy is current if it was written after the remote last changed.
pub struct MtimeFreshness;

impl Freshness for MtimeFreshness {
    fn is_stale(&self, remote: &HeadResult, local_modified: Option<SystemTime>) -> bool {
        match local_modified {
            Some(mtime) => DateTime::<Utc>::from(mtime) <= remote.last_modified,
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Folder,
    NoLink,
    UpToDate,
    Downloaded(PathBuf),
    Shortcut(PathBuf),
}

pub struct Syncer<R, F = MtimeFreshness> {
    remote: R,
    freshness: F,
}

impl<R: Remote> Syncer<R> {
    pub fn new(remote: R) -> Self {
        Syncer {
            remote,
            freshness: MtimeFreshness,
        }
    }
}

impl<R: Remote, F: Freshness> Syncer<R, F> {
    pub fn with_freshness(remote: R, freshness: F) -> Self {
        Syncer { remote, freshness }
    }

    /// Brings one resource's local copy up to date inside `directory`,
    /// which is created first.
    pub async fn sync(&self, resource: &Resource, directory: &Path) -> Result<Outcome> {
        tokio::fs::create_dir_all(directory).await?;

        if resource.filetype.is_folder() {
            return Ok(Outcome::Folder);
        }
        let Some(url) = resource.link.as_deref() else {
            log::warn!("{} has no link, skipping", resource.title);
            return Ok(Outcome::NoLink);
        };

        match resource.filetype {
            FileType::WebLink => self.sync_web_link(url, directory, &resource.title).await,
            _ => self.sync_file(url, directory, &resource.title).await,
        }
    }

    async fn sync_file(&self, url: &str, directory: &Path, title: &str) -> Result<Outcome> {
        let Some(info) = self.remote.head(url).await else {
            return Ok(Outcome::UpToDate);
        };
        // without a disposition name the download falls back to the title
        let fallback = legal_filename(title);
        let name = info.filename.as_deref().unwrap_or(&fallback);
        let local = modified(&directory.join(name)).await;
        log::debug!(
            "{}: {:?}, {:?} bytes, modified {} (server time {}), local {local:?}",
            info.url,
            info.content_type,
            info.content_length,
            info.last_modified,
            info.date
        );
        if !self.freshness.is_stale(&info, local) {
            return Ok(Outcome::UpToDate);
        }

        let path = self
            .remote
            .download(url, directory, &fallback)
            .await?;
        log::info!("downloaded {}", path.display());
        Ok(Outcome::Downloaded(path))
    }

    async fn sync_web_link(&self, url: &str, directory: &Path, title: &str) -> Result<Outcome> {
        let path = directory.join(shortcut_filename(title));
        let Some(info) = self.remote.head(url).await else {
            return Ok(Outcome::UpToDate);
        };
        if !self.freshness.is_stale(&info, modified(&path).await) {
            return Ok(Outcome::UpToDate);
        }

        let target = self.remote.redirect_target(url).await?;
        tokio::fs::write(&path, render_shortcut(&target)).await?;
        log::info!("wrote shortcut {} -> {target}", path.display());
        Ok(Outcome::Shortcut(path))
    }
}

async fn modified(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.and_then(|m| m.modified()).ok()
}

pub fn legal_filename(title: &str) -> String {
    title.replace(':', "").replace('/', "_")
}

pub fn shortcut_filename(title: &str) -> String {
    let mut name = legal_filename(title);
    if !name.ends_with(SHORTCUT_EXTENSION) {
        name.push_str(SHORTCUT_EXTENSION);
    }
    name
}

pub fn render_shortcut(target: &str) -> String {
    format!("[InternetShortcut]\nURL={target}")
}

pub fn filename_from_disposition(value: &str) -> Option<String> {
    let re = Regex::new(r#"filename="(.*)""#).ok()?;
    let name = re.captures(value)?.get(1)?.as_str();
    Some(name.replace(['/', '\\'], "_"))
}

pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

/// Header value as text; non-UTF-8 bytes become replacement characters.
fn header_text(value: &HeaderValue) -> String {
    String::from_utf8_lossy(value.as_bytes()).into_owned()
}

pub fn head_result(url: &str, headers: &HeaderMap) -> Option<HeadResult> {
    let header = |name: HeaderName| headers.get(name).map(header_text);

    let (Some(date), Some(last_modified)) = (
        header(DATE).as_deref().and_then(parse_http_date),
        header(LAST_MODIFIED).as_deref().and_then(parse_http_date),
    ) else {
        log::warn!("{url}: no usable Date/Last-Modified headers");
        return None;
    };

    Some(HeadResult {
        url: url.into(),
        filename: header(CONTENT_DISPOSITION)
            .as_deref()
            .and_then(filename_from_disposition),
        date,
        last_modified,
        content_type: header(CONTENT_TYPE),
        content_length: header(CONTENT_LENGTH).and_then(|v| v.parse().ok()),
    })
}

/// Talks to the portal directly, borrowing the session's cookies per request.
pub struct HttpRemote<'a> {
    credentials: &'a (dyn CredentialSource + Sync),
    client: Client,
    no_redirect: Client,
}

impl<'a> HttpRemote<'a> {
    pub fn new(credentials: &'a (dyn CredentialSource + Sync)) -> Result<Self> {
        Ok(HttpRemote {
            credentials,
            client: Client::builder().gzip(true).build()?,
            no_redirect: Client::builder().redirect(redirect::Policy::none()).build()?,
        })
    }

    fn request(&self, client: &Client, method: Method, url: &str) -> Result<RequestBuilder> {
        let url = Url::parse(url)?;
        let credentials = self.credentials.credentials(&url);
        Ok(credentials.apply(client.request(method, url)))
    }
}

#[async_trait]
impl Remote for HttpRemote<'_> {
    async fn head(&self, url: &str) -> Option<HeadResult> {
        let request = match self.request(&self.no_redirect, Method::HEAD, url) {
            Ok(request) => request,
            Err(e) => {
                log::warn!("HEAD {url}: {e}");
                return None;
            }
        };
        let res = match request.send().await {
            Ok(res) => res,
            Err(e) => {
                log::warn!("HEAD {url}: {e}");
                return None;
            }
        };
        if !matches!(res.status(), StatusCode::OK | StatusCode::FOUND) {
            log::warn!("HEAD {url}: {}", res.status());
            return None;
        }
        head_result(url, res.headers())
    }

    async fn download(&self, url: &str, directory: &Path, fallback_name: &str) -> Result<PathBuf> {
        let res = self
            .request(&self.client, Method::GET, url)?
            .send()
            .await?
            .error_for_status()?;

        let filename = res
            .headers()
            .get(CONTENT_DISPOSITION)
            .map(header_text)
            .and_then(|v| filename_from_disposition(&v))
            .unwrap_or_else(|| fallback_name.into());
        let path = directory.join(filename);

        let mut file = File::create(&path).await?;
        let mut stream = res.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(path)
    }

    async fn redirect_target(&self, url: &str) -> Result<String> {
        let res = self
            .request(&self.no_redirect, Method::GET, url)?
            .send()
            .await?
            .error_for_status()?;
        res.headers()
            .get(LOCATION)
            .map(header_text)
            .ok_or_else(|| Error::MissingHeader {
                url: url.into(),
                header: "Location",
            })
    }
}
