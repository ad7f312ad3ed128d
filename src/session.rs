use crate::error::Result;
use crate::scrape::Form;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderValue, COOKIE};
use reqwest::{Client, RequestBuilder, Response};
use scraper::Html;
use std::sync::Arc;
use url::Url;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Cookies the session would send to one URL, for requests made outside it.
#[derive(Debug, Clone, Default)]
pub struct SessionCredentials(Option<HeaderValue>);

impl SessionCredentials {
    pub fn apply(self, request: RequestBuilder) -> RequestBuilder {
        match self.0 {
            Some(cookies) => request.header(COOKIE, cookies),
            None => request,
        }
    }
}

pub trait CredentialSource {
    fn credentials(&self, url: &Url) -> SessionCredentials;
}

/// The logged-in portal session: a cookie-keeping client plus the page it
/// is currently on.
pub struct Session {
    client: Client,
    jar: Arc<Jar>,
    url: Url,
    html: String,
}

impl Session {
    pub fn new() -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .gzip(true)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Session {
            client,
            jar,
            url: Url::parse("about:blank")?,
            html: String::new(),
        })
    }

    #[cfg(test)]
    pub fn with_page(url: &str, html: &str) -> Result<Self> {
        let mut session = Session::new()?;
        session.url = Url::parse(url)?;
        session.html = html.into();
        Ok(session)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Parsed copy of the current page.
    pub fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }

    /// Resolves `href` against the current page, like a link would.
    pub fn resolve(&self, href: &str) -> Result<Url> {
        match Url::parse(href) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => Ok(self.url.join(href)?),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn goto(&mut self, href: &str) -> Result<()> {
        let url = self.resolve(href)?;
        log::debug!("GET {url}");
        let res = self.client.get(url).send().await?;
        self.load(res).await
    }

    pub async fn submit(&mut self, form: &Form) -> Result<()> {
        let action = if form.action.is_empty() {
            self.url.clone()
        } else {
            self.resolve(&form.action)?
        };
        log::debug!("{} {action}", form.method);

        let pairs = form.pairs();
        let request = match form.method.as_str() {
            "GET" => self.client.get(action).query(&pairs),
            _ => self.client.post(action).form(&pairs),
        };
        self.load(request.send().await?).await
    }

    async fn load(&mut self, res: Response) -> Result<()> {
        let res = res.error_for_status()?;
        self.url = res.url().clone();
        self.html = res.text().await?;
        Ok(())
    }
}

impl CredentialSource for Session {
    fn credentials(&self, url: &Url) -> SessionCredentials {
        SessionCredentials(self.jar.cookies(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_links_against_current_page() {
        let mut session = Session::new().unwrap();
        session.url = Url::parse("https://sakai.unc.edu/portal/site/abc/").unwrap();

        assert_eq!(
            session.resolve("tool/res").unwrap().as_str(),
            "https://sakai.unc.edu/portal/site/abc/tool/res"
        );
        assert_eq!(
            session.resolve("/welcome/").unwrap().as_str(),
            "https://sakai.unc.edu/welcome/"
        );
        assert_eq!(
            session.resolve("https://sso.unc.edu/idp").unwrap().as_str(),
            "https://sso.unc.edu/idp"
        );
    }

    #[test]
    fn exports_cookies_for_matching_urls() {
        let session = Session::new().unwrap();
        let portal = Url::parse("https://sakai.unc.edu/portal").unwrap();
        session
            .jar
            .add_cookie_str("JSESSIONID=abc123; Path=/", &portal);

        let access = Url::parse("https://sakai.unc.edu/access/content/x.pdf").unwrap();
        let credentials = session.credentials(&access);
        assert_eq!(
            credentials.0.as_ref().and_then(|v| v.to_str().ok()),
            Some("JSESSIONID=abc123")
        );

        let other = Url::parse("https://example.edu/").unwrap();
        assert!(session.credentials(&other).0.is_none());
    }
}
