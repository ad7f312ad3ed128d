use crate::error::{Error, Result};
use crate::scrape;
use crate::session::Session;
use crate::settings::Credentials;

pub const WELCOME_URL: &str = "https://sakai.unc.edu/welcome/";
pub const PORTAL_URL: &str = "https://sakai.unc.edu/portal";
const SSO_URL: &str = "https://sso.unc.edu/idp/profile/SAML2/Redirect/SSO";

// the IdP answers with an auto-submitting form per hop back to the portal
const MAX_RELAYS: usize = 3;

pub async fn login(session: &mut Session, credentials: &Credentials) -> Result<()> {
    session.goto(WELCOME_URL).await?;
    let href = scrape::link_by_text(&session.document(), "onyen login")?
        .ok_or_else(|| Error::missing(session.url(), "onyen login link"))?;
    session.goto(&href).await?;

    if !session.url().as_str().starts_with(SSO_URL) {
        return Err(Error::Login(format!(
            "expected the sign-in page, landed on {}",
            session.url()
        )));
    }

    let mut form = scrape::find_form(&session.document(), "form", Some("input#username"))?
        .ok_or_else(|| Error::missing(session.url(), "sign-in form"))?;
    if !form.fill("username", &credentials.username) || !form.fill("password", &credentials.password)
    {
        return Err(Error::missing(session.url(), "username/password inputs"));
    }
    form.press(None);
    session.submit(&form).await?;

    for _ in 0..MAX_RELAYS {
        let relay = scrape::find_form(
            &session.document(),
            "form",
            Some("input[name=SAMLResponse]"),
        )?;
        match relay {
            Some(form) => session.submit(&form).await?,
            None => break,
        }
    }

    if !session.url().as_str().starts_with(PORTAL_URL) {
        return Err(Error::Login(format!(
            "sign-in did not reach the portal (at {}); check SAKAI_USERNAME and SAKAI_PASSWORD",
            session.url()
        )));
    }
    log::info!("logged in as {}", credentials.username);
    Ok(())
}
