mod downloader;
mod error;
mod login;
mod scrape;
mod session;
mod settings;
mod sites;
mod structs;
mod tree;

use downloader::{HttpRemote, Syncer};
use session::Session;
use settings::{expand_home, Settings};
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "config.yaml".into());
    let settings = Settings::load(&path)?;
    let credentials = match settings.credentials() {
        Ok(credentials) => credentials,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let mut session = Session::new()?;
    login::login(&mut session, &credentials).await?;

    let term = settings.current_term();
    for site in sites::course_sites(&session, term)? {
        if !settings.site_enabled(&site.title) {
            log::debug!("{} is not enabled", site.title);
            continue;
        }
        log::info!("syncing {}", site.title);

        site.goto_resources(&mut session).await?;
        let mut tree = {
            let mut resources = site.resources(&mut session);
            resources.expand_all_folders().await?;
            match resources.current_path() {
                Ok(path) => log::debug!("at {}", path.join(" / ")),
                Err(e) => log::warn!("{e}"),
            }
            resources.tree()?
        };
        tree.set_root_path(settings.download_directory(&site.title)?);
        log::info!(
            "{} resources under {:?}, saving to {}",
            tree.len(),
            tree.resource(tree.root()).title,
            tree.root_path().display()
        );
        log::debug!("{}", serde_json::to_string(&tree)?);

        let skip = settings.skip_directories(&site.title)?;
        {
            let syncer = Syncer::new(HttpRemote::new(&session)?);
            for id in tree.walk(&skip) {
                let directory = expand_home(tree.local_directory(id));
                syncer.sync(tree.resource(id), &directory).await?;
            }
        }

        // back to the portal page listing the site tabs
        session.goto(login::PORTAL_URL).await?;
    }

    Ok(())
}
