use crate::error::{Error, Result};
use crate::login::PORTAL_URL;
use crate::scrape::{self, FolderToggle};
use crate::session::Session;
use crate::structs::{Resource, Site};
use crate::tree::ResourceTree;

use std::collections::HashSet;

const RESOURCES_TOOL: &str = "Resources";

/// Every site tab on the current portal page.
pub fn all_sites(session: &Session) -> Result<Vec<Site>> {
    scrape::parse_sites(&session.document())
}

/// Site tabs whose title mentions the term, e.g. "Fall 2024".
pub fn course_sites(session: &Session, term: &str) -> Result<Vec<Site>> {
    Ok(filter_term(all_sites(session)?, term))
}

fn filter_term(sites: Vec<Site>, term: &str) -> Vec<Site> {
    sites
        .into_iter()
        .filter(|site| site.title.contains(term))
        .collect()
}

impl Site {
    pub async fn goto(&self, session: &mut Session) -> Result<()> {
        if !session.url().as_str().starts_with(PORTAL_URL) {
            return Err(Error::Portal(format!(
                "cannot open site {:?} from {}",
                self.title,
                session.url()
            )));
        }
        session.goto(&self.href).await
    }

    /// Opens the site's Resources tool unless it is already showing.
    pub async fn goto_resources(&self, session: &mut Session) -> Result<()> {
        self.goto(session).await?;

        let href = {
            let doc = session.document();
            if scrape::current_tool(&doc)?.as_deref() == Some(RESOURCES_TOOL) {
                return Ok(());
            }
            scrape::tool_link(&doc, RESOURCES_TOOL)?
                .ok_or_else(|| Error::missing(session.url(), "Resources tool"))?
        };
        session.goto(&href).await
    }

    pub fn resources<'a>(&self, session: &'a mut Session) -> Resources<'a> {
        Resources { session }
    }
}

/// The Resources tool of whichever site the session has open.
pub struct Resources<'a> {
    session: &'a mut Session,
}

impl Resources<'_> {
    pub fn ensure_current_menu(&self) -> Result<()> {
        match scrape::current_tool(&self.session.document())? {
            Some(tool) if tool == RESOURCES_TOOL => Ok(()),
            other => Err(Error::Portal(format!(
                "expected the Resources tool, found {other:?}"
            ))),
        }
    }

    pub fn current_path(&self) -> Result<Vec<String>> {
        self.ensure_current_menu()?;
        scrape::breadcrumbs(&self.session.document())
    }

    fn ensure_listing(&self) -> Result<()> {
        if scrape::has_resources_table(&self.session.document())? {
            Ok(())
        } else {
            Err(Error::missing(self.session.url(), "resources table"))
        }
    }

    /// Clicks collapsed folders until the whole tree is listed.
    pub async fn expand_all_folders(&mut self) -> Result<()> {
        let mut clicked = HashSet::new();
        loop {
            self.ensure_listing()?;
            let Some(toggle) = scrape::collapsed_folder(&self.session.document())? else {
                return Ok(());
            };
            if !clicked.insert(format!("{toggle:?}")) {
                return Err(Error::Portal(format!("folder did not expand: {toggle:?}")));
            }
            self.click(&toggle).await?;
        }
    }

    async fn click(&mut self, toggle: &FolderToggle) -> Result<()> {
        if toggle.assignments.is_empty() {
            let href = toggle
                .href
                .as_deref()
                .ok_or_else(|| Error::Portal("folder toggle has no target".into()))?;
            return self.session.goto(href).await;
        }

        let form_css = format!("form#{}", toggle.form);
        let mut form = scrape::find_form(&self.session.document(), &form_css, None)?
            .ok_or_else(|| Error::missing(self.session.url(), form_css.as_str()))?;
        for (key, value) in &toggle.assignments {
            form.fill(key, value);
        }
        self.session.submit(&form).await
    }

    pub fn tree(&self) -> Result<ResourceTree> {
        self.ensure_listing()?;
        let rows = scrape::parse_resource_rows(&self.session.document())?;
        ResourceTree::build(rows.into_iter().map(Resource::from))
            .ok_or_else(|| Error::missing(self.session.url(), "resources"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{expand_home, Settings};
    use crate::structs::{ResourceRow, FOLDER};

    fn site(title: &str) -> Site {
        Site {
            id: title.to_lowercase(),
            title: title.into(),
            href: format!("https://sakai.unc.edu/portal/site/{}", title.len()),
        }
    }

    #[test]
    fn keeps_sites_of_current_term() {
        let sites = vec![
            site("Home"),
            site("CS101 Fall 2024"),
            site("MATH 231 Spring 2024"),
            site("HIST 101 Fall 2024"),
        ];
        let titles: Vec<String> = filter_term(sites, "Fall")
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, ["CS101 Fall 2024", "HIST 101 Fall 2024"]);
    }

    #[test]
    fn configured_course_site_resolves_to_its_directory() {
        let settings = Settings::from_yaml(
            "term:\n  current: Fall\nsites:\n  CS101:\n    enable: true\n    download-directory: \"~/cs101\"\n",
        )
        .unwrap();

        let selected = filter_term(
            vec![site("CS101 Fall 2024"), site("CS101 Spring 2024")],
            settings.current_term(),
        );
        assert_eq!(selected.len(), 1);
        let cs101 = &selected[0];
        assert!(settings.site_enabled(&cs101.title));

        let rows = vec![
            ("CS101 Fall 2024", FOLDER, 0),
            ("assignments", FOLDER, 1),
            ("hw1.pdf", "PDF", 2),
            ("syllabus.pdf", "PDF", 1),
        ];
        let mut tree = ResourceTree::build(rows.into_iter().map(|(title, tag, indent)| {
            Resource::from(ResourceRow {
                title: title.into(),
                link: None,
                filetype: tag.into(),
                indent,
                details: None,
            })
        }))
        .unwrap();
        tree.set_root_path(settings.download_directory(&cs101.title).unwrap());

        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_home(tree.local_directory(tree.root())), home.join("cs101"));

        let settings = Settings::from_yaml(
            "term:\n  current: Fall\nsites:\n  CS101:\n    enable: true\n    download-directory: \"~/cs101\"\n    skip-directories: [assignments]\n",
        )
        .unwrap();
        let skip = settings.skip_directories(&cs101.title).unwrap();
        assert_eq!(skip, vec![home.join("cs101").join("assignments")]);
        let walked: Vec<&str> = tree
            .walk(&skip)
            .map(|id| tree.resource(id).title.as_str())
            .collect();
        assert_eq!(walked, ["CS101 Fall 2024", "syllabus.pdf"]);
    }

    #[test]
    fn breadcrumbs_outside_resources_are_an_error() {
        let mut session =
            Session::with_page("https://sakai.unc.edu/portal/site/abc", "<html><body></body></html>")
                .unwrap();
        let resources = site("CS101 Fall 2024").resources(&mut session);
        assert!(matches!(resources.current_path(), Err(Error::Portal(_))));
    }

    #[test]
    fn term_match_is_case_sensitive() {
        assert!(filter_term(vec![site("cs101 fall 2024")], "Fall").is_empty());
    }
}
