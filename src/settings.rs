use crate::error::{Error, Result};

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

const DEFAULT_SITE: &str = "default";

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub term: Term,
    #[serde(default)]
    pub sites: HashMap<String, SiteSettings>,
    // filled from SAKAI_USERNAME / SAKAI_PASSWORD
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Term {
    pub current: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteSettings {
    pub enable: Option<bool>,
    pub download_directory: Option<String>,
    #[serde(default)]
    pub skip_directories: Vec<String>,
}

pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Settings {
    pub fn load(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::new(path, FileFormat::Yaml))
            .add_source(Environment::with_prefix("SAKAI"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    #[cfg(test)]
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn credentials(&self) -> Result<Credentials> {
        fn present(value: &Option<String>, name: &'static str) -> Result<String> {
            match value.as_deref() {
                Some(v) if !v.is_empty() => Ok(v.into()),
                _ => Err(Error::MissingCredential(name)),
            }
        }
        Ok(Credentials {
            username: present(&self.username, "SAKAI_USERNAME")?,
            password: present(&self.password, "SAKAI_PASSWORD")?,
        })
    }

    pub fn current_term(&self) -> &str {
        &self.term.current
    }

    /// Settings for a site title. An exact key wins; otherwise the longest
    /// key the title starts with (at a word boundary), so `CS101` covers
    /// `CS101 Fall 2024`. Keys are compared ignoring ASCII case.
    pub fn site(&self, title: &str) -> Option<&SiteSettings> {
        if let Some((_, site)) = self
            .sites
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(title))
        {
            return Some(site);
        }

        self.sites
            .iter()
            .filter(|(key, _)| !key.eq_ignore_ascii_case(DEFAULT_SITE))
            .filter(|(key, _)| is_word_prefix(key, title))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, site)| site)
    }

    pub fn site_enabled(&self, title: &str) -> bool {
        self.site(title).and_then(|s| s.enable).unwrap_or(false)
    }

    /// The site's own download-directory, else the default site's.
    pub fn download_directory(&self, title: &str) -> Result<PathBuf> {
        self.site(title)
            .and_then(|s| s.download_directory.as_deref())
            .or_else(|| {
                self.sites
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(DEFAULT_SITE))
                    .and_then(|(_, s)| s.download_directory.as_deref())
            })
            .map(PathBuf::from)
            .ok_or_else(|| Error::NoDownloadDirectory(title.into()))
    }

    /// Skip entries resolved to the absolute, home-expanded form the walker
    /// compares against.
    pub fn skip_directories(&self, title: &str) -> Result<Vec<PathBuf>> {
        let Some(site) = self.site(title) else {
            return Ok(Vec::new());
        };
        if site.skip_directories.is_empty() {
            return Ok(Vec::new());
        }

        let base = self.download_directory(title)?;
        Ok(site
            .skip_directories
            .iter()
            .map(|dir| {
                let dir = Path::new(dir);
                if dir.is_absolute() {
                    dir.to_path_buf()
                } else if dir.starts_with("~") {
                    expand_home(dir)
                } else {
                    expand_home(base.join(dir))
                }
            })
            .collect())
    }
}

fn is_word_prefix(key: &str, title: &str) -> bool {
    let (Some(head), Some(rest)) = (title.get(..key.len()), title.get(key.len()..)) else {
        return false;
    };
    head.eq_ignore_ascii_case(key) && rest.chars().next().map_or(true, char::is_whitespace)
}

/// Replaces a leading `~` with the home directory.
pub fn expand_home(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => match dirs::home_dir() {
            Some(home) => home.join(components.as_path()),
            None => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
term:
  current: Fall
sites:
  default:
    download-directory: /srv/sakai
  CS101:
    enable: true
    download-directory: ~/cs101
    skip-directories:
      - assignments
      - /tmp/elsewhere
      - ~/scratch
  MATH 231 Fall 2024:
    enable: false
  HIST 101 Fall 2024:
    enable: true
"#;

    fn home() -> PathBuf {
        dirs::home_dir().expect("home directory")
    }

    #[test]
    fn reads_term() {
        let settings = Settings::from_yaml(YAML).unwrap();
        assert_eq!(settings.current_term(), "Fall");
    }

    #[test]
    fn prefix_key_enables_site() {
        let settings = Settings::from_yaml(YAML).unwrap();
        assert!(settings.site_enabled("CS101 Fall 2024"));
        assert!(settings.site_enabled("CS101"));
        assert!(!settings.site_enabled("CS1010 Fall 2024"));
        assert!(!settings.site_enabled("MATH 231 Fall 2024"));
        assert!(!settings.site_enabled("PHYS 118 Fall 2024"));
    }

    #[test]
    fn download_directory_falls_back_to_default() {
        let settings = Settings::from_yaml(YAML).unwrap();
        assert_eq!(
            settings.download_directory("CS101 Fall 2024").unwrap(),
            PathBuf::from("~/cs101")
        );
        assert_eq!(
            settings.download_directory("HIST 101 Fall 2024").unwrap(),
            PathBuf::from("/srv/sakai")
        );
        assert_eq!(
            settings.download_directory("unknown").unwrap(),
            PathBuf::from("/srv/sakai")
        );
    }

    #[test]
    fn missing_default_directory_is_an_error() {
        let settings = Settings::from_yaml("term:\n  current: Fall\n").unwrap();
        assert!(matches!(
            settings.download_directory("CS101"),
            Err(Error::NoDownloadDirectory(_))
        ));
    }

    #[test]
    fn skip_directories_resolve_against_download_directory() {
        let settings = Settings::from_yaml(YAML).unwrap();
        let skip = settings.skip_directories("CS101 Fall 2024").unwrap();
        assert_eq!(
            skip,
            vec![
                home().join("cs101/assignments"),
                PathBuf::from("/tmp/elsewhere"),
                home().join("scratch"),
            ]
        );
        assert!(settings
            .skip_directories("HIST 101 Fall 2024")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn credentials_must_be_present_and_non_empty() {
        let mut settings = Settings::from_yaml(YAML).unwrap();
        settings.username = Some("onyen".into());
        settings.password = None;
        assert!(matches!(
            settings.credentials(),
            Err(Error::MissingCredential("SAKAI_PASSWORD"))
        ));

        settings.password = Some(String::new());
        assert!(settings.credentials().is_err());

        settings.password = Some("hunter2".into());
        let credentials = settings.credentials().unwrap();
        assert_eq!(credentials.username, "onyen");
        assert_eq!(credentials.password, "hunter2");
    }

    #[test]
    fn expands_leading_tilde_only() {
        assert_eq!(expand_home("~/cs101"), home().join("cs101"));
        assert_eq!(expand_home("~"), home());
        assert_eq!(expand_home("/a/~/b"), PathBuf::from("/a/~/b"));
        assert_eq!(expand_home("a~/b"), PathBuf::from("a~/b"));
    }
}
