use chrono::{DateTime, Utc};
use serde::Serialize;

pub const FOLDER: &str = "Folder";
pub const WEB_LINK: &str = "Web link (URL)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FileType {
    Folder,
    WebLink,
    /// Any other tag the listing reports, e.g. "PDF" or "Word document".
    File(String),
}

impl FileType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            FOLDER => FileType::Folder,
            WEB_LINK => FileType::WebLink,
            other => FileType::File(other.into()),
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, FileType::Folder)
    }
}

/// Columns only present on non-root rows of the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDetails {
    pub creator: String,
    pub modified: String,
    pub size: String,
}

/// One `<tr>` of the resources table, as scraped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRow {
    pub title: String,
    pub link: Option<String>,
    pub filetype: String,
    pub indent: usize,
    pub details: Option<RowDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub title: String,
    pub link: Option<String>,
    pub filetype: FileType,
    pub indent: usize,
    pub creator: Option<String>,
    pub modified_time: Option<String>,
    /// Folders only, from the "<N> items" column.
    pub item_count: Option<usize>,
    /// Files only, as displayed by the portal.
    pub size: Option<String>,
}

impl From<ResourceRow> for Resource {
    fn from(row: ResourceRow) -> Self {
        let mut resource = Resource {
            title: row.title,
            link: row.link,
            filetype: FileType::from_tag(&row.filetype),
            indent: row.indent,
            creator: None,
            modified_time: None,
            item_count: None,
            size: None,
        };

        // the root row carries no details
        if row.indent == 0 {
            return resource;
        }
        if let Some(details) = row.details {
            if details.size.to_lowercase().contains("item") {
                resource.item_count = details
                    .size
                    .split_whitespace()
                    .next()
                    .and_then(|n| n.parse().ok());
            } else {
                resource.size = Some(details.size);
            }
            resource.creator = Some(details.creator);
            resource.modified_time = Some(details.modified);
        }
        resource
    }
}

/// A portal workspace tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Site {
    pub id: String,
    pub title: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadResult {
    pub url: String,
    pub filename: Option<String>,
    pub date: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(indent: usize, filetype: &str, size: &str) -> ResourceRow {
        ResourceRow {
            title: "Week 1".into(),
            link: Some("https://sakai.unc.edu/access/content/group/x/".into()),
            filetype: filetype.into(),
            indent,
            details: Some(RowDetails {
                creator: "Jane Doe".into(),
                modified: "Aug 20, 2024 10:14 am".into(),
                size: size.into(),
            }),
        }
    }

    #[test]
    fn folder_rows_report_item_count() {
        let resource = Resource::from(row(1, FOLDER, "3 items"));
        assert_eq!(resource.filetype, FileType::Folder);
        assert_eq!(resource.item_count, Some(3));
        assert_eq!(resource.size, None);
        assert_eq!(resource.creator.as_deref(), Some("Jane Doe"));

        let single = Resource::from(row(1, FOLDER, "1 item"));
        assert_eq!(single.item_count, Some(1));
    }

    #[test]
    fn file_rows_report_size() {
        let resource = Resource::from(row(2, "PDF", "120 KB"));
        assert_eq!(resource.filetype, FileType::File("PDF".into()));
        assert_eq!(resource.item_count, None);
        assert_eq!(resource.size.as_deref(), Some("120 KB"));
    }

    #[test]
    fn root_row_ignores_details() {
        let resource = Resource::from(row(0, FOLDER, "12 items"));
        assert_eq!(resource.creator, None);
        assert_eq!(resource.modified_time, None);
        assert_eq!(resource.item_count, None);
        assert_eq!(resource.size, None);
    }

    #[test]
    fn web_link_tag() {
        assert_eq!(FileType::from_tag(WEB_LINK), FileType::WebLink);
        assert!(!FileType::from_tag(WEB_LINK).is_folder());
    }
}
