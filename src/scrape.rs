use crate::error::{Error, Result};
use crate::structs::*;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|_| Error::Selector(css.into()))
}

/// Rendered text of an element with whitespace runs collapsed.
pub fn inner_text(el: ElementRef) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first<'a>(el: ElementRef<'a>, css: &str) -> Result<Option<ElementRef<'a>>> {
    Ok(el.select(&selector(css)?).next())
}

pub fn text_indent(style: &str) -> Result<Option<usize>> {
    let re = Regex::new(r"(?i)text-indent: ?([0-9]+)em")?;
    Ok(re.captures(style).and_then(|caps| caps[1].parse().ok()))
}

pub fn has_resources_table(doc: &Html) -> Result<bool> {
    Ok(doc.select(&selector("table.resourcesList")?).next().is_some())
}

/// Rows of the resources table, minus the `#expansion` marker rows.
pub fn parse_resource_rows(doc: &Html) -> Result<Vec<ResourceRow>> {
    let row_sel = selector("table.resourcesList tbody > tr")?;
    let mut rows = Vec::new();

    for tr in doc.select(&row_sel) {
        if first(tr, "#expansion")?.is_some() {
            continue;
        }
        rows.push(parse_resource_row(tr)?);
    }

    Ok(rows)
}

fn parse_resource_row(tr: ElementRef) -> Result<ResourceRow> {
    let title_td = first(tr, "td.title")?.ok_or_else(|| Error::Row(inner_text(tr)))?;
    let title = first(title_td, "span.resource-name")?
        .map(inner_text)
        .ok_or_else(|| Error::Row(inner_text(title_td)))?;

    let title_a = first(title_td, "a:last-of-type")?;
    let link = title_a.and_then(|a| a.attr("href")).map(String::from);
    let filetype = title_a
        .and_then(|a| a.attr("title"))
        .unwrap_or_default()
        .to_string();

    let indent = text_indent(title_td.attr("style").unwrap_or_default())?
        .ok_or_else(|| Error::Row(format!("{title}: no text-indent")))?;

    let details = if indent == 0 {
        None
    } else {
        let column = |css: &str| -> Result<String> {
            Ok(first(tr, css)?.map(inner_text).unwrap_or_default())
        };
        Some(RowDetails {
            creator: column(".resource-creator")?,
            modified: column(".resource-modified")?,
            size: column(".resource-size")?,
        })
    };

    Ok(ResourceRow {
        title,
        link,
        filetype,
        indent,
        details,
    })
}

/// A collapsed folder in the listing and what clicking it would do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderToggle {
    pub href: Option<String>,
    pub form: String,
    /// `document.getElementById(id).value = v` assignments from its onclick.
    pub assignments: Vec<(String, String)>,
}

pub fn collapsed_folder(doc: &Html) -> Result<Option<FolderToggle>> {
    let Some(a) = doc
        .select(&selector("table.resourcesList a.nil.fa-folder")?)
        .next()
    else {
        return Ok(None);
    };

    let onclick = a.attr("onclick").unwrap_or_default();
    let assign_re =
        Regex::new(r#"getElementById\(\s*['"]([^'"]+)['"]\s*\)\.value\s*=\s*['"]([^'"]*)['"]"#)?;
    let form_re = Regex::new(r#"submitform\(\s*['"]([^'"]+)['"]"#)?;

    Ok(Some(FolderToggle {
        href: a
            .attr("href")
            .filter(|href| !href.is_empty() && !href.starts_with('#'))
            .map(String::from),
        form: form_re
            .captures(onclick)
            .map(|caps| caps[1].to_string())
            .unwrap_or_else(|| "showForm".into()),
        assignments: assign_re
            .captures_iter(onclick)
            .map(|caps| (caps[1].to_string(), caps[2].to_string()))
            .collect(),
    }))
}

/// Site tabs in the portal's top navigation.
pub fn parse_sites(doc: &Html) -> Result<Vec<Site>> {
    let mut sites = Vec::new();
    for a in doc.select(&selector("#topnav_container li a.link-container")?) {
        let (Some(href), Some(title)) = (a.attr("href"), a.attr("title")) else {
            continue;
        };
        sites.push(Site {
            id: href.trim_end_matches('/').rsplit('/').next().unwrap_or_default().into(),
            title: title.into(),
            href: href.into(),
        });
    }
    Ok(sites)
}

/// Title of the highlighted tool in the site's tool menu.
pub fn current_tool(doc: &Html) -> Result<Option<String>> {
    Ok(doc
        .select(&selector("#toolMenu li.is-current a")?)
        .next()
        .and_then(|a| {
            a.attr("title").map(String::from).or_else(|| {
                a.select(&selector(".Mrphs-toolsNav__menuitem--title").ok()?)
                    .next()
                    .map(inner_text)
            })
        }))
}

pub fn tool_link(doc: &Html, name: &str) -> Result<Option<String>> {
    Ok(doc
        .select(&selector("#toolMenu li a")?)
        .find(|a| inner_text(*a).contains(name))
        .and_then(|a| a.attr("href"))
        .map(String::from))
}

/// Breadcrumb of the folder currently shown by the Resources tool.
pub fn breadcrumbs(doc: &Html) -> Result<Vec<String>> {
    Ok(doc
        .select(&selector("#showForm ol li:not(.dropdown)")?)
        .map(inner_text)
        .collect())
}

/// First link whose text contains `text`, ignoring case.
pub fn link_by_text(doc: &Html, text: &str) -> Result<Option<String>> {
    let needle = text.to_lowercase();
    Ok(doc
        .select(&selector("a[href]")?)
        .find(|a| inner_text(*a).to_lowercase().contains(&needle))
        .and_then(|a| a.attr("href"))
        .map(String::from))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub id: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    pub action: String,
    pub method: String,
    pub fields: Vec<FormField>,
    pub buttons: Vec<FormField>,
}

impl Form {
    /// Sets the field with this id or name. Returns false if there is none.
    pub fn fill(&mut self, key: &str, value: &str) -> bool {
        match self
            .fields
            .iter_mut()
            .find(|f| f.id.as_deref() == Some(key) || f.name == key)
        {
            Some(field) => {
                field.value = value.into();
                true
            }
            None => false,
        }
    }

    /// Includes a submit button in the submission, the first one if `name`
    /// is `None`, as clicking it would.
    pub fn press(&mut self, name: Option<&str>) {
        let button = self
            .buttons
            .iter()
            .find(|b| name.map_or(true, |n| b.name == n))
            .cloned();
        if let Some(button) = button {
            self.fields.push(button);
        }
    }

    pub fn pairs(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.value.clone()))
            .collect()
    }
}

/// The first form matching `form_css` that contains an element matching
/// `containing`, if given.
pub fn find_form(doc: &Html, form_css: &str, containing: Option<&str>) -> Result<Option<Form>> {
    let inner = containing.map(selector).transpose()?;
    let Some(form) = doc
        .select(&selector(form_css)?)
        .find(|f| inner.as_ref().map_or(true, |s| f.select(s).next().is_some()))
    else {
        return Ok(None);
    };

    let mut fields = Vec::new();
    let mut buttons = Vec::new();
    for el in form.select(&selector("input[name], textarea[name], button[name]")?) {
        let attr = |name: &str| el.attr(name).map(String::from);
        let field = FormField {
            name: attr("name").unwrap_or_default(),
            id: attr("id"),
            value: match el.value().name() {
                "textarea" => el.text().collect(),
                _ => attr("value").unwrap_or_default(),
            },
        };
        let kind = attr("type").unwrap_or_default().to_lowercase();
        match (el.value().name(), kind.as_str()) {
            ("button", "" | "submit") | ("input", "submit" | "image") => buttons.push(field),
            ("button", _) | ("input", "button" | "reset") => {}
            ("input", "checkbox" | "radio") if el.attr("checked").is_none() => {}
            _ => fields.push(field),
        }
    }

    Ok(Some(Form {
        action: form.attr("action").unwrap_or_default().into(),
        method: form.attr("method").unwrap_or("get").to_uppercase(),
        fields,
        buttons,
    }))
}
