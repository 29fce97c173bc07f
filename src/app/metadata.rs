//! Dublin Core metadata input
//!
//! Reads `<dcvalue element=".." qualifier="..">` entries from item metadata
//! files into a [`MetadataPatch`] for the `traditionalpageone` section, and
//! generates minimal Dublin Core sidecars for loose content files.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use scraper::{Html, Selector};

use crate::app::models::{MetadataPatch, MetadataValue};
use crate::constants::{dspace, files};
use crate::errors::{MetadataError, MetadataResult};

/// Submission field for a Dublin Core element/qualifier pair
///
/// Only whitelisted pairs map to a field; everything else is dropped.
/// A missing qualifier and the literal `none` are equivalent.
pub fn dublin_core_field(element: &str, qualifier: Option<&str>) -> Option<&'static str> {
    let element = element.trim().to_ascii_lowercase();
    let qualifier = qualifier
        .map(|q| q.trim().to_ascii_lowercase())
        .filter(|q| !q.is_empty() && q != "none");

    let field = match (element.as_str(), qualifier.as_deref()) {
        ("title", None) => "dc.title",
        ("title", Some("alternative")) => "dc.title.alternative",
        ("contributor", Some("author")) | ("creator", None) => "dc.contributor.author",
        ("date", Some("issued")) | ("date", None) => "dc.date.issued",
        ("type", None) => "dc.type",
        ("subject", None) => "dc.subject",
        ("description", Some("abstract")) => "dc.description.abstract",
        ("description", None) => "dc.description",
        ("publisher", None) => "dc.publisher",
        ("language", Some("iso")) => "dc.language.iso",
        ("identifier", Some("citation")) => "dc.identifier.citation",
        _ => return None,
    };
    Some(field)
}

/// Parse Dublin Core markup into a metadata patch
///
/// Entries with empty values or unmapped fields are skipped. Repeated fields
/// accumulate their values in document order.
pub fn parse_dublin_core(markup: &str) -> MetadataPatch {
    let document = Html::parse_document(markup);
    let mut patch = MetadataPatch::new();

    let Ok(selector) = Selector::parse("dcvalue") else {
        return patch;
    };

    for entry in document.select(&selector) {
        let attrs = entry.value();
        let Some(element) = attrs.attr("element") else {
            continue;
        };

        let value = entry.text().collect::<String>();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match dublin_core_field(element, attrs.attr("qualifier")) {
            Some(field) => {
                let language = attrs
                    .attr("language")
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && *l != "none")
                    .map(str::to_string);
                patch.add_field(
                    dspace::METADATA_SECTION,
                    field,
                    MetadataValue {
                        value: value.to_string(),
                        language,
                    },
                );
            }
            None => tracing::debug!(
                "Skipping unmapped dcvalue element={} qualifier={:?}",
                element,
                attrs.attr("qualifier")
            ),
        }
    }

    patch
}

/// Read a metadata file into a patch
///
/// # Errors
///
/// `NotFound` if the file is missing, `NoUsableFields` if nothing mapped
pub async fn read_metadata_file(path: &Path) -> MetadataResult<MetadataPatch> {
    if !path.exists() {
        return Err(MetadataError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let markup = tokio::fs::read_to_string(path).await?;
    let patch = parse_dublin_core(&markup);

    if patch.is_empty() {
        return Err(MetadataError::NoUsableFields {
            path: path.to_path_buf(),
        });
    }

    tracing::debug!("Read {} field(s) from {}", patch.len(), path.display());
    Ok(patch)
}

/// Descriptive values for a generated sidecar; unset values get defaults
#[derive(Debug, Clone, Default)]
pub struct ItemInfo {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
    pub item_type: Option<String>,
}

/// Sidecar path for a loose content file: `<stem>_dublin_core.xml`
pub fn sidecar_path(content_path: &Path) -> PathBuf {
    let stem = content_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    content_path.with_file_name(format!("{}{}", stem, files::DUBLIN_CORE_SUFFIX))
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render a Dublin Core document for a scanned file
pub fn render_dublin_core(file_name: &str, scanned: DateTime<Local>, info: &ItemInfo) -> String {
    let entries = [
        (
            "title",
            info.title
                .clone()
                .unwrap_or_else(|| format!("Scanned Document: {}", file_name)),
        ),
        (
            "creator",
            info.creator.clone().unwrap_or_else(|| "Scanner".to_string()),
        ),
        (
            "date",
            info.date
                .clone()
                .unwrap_or_else(|| scanned.format("%Y-%m-%d").to_string()),
        ),
        (
            "description",
            info.description
                .clone()
                .unwrap_or_else(|| format!("Scanned on {}", scanned.format("%Y-%m-%d %H:%M:%S"))),
        ),
        (
            "type",
            info.item_type.clone().unwrap_or_else(|| "Text".to_string()),
        ),
        ("format", "application/pdf".to_string()),
    ];

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<dublin_core schema=\"dc\">\n");
    for (element, value) in entries.iter().filter(|(_, v)| !v.trim().is_empty()) {
        xml.push_str(&format!(
            "  <dcvalue element=\"{}\">{}</dcvalue>\n",
            element,
            escape_xml(value)
        ));
    }
    xml.push_str("</dublin_core>\n");
    xml
}

/// Make sure a loose content file has a Dublin Core sidecar
///
/// An existing sidecar is left untouched. A generated one is titled after the
/// file name and dated from the file's modification time.
pub async fn ensure_sidecar(content_path: &Path) -> MetadataResult<PathBuf> {
    let sidecar = sidecar_path(content_path);
    if sidecar.exists() {
        return Ok(sidecar);
    }

    let modified = tokio::fs::metadata(content_path).await?.modified()?;
    let file_name = content_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let info = ItemInfo {
        title: Some(file_name.clone()),
        ..Default::default()
    };

    let xml = render_dublin_core(&file_name, DateTime::<Local>::from(modified), &info);
    tokio::fs::write(&sidecar, xml).await?;
    tracing::info!("Generated metadata sidecar {}", sidecar.display());
    Ok(sidecar)
}
