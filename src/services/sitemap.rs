//! Sitemap XML emission for the controlled domain.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::models::{Article, ImageVariant, ImageVariants, Language};
use crate::repository::{ArticleFilter, Database, DbError};
use crate::utils::url::{is_on_origin, rewrite_host, source_domain};
use crate::utils::xml_escape;

const FALLBACK_SOURCE_DOMAIN: &str = "sermitsiaq.ag";

#[derive(Debug, Error)]
pub enum SitemapError {
    #[error(transparent)]
    Database(#[from] DbError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// File name of the sitemap for a language.
pub fn sitemap_filename(language: Language) -> &'static str {
    match language {
        Language::En => "sitemap.xml",
        Language::Da => "sitemap-DK.xml",
        Language::Kl => "sitemap-KL.xml",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<String>,
    pub image: Option<String>,
}

/// Pick the image URL for an article: a controlled-origin copy when one
/// exists, otherwise the canonical image-service URL for its id.
fn image_loc(article: &Article, origin: &str) -> Option<String> {
    let image = article.image_data.as_ref()?;
    let order = [
        ImageVariant::DesktopWebp,
        ImageVariant::Fallback,
        ImageVariant::DesktopJpeg,
        ImageVariant::MobileWebp,
        ImageVariant::MobileJpeg,
    ];
    if let Some(local) = order
        .iter()
        .filter_map(|v| image.variant(*v))
        .find(|u| is_on_origin(u, origin))
    {
        return Some(local.to_string());
    }
    let id = image.image_id()?;
    let domain = image
        .variant_urls()
        .into_iter()
        .find_map(source_domain)
        .or_else(|| source_domain(&article.published_url))
        .unwrap_or_else(|| FALLBACK_SOURCE_DOMAIN.to_string());
    Some(format!(
        "https://image.{}?imageId={}&format=webp&width=1200",
        domain, id
    ))
}

/// The `<url>` entry for one article, or `None` for rows without a URL.
pub fn sitemap_entry(article: &Article, domain: &str, origin: &str) -> Option<SitemapEntry> {
    let source = match article.language {
        Language::En => article
            .published_url_en
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(&article.published_url),
        _ => &article.published_url,
    };
    if source.is_empty() {
        return None;
    }
    let lastmod = article
        .published_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| article.updated_at.format("%Y-%m-%d").to_string());
    Some(SitemapEntry {
        loc: rewrite_host(source, domain),
        lastmod: Some(format!("{}T00:00+01:00", lastmod)),
        image: image_loc(article, origin),
    })
}

pub fn render_sitemap(entries: &[SitemapEntry]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\" \
         xmlns:image=\"http://www.google.com/schemas/sitemap-image/1.1\">\n",
    );
    for entry in entries {
        xml.push_str("  <url>\n");
        let _ = writeln!(xml, "    <loc>{}</loc>", xml_escape(&entry.loc));
        if let Some(lastmod) = &entry.lastmod {
            let _ = writeln!(xml, "    <lastmod>{}</lastmod>", lastmod);
        }
        if let Some(image) = &entry.image {
            let _ = writeln!(
                xml,
                "    <image:image><image:loc>{}</image:loc></image:image>",
                xml_escape(image)
            );
        }
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

/// Public entries for one language, first occurrence of each `loc` kept.
pub async fn collect_entries(
    db: &Database,
    language: Language,
    domain: &str,
    origin: &str,
) -> Result<Vec<SitemapEntry>, DbError> {
    let articles = db
        .articles()
        .list(&ArticleFilter {
            language: Some(language),
            public_only: true,
            with_url: true,
            ..Default::default()
        })
        .await?;
    let mut seen = HashSet::new();
    Ok(articles
        .iter()
        .filter_map(|a| sitemap_entry(a, domain, origin))
        .filter(|e| seen.insert(e.loc.clone()))
        .collect())
}

/// Write the sitemap files into `output_dir`. Returns each path with its
/// entry count.
pub async fn write_sitemaps(
    db: &Database,
    output_dir: &Path,
    language: Option<Language>,
    domain: &str,
    origin: &str,
) -> Result<Vec<(PathBuf, usize)>, SitemapError> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|source| SitemapError::Io {
            path: output_dir.to_path_buf(),
            source,
        })?;

    let languages: Vec<Language> = match language {
        Some(l) => vec![l],
        None => Language::ALL.to_vec(),
    };

    let mut written = Vec::new();
    for language in languages {
        let entries = collect_entries(db, language, domain, origin).await?;
        let path = output_dir.join(sitemap_filename(language));
        tokio::fs::write(&path, render_sitemap(&entries))
            .await
            .map_err(|source| SitemapError::Io {
                path: path.clone(),
                source,
            })?;
        info!("Wrote {} ({} urls)", path.display(), entries.len());
        written.push((path, entries.len()));
    }
    Ok(written)
}
