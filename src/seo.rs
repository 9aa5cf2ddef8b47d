//! Build-time SEO prerender.
//!
//! Takes the single-page web build's `index.html` and writes one copy per
//! public route, each with its own `<title>`, description and keywords,
//! so crawlers that do not run JavaScript still see route metadata.
//!
//! Routes come from a JSON manifest:
//! `[{ "path": "/services", "title": "...", "description": "...", "keywords": "..." }]`

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>.*?</title>").expect("title regex"));

static DESCRIPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta\s[^>]*name\s*=\s*["']description["'][^>]*>"#).expect("description regex")
});

static KEYWORDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta\s[^>]*name\s*=\s*["']keywords["'][^>]*>"#).expect("keywords regex")
});

static HEAD_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</head\s*>").expect("head regex"));

#[derive(Debug, thiserror::Error)]
pub enum SeoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid route manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Template has no </head> to insert metadata into")]
    MissingHead,

    #[error("Route path not allowed: {0}")]
    InvalidRoute(String),
}

/// Metadata for one public route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMeta {
    pub path: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Comma-separated, as it appears in the tag.
    #[serde(default)]
    pub keywords: String,
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Replace the first tag matched by `re` with `tag`, or queue it for
/// insertion before `</head>`.
fn upsert(html: String, re: &Regex, tag: String, missing: &mut Vec<String>) -> String {
    if re.is_match(&html) {
        re.replace(&html, NoExpand(&tag)).into_owned()
    } else {
        missing.push(tag);
        html
    }
}

/// Render `template` with the metadata of one route.
///
/// Existing tags are replaced in place; absent ones are inserted just
/// before `</head>`. An empty description or keyword list leaves the
/// template's tag untouched.
pub fn render_route(template: &str, meta: &RouteMeta) -> Result<String, SeoError> {
    let mut missing = Vec::new();
    let mut html = upsert(
        template.to_string(),
        &TITLE_RE,
        format!("<title>{}</title>", escape_html(&meta.title)),
        &mut missing,
    );

    if !meta.description.is_empty() {
        html = upsert(
            html,
            &DESCRIPTION_RE,
            format!(
                r#"<meta name="description" content="{}" />"#,
                escape_html(&meta.description)
            ),
            &mut missing,
        );
    }
    if !meta.keywords.is_empty() {
        html = upsert(
            html,
            &KEYWORDS_RE,
            format!(r#"<meta name="keywords" content="{}" />"#, escape_html(&meta.keywords)),
            &mut missing,
        );
    }

    if missing.is_empty() {
        return Ok(html);
    }
    let Some(head_close) = HEAD_CLOSE_RE.find(&html) else {
        return Err(SeoError::MissingHead);
    };
    let mut inserted = missing.join("\n    ");
    inserted.push_str("\n  ");
    html.insert_str(head_close.start(), &inserted);
    Ok(html)
}

/// Output file for a route: `/` → `index.html`, `/a/b` → `a/b/index.html`.
fn route_file(out_dir: &Path, route: &str) -> Result<PathBuf, SeoError> {
    let relative = Path::new(route.trim_matches('/'));
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(SeoError::InvalidRoute(route.to_string()));
    }
    Ok(out_dir.join(relative).join("index.html"))
}

/// Write one rendered page per route under `out_dir`. Returns the files
/// written, in manifest order.
pub fn write_route_pages(
    template: &str,
    routes: &[RouteMeta],
    out_dir: &Path,
) -> Result<Vec<PathBuf>, SeoError> {
    let mut written = Vec::with_capacity(routes.len());
    for route in routes {
        let file = route_file(out_dir, &route.path)?;
        let html = render_route(template, route)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&file, html)?;
        tracing::debug!(route = %route.path, file = %file.display(), "Route page written");
        written.push(file);
    }
    tracing::info!(count = written.len(), out = %out_dir.display(), "SEO route pages generated");
    Ok(written)
}

pub fn load_manifest(path: &Path) -> Result<Vec<RouteMeta>, SeoError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Read the template and manifest from disk and write every route page.
pub fn prerender(template: &Path, manifest: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, SeoError> {
    let html = fs::read_to_string(template)?;
    let routes = load_manifest(manifest)?;
    write_route_pages(&html, &routes, out_dir)
}
