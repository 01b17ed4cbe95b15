//! Structural resource extraction from a parsed document.
//!
//! Walks a fixed set of element patterns and resolves every reference
//! against the document URL. Malformed fragments never abort the walk — a
//! reference that does not resolve to an absolute URL is skipped. All public
//! entry points are synchronous because `scraper`'s DOM types are `!Send`;
//! the orchestrator wraps calls in `tokio::task::spawn_blocking`.

use crate::model::{ElementCategory, ElementMeta, Resource, ResourceSet};
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;
use url::Url;

/// Everything the extractor recovers from one document.
#[derive(Debug, Default)]
pub struct ExtractedDocument {
    pub resources: ResourceSet,
    /// Text of every inline `<script>` block, in document order.
    pub inline_scripts: Vec<String>,
}

fn import_rule_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"@import\s+['"]([^'"]+)['"]"#).expect("valid regex"))
}

fn sel(s: &str) -> Selector {
    Selector::parse(s).expect("valid selector")
}

/// Extract sub-resource references and inline script text from a document.
pub fn extract(html: &str, base: &Url) -> ExtractedDocument {
    let document = Html::parse_document(html);
    let mut out = ExtractedDocument::default();

    let resolve = |raw: &str| -> Option<Url> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        base.join(raw).ok()
    };

    let attr_of = |el: &scraper::ElementRef<'_>, name: &str| -> Option<String> {
        el.value().attr(name).map(|v| v.to_string())
    };

    // Images
    for el in document.select(&sel("img")) {
        let Some(url) = el.value().attr("src").and_then(|s| resolve(s)) else {
            continue;
        };
        let meta = ElementMeta {
            alt_text: attr_of(&el, "alt"),
            width: attr_of(&el, "width"),
            height: attr_of(&el, "height"),
            loading: attr_of(&el, "loading"),
            ..Default::default()
        };
        out.resources
            .push(Resource::new(url, ElementCategory::Image, meta));
    }

    // Stylesheets
    for el in document.select(&sel(r#"link[rel~="stylesheet"]"#)) {
        let Some(url) = el.value().attr("href").and_then(|s| resolve(s)) else {
            continue;
        };
        let meta = ElementMeta {
            media: attr_of(&el, "media").or_else(|| Some("all".to_string())),
            integrity: attr_of(&el, "integrity"),
            ..Default::default()
        };
        out.resources
            .push(Resource::new(url, ElementCategory::Stylesheet, meta));
    }

    // Scripts with a source attribute
    for el in document.select(&sel("script[src]")) {
        let Some(url) = el.value().attr("src").and_then(|s| resolve(s)) else {
            continue;
        };
        let meta = ElementMeta {
            is_async: el.value().attr("async").is_some(),
            is_defer: el.value().attr("defer").is_some(),
            mime_hint: attr_of(&el, "type").or_else(|| Some("text/javascript".to_string())),
            ..Default::default()
        };
        out.resources
            .push(Resource::new(url, ElementCategory::Script, meta));
    }

    // Font preloads and font-ish link rels
    for el in document.select(&sel("link[rel]")) {
        let rel = el.value().attr("rel").unwrap_or("");
        if !rel.to_ascii_lowercase().contains("font") {
            continue;
        }
        let Some(url) = el.value().attr("href").and_then(|s| resolve(s)) else {
            continue;
        };
        out.resources.push(Resource::new(
            url,
            ElementCategory::Font,
            ElementMeta::default(),
        ));
    }

    // @import rules inside inline style blocks land with the stylesheets
    for el in document.select(&sel("style")) {
        let css: String = el.text().collect();
        for cap in import_rule_re().captures_iter(&css) {
            let Some(url) = resolve(&cap[1]) else { continue };
            let meta = ElementMeta {
                style_import: true,
                ..Default::default()
            };
            out.resources
                .push(Resource::new(url, ElementCategory::Stylesheet, meta));
        }
    }

    // Videos and their sources
    for el in document.select(&sel("video, source")) {
        let Some(url) = el.value().attr("src").and_then(|s| resolve(s)) else {
            continue;
        };
        let meta = ElementMeta {
            mime_hint: attr_of(&el, "type"),
            ..Default::default()
        };
        out.resources
            .push(Resource::new(url, ElementCategory::Video, meta));
    }

    // Inline frames
    for el in document.select(&sel("iframe")) {
        let Some(url) = el.value().attr("src").and_then(|s| resolve(s)) else {
            continue;
        };
        out.resources.push(Resource::new(
            url,
            ElementCategory::Other,
            ElementMeta::default(),
        ));
    }

    // Inline script text, for the API sniffer
    for el in document.select(&sel("script:not([src])")) {
        let text: String = el.text().collect();
        if !text.trim().is_empty() {
            out.inline_scripts.push(text);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://shop.example.com/page/index.html").unwrap()
    }

    #[test]
    fn test_extracts_all_categories() {
        let html = r#"<html><head>
            <link rel="stylesheet" href="/css/site.css" media="screen">
            <link rel="preload font" href="/fonts/a.woff2">
            <style>@import "extra.css";</style>
            <script src="/js/app.js" defer></script>
        </head><body>
            <img src="/img/logo.png" alt="logo" width="100">
            <video src="/media/intro.mp4" type="video/mp4"></video>
            <iframe src="https://widgets.example.net/embed"></iframe>
            <script>var x = 1;</script>
        </body></html>"#;

        let doc = extract(html, &base());
        assert_eq!(doc.resources.category(ElementCategory::Image).len(), 1);
        assert_eq!(doc.resources.category(ElementCategory::Stylesheet).len(), 2);
        assert_eq!(doc.resources.category(ElementCategory::Script).len(), 1);
        assert_eq!(doc.resources.category(ElementCategory::Font).len(), 1);
        assert_eq!(doc.resources.category(ElementCategory::Video).len(), 1);
        assert_eq!(doc.resources.category(ElementCategory::Other).len(), 1);
        assert_eq!(doc.inline_scripts.len(), 1);

        let img = &doc.resources.category(ElementCategory::Image)[0];
        assert_eq!(img.url.as_str(), "https://shop.example.com/img/logo.png");
        assert_eq!(img.meta.alt_text.as_deref(), Some("logo"));
        assert_eq!(img.meta.width.as_deref(), Some("100"));

        let js = &doc.resources.category(ElementCategory::Script)[0];
        assert!(js.meta.is_defer);
        assert!(!js.meta.is_async);

        let import = &doc.resources.category(ElementCategory::Stylesheet)[1];
        assert!(import.meta.style_import);
        assert_eq!(
            import.url.as_str(),
            "https://shop.example.com/page/extra.css"
        );
    }

    #[test]
    fn test_relative_resolution_against_document_url() {
        let html = r#"<img src="thumb.jpg">"#;
        let doc = extract(html, &base());
        assert_eq!(
            doc.resources.category(ElementCategory::Image)[0].url.as_str(),
            "https://shop.example.com/page/thumb.jpg"
        );
    }

    #[test]
    fn test_skips_unresolvable_and_empty_references() {
        let html = r#"<img src=""><img><link rel="stylesheet"><img src="   ">"#;
        let doc = extract(html, &base());
        assert!(doc.resources.is_empty());
    }

    #[test]
    fn test_malformed_markup_does_not_panic() {
        let html = "<img src='/a.png'><div><<<<span></p><video src=/v.mp4";
        let doc = extract(html, &base());
        assert_eq!(doc.resources.category(ElementCategory::Image).len(), 1);
    }

    #[test]
    fn test_stylesheet_media_defaults_to_all() {
        let html = r#"<link rel="stylesheet" href="/a.css">"#;
        let doc = extract(html, &base());
        let css = &doc.resources.category(ElementCategory::Stylesheet)[0];
        assert_eq!(css.meta.media.as_deref(), Some("all"));
    }

    #[test]
    fn test_duplicate_reference_kept_once_per_category() {
        let html = r#"<img src="/a.png"><img src="/a.png">"#;
        let doc = extract(html, &base());
        assert_eq!(doc.resources.category(ElementCategory::Image).len(), 1);
    }
}
