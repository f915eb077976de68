//! Headline scrapers for the newspapers the pipeline knows about.
//!
//! Each front page is parsed once with [`scraper::Html`]; the site is
//! identified by [`detect_site`] and its rows pulled out by
//! [`extract_headlines`].
//!
//! # Supported Sources
//!
//! | Source | Module | Item selector | Notes |
//! |--------|--------|---------------|-------|
//! | Portafolio | [`portafolio`] | `article` | category and title fall back to `p.tarjeta__*` text |
//! | El Tiempo | [`eltiempo`] | `article.c-article` | title from the `h3` also takes its link from there |
//!
//! # Common Patterns
//!
//! A site is described by a [`SiteLayout`]: for each matched item the
//! category and title come from a `data-*` attribute, falling back to the
//! text of a nested element, then to a sentinel. The link is the first
//! `a[href]` in the card, prefixed with the site origin when it starts with
//! `/`. El Tiempo cards whose title came from the `h3` look for the link
//! inside that `h3` first.

pub mod eltiempo;
pub mod portafolio;

use crate::models::{Headline, NO_CATEGORY, NO_LINK, NO_TITLE, Site};
use crate::utils::squash_whitespace;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument};

static ANCHOR_WITH_HREF: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// How headlines are laid out on one site's front page.
#[derive(Debug, Clone, Copy)]
pub struct SiteLayout {
    pub site: Site,
    /// One match per headline card.
    pub item: &'static Selector,
    pub category_attr: &'static str,
    pub category_fallback: Option<&'static Selector>,
    pub title_attr: &'static str,
    pub title_fallback: Option<&'static Selector>,
    /// Search the title fallback element for a link when it supplied the title.
    pub link_in_title: bool,
}

/// Identify which newspaper produced `document`.
///
/// The object key is checked first, in [`Site::ALL`] order. When the key
/// names no site, the markup decides: El Tiempo's `article.c-article` cards
/// are tested before Portafolio's bare `article`. `None` means unknown.
#[instrument(level = "debug", skip(document))]
pub fn detect_site(key: &str, document: &Html) -> Option<Site> {
    if let Some(site) = Site::ALL.into_iter().find(|s| key.contains(s.token())) {
        debug!(%site, "Site identified from object key");
        return Some(site);
    }

    let site = if eltiempo::matches_markup(document) {
        Some(Site::ElTiempo)
    } else if portafolio::matches_markup(document) {
        Some(Site::Portafolio)
    } else {
        None
    };
    debug!(site = ?site, "Site identified from markup");
    site
}

/// Layout used to parse `site`.
pub fn layout_for(site: Site) -> SiteLayout {
    match site {
        Site::Portafolio => portafolio::layout(),
        Site::ElTiempo => eltiempo::layout(),
    }
}

/// Extract every headline card on the page, in document order.
pub fn extract_headlines(site: Site, document: &Html) -> Vec<Headline> {
    extract_with_layout(&layout_for(site), document)
}

/// Extract with an explicit layout.
pub fn extract_with_layout(layout: &SiteLayout, document: &Html) -> Vec<Headline> {
    let headlines: Vec<Headline> = document
        .select(layout.item)
        .map(|card| extract_item(layout, card))
        .collect();

    info!(site = %layout.site, count = headlines.len(), "Extracted headlines");
    headlines
}

fn extract_item(layout: &SiteLayout, card: ElementRef<'_>) -> Headline {
    let category = attr_value(card, layout.category_attr)
        .or_else(|| {
            layout
                .category_fallback
                .and_then(|selector| card.select(selector).next())
                .and_then(text_of)
        })
        .unwrap_or_else(|| NO_CATEGORY.to_string());

    let (title, title_node) = match attr_value(card, layout.title_attr) {
        Some(title) => (title, None),
        None => {
            let node = layout
                .title_fallback
                .and_then(|selector| card.select(selector).next());
            let title = node.and_then(text_of).unwrap_or_else(|| NO_TITLE.to_string());
            (title, node)
        }
    };

    let link = title_node
        .filter(|_| layout.link_in_title)
        .and_then(first_href)
        .or_else(|| first_href(card))
        .map_or_else(|| NO_LINK.to_string(), |href| resolve_link(layout.site, href));

    Headline {
        category,
        title,
        link,
    }
}

/// Attribute value as written. Blank values count as missing.
fn attr_value(card: ElementRef<'_>, attr: &str) -> Option<String> {
    card.value()
        .attr(attr)
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

/// Whitespace-collapsed text of `node`, `None` when empty.
fn text_of(node: ElementRef<'_>) -> Option<String> {
    Some(squash_whitespace(&node.text().collect::<String>())).filter(|t| !t.is_empty())
}

fn first_href<'a>(scope: ElementRef<'a>) -> Option<&'a str> {
    scope
        .select(&ANCHOR_WITH_HREF)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())
}

/// Prefix a site-relative href with the site origin; any other href is
/// returned as written.
pub fn resolve_link(site: Site, href: &str) -> String {
    if href.starts_with('/') {
        format!("{}{}", site.base_url(), href)
    } else {
        href.to_string()
    }
}
