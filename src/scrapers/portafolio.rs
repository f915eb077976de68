//! Portafolio front-page layout.
//!
//! Every `<article>` on the page is a headline card. Cards usually carry
//! `data-category` and `data-name`; older cards only render the values as
//! `p.tarjeta__categoria` and `p.tarjeta__titulo`. Links are site-relative
//! and prefixed with `https://www.portafolio.co`.

use super::SiteLayout;
use crate::models::Site;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

static CARD: Lazy<Selector> = Lazy::new(|| Selector::parse("article").unwrap());
static CATEGORY: Lazy<Selector> = Lazy::new(|| Selector::parse("p.tarjeta__categoria").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("p.tarjeta__titulo").unwrap());

pub fn layout() -> SiteLayout {
    SiteLayout {
        site: Site::Portafolio,
        item: &*CARD,
        category_attr: "data-category",
        category_fallback: Some(&*CATEGORY),
        title_attr: "data-name",
        title_fallback: Some(&*TITLE),
        link_in_title: false,
    }
}

/// Any `<article>` at all. Checked after the more specific El Tiempo marker.
pub fn matches_markup(document: &Html) -> bool {
    document.select(&CARD).next().is_some()
}
