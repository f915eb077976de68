//! El Tiempo front-page layout.
//!
//! Headline cards are `article.c-article`. The category only exists as
//! `data-category`; the title is `data-name` or the `h3.c-article__title`
//! text. When the `h3` supplied the title, its anchor is the link; otherwise
//! the first anchor in the card is used.

use super::SiteLayout;
use crate::models::Site;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

static CARD: Lazy<Selector> = Lazy::new(|| Selector::parse("article.c-article").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("h3.c-article__title").unwrap());

pub fn layout() -> SiteLayout {
    SiteLayout {
        site: Site::ElTiempo,
        item: &*CARD,
        category_attr: "data-category",
        category_fallback: None,
        title_attr: "data-name",
        title_fallback: Some(&*TITLE),
        link_in_title: true,
    }
}

pub fn matches_markup(document: &Html) -> bool {
    document.select(&CARD).next().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NO_CATEGORY, NO_LINK};
    use crate::scrapers::extract_headlines;

    const FRONT_PAGE: &str = r#"
        <html><body>
          <article class="c-article c-article--destacado" data-category="Política" data-name="Congreso aprueba reforma">
            <a href="/fotos/galeria-1"><img src="x.jpg"></a>
            <h3 class="c-article__title"><a href="/politica/congreso-reforma">Congreso aprueba reforma</a></h3>
          </article>
          <article class="c-article">
            <h3 class="c-article__title"><a href="https://www.eltiempo.com/mundo/cumbre">  Cumbre
              en Lima </a></h3>
            <div class="c-article__epigraph">Mundo</div>
          </article>
          <article class="c-article" data-name="Solo texto">
            <h3 class="c-article__title">Solo texto</h3>
            <footer><a href="/deportes/resumen">Ver más</a></footer>
          </article>
          <article class="c-article" data-name="Sin enlaces"></article>
          <article class="other"><a href="/no-es-tarjeta">x</a></article>
        </body></html>
    "#;

    #[test]
    fn test_extracts_only_c_article_cards() {
        let doc = Html::parse_document(FRONT_PAGE);
        let rows = extract_headlines(Site::ElTiempo, &doc);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].category, "Política");
        assert_eq!(rows[0].title, "Congreso aprueba reforma");
    }

    #[test]
    fn test_named_card_takes_first_anchor() {
        let doc = Html::parse_document(FRONT_PAGE);
        let rows = extract_headlines(Site::ElTiempo, &doc);
        assert_eq!(rows[0].link, "https://www.eltiempo.com/fotos/galeria-1");
    }

    #[test]
    fn test_h3_title_takes_h3_anchor() {
        let html = r#"
            <article class="c-article">
              <a href="/fotos/galeria-2"><img src="y.jpg"></a>
              <h3 class="c-article__title"><a href="/economia/dolar">Dólar baja</a></h3>
            </article>
        "#;
        let doc = Html::parse_document(html);
        let rows = extract_headlines(Site::ElTiempo, &doc);
        assert_eq!(rows[0].title, "Dólar baja");
        assert_eq!(rows[0].link, "https://www.eltiempo.com/economia/dolar");
    }

    #[test]
    fn test_h3_without_anchor_falls_back_to_card() {
        let html = r#"
            <article class="c-article">
              <h3 class="c-article__title">Sin ancla</h3>
              <a href="/vida/nota">Leer</a>
            </article>
        "#;
        let doc = Html::parse_document(html);
        let rows = extract_headlines(Site::ElTiempo, &doc);
        assert_eq!(rows[0].link, "https://www.eltiempo.com/vida/nota");
    }

    #[test]
    fn test_title_text_fallback_and_no_category_lookup() {
        let doc = Html::parse_document(FRONT_PAGE);
        let rows = extract_headlines(Site::ElTiempo, &doc);
        assert_eq!(rows[1].title, "Cumbre en Lima");
        assert_eq!(rows[1].category, NO_CATEGORY);
        assert_eq!(rows[1].link, "https://www.eltiempo.com/mundo/cumbre");
    }

    #[test]
    fn test_link_falls_back_to_card_anchor() {
        let doc = Html::parse_document(FRONT_PAGE);
        let rows = extract_headlines(Site::ElTiempo, &doc);
        assert_eq!(rows[2].link, "https://www.eltiempo.com/deportes/resumen");
        assert_eq!(rows[3].link, NO_LINK);
    }
}
