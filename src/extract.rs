use chrono::NaiveDateTime;
use scraper::{ElementRef, Html, Selector};

use crate::driver::{Browser, Locator};
use crate::error::PostError;
use crate::models::PostRecord;
use crate::numerals::to_count;
use crate::selectors::PostSelectors;

/// Text nodes trimmed and glued together, with stray line breaks turned
/// into spaces.
fn text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<String>()
        .replace(['\n', '\r'], " ")
}

fn first_text(doc: &Html, sel: &Selector) -> Option<String> {
    doc.select(sel).next().map(text)
}

fn short(s: &str) -> String {
    s.chars().take(30).collect()
}

fn post_text(doc: &Html, sel: &PostSelectors) -> String {
    let primary = first_text(doc, &sel.text).unwrap_or_default();
    if !primary.is_empty() {
        return primary;
    }
    match first_text(doc, &sel.caption) {
        Some(caption) if !caption.is_empty() => caption,
        _ => " ".to_string(),
    }
}

fn comment_count(doc: &Html, sel: &PostSelectors, label: &str) -> u64 {
    let Some(block) = doc.select(&sel.comment_block).next() else {
        tracing::debug!("No comment block for post: {label}");
        return 0;
    };
    let hit = block
        .select(&sel.span)
        .map(text)
        .find(|t| sel.comment_words.iter().any(|w| t.contains(w.as_str())));
    match hit {
        Some(t) => to_count(&t),
        None => {
            tracing::debug!("No comment counter in comment block for post: {label}");
            0
        }
    }
}

/// Builds a record from the outer HTML of one post container.
pub fn extract_post(html: &str, sel: &PostSelectors, at: NaiveDateTime) -> PostRecord {
    let doc = Html::parse_fragment(html);
    let post_text = post_text(&doc, sel);
    let label = short(&post_text);

    let counter = |s: &Selector| first_text(&doc, s).map(|t| to_count(&t)).unwrap_or(0);

    PostRecord {
        date: at,
        reactions: counter(&sel.reactions),
        comments: comment_count(&doc, sel, &label),
        shares: counter(&sel.shares),
        post_text,
    }
}

/// Extracts every post container currently on the page. Posts whose HTML
/// cannot be read are logged and left out.
pub async fn collect_posts<B: Browser + ?Sized>(
    drv: &B,
    posts: &Locator,
    sel: &PostSelectors,
    at: NaiveDateTime,
) -> anyhow::Result<Vec<PostRecord>> {
    let elements = drv.find_all(posts).await?;
    let mut out = Vec::with_capacity(elements.len());
    for (index, el) in elements.iter().enumerate() {
        match drv.outer_html(el).await {
            Ok(html) => out.push(extract_post(&html, sel, at)),
            Err(e) => {
                let err = PostError::Unreadable { index, reason: format!("{e:#}") };
                tracing::error!("Skipping post: {err}");
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::fake::FakeBrowser;
    use crate::selectors::SelectorTable;
    use chrono::NaiveDate;

    const REACTIONS: &str = "xrbpyxo x6ikm8r x10wlt62 xlyipyv x1exxlbk";
    const COMMENTS: &str = "x9f619 x1n2onr6 x1ja2u2z x78zum5 x2lah0s x1qughib x1qjc9v5 xozqiw3 \
                            x1q0g3np xykv574 xbmpl8g x4cne27 xifccgj";
    const CAPTION: &str =
        "x6s0dn4 x78zum5 xdt5ytf x5yr21d xl56j7k x10l6tqk x17qophe x13vifvy xh8yej3";

    fn shares_class() -> String {
        SelectorTable::default()
            .shares
            .trim_start_matches("div.")
            .replace('.', " ")
    }

    fn sel() -> PostSelectors {
        PostSelectors::try_from(&SelectorTable::default()).unwrap()
    }

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn hello_world_post() {
        let html = format!(
            r#"<div role="article">
                 <div data-ad-preview="message"><div>Hello</div> <div>world</div></div>
                 <span class="{REACTIONS}">1.2K</span>
                 <div class="{}"><span>500</span></div>
               </div>"#,
            shares_class()
        );
        let rec = extract_post(&html, &sel(), at());
        assert_eq!(rec.post_text, "Helloworld");
        assert_eq!(rec.reactions, 1200);
        assert_eq!(rec.comments, 0);
        assert_eq!(rec.shares, 500);
        assert_eq!(rec.date, at());
    }

    #[test]
    fn single_block_text_is_kept_with_inner_spaces() {
        let html = format!(
            r#"<div data-ad-preview="message">Hello world</div>
               <span class="{REACTIONS}">1.2K</span>
               <div class="{}">500</div>"#,
            shares_class()
        );
        let rec = extract_post(&html, &sel(), at());
        assert_eq!(
            (rec.post_text.as_str(), rec.reactions, rec.comments, rec.shares),
            ("Hello world", 1200, 0, 500)
        );
    }

    #[test]
    fn comment_span_is_found_by_indicator_word() {
        let html = format!(
            r#"<div data-ad-preview="message">ขายบ้าน</div>
               <div class="{COMMENTS}">
                 <span>ถูกใจ</span>
                 <span>ความคิดเห็น 1.5 พัน รายการ</span>
               </div>"#
        );
        let rec = extract_post(&html, &sel(), at());
        assert_eq!(rec.comments, 1500);
        assert_eq!(rec.reactions, 0);
    }

    #[test]
    fn comment_block_without_indicator_counts_zero() {
        let html = format!(r#"<div class="{COMMENTS}"><span>12 shares</span></div>"#);
        assert_eq!(extract_post(&html, &sel(), at()).comments, 0);
    }

    #[test]
    fn caption_fallback() {
        let html = format!(r#"<div class="{CAPTION}">Sunset
            over the bay</div>"#);
        let rec = extract_post(&html, &sel(), at());
        assert_eq!(rec.post_text, "Sunset\n            over the bay".replace('\n', " "));
    }

    #[test]
    fn blank_post_gets_single_space() {
        let rec = extract_post("<div role=\"article\"><img src=\"x.png\"></div>", &sel(), at());
        assert_eq!(rec.post_text, " ");
    }

    #[tokio::test]
    async fn unreadable_posts_are_skipped() {
        let loc = SelectorTable::default().post_locator();
        let b = FakeBrowser::default().with_html(
            loc.clone(),
            vec![
                Ok(r#"<div data-ad-preview="message">first</div>"#.into()),
                Err("stale element reference".into()),
                Ok(r#"<div data-ad-preview="message">third</div>"#.into()),
            ],
        );
        let got = collect_posts(&b, &loc, &sel(), at()).await.unwrap();
        let texts: Vec<_> = got.iter().map(|r| r.post_text.as_str()).collect();
        assert_eq!(texts, ["first", "third"]);
    }
}
