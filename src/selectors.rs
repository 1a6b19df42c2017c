//! Every page selector the harvester depends on.
//!
//! The class signatures are generated by the site's build and change without
//! notice. When extraction starts returning zeros, update this table (or
//! point `--selectors` at a TOML file overriding the affected keys) instead
//! of touching the extraction code.

use std::path::Path;

use anyhow::{Context, Result};
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::driver::Locator;
use crate::error::HarvestError;

/// `div` + `"a b c"` -> `div.a.b.c`
fn class_signature(tag: &str, classes: &str) -> String {
    let mut out = tag.to_string();
    for c in classes.split_whitespace() {
        out.push('.');
        out.push_str(c);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorTable {
    pub login_url: String,
    /// `name` attributes of the login form fields.
    pub email_field: String,
    pub password_field: String,
    pub login_button: String,
    /// Present only once the login landed on the home page.
    pub logged_in_marker: String,

    pub post_container: String,
    /// XPath, because the expanders are matched by their text.
    pub see_more: String,

    pub post_text: String,
    pub image_caption: String,
    pub reactions: String,
    pub comment_block: String,
    pub comment_words: Vec<String>,
    pub shares: String,
}

impl Default for SelectorTable {
    fn default() -> Self {
        Self {
            login_url: "https://www.facebook.com/login/".into(),
            email_field: "email".into(),
            password_field: "pass".into(),
            login_button: "login".into(),
            logged_in_marker: r#"[aria-label="Facebook"]"#.into(),

            post_container: r#"div[role="article"]"#.into(),
            see_more: "//*[contains(text(), 'See more') or contains(text(), 'ดูเพิ่มเติม')]".into(),

            post_text: r#"div[data-ad-preview="message"]"#.into(),
            image_caption: class_signature(
                "div",
                "x6s0dn4 x78zum5 xdt5ytf x5yr21d xl56j7k x10l6tqk x17qophe x13vifvy xh8yej3",
            ),
            reactions: class_signature("span", "xrbpyxo x6ikm8r x10wlt62 xlyipyv x1exxlbk"),
            comment_block: class_signature(
                "div",
                "x9f619 x1n2onr6 x1ja2u2z x78zum5 x2lah0s x1qughib x1qjc9v5 xozqiw3 x1q0g3np \
                 xykv574 xbmpl8g x4cne27 xifccgj",
            ),
            comment_words: vec!["ความคิดเห็น".into(), "comments".into()],
            shares: class_signature(
                "div",
                "x1i10hfl x1qjc9v5 xjqpnuy xa49m3k xqeqjp1 x2hbi6w x1ypdohk xdl72j9 x2lah0s \
                 xe8uvvx x2lwn1j xeuugli xggy1nq x1t137rt x1o1ewxj x3x9cwd x1e5q0jg x13rtm0m \
                 x3nfvp2 x1q0g3np x87ps6o x1lku1pv x1a2a7pz xjyslct xjbqb8w x13fuv20 xu3j5b3 \
                 x1q0q8m5 x26u7qi x972fbf xcfux6l x1qhh985 xm0m39n x9f619 x1heor9g xdj266r \
                 x11i5rnm xat24cr x1mh8g0r xexx8yu x4uap5 x18d9i69 xkhd6sd x1n2onr6 x16tdsg8 \
                 xt0b8zv x1hl2dhg x1ja2u2z",
            ),
        }
    }
}

impl SelectorTable {
    /// Defaults with any keys present in the TOML file replaced.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading selector table {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing selector table {}", path.display()))
    }

    pub fn email_locator(&self) -> Locator {
        Locator::Name(self.email_field.clone())
    }

    pub fn password_locator(&self) -> Locator {
        Locator::Name(self.password_field.clone())
    }

    pub fn login_button_locator(&self) -> Locator {
        Locator::Name(self.login_button.clone())
    }

    pub fn logged_in_locator(&self) -> Locator {
        Locator::Css(self.logged_in_marker.clone())
    }

    pub fn post_locator(&self) -> Locator {
        Locator::Css(self.post_container.clone())
    }

    pub fn see_more_locator(&self) -> Locator {
        Locator::XPath(self.see_more.clone())
    }
}

/// Parsed form of the fragment-side selectors, built once per run.
#[derive(Debug)]
pub struct PostSelectors {
    pub text: Selector,
    pub caption: Selector,
    pub reactions: Selector,
    pub comment_block: Selector,
    pub span: Selector,
    pub shares: Selector,
    pub comment_words: Vec<String>,
}

fn compile(css: &str) -> Result<Selector, HarvestError> {
    Selector::parse(css).map_err(|e| HarvestError::Selector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

impl TryFrom<&SelectorTable> for PostSelectors {
    type Error = HarvestError;

    fn try_from(t: &SelectorTable) -> Result<Self, Self::Error> {
        Ok(Self {
            text: compile(&t.post_text)?,
            caption: compile(&t.image_caption)?,
            reactions: compile(&t.reactions)?,
            comment_block: compile(&t.comment_block)?,
            span: compile("span")?,
            shares: compile(&t.shares)?,
            comment_words: t.comment_words.clone(),
        })
    }
}
