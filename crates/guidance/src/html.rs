//! Pull the useful parts out of a rule documentation page.
//!
//! Rule pages on linter.aip.dev are rendered markdown: a `Details` section with
//! prose, then an `Examples` section where each code block is introduced by a
//! paragraph saying whether it is **Incorrect** or **Correct**. Only those parts
//! are kept, converted back to markdown.

use aipguard_core::{Error, Result};
use regex::{Captures, Regex};
use reqwest::Url;

/// What was found on a documentation page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleDoc {
    /// Markdown of the `Details` section.
    pub details: Option<String>,
    /// First code example labelled incorrect.
    pub incorrect: Option<String>,
    /// First code example labelled correct.
    pub correct: Option<String>,
}

impl RuleDoc {
    /// Whether nothing at all was extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.details.is_none() && self.incorrect.is_none() && self.correct.is_none()
    }
}

/// Compiled patterns for page extraction.
#[derive(Debug)]
pub struct Extractor {
    heading: Regex,
    pre: Regex,
    code: Regex,
    link: Regex,
    strong: Regex,
    em: Regex,
    list_item: Regex,
    line_break: Regex,
    block: Regex,
    tag: Regex,
    entity: Regex,
    whitespace: Regex,
    blank_lines: Regex,
}

impl Extractor {
    /// Compile the patterns.
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| Error::configuration(format!("invalid pattern {pattern}: {e}")))
        };

        Ok(Self {
            heading: compile(r"(?is)<h([1-6])\b[^>]*>(.*?)</h[1-6]\s*>")?,
            pre: compile(r"(?is)<pre\b[^>]*>(.*?)</pre\s*>")?,
            code: compile(r"(?is)<code\b[^>]*>(.*?)</code\s*>")?,
            link: compile(r#"(?is)<a\b[^>]*?\bhref\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a\s*>"#)?,
            strong: compile(r"(?is)<(?:strong|b)\b[^>]*>(.*?)</(?:strong|b)\s*>")?,
            em: compile(r"(?is)<(?:em|i)\b[^>]*>(.*?)</(?:em|i)\s*>")?,
            list_item: compile(r"(?i)<li\b[^>]*>")?,
            line_break: compile(r"(?i)<br\s*/?>")?,
            block: compile(r"(?i)</?(?:p|div|ul|ol|table|tr|blockquote|h[1-6])\b[^>]*>")?,
            tag: compile(r"(?s)<[^>]*>")?,
            entity: compile(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z][a-zA-Z0-9]*);")?,
            whitespace: compile(r"\s+")?,
            blank_lines: compile(r"\n{3,}")?,
        })
    }

    /// Extract details and examples from a page fetched from `page_url`.
    #[must_use]
    pub fn extract(&self, html: &str, page_url: &Url) -> RuleDoc {
        let details = self
            .section(html, "Details")
            .map(|section| self.to_markdown(section, page_url))
            .filter(|text| !text.is_empty());

        let (incorrect, correct) = self
            .section(html, "Examples")
            .map(|section| self.examples(section))
            .unwrap_or_default();

        RuleDoc {
            details,
            incorrect,
            correct,
        }
    }

    /// The markup between the heading titled `title` and the next heading of the
    /// same or a higher level.
    ///
    /// Titles compare case-insensitively after stripping inline markup.
    #[must_use]
    pub fn section<'a>(&self, html: &'a str, title: &str) -> Option<&'a str> {
        let mut headings = self.heading.captures_iter(html);
        let (level, start) = headings.by_ref().find_map(|caps| {
            let text = self.plain_text(caps.get(2)?.as_str());
            text.eq_ignore_ascii_case(title)
                .then(|| (caps[1].to_string(), caps.get(0).map_or(0, |m| m.end())))
        })?;

        let end = headings
            .find(|caps| &caps[1] <= level.as_str())
            .and_then(|caps| caps.get(0))
            .map_or(html.len(), |m| m.start());

        Some(&html[start..end])
    }

    /// Convert an HTML fragment to markdown.
    #[must_use]
    pub fn to_markdown(&self, fragment: &str, page_url: &Url) -> String {
        let mut out = String::new();
        let mut last = 0;
        for caps in self.pre.captures_iter(fragment) {
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&self.inline(&fragment[last..whole.start()], page_url));
            out.push_str("\n\n");
            out.push_str(&self.code_block(inner.as_str()));
            out.push_str("\n\n");
            last = whole.end();
        }
        out.push_str(&self.inline(&fragment[last..], page_url));

        let out = self.blank_lines.replace_all(&out, "\n\n");
        out.trim().to_string()
    }

    /// First incorrect and first correct code example in `section`.
    fn examples(&self, section: &str) -> (Option<String>, Option<String>) {
        let mut incorrect = None;
        let mut correct = None;
        let mut last = 0;

        for caps in self.pre.captures_iter(section) {
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let label = self.plain_text(&section[last..whole.start()]).to_lowercase();
            last = whole.end();

            if label.contains("incorrect") {
                incorrect.get_or_insert_with(|| self.code_block(inner.as_str()));
            } else if label.contains("correct") {
                correct.get_or_insert_with(|| self.code_block(inner.as_str()));
            }
        }

        (incorrect, correct)
    }

    fn code_block(&self, inner: &str) -> String {
        let code = self.decode_entities(&self.tag.replace_all(inner, ""));
        format!("```proto\n{}\n```", code.trim_matches('\n').trim_end())
    }

    fn inline(&self, text: &str, page_url: &Url) -> String {
        let text = self.whitespace.replace_all(text, " ");
        let text = self.code.replace_all(&text, |caps: &Captures| {
            format!("`{}`", self.tag.replace_all(&caps[1], "").trim())
        });
        let text = self.link.replace_all(&text, |caps: &Captures| {
            let href = self.decode_entities(&caps[1]);
            let target = page_url
                .join(&href)
                .map_or(href, |url| url.to_string());
            format!("[{}]({target})", caps[2].trim())
        });
        let text = self.strong.replace_all(&text, "**$1**");
        let text = self.em.replace_all(&text, "_${1}_");
        let text = self.list_item.replace_all(&text, "\n- ");
        let text = self.line_break.replace_all(&text, "\n");
        let text = self.block.replace_all(&text, "\n\n");
        let text = self.tag.replace_all(&text, "");
        let text = self.decode_entities(&text);

        text.lines()
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn plain_text(&self, html: &str) -> String {
        let text = self.tag.replace_all(html, "");
        let text = self.decode_entities(&text);
        self.whitespace.replace_all(text.trim(), " ").into_owned()
    }

    /// Decode named and numeric character references.
    #[must_use]
    pub fn decode_entities(&self, text: &str) -> String {
        self.entity
            .replace_all(text, |caps: &Captures| {
                decode_entity(&caps[1]).map_or_else(|| caps[0].to_string(), String::from)
            })
            .into_owned()
    }
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    if let Some(dec) = name.strip_prefix('#') {
        return dec.parse().ok().and_then(char::from_u32);
    }
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "copy" => '\u{a9}',
        _ => return None,
    };
    Some(c)
}
