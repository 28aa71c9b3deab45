// src/ingest/extract.rs
//! Heuristic extraction of an alert level and bulletin date from raw HTML.
//!
//! Rules are plain ordered lists evaluated top to bottom; the first rule whose
//! captured digit lands in 0..=5 wins. A digit outside that range is a miss for
//! that rule only, and the cascade moves on. Date search runs independently of
//! the level search.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ingest::types::{AlertLevel, ExtractedSignal};

/// One entry of a first-match-wins cascade.
#[derive(Debug)]
pub struct Rule {
    pub name: &'static str,
    pub re: Regex,
}

impl Rule {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            re: Regex::new(pattern).expect("static extraction pattern"),
        }
    }
}

const MONTHS: &str =
    "January|February|March|April|May|June|July|August|September|October|November|December";

static DATE_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule::new(
            "day-month-year",
            &format!(r"(?i)\b([0-9]{{1,2}}\s+(?:{MONTHS})\s+[0-9]{{4}})\b"),
        ),
        Rule::new(
            "month-day-year",
            &format!(r"(?i)\b((?:{MONTHS})\s+[0-9]{{1,2}},?\s+[0-9]{{4}})\b"),
        ),
        Rule::new(
            "numeric",
            r"(?i)(?:as of|dated?|updated?)\s*:?\s*([0-9]{1,2}[/\-][0-9]{1,2}[/\-][0-9]{2,4})\b",
        ),
    ]
});

static RE_NON_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<!--.*?-->|<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>|<noscript\b[^>]*>.*?</noscript\s*>")
        .expect("static markup pattern")
});
static RE_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)</?[a-zA-Z!][^>]*>").expect("static markup pattern"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static markup pattern"));
static RE_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<h([1-6])\b[^>]*>(.*?)</h[1-6]\s*>").expect("static markup pattern")
});

/// Render markup as a single line of plain text: drops scripts, styles and
/// comments, replaces tags with spaces, decodes entities, collapses whitespace.
pub fn html_to_text(html: &str) -> String {
    let out = RE_NON_TEXT.replace_all(html, " ");
    let out = RE_TAGS.replace_all(&out, " ");
    let out = html_escape::decode_html_entities(&out);
    let out = out.replace('\u{00A0}', " ");
    RE_WS.replace_all(&out, " ").trim().to_string()
}

/// Inner HTML of `<body>`, or the whole input when there is no body tag.
fn body_of(html: &str) -> &str {
    let lc = html.to_ascii_lowercase();
    let Some(open) = lc.find("<body") else {
        return html;
    };
    let Some(gt) = lc[open..].find('>') else {
        return html;
    };
    let start = open + gt + 1;
    let end = lc[start..]
        .rfind("</body")
        .map(|i| start + i)
        .unwrap_or(html.len());
    &html[start..end]
}

/// Section starting at the single heading that mentions `needle`, running up to
/// the next heading of the same or higher rank. `None` when zero or several
/// headings match.
pub fn section_for<'a>(html: &'a str, needle: &str) -> Option<&'a str> {
    let needle = needle.to_lowercase();
    let headings: Vec<(usize, usize, u8, bool)> = RE_HEADING
        .captures_iter(html)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let rank = c.get(1)?.as_str().parse::<u8>().ok()?;
            let text = html_to_text(c.get(2)?.as_str()).to_lowercase();
            Some((whole.start(), whole.end(), rank, text.contains(&needle)))
        })
        .collect();

    let mut hits = headings.iter().enumerate().filter(|(_, h)| h.3);
    let (idx, &(start, _, rank, _)) = hits.next()?;
    if hits.next().is_some() {
        return None;
    }

    let end = headings[idx + 1..]
        .iter()
        .find(|h| h.2 <= rank)
        .map(|h| h.0)
        .unwrap_or(html.len());
    Some(&html[start..end])
}

/// Ordered pattern cascade for one volcano of interest.
#[derive(Debug)]
pub struct Extractor {
    volcano: String,
    level_rules: Vec<Rule>,
}

impl Extractor {
    pub fn new(volcano: &str) -> Self {
        let v = regex::escape(volcano.trim());
        // Decreasing specificity: explicit label first, loose context last.
        let level_rules = vec![
            Rule::new("explicit-label", r"(?i)alert\s*level\s*:?\s*([0-9])\b"),
            Rule::new(
                "level-status",
                r"(?i)level\s*([0-9])\s*(?:is|has been|remains|was)\b",
            ),
            Rule::new("raised", r"(?i)raised.*?level\s*([0-9])\b"),
            Rule::new("lowered", r"(?i)lowered.*?level\s*([0-9])\b"),
            Rule::new("maintains", r"(?i)maintains.*?level\s*([0-9])\b"),
            Rule::new("volcano-context", &format!(r"(?i){v}.*?level\s*([0-9])\b")),
        ];
        Self {
            volcano: volcano.trim().to_string(),
            level_rules,
        }
    }

    /// Extract from the whole document body.
    pub fn extract(&self, raw_html: &str) -> ExtractedSignal {
        let text = html_to_text(body_of(raw_html));
        self.extract_text(&text)
    }

    /// Extract from the section headed by the volcano name when `narrow` is set
    /// and exactly one such section exists; otherwise the whole document.
    pub fn extract_scoped(&self, raw_html: &str, narrow: bool) -> ExtractedSignal {
        if !narrow {
            return self.extract(raw_html);
        }
        let body = body_of(raw_html);
        match section_for(body, &self.volcano) {
            Some(section) => self.extract_text(&html_to_text(section)),
            None => {
                tracing::debug!(
                    target: "ingest",
                    volcano = %self.volcano,
                    "no unique volcano section; scanning whole document"
                );
                self.extract_text(&html_to_text(body))
            }
        }
    }

    /// Run both cascades over already-rendered text.
    pub fn extract_text(&self, text: &str) -> ExtractedSignal {
        let level = self.match_level(text).map(|(level, rule)| {
            tracing::debug!(target: "ingest", rule, %level, "level rule matched");
            level
        });
        ExtractedSignal {
            level,
            date: match_date(text),
        }
    }

    /// First rule whose capture parses into 0..=5, with the rule's name.
    pub fn match_level(&self, text: &str) -> Option<(AlertLevel, &'static str)> {
        self.level_rules.iter().find_map(|rule| {
            let digit = rule.re.captures(text)?.get(1)?.as_str().parse::<u8>().ok()?;
            AlertLevel::new(digit).map(|l| (l, rule.name))
        })
    }
}

/// First date-shaped string, month-name forms before numeric ones.
pub fn match_date(text: &str) -> Option<String> {
    DATE_RULES.iter().find_map(|rule| {
        rule.re
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
}
