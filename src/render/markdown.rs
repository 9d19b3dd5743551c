//! Markdown parsing behind a narrow contract: source in, HTML + TOC + link
//! list out. Deterministic: same input and parser version, same output.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd, html};
use rustc_hash::FxHashMap;

use super::highlight::{self, HighlightOptions};
use crate::content::TocEntry;
use crate::content::taxonomy::slugify;

/// Bumped whenever parse output could change; invalidates `parsed_content`.
pub const PARSER_VERSION: u32 = 1;

/// Parse result for one page body.
#[derive(Debug, Default)]
pub struct ParsedMarkdown {
    pub html: String,
    pub toc: Vec<TocEntry>,
    /// Outbound link destinations, in document order.
    pub links: Vec<String>,
}

/// Parse a Markdown body.
///
/// Headings get stable slug ids (deduplicated with `-2`, `-3` suffixes),
/// fenced code blocks go through the highlight contract, and link
/// destinations are collected for reference tracking.
pub fn parse(source: &str) -> ParsedMarkdown {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

    let parser = Parser::new_ext(source, options);

    let mut events: Vec<Event> = Vec::new();
    let mut toc: Vec<TocEntry> = Vec::new();
    let mut links: Vec<String> = Vec::new();
    let mut slug_counts: FxHashMap<String, usize> = FxHashMap::default();

    // Buffers for the construct currently being collected.
    let mut heading: Option<(u8, Option<String>, Vec<Event>)> = None;
    let mut code: Option<(String, String)> = None;

    for event in parser {
        // Inside a fenced code block: accumulate text only.
        if let Some((_, buffer)) = code.as_mut() {
            match event {
                Event::Text(text) => {
                    buffer.push_str(&text);
                    continue;
                }
                Event::End(TagEnd::CodeBlock) => {
                    let (info, buffer) = code.take().unwrap();
                    let (lang, opts) = parse_fence_info(&info);
                    events.push(Event::Html(
                        highlight::highlight(&buffer, &lang, &opts).into(),
                    ));
                    continue;
                }
                _ => continue,
            }
        }

        // Inside a heading: buffer inner events to extract the title text.
        if let Some((level, explicit_id, buffer)) = heading.as_mut() {
            match event {
                Event::End(TagEnd::Heading(_)) => {
                    let title = plain_text(buffer);
                    let id = explicit_id
                        .take()
                        .unwrap_or_else(|| unique_slug(&title, &mut slug_counts));
                    toc.push(TocEntry {
                        level: *level,
                        id: id.clone(),
                        title,
                    });

                    let level = *level;
                    let inner = std::mem::take(buffer);
                    heading = None;

                    events.push(Event::Html(
                        format!("<h{level} id=\"{id}\">").into(),
                    ));
                    events.extend(inner);
                    events.push(Event::Html(format!("</h{level}>").into()));
                    continue;
                }
                other => {
                    if let Event::Start(Tag::Link { dest_url, .. }) = &other {
                        links.push(dest_url.to_string());
                    }
                    buffer.push(other);
                    continue;
                }
            }
        }

        match event {
            Event::Start(Tag::Heading { level, id, .. }) => {
                heading = Some((level as u8, id.map(|s| s.to_string()), Vec::new()));
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                let info = match kind {
                    CodeBlockKind::Fenced(info) => info.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                code = Some((info, String::new()));
            }
            other => {
                if let Event::Start(Tag::Link { dest_url, .. }) = &other {
                    links.push(dest_url.to_string());
                }
                events.push(other);
            }
        }
    }

    let mut out = String::with_capacity(source.len() * 2);
    html::push_html(&mut out, events.into_iter());

    ParsedMarkdown {
        html: out,
        toc,
        links,
    }
}

/// Concatenated text content of buffered inline events.
fn plain_text(events: &[Event]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            _ => {}
        }
    }
    text
}

fn unique_slug(title: &str, counts: &mut FxHashMap<String, usize>) -> String {
    let base = slugify(title);
    let base = if base.is_empty() { "section".to_string() } else { base };
    let count = counts.entry(base.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
        base
    } else {
        format!("{base}-{count}")
    }
}

/// Parse a fence info string: `rust`, `python,linenos`, `js,hl_lines=2-4`.
fn parse_fence_info(info: &str) -> (String, HighlightOptions) {
    let mut parts = info.split(',').map(str::trim);
    let lang = parts.next().unwrap_or("").to_string();
    let mut opts = HighlightOptions::default();
    for part in parts {
        if part == "linenos" {
            opts.show_linenos = true;
        } else if let Some(spec) = part.strip_prefix("hl_lines=") {
            opts.hl_lines = parse_line_ranges(spec);
        }
    }
    (lang, opts)
}

fn parse_line_ranges(spec: &str) -> Vec<usize> {
    let mut lines = Vec::new();
    for chunk in spec.split_whitespace() {
        if let Some((start, end)) = chunk.split_once('-') {
            if let (Ok(start), Ok(end)) = (start.parse::<usize>(), end.parse::<usize>()) {
                lines.extend(start..=end);
            }
        } else if let Ok(line) = chunk.parse::<usize>() {
            lines.push(line);
        }
    }
    lines
}
