//! Markdown rendering
//!
//! Converts post and comment bodies to HTML with pulldown-cmark. Raw HTML in
//! the source is escaped rather than passed through, and links or images
//! with script URLs are neutralised, so stored `content_html` is safe to
//! embed.
//!
//! # Example
//!
//! ```
//! use inkwell::services::markdown::MarkdownRenderer;
//!
//! let renderer = MarkdownRenderer::new();
//! let html = renderer.render("# Hello\n\nThis is **bold** text.");
//! assert!(html.contains("<h1>"));
//! assert!(html.contains("<strong>"));
//! ```

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};

/// URL schemes that are never rendered into `href` or `src`
const BLOCKED_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:"];

/// Markdown to HTML renderer for posts and comments.
#[derive(Debug, Clone, Copy)]
pub struct MarkdownRenderer {
    options: Options,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    /// Tables, strikethrough, task lists and smart punctuation enabled.
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);
        Self { options }
    }

    /// Render a full post body.
    pub fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, self.options);
        let events = Self::process_events(parser);

        let mut output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut output, events.into_iter());
        output
    }

    /// Render a comment. Headings are flattened to paragraphs and images
    /// become plain links.
    pub fn render_comment(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, Options::ENABLE_STRIKETHROUGH);
        let events = Self::process_events(parser).into_iter().map(|event| match event {
            Event::Start(Tag::Heading { .. }) => Event::Start(Tag::Paragraph),
            Event::End(TagEnd::Heading(_)) => Event::End(TagEnd::Paragraph),
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            }),
            Event::End(TagEnd::Image) => Event::End(TagEnd::Link),
            other => other,
        });

        let mut output = String::new();
        html::push_html(&mut output, events);
        output
    }

    /// Escape raw HTML, render code blocks with a language class and drop
    /// script URLs.
    fn process_events(parser: Parser<'_>) -> Vec<Event<'_>> {
        let mut events = Vec::new();
        let mut code: Option<(Option<String>, String)> = None;

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(lang) if !lang.is_empty() => {
                            lang.split_whitespace().next().map(str::to_string)
                        }
                        _ => None,
                    };
                    code = Some((lang, String::new()));
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((lang, body)) = code.take() {
                        events.push(Event::Html(code_block(&body, lang.as_deref()).into()));
                    }
                }
                Event::Text(text) if code.is_some() => {
                    if let Some((_, body)) = code.as_mut() {
                        body.push_str(&text);
                    }
                }
                Event::Html(raw) | Event::InlineHtml(raw) => {
                    events.push(Event::Text(raw));
                }
                Event::Start(Tag::Link {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => events.push(Event::Start(Tag::Link {
                    link_type,
                    dest_url: safe_url(dest_url),
                    title,
                    id,
                })),
                Event::Start(Tag::Image {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => events.push(Event::Start(Tag::Image {
                    link_type,
                    dest_url: safe_url(dest_url),
                    title,
                    id,
                })),
                other => events.push(other),
            }
        }

        events
    }
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    let lowered = url.trim().to_ascii_lowercase();
    if BLOCKED_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme)) {
        CowStr::Borrowed("#")
    } else {
        url
    }
}

fn code_block(code: &str, lang: Option<&str>) -> String {
    match lang {
        Some(lang) => format!(
            "<pre><code class=\"language-{}\">{}</code></pre>\n",
            html_escape(lang),
            html_escape(code)
        ),
        None => format!("<pre><code>{}</code></pre>\n", html_escape(code)),
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Strip markdown syntax, leaving plain prose for excerpts and analysis.
pub fn plain_text(markdown: &str) -> String {
    let mut text = String::with_capacity(markdown.len());
    for event in Parser::new(markdown) {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            Event::End(TagEnd::Paragraph) | Event::End(TagEnd::Heading(_)) | Event::End(TagEnd::Item) => {
                text.push('\n')
            }
            _ => {}
        }
    }
    text.trim().to_string()
}
