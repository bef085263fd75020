//! Markdown -> standalone HTML page.

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};
use pulldown_cmark_escape::{escape_href, escape_html};

const PAGE_HEAD: &str = "<style>html {text-align: center; max-width: 60vw; margin-left: auto; margin-right: auto;}</style><link rel=\"stylesheet\" href=\"https://unpkg.com/marx-css/css/marx.min.css\">";

fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_HEADING_ATTRIBUTES
}

fn is_external(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://") || url.starts_with("//")
}

// Writing into a String cannot fail.
fn attribute(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let _ = escape_html(&mut out, input);
    out
}

fn href(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let _ = escape_href(&mut out, input);
    out
}

/// Render `markdown` into a complete HTML document titled `title`.
///
/// External links open in a new tab. Empty input still yields a valid page.
pub fn render_page(markdown: &str, title: &str) -> String {
    let mut external_link_open = Vec::new();
    let events = Parser::new_ext(markdown, parser_options()).map(|event| match event {
        Event::Start(Tag::Link {
            dest_url,
            title: link_title,
            ..
        }) if is_external(&dest_url) => {
            external_link_open.push(true);
            let mut anchor = format!("<a href=\"{}\"", href(&dest_url));
            if !link_title.is_empty() {
                anchor.push_str(&format!(" title=\"{}\"", attribute(&link_title)));
            }
            anchor.push_str(" target=\"_blank\">");
            Event::InlineHtml(CowStr::from(anchor))
        }
        Event::Start(tag @ Tag::Link { .. }) => {
            external_link_open.push(false);
            Event::Start(tag)
        }
        Event::End(TagEnd::Link) => match external_link_open.pop() {
            Some(true) => Event::InlineHtml(CowStr::from("</a>")),
            _ => Event::End(TagEnd::Link),
        },
        other => other,
    });

    let mut body = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut body, events);

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n  <title>{}</title>\n  <meta charset=\"utf-8\">\n  {}\n</head>\n<body>\n\n{}\n</body>\n</html>\n",
        attribute(title),
        PAGE_HEAD,
        body
    )
}
