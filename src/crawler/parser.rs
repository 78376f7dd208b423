//! HTML rewriter for mirrored pages
//!
//! This module parses a page and serializes it back with its links rewritten:
//! - Page links (`<a>`, `<area>`, `<iframe>`, `<frame>`) and page requisites
//!   (`<img>`, `<script>`, loadable `<link>`) are reported to a callback
//! - Every link attribute is replaced either by the callback's local path or
//!   by the absolute URL
//! - The absolute URL is kept in a `tppabs` attribute so later passes can
//!   recover it after the link was made local
//! - Charset declarations are rewritten to UTF-8, the encoding pages are
//!   saved in

use crate::url::resolve_link;
use ego_tree::NodeRef;
use scraper::node::Element;
use scraper::{Html, Node};
use url::Url;

/// Attribute holding the absolute URL of a rewritten link
pub const ABSOLUTE_URL_ATTR: &str = "tppabs";

/// How a discovered link is treated by the crawler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// A page to follow while the link budget lasts
    Page,

    /// A resource the page needs to render; always fetched
    Requisite,
}

/// `rel` tokens of `<link>` elements whose target is fetched
const LOADABLE_RELS: &[&str] = &["stylesheet", "preload", "icon", "apple-touch-icon", "image_src"];

/// Elements whose text content is not escaped
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

/// Elements without end tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Parses `input` and serializes it with rewritten links
///
/// # Arguments
///
/// * `input` - The page content, already decoded to UTF-8
/// * `page_url` - The URL the page was fetched from (a `<base href>` in the
///   page takes precedence when resolving relative links)
/// * `first_parse` - True for freshly downloaded content. Later passes read
///   the absolute URL back from `tppabs` instead of resolving `href`/`src`,
///   which may already point at a local file.
/// * `on_link` - Called with every page link and requisite. Returns the
///   local path to link to, or None to link the absolute URL.
///
/// # Returns
///
/// The serialized document
///
/// # Example
///
/// ```
/// use url::Url;
/// use webmirror::crawler::rewrite_html;
///
/// let page = Url::parse("http://example.com/docs/").unwrap();
/// let html = rewrite_html(r#"<a href="intro.html">Intro</a>"#, &page, true, |_, _| None);
/// assert!(html.contains(r#"href="http://example.com/docs/intro.html""#));
/// ```
pub fn rewrite_html<F>(input: &str, page_url: &Url, first_parse: bool, on_link: F) -> String
where
    F: FnMut(&Url, LinkKind) -> Option<String>,
{
    let document = Html::parse_document(input);
    let base = base_url(&document, page_url);

    let mut rewriter = Rewriter {
        base,
        first_parse,
        on_link,
    };
    let mut out = String::with_capacity(input.len() + input.len() / 8);
    rewriter.serialize(document.tree.root(), false, &mut out);
    out
}

/// Resolves the first `<base href>` against the page URL
fn base_url(document: &Html, page_url: &Url) -> Url {
    document
        .tree
        .nodes()
        .filter_map(|node| node.value().as_element())
        .find(|element| element.name() == "base")
        .and_then(|element| element.attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone())
}

struct Rewriter<F> {
    base: Url,
    first_parse: bool,
    on_link: F,
}

impl<F> Rewriter<F>
where
    F: FnMut(&Url, LinkKind) -> Option<String>,
{
    fn serialize(&mut self, node: NodeRef<'_, Node>, raw_text: bool, out: &mut String) {
        match node.value() {
            Node::Document | Node::Fragment => {
                for child in node.children() {
                    self.serialize(child, false, out);
                }
            }
            Node::Doctype(doctype) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(doctype.name());
                let (public_id, system_id) = (doctype.public_id(), doctype.system_id());
                if !public_id.is_empty() {
                    out.push_str(" PUBLIC \"");
                    out.push_str(public_id);
                    out.push('"');
                    if !system_id.is_empty() {
                        out.push_str(" \"");
                        out.push_str(system_id);
                        out.push('"');
                    }
                } else if !system_id.is_empty() {
                    out.push_str(" SYSTEM \"");
                    out.push_str(system_id);
                    out.push('"');
                }
                out.push('>');
            }
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            Node::Text(text) => {
                if raw_text {
                    out.push_str(text);
                } else {
                    escape_text(text, out);
                }
            }
            Node::Element(element) => {
                let name = element.name();
                out.push('<');
                out.push_str(name);
                for (attr, value) in self.rewrite_attrs(element) {
                    out.push(' ');
                    out.push_str(&attr);
                    out.push_str("=\"");
                    escape_attr(&value, out);
                    out.push('"');
                }
                out.push('>');

                if VOID_ELEMENTS.contains(&name) {
                    return;
                }

                let raw = RAW_TEXT_ELEMENTS.contains(&name);
                for child in node.children() {
                    self.serialize(child, raw, out);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            Node::ProcessingInstruction(pi) => {
                out.push_str("<?");
                out.push_str(&pi.target);
                if !pi.data.is_empty() {
                    out.push(' ');
                    out.push_str(&pi.data);
                }
                out.push('>');
            }
        }
    }

    /// Returns the attributes to write for an element
    ///
    /// Names keep their namespace prefix (`xlink:href`, `xml:lang`).
    fn rewrite_attrs(&mut self, element: &Element) -> Vec<(String, String)> {
        let mut attrs: Vec<(String, String)> = element
            .attrs
            .iter()
            .map(|(name, value)| {
                let name = match &name.prefix {
                    Some(prefix) => format!("{}:{}", prefix, name.local),
                    None => name.local.to_string(),
                };
                (name, value.to_string())
            })
            .collect();

        let (link_attr, kind) = match element.name() {
            "a" | "area" => ("href", Some(LinkKind::Page)),
            "iframe" | "frame" => ("src", Some(LinkKind::Page)),
            "img" | "script" => ("src", Some(LinkKind::Requisite)),
            "link" => {
                let loadable = element.attr("rel").map_or(false, is_loadable_rel);
                ("href", loadable.then_some(LinkKind::Requisite))
            }
            "meta" => {
                rewrite_charset(&mut attrs);
                return attrs;
            }
            _ => return attrs,
        };

        let Some(value) = element.attr(link_attr) else {
            return attrs;
        };

        let absolute = if self.first_parse {
            resolve_link(value, &self.base)
        } else {
            element
                .attr(ABSOLUTE_URL_ATTR)
                .and_then(|saved| Url::parse(saved).ok())
                .or_else(|| resolve_link(value, &self.base))
        };
        let Some(absolute) = absolute else {
            return attrs;
        };

        let target = kind
            .and_then(|kind| (self.on_link)(&absolute, kind))
            .unwrap_or_else(|| absolute.to_string());
        set_attr(&mut attrs, link_attr, target);
        if self.first_parse {
            set_attr(&mut attrs, ABSOLUTE_URL_ATTR, absolute.to_string());
        }

        attrs
    }
}

fn is_loadable_rel(rel: &str) -> bool {
    rel.split_ascii_whitespace()
        .any(|token| LOADABLE_RELS.iter().any(|r| token.eq_ignore_ascii_case(r)))
}

fn set_attr(attrs: &mut Vec<(String, String)>, name: &str, value: String) {
    match attrs.iter_mut().find(|(attr, _)| attr == name) {
        Some((_, existing)) => *existing = value,
        None => attrs.push((name.to_string(), value)),
    }
}

/// Rewrites `<meta charset>` and `<meta http-equiv="Content-Type">` to UTF-8
fn rewrite_charset(attrs: &mut Vec<(String, String)>) {
    if attrs.iter().any(|(name, _)| name == "charset") {
        set_attr(attrs, "charset", "utf-8".to_string());
        return;
    }

    let is_content_type = attrs
        .iter()
        .any(|(name, value)| name == "http-equiv" && value.eq_ignore_ascii_case("content-type"));
    if is_content_type && attrs.iter().any(|(name, _)| name == "content") {
        set_attr(attrs, "content", "text/html; charset=utf-8".to_string());
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}
