//! HTML and markdown serialization of document subtrees.

use super::parse::{is_raw_text, is_void};
use super::{Document, NodeData, NodeId, ScriptHost};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Emit sandboxed iframes as `srcdoc` documents instead of inline
    /// children, so a browser loads (and runs) their content itself.
    pub surfaces_as_srcdoc: bool,
}

pub(crate) fn inner_html<H: ScriptHost>(doc: &Document<H>, node: NodeId, opts: SerializeOptions) -> String {
    let mut out = String::new();
    for child in doc.children(node) {
        write_node(doc, *child, opts, &mut out);
    }
    out
}

pub(crate) fn outer_html<H: ScriptHost>(doc: &Document<H>, node: NodeId, opts: SerializeOptions) -> String {
    let mut out = String::new();
    write_node(doc, node, opts, &mut out);
    out
}

fn write_node<H: ScriptHost>(doc: &Document<H>, node: NodeId, opts: SerializeOptions, out: &mut String) {
    let el = match doc.data(node) {
        NodeData::Text(t) => {
            let raw_parent = doc
                .parent(node)
                .and_then(|p| doc.tag(p))
                .is_some_and(is_raw_text);
            if raw_parent {
                out.push_str(t);
            } else {
                out.push_str(&escape_text(t));
            }
            return;
        }
        NodeData::Element(el) => el,
    };

    out.push('<');
    out.push_str(&el.tag);
    for (k, v) in &el.attrs {
        out.push(' ');
        out.push_str(k);
        out.push_str("=\"");
        out.push_str(&escape_attr(v));
        out.push('"');
    }

    if opts.surfaces_as_srcdoc && el.tag == "iframe" && !doc.children(node).is_empty() {
        let content = inner_html(doc, node, opts);
        out.push_str(" srcdoc=\"");
        out.push_str(&escape_attr(&content));
        out.push_str("\"></iframe>");
        return;
    }

    out.push('>');
    if is_void(&el.tag) {
        return;
    }
    for child in doc.children(node) {
        write_node(doc, *child, opts, out);
    }
    out.push_str("</");
    out.push_str(&el.tag);
    out.push('>');
}

pub(crate) fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Lossy markdown rendition for terminal display. Headings, paragraphs,
/// lists, emphasis, code and line breaks survive; everything else is
/// flattened to its text.
pub(crate) fn to_markdown<H: ScriptHost>(doc: &Document<H>, node: NodeId) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut inline = String::new();
    markdown_block(doc, node, &mut blocks, &mut inline);
    flush(&mut blocks, &mut inline);
    blocks.join("\n\n")
}

fn flush(blocks: &mut Vec<String>, inline: &mut String) {
    let text = inline.trim();
    if !text.is_empty() {
        blocks.push(text.to_string());
    }
    inline.clear();
}

fn markdown_block<H: ScriptHost>(doc: &Document<H>, node: NodeId, blocks: &mut Vec<String>, inline: &mut String) {
    for child in doc.children(node) {
        let child = *child;
        let Some(tag) = doc.tag(child) else {
            if let Some(t) = doc.text(child) {
                push_collapsed(inline, t);
            }
            continue;
        };
        match tag {
            "script" | "style" | "head" | "title" => {}
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                flush(blocks, inline);
                let level = tag[1..].parse::<usize>().unwrap_or(1);
                let text = markdown_inline(doc, child);
                blocks.push(format!("{} {}", "#".repeat(level), text.trim()));
            }
            "ul" | "ol" => {
                flush(blocks, inline);
                let ordered = tag == "ol";
                let items: Vec<String> = doc
                    .children(child)
                    .iter()
                    .filter(|li| doc.tag(**li) == Some("li"))
                    .enumerate()
                    .map(|(i, li)| {
                        let text = markdown_inline(doc, *li);
                        if ordered {
                            format!("{}. {}", i + 1, text.trim())
                        } else {
                            format!("- {}", text.trim())
                        }
                    })
                    .collect();
                if !items.is_empty() {
                    blocks.push(items.join("\n"));
                }
            }
            "pre" => {
                flush(blocks, inline);
                blocks.push(format!("```\n{}\n```", doc.text_content(child).trim_end()));
            }
            "tr" => {
                flush(blocks, inline);
                let cells: Vec<String> = doc
                    .children(child)
                    .iter()
                    .filter(|c| matches!(doc.tag(**c), Some("td") | Some("th")))
                    .map(|c| markdown_inline(doc, *c).trim().to_string())
                    .collect();
                blocks.push(format!("| {} |", cells.join(" | ")));
            }
            "p" | "div" | "section" | "article" | "header" | "footer" | "main" | "table"
            | "thead" | "tbody" | "blockquote" | "figure" | "iframe" | "body" | "html" => {
                flush(blocks, inline);
                markdown_block(doc, child, blocks, inline);
                flush(blocks, inline);
            }
            _ => inline.push_str(&markdown_inline_element(doc, child, tag)),
        }
    }
}

fn markdown_inline<H: ScriptHost>(doc: &Document<H>, node: NodeId) -> String {
    let mut out = String::new();
    for child in doc.children(node) {
        match doc.tag(*child) {
            Some(tag) => out.push_str(&markdown_inline_element(doc, *child, tag)),
            None => {
                if let Some(t) = doc.text(*child) {
                    push_collapsed(&mut out, t);
                }
            }
        }
    }
    out
}

fn markdown_inline_element<H: ScriptHost>(doc: &Document<H>, node: NodeId, tag: &str) -> String {
    match tag {
        "script" | "style" => String::new(),
        "br" => "\n".to_string(),
        "strong" | "b" => format!("**{}**", markdown_inline(doc, node).trim()),
        "em" | "i" => format!("*{}*", markdown_inline(doc, node).trim()),
        "code" => format!("`{}`", doc.text_content(node)),
        _ => markdown_inline(doc, node),
    }
}

fn push_collapsed(out: &mut String, text: &str) {
    let mut last_space = out.ends_with(' ') || out.is_empty();
    for c in text.chars() {
        if c.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.push(c);
            last_space = false;
        }
    }
}
