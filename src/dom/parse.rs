//! Forgiving HTML fragment parser.
//!
//! Handles what pipeline fragments contain: nested elements, quoted and bare
//! attributes, void elements, raw-text `<script>`/`<style>` bodies, comments
//! and character references. Unclosed elements are closed at end of input;
//! stray end tags are ignored.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedNode {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<ParsedNode>,
    },
    Text(String),
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub(crate) fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

pub(crate) fn is_raw_text(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}

struct OpenElement {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<ParsedNode>,
}

pub fn parse_fragment(html: &str) -> Vec<ParsedNode> {
    let mut top: Vec<ParsedNode> = Vec::new();
    let mut stack: Vec<OpenElement> = Vec::new();
    let mut pos = 0;
    let bytes = html.as_bytes();

    while pos < html.len() {
        let Some(lt) = html[pos..].find('<').map(|i| pos + i) else {
            push_text(&mut stack, &mut top, &html[pos..]);
            break;
        };
        if lt > pos {
            push_text(&mut stack, &mut top, &html[pos..lt]);
        }
        pos = lt;

        let next = bytes.get(pos + 1).copied();
        match next {
            Some(b'!') => {
                pos = skip_markup_declaration(html, pos);
            }
            Some(b'/') => {
                let end = html[pos..].find('>').map(|i| pos + i).unwrap_or(html.len());
                let name = html[pos + 2..end].trim().to_ascii_lowercase();
                close_element(&mut stack, &mut top, &name);
                pos = (end + 1).min(html.len());
            }
            Some(c) if c.is_ascii_alphabetic() => {
                let (tag, attrs, self_closing, after) = parse_start_tag(html, pos + 1);
                pos = after;
                if is_raw_text(&tag) {
                    let (body, resume) = raw_text_body(html, pos, &tag);
                    let children = if body.is_empty() {
                        Vec::new()
                    } else {
                        vec![ParsedNode::Text(body.to_string())]
                    };
                    push_node(&mut stack, &mut top, ParsedNode::Element { tag, attrs, children });
                    pos = resume;
                } else if self_closing || is_void(&tag) {
                    push_node(&mut stack, &mut top, ParsedNode::Element { tag, attrs, children: Vec::new() });
                } else {
                    stack.push(OpenElement { tag, attrs, children: Vec::new() });
                }
            }
            _ => {
                // A lone '<' is text.
                push_text(&mut stack, &mut top, "<");
                pos += 1;
            }
        }
    }

    while let Some(open) = stack.pop() {
        let node = ParsedNode::Element { tag: open.tag, attrs: open.attrs, children: open.children };
        push_node(&mut stack, &mut top, node);
    }
    top
}

fn push_node(stack: &mut [OpenElement], top: &mut Vec<ParsedNode>, node: ParsedNode) {
    match stack.last_mut() {
        Some(open) => open.children.push(node),
        None => top.push(node),
    }
}

fn push_text(stack: &mut [OpenElement], top: &mut Vec<ParsedNode>, raw: &str) {
    let text = decode_entities(raw);
    if text.is_empty() {
        return;
    }
    let siblings = match stack.last_mut() {
        Some(open) => &mut open.children,
        None => top,
    };
    if let Some(ParsedNode::Text(prev)) = siblings.last_mut() {
        prev.push_str(&text);
    } else {
        siblings.push(ParsedNode::Text(text));
    }
}

fn close_element(stack: &mut Vec<OpenElement>, top: &mut Vec<ParsedNode>, name: &str) {
    if !stack.iter().any(|open| open.tag == name) {
        return;
    }
    while let Some(open) = stack.pop() {
        let matched = open.tag == name;
        let node = ParsedNode::Element { tag: open.tag, attrs: open.attrs, children: open.children };
        push_node(stack, top, node);
        if matched {
            break;
        }
    }
}

/// `<!-- ... -->`, `<!DOCTYPE ...>` and friends are dropped.
fn skip_markup_declaration(html: &str, pos: usize) -> usize {
    if html[pos..].starts_with("<!--") {
        return html[pos + 4..]
            .find("-->")
            .map(|i| pos + 4 + i + 3)
            .unwrap_or(html.len());
    }
    html[pos..].find('>').map(|i| pos + i + 1).unwrap_or(html.len())
}

/// Parses from just after `<`. Returns tag, attributes, self-closing flag and
/// the position after `>`.
fn parse_start_tag(html: &str, start: usize) -> (String, Vec<(String, String)>, bool, usize) {
    let bytes = html.as_bytes();
    let mut pos = start;
    while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b'>' && bytes[pos] != b'/' {
        pos += 1;
    }
    let tag = html[start..pos].to_ascii_lowercase();
    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut self_closing = false;

    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= bytes.len() {
            return (tag, attrs, self_closing, pos);
        }
        match bytes[pos] {
            b'>' => return (tag, attrs, self_closing, pos + 1),
            b'/' => {
                self_closing = true;
                pos += 1;
                continue;
            }
            _ => {}
        }
        self_closing = false;

        let name_start = pos;
        while pos < bytes.len()
            && !bytes[pos].is_ascii_whitespace()
            && !matches!(bytes[pos], b'=' | b'>' | b'/')
        {
            pos += 1;
        }
        let name = html[name_start..pos].to_ascii_lowercase();
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }

        let mut value = String::new();
        if pos < bytes.len() && bytes[pos] == b'=' {
            pos += 1;
            while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            if pos < bytes.len() && (bytes[pos] == b'"' || bytes[pos] == b'\'') {
                let quote = bytes[pos] as char;
                let value_start = pos + 1;
                let value_end = html[value_start..]
                    .find(quote)
                    .map(|i| value_start + i)
                    .unwrap_or(html.len());
                value = decode_entities(&html[value_start..value_end]);
                pos = (value_end + 1).min(html.len());
            } else {
                let value_start = pos;
                while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b'>' {
                    pos += 1;
                }
                value = decode_entities(&html[value_start..pos]);
            }
        }

        if !name.is_empty() && !attrs.iter().any(|(k, _)| *k == name) {
            attrs.push((name, value));
        }
    }
}

/// Body of a raw-text element up to its case-insensitive end tag.
fn raw_text_body<'a>(html: &'a str, start: usize, tag: &str) -> (&'a str, usize) {
    let needle = format!("</{}", tag);
    let lower = html[start..].to_ascii_lowercase();
    match lower.find(&needle) {
        Some(i) => {
            let body_end = start + i;
            let close = html[body_end..].find('>').map(|j| body_end + j + 1).unwrap_or(html.len());
            (&html[start..body_end], close)
        }
        None => (&html[start..], html.len()),
    }
}

pub(crate) fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|semi| *semi <= 10)
            .and_then(|semi| decode_reference(&rest[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}
