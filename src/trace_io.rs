//! `TraceIOExtractionService` (§4.13): builds a per-trace parent/child tree
//! from canonicalized spans and extracts the trace's first input and last
//! output.

use serde_json::Value as JsonValue;

use crate::model::span::NormalizedSpan;

/// Raw attribute value plus its rendered text, the shape every rich-I/O
/// lookup returns.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceIo {
    pub raw: JsonValue,
    pub text: String,
}

struct Node<'a> {
    span: &'a NormalizedSpan,
    children: Vec<usize>,
}

struct Tree<'a> {
    nodes: Vec<Node<'a>>,
    roots: Vec<usize>,
}

fn build_tree(spans: &[NormalizedSpan]) -> Tree<'_> {
    let mut ordered: Vec<&NormalizedSpan> = spans.iter().collect();
    ordered.sort_by(|a, b| {
        a.start_time_unix_ms
            .cmp(&b.start_time_unix_ms)
            .then_with(|| a.span_id.cmp(&b.span_id))
    });

    let mut nodes: Vec<Node> = ordered
        .iter()
        .map(|span| Node {
            span,
            children: Vec::new(),
        })
        .collect();

    let index_of = |id: &str, nodes: &[Node]| nodes.iter().position(|n| n.span.span_id == id);

    let mut roots = Vec::new();
    for i in 0..nodes.len() {
        let parent_id = nodes[i].span.parent_span_id.clone();
        match parent_id.as_deref().and_then(|id| index_of(id, &nodes)) {
            Some(parent_idx) if parent_idx != i => nodes[parent_idx].children.push(i),
            _ => roots.push(i),
        }
    }

    Tree { nodes, roots }
}

fn is_excluded(span: &NormalizedSpan) -> bool {
    matches!(span.span_type(), Some("evaluation") | Some("guardrail"))
}

fn pre_order(tree: &Tree, out: &mut Vec<usize>) {
    fn visit(tree: &Tree, idx: usize, out: &mut Vec<usize>) {
        out.push(idx);
        for &child in &tree.nodes[idx].children {
            visit(tree, child, out);
        }
    }
    for &root in &tree.roots {
        visit(tree, root, out);
    }
}

fn post_order(tree: &Tree, out: &mut Vec<usize>) {
    fn visit(tree: &Tree, idx: usize, out: &mut Vec<usize>) {
        for &child in &tree.nodes[idx].children {
            visit(tree, child, out);
        }
        out.push(idx);
    }
    for &root in &tree.roots {
        visit(tree, root, out);
    }
}

/// `extractMessageContent`: `content` may be a string, an array of
/// strings/blocks (`{type:"text", text}` / `{text}`, image blocks skipped),
/// joined with newlines.
fn extract_message_content(content: &JsonValue) -> Option<String> {
    crate::extract::helpers::extract_message_text(content)
}

/// `messagesToText`: understands a bare string, a single message object, or
/// an array of messages.
fn messages_to_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Array(items) => {
            let pieces: Vec<String> = items
                .iter()
                .filter_map(|m| {
                    m.get("content")
                        .and_then(extract_message_content)
                        .or_else(|| m.get("text").and_then(|v| v.as_str()).map(str::to_string))
                        .or_else(|| m.get("value").and_then(|v| v.as_str()).map(str::to_string))
                })
                .collect();
            if pieces.is_empty() {
                None
            } else {
                Some(pieces.join("\n"))
            }
        }
        JsonValue::Object(_) => value
            .get("content")
            .and_then(extract_message_content)
            .or_else(|| value.get("text").and_then(|v| v.as_str()).map(str::to_string))
            .or_else(|| value.get("value").and_then(|v| v.as_str()).map(str::to_string)),
        _ => None,
    }
}

/// Rich I/O lookup for one span and direction, per the priority order in
/// §4.13: structured `gen_ai.*.messages` first, then `langwatch.input`/
/// `langwatch.output`.
fn rich_io(span: &NormalizedSpan, is_input: bool) -> Option<TraceIo> {
    let messages_key = if is_input {
        "gen_ai.input.messages"
    } else {
        "gen_ai.output.messages"
    };
    if let Some(v) = span.span_attributes.get(messages_key) {
        let json = match v.as_str() {
            Some(s) => crate::extract::helpers::safe_json_parse(s),
            None => v.to_json(),
        };
        if let Some(text) = messages_to_text(&json) {
            return Some(TraceIo { raw: json, text });
        }
    }

    let langwatch_key = if is_input {
        "langwatch.input"
    } else {
        "langwatch.output"
    };
    if let Some(v) = span.span_attributes.get(langwatch_key) {
        let json = v.to_json();
        let text = match &json {
            JsonValue::String(s) => s.clone(),
            other => messages_to_text(other).unwrap_or_else(|| other.to_string()),
        };
        return Some(TraceIo { raw: json, text });
    }

    None
}

pub struct TraceIoExtractionService;

impl TraceIoExtractionService {
    /// Pre-order traversal, first non-excluded span with a non-null input
    /// wins. Fallback: the root span's `"<http.method> <http.target>"` if
    /// both are strings, else its name.
    pub fn first_input(spans: &[NormalizedSpan]) -> Option<TraceIo> {
        let tree = build_tree(spans);
        let mut order = Vec::new();
        pre_order(&tree, &mut order);

        for idx in order {
            let span = tree.nodes[idx].span;
            if is_excluded(span) {
                continue;
            }
            if let Some(io) = rich_io(span, true) {
                return Some(io);
            }
        }

        let root = *tree.roots.first()?;
        let span = tree.nodes[root].span;
        let method = span.span_attributes.get("http.method").and_then(|v| v.as_str());
        let target = span.span_attributes.get("http.target").and_then(|v| v.as_str());
        let text = match (method, target) {
            (Some(m), Some(t)) => format!("{m} {t}"),
            _ => span.name.clone(),
        };
        Some(TraceIo {
            raw: JsonValue::String(text.clone()),
            text,
        })
    }

    /// Post-order traversal reversed; a single top-level survivor wins
    /// outright, otherwise the survivor with the largest `endTimeUnixMs`.
    /// Fallback: the root span's `http.status_code` as a string.
    pub fn last_output(spans: &[NormalizedSpan]) -> Option<TraceIo> {
        let tree = build_tree(spans);
        let mut order = Vec::new();
        post_order(&tree, &mut order);
        order.reverse();

        let survivors: Vec<(usize, TraceIo)> = order
            .into_iter()
            .filter(|&idx| !is_excluded(tree.nodes[idx].span))
            .filter_map(|idx| rich_io(tree.nodes[idx].span, false).map(|io| (idx, io)))
            .collect();

        if survivors.len() == 1 {
            return Some(survivors.into_iter().next().unwrap().1);
        }
        if !survivors.is_empty() {
            let best = survivors
                .into_iter()
                .max_by_key(|(idx, _)| tree.nodes[*idx].span.end_time_unix_ms)
                .unwrap();
            return Some(best.1);
        }

        let root = *tree.roots.first()?;
        let span = tree.nodes[root].span;
        let status = span
            .span_attributes
            .get("http.status_code")
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_json().to_string()));
        status.map(|s| TraceIo {
            raw: JsonValue::String(s.clone()),
            text: s,
        })
    }
}
