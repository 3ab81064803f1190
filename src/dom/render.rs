//! Textual rendering of nodes and of the affordance outline shown to the proposer.

use crate::dom::element::{Node, NodeId};
use crate::dom::page::PageModel;
use crate::dom::tree::DomTree;
use std::collections::BTreeSet;
use std::fmt::Write;

/// Elements rendered without a closing tag when they have no children
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr",
];

/// Attributes that carry human-readable meaning; everything else is omitted
pub const READABLE_ATTRIBUTES: &[&str] = &[
    "title",
    "alt",
    "href",
    "placeholder",
    "label",
    "value",
    "caption",
    "summary",
    "aria-label",
    "aria-describedby",
    "datetime",
    "download",
    "selected",
    "checked",
    "type",
];

/// Render a node and its descendants as indented pseudo-HTML
pub fn render_node(tree: &DomTree, id: NodeId, indent: usize) -> String {
    let mut out = String::new();
    write_node(tree, id, indent, &mut out);
    out
}

fn write_node(tree: &DomTree, id: NodeId, indent: usize, out: &mut String) {
    let Some(node) = tree.get(id) else {
        return;
    };
    let pad = " ".repeat(indent);

    if node.is_text() {
        out.push_str(&pad);
        out.push_str(&single_line(node.text_value.as_deref().unwrap_or_default()));
        return;
    }

    let open = open_tag(node);
    let close = format!("</{}>", node.tag_name);
    let children: Vec<&Node> = tree.children(id).collect();

    match children.as_slice() {
        [] => {
            out.push_str(&pad);
            out.push_str(&open);
            if !VOID_ELEMENTS.contains(&node.tag_name.as_str()) {
                out.push_str(&close);
            }
        }
        [only] if only.is_text() => {
            out.push_str(&pad);
            out.push_str(&open);
            write_node(tree, only.id, 0, out);
            out.push_str(&close);
        }
        _ => {
            out.push_str(&pad);
            out.push_str(&open);
            for child in &children {
                out.push('\n');
                write_node(tree, child.id, indent + 2, out);
            }
            out.push('\n');
            out.push_str(&pad);
            out.push_str(&close);
        }
    }
}

fn open_tag(node: &Node) -> String {
    let mut tag = format!("<{}", node.tag_name);
    for (name, value) in &node.attributes {
        if READABLE_ATTRIBUTES.contains(&name.as_str()) {
            let _ = write!(tag, " {}=\"{}\"", name, single_line(value));
        }
    }
    tag.push('>');
    tag
}

/// Page text may not start lines of its own, or it could pass for a `<node>` marker
fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// Wrap every affordance in a `<node>` block, in ascending id order
pub fn render_outline(model: &PageModel) -> String {
    let mut out = String::new();
    for affordance_id in model.affordance_ids() {
        let Some(node) = model.node(affordance_id) else {
            continue;
        };
        let _ = writeln!(
            out,
            "<node id={} clickable={} inputable={}>",
            affordance_id,
            model.clickable().contains(affordance_id),
            model.inputable().contains(affordance_id)
        );
        out.push_str(&render_node(model.tree(), node.id, 2));
        out.push_str("\n</node>\n");
    }
    out
}

/// Recover the affordance ids referenced by an outline
pub fn outline_ids(outline: &str) -> BTreeSet<usize> {
    outline
        .lines()
        .filter_map(|line| line.strip_prefix("<node id="))
        .filter_map(|rest| rest.split_whitespace().next())
        .filter_map(|id| id.parse().ok())
        .collect()
}
