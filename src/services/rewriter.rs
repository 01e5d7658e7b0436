//! Removes blocks that embed deleted media from a content tree.
//!
//! A block is pruned when its `props.id` names one of the target ids. The
//! walk descends into `content` and `children` of every kept block, and
//! into strings that hold serialized sub-trees. Nothing is tombstoned: a
//! pruned block disappears together with everything nested under it.
//!
//! Each function reports whether it changed anything so callers can skip
//! writing documents that did not reference a target. Untouched string
//! leaves keep their original bytes.

use std::collections::HashSet;

use serde_json::Value;
use uuid::Uuid;

use crate::models::content::{Block, ContentTree};

/// Target ids in the form they take inside `props.id`.
pub fn target_set(ids: &[Uuid]) -> HashSet<String> {
    ids.iter().map(Uuid::to_string).collect()
}

/// Returns the rewritten content, or `None` when no target was referenced.
pub fn rewrite_content(content: &Value, targets: &HashSet<String>) -> Option<Value> {
    let mut tree = ContentTree::from(content.clone());
    strip_references(&mut tree, targets).then(|| Value::from(tree))
}

/// Node rule. A matching block in node position becomes `null`.
pub fn strip_references(tree: &mut ContentTree, targets: &HashSet<String>) -> bool {
    match tree {
        ContentTree::Text(text) => strip_encoded(text, targets),
        ContentTree::List(items) => strip_list(items, targets),
        ContentTree::Block(block) if references_target(block, targets) => {
            *tree = ContentTree::Leaf(Value::Null);
            true
        }
        ContentTree::Block(block) => strip_block(block, targets),
        ContentTree::Leaf(_) => false,
    }
}

fn references_target(block: &Block, targets: &HashSet<String>) -> bool {
    block.referenced_id().is_some_and(|id| targets.contains(id))
}

/// Strings that parse as content are rewritten and re-serialized; anything
/// else is an opaque leaf.
fn strip_encoded(text: &mut String, targets: &HashSet<String>) -> bool {
    let Some(mut parsed) = ContentTree::parse_text(text) else {
        return false;
    };
    if !strip_references(&mut parsed, targets) {
        return false;
    }
    match serde_json::to_string(&Value::from(parsed)) {
        Ok(encoded) => {
            *text = encoded;
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not re-encode rewritten sub-tree, leaving it as is");
            false
        }
    }
}

/// List rule: matching blocks are dropped, kept blocks are descended into,
/// other elements stay as they are. Relative order is preserved.
fn strip_list(items: &mut Vec<ContentTree>, targets: &HashSet<String>) -> bool {
    let before = items.len();
    let mut changed = false;
    items.retain_mut(|item| match item {
        ContentTree::Block(block) if references_target(block, targets) => false,
        ContentTree::Block(block) => {
            changed |= strip_block(block, targets);
            true
        }
        _ => true,
    });
    changed || items.len() != before
}

fn strip_block(block: &mut Block, targets: &HashSet<String>) -> bool {
    let mut changed = false;
    if let Some(content) = block.content.as_deref_mut() {
        changed |= strip_references(content, targets);
    }
    if let Some(children) = block.children.as_mut() {
        let before = children.len();
        children.retain(|child| !child.is_null());
        changed |= children.len() != before;
        changed |= strip_list(children, targets);
    }
    changed
}
