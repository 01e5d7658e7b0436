//! Loosely typed document content as produced by the block editor.
//!
//! Content arrives as arbitrary JSON: a string (which may itself hold
//! serialized content), a list of blocks, or a single block. It is never
//! schema-validated; anything that is not one of those shapes is carried
//! through untouched as a [`ContentTree::Leaf`].

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum ContentTree {
    /// Prose, or a serialized sub-tree waiting to be parsed.
    Text(String),
    List(Vec<ContentTree>),
    Block(Block),
    /// Numbers, booleans and nulls.
    Leaf(Value),
}

/// One node of a content tree.
///
/// `type`, `props`, `content` and an array-valued `children` are lifted
/// out; every other field is kept verbatim in `extra`. `order` remembers
/// the key order the block was read with so it serializes back the same.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub kind: Option<String>,
    pub props: Option<Value>,
    pub content: Option<Box<ContentTree>>,
    pub children: Option<Vec<ContentTree>>,
    pub extra: Map<String, Value>,
    pub order: Vec<String>,
}

impl ContentTree {
    /// Parses a string leaf as serialized content. `None` means the text is
    /// opaque (prose, or anything else that is not JSON).
    pub fn parse_text(text: &str) -> Option<ContentTree> {
        serde_json::from_str::<Value>(text).ok().map(ContentTree::from)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ContentTree::Leaf(Value::Null))
    }

    /// Blocks directly inside a list root. Any other root has none.
    pub fn top_level_blocks(&self) -> Vec<&Block> {
        match self {
            ContentTree::List(items) => items
                .iter()
                .filter_map(|item| match item {
                    ContentTree::Block(block) => Some(block),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<Value> for ContentTree {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => ContentTree::Text(s),
            Value::Array(items) => {
                ContentTree::List(items.into_iter().map(ContentTree::from).collect())
            }
            Value::Object(map) => ContentTree::Block(Block::from(map)),
            other => ContentTree::Leaf(other),
        }
    }
}

impl From<ContentTree> for Value {
    fn from(tree: ContentTree) -> Self {
        match tree {
            ContentTree::Text(s) => Value::String(s),
            ContentTree::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            ContentTree::Block(block) => Value::Object(block.into()),
            ContentTree::Leaf(v) => v,
        }
    }
}

impl Block {
    /// The media asset this block embeds, taken from `props.id`.
    pub fn referenced_id(&self) -> Option<&str> {
        self.props.as_ref()?.get("id")?.as_str()
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind.as_deref() == Some(kind)
    }

    /// A field outside `type`/`props`/`content`/`children`.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

impl From<Map<String, Value>> for Block {
    fn from(map: Map<String, Value>) -> Self {
        let mut block = Block::default();
        for (key, value) in map {
            block.order.push(key.clone());
            match key.as_str() {
                "type" if value.is_string() => {
                    block.kind = value.as_str().map(str::to_owned);
                }
                "props" => block.props = Some(value),
                "content" => block.content = Some(Box::new(ContentTree::from(value))),
                "children" if value.is_array() => {
                    if let Value::Array(items) = value {
                        block.children = Some(items.into_iter().map(ContentTree::from).collect());
                    }
                }
                _ => {
                    block.extra.insert(key, value);
                }
            }
        }
        block
    }
}

impl Block {
    fn take_field(&mut self, key: &str) -> Option<Value> {
        match key {
            "type" if self.kind.is_some() => self.kind.take().map(Value::String),
            "props" if self.props.is_some() => self.props.take(),
            "content" if self.content.is_some() => self.content.take().map(|c| Value::from(*c)),
            "children" if self.children.is_some() => self
                .children
                .take()
                .map(|items| Value::Array(items.into_iter().map(Value::from).collect())),
            _ => self.extra.shift_remove(key),
        }
    }
}

impl From<Block> for Map<String, Value> {
    /// Keys come out in the order they were read; lifted fields the block
    /// did not start with are appended after them.
    fn from(mut block: Block) -> Self {
        let mut map = Map::new();
        for key in std::mem::take(&mut block.order) {
            if let Some(value) = block.take_field(&key) {
                map.insert(key, value);
            }
        }
        for key in ["type", "props", "content", "children"] {
            if let Some(value) = block.take_field(key) {
                map.insert(key.into(), value);
            }
        }
        map.extend(block.extra);
        map
    }
}
