use crate::error::{PrimeTowerError, Result};
use crate::types::Token;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle to a node of an [`InstructionList`].
///
/// Ids index into the list's arena and never change, no matter how many
/// nodes are inserted around them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in the arena (not in the sequence).
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Node {
    token: Token,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

/// Ordered, mutable instruction sequence backed by an arena of linked nodes.
#[derive(Debug, Clone, Default)]
pub struct InstructionList {
    nodes: Vec<Node>,
    head: Option<NodeId>,
    tail: Option<NodeId>,
}

impl InstructionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the sequence.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn front(&self) -> Option<NodeId> {
        self.head
    }

    pub fn back(&self) -> Option<NodeId> {
        self.tail
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn get(&self, id: NodeId) -> Option<&Token> {
        self.nodes.get(id.0).map(|node| &node.token)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Token> {
        self.nodes.get_mut(id.0).map(|node| &mut node.token)
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.next)
    }

    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.prev)
    }

    fn alloc(&mut self, token: Token) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            token,
            prev: None,
            next: None,
        });
        id
    }

    /// Append a token at the end of the sequence.
    pub fn push_back(&mut self, token: Token) -> NodeId {
        let id = self.alloc(token);
        match self.tail {
            Some(tail) => self.link(tail, id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        id
    }

    /// Prepend a token at the start of the sequence.
    pub fn push_front(&mut self, token: Token) -> NodeId {
        let Some(head) = self.head else {
            return self.push_back(token);
        };
        let id = self.alloc(token);
        self.link(id, head);
        self.head = Some(id);
        id
    }

    fn check(&self, at: NodeId) -> Result<()> {
        if self.contains(at) {
            Ok(())
        } else {
            Err(PrimeTowerError::InvalidMarker { marker: at })
        }
    }

    /// Insert a token right after `at`.
    pub fn insert_after(&mut self, at: NodeId, token: Token) -> Result<NodeId> {
        self.check(at)?;
        let id = self.alloc(token);
        let next = self.nodes[at.0].next;
        self.link(at, id);
        match next {
            Some(next) => self.link(id, next),
            None => self.tail = Some(id),
        }
        Ok(id)
    }

    /// Insert a token right before `at`.
    pub fn insert_before(&mut self, at: NodeId, token: Token) -> Result<NodeId> {
        self.check(at)?;
        let id = self.alloc(token);
        let prev = self.nodes[at.0].prev;
        self.link(id, at);
        match prev {
            Some(prev) => self.link(prev, id),
            None => self.head = Some(id),
        }
        Ok(id)
    }

    /// Move every node of `fragment` into this list, right after `at`, keeping
    /// the fragment's order. Returns the new ids in sequence order.
    pub fn splice_after(&mut self, at: NodeId, fragment: InstructionList) -> Result<Vec<NodeId>> {
        let mut cursor = at;
        let mut ids = Vec::with_capacity(fragment.len());
        for token in fragment.into_tokens() {
            cursor = self.insert_after(cursor, token)?;
            ids.push(cursor);
        }
        Ok(ids)
    }

    /// Concatenate `other` at the end of this list.
    pub fn append(&mut self, other: InstructionList) -> Vec<NodeId> {
        other
            .into_tokens()
            .map(|token| self.push_back(token))
            .collect()
    }

    /// Iterate over `(id, token)` pairs in sequence order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Tokens in sequence order.
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.iter().map(|(_, token)| token)
    }

    /// Consume the list, yielding tokens in sequence order.
    pub fn into_tokens(self) -> impl Iterator<Item = Token> {
        let order: Vec<NodeId> = self.iter().map(|(id, _)| id).collect();
        let mut slots: Vec<Option<Token>> = self.nodes.into_iter().map(|n| Some(n.token)).collect();
        order.into_iter().filter_map(move |id| slots[id.0].take())
    }

    fn link(&mut self, a: NodeId, b: NodeId) {
        self.nodes[a.0].next = Some(b);
        self.nodes[b.0].prev = Some(a);
    }
}

impl FromIterator<Token> for InstructionList {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        let mut list = InstructionList::new();
        for token in iter {
            list.push_back(token);
        }
        list
    }
}

/// Sequence-order iterator over an [`InstructionList`].
pub struct Iter<'a> {
    list: &'a InstructionList,
    cursor: Option<NodeId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (NodeId, &'a Token);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let node = &self.list.nodes[id.0];
        self.cursor = node.next;
        Some((id, &node.token))
    }
}
