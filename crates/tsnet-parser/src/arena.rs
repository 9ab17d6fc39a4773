//! NodeArena - owns every node of one source file.
//!
//! Children are always allocated before their parent, so `add` can wire the
//! parent links of a new node's children immediately.

use crate::node::{Node, NodeIndex, NodeKind};
use smallvec::SmallVec;

#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    /// Maximum pre-allocation to avoid capacity overflow in huge files.
    const MAX_NODE_PREALLOC: usize = 1_000_000;

    #[must_use]
    pub fn new() -> NodeArena {
        NodeArena::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> NodeArena {
        NodeArena {
            nodes: Vec::with_capacity(capacity.min(Self::MAX_NODE_PREALLOC)),
        }
    }

    /// Allocate a node and point its children back at it.
    pub fn add(&mut self, kind: NodeKind, pos: u32, end: u32) -> NodeIndex {
        let index = NodeIndex(self.nodes.len() as u32);
        let children = children_of(&kind);
        self.nodes.push(Node {
            kind,
            pos,
            end,
            parent: NodeIndex::NONE,
        });
        for child in children {
            if let Some(node) = self.get_mut(child) {
                node.parent = index;
            }
        }
        index
    }

    /// Get a node by index
    #[inline]
    #[must_use]
    pub fn get(&self, index: NodeIndex) -> Option<&Node> {
        if index.is_none() {
            None
        } else {
            self.nodes.get(index.0 as usize)
        }
    }

    #[inline]
    fn get_mut(&mut self, index: NodeIndex) -> Option<&mut Node> {
        if index.is_none() {
            None
        } else {
            self.nodes.get_mut(index.0 as usize)
        }
    }

    /// Kind of the node at `index`, if it exists.
    #[inline]
    #[must_use]
    pub fn kind(&self, index: NodeIndex) -> Option<&NodeKind> {
        self.get(index).map(|node| &node.kind)
    }

    #[inline]
    #[must_use]
    pub fn parent(&self, index: NodeIndex) -> NodeIndex {
        self.get(index).map_or(NodeIndex::NONE, |node| node.parent)
    }

    /// Direct children in source order.
    #[must_use]
    pub fn children(&self, index: NodeIndex) -> SmallVec<[NodeIndex; 8]> {
        self.get(index)
            .map(|node| children_of(&node.kind))
            .unwrap_or_default()
    }

    /// Identifier text of an `Identifier` node.
    #[must_use]
    pub fn identifier_text(&self, index: NodeIndex) -> Option<&str> {
        match self.kind(index)? {
            NodeKind::Identifier(name) => Some(name),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop nodes allocated after a speculative parse that was abandoned.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
    }

    /// Iterate all nodes with their indices, in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeIndex(i as u32), node))
    }
}

fn children_of(kind: &NodeKind) -> SmallVec<[NodeIndex; 8]> {
    let mut out: SmallVec<[NodeIndex; 8]> = SmallVec::new();
    let mut push = |index: NodeIndex| {
        if index.is_some() {
            out.push(index);
        }
    };
    match kind {
        NodeKind::ClassDeclaration(data) => {
            data.type_parameters.iter().copied().for_each(&mut push);
            push(data.extends);
            data.implements.iter().copied().for_each(&mut push);
            data.members.iter().copied().for_each(&mut push);
        }
        NodeKind::InterfaceDeclaration(data) => {
            data.type_parameters.iter().copied().for_each(&mut push);
            data.extends.iter().copied().for_each(&mut push);
            data.members.iter().copied().for_each(&mut push);
        }
        NodeKind::TypeAliasDeclaration(data) => {
            data.type_parameters.iter().copied().for_each(&mut push);
            push(data.type_node);
        }
        NodeKind::EnumDeclaration(data) => data.members.iter().copied().for_each(&mut push),
        NodeKind::EnumMember(data) => push(data.initializer),
        NodeKind::FunctionDeclaration(data) | NodeKind::FunctionExpression(data) => {
            data.type_parameters.iter().copied().for_each(&mut push);
            data.parameters.iter().copied().for_each(&mut push);
            push(data.return_type);
            push(data.body);
        }
        NodeKind::VariableStatement(data) => data.declarations.iter().copied().for_each(&mut push),
        NodeKind::VariableDeclaration(data) => {
            push(data.type_annotation);
            push(data.initializer);
        }
        NodeKind::TypeParameter(data) => {
            push(data.constraint);
            push(data.default);
        }
        NodeKind::Parameter(data) => {
            push(data.type_annotation);
            push(data.initializer);
        }
        NodeKind::PropertyDeclaration(data) => {
            push(data.type_annotation);
            push(data.initializer);
        }
        NodeKind::MethodDeclaration(data) => {
            data.type_parameters.iter().copied().for_each(&mut push);
            data.parameters.iter().copied().for_each(&mut push);
            push(data.return_type);
            push(data.body);
        }
        NodeKind::Constructor(data) => {
            data.parameters.iter().copied().for_each(&mut push);
            push(data.body);
        }
        NodeKind::GetAccessor(data) | NodeKind::SetAccessor(data) => {
            data.parameters.iter().copied().for_each(&mut push);
            push(data.type_annotation);
            push(data.body);
        }
        NodeKind::IndexSignature(data) => {
            push(data.key_type);
            push(data.value_type);
        }
        NodeKind::Block(statements) => statements.iter().copied().for_each(&mut push),
        NodeKind::ReturnStatement(expr)
        | NodeKind::ExpressionStatement(expr)
        | NodeKind::SpreadElement(expr)
        | NodeKind::ParenthesizedExpression(expr)
        | NodeKind::ArrayType(expr)
        | NodeKind::ParenthesizedType(expr) => push(*expr),
        NodeKind::PropertyAccess(data) => push(data.expression),
        NodeKind::CallExpression(data) | NodeKind::NewExpression(data) => {
            push(data.callee);
            data.type_arguments.iter().copied().for_each(&mut push);
            data.arguments.iter().copied().for_each(&mut push);
        }
        NodeKind::BinaryExpression(data) => {
            push(data.left);
            push(data.right);
        }
        NodeKind::ArrayLiteral(elements)
        | NodeKind::ObjectLiteral(elements)
        | NodeKind::TupleType(elements)
        | NodeKind::UnionType(elements)
        | NodeKind::IntersectionType(elements)
        | NodeKind::TypeLiteral(elements) => elements.iter().copied().for_each(&mut push),
        NodeKind::TypeReference(data) => data.type_arguments.iter().copied().for_each(&mut push),
        NodeKind::TupleMember(data) => push(data.element_type),
        NodeKind::FunctionType(data) => {
            data.type_parameters.iter().copied().for_each(&mut push);
            data.parameters.iter().copied().for_each(&mut push);
            push(data.return_type);
        }
        NodeKind::TypeOperator(data) => push(data.type_node),
        NodeKind::Identifier(_)
        | NodeKind::ThisExpression
        | NodeKind::LiteralExpression(_)
        | NodeKind::KeywordType(_)
        | NodeKind::LiteralType(_)
        | NodeKind::Missing => {}
    }
    out
}
