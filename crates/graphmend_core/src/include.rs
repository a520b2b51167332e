//! Include trees: which relationships an operation may traverse.
//!
//! Only relationships named in the include tree participate in recursive
//! insert/update/delete. Everything else in a payload is left untouched
//! on the persisted entity.

use crate::error::{GraphError, GraphResult};
use graphmend_store::{RelationKind, Schema};

/// One node of an include tree: a relationship accessor plus the
/// relationships to traverse on the target in turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeNode {
    /// Accessor name of the relationship to traverse.
    pub accessor: String,
    /// Include tree applied to the relationship's target.
    pub children: Vec<IncludeNode>,
}

impl IncludeNode {
    /// Creates a leaf node for the named relationship.
    pub fn new(accessor: impl Into<String>) -> Self {
        Self {
            accessor: accessor.into(),
            children: Vec::new(),
        }
    }

    /// Adds a child node. Builder-style.
    pub fn with(mut self, child: IncludeNode) -> Self {
        self.children.push(child);
        self
    }

    /// Adds several child nodes. Builder-style.
    pub fn with_all(mut self, children: Vec<IncludeNode>) -> Self {
        self.children.extend(children);
        self
    }
}

/// Conditional include helper: the nodes when `condition` holds, else
/// nothing.
pub fn when(condition: bool, nodes: Vec<IncludeNode>) -> Vec<IncludeNode> {
    if condition {
        nodes
    } else {
        Vec::new()
    }
}

/// Finds the include node for an accessor, if declared.
pub(crate) fn node_for<'a>(include: &'a [IncludeNode], accessor: &str) -> Option<&'a IncludeNode> {
    include.iter().find(|node| node.accessor == accessor)
}

/// Validates an include tree against the schema, starting from the named
/// root type.
///
/// Every accessor must resolve to a declared relationship, and join-table
/// relationships are rejected: they cannot be recursively embedded.
pub fn validate_include(
    schema: &Schema,
    type_name: &str,
    include: &[IncludeNode],
) -> GraphResult<()> {
    let ty = schema
        .get(type_name)
        .ok_or_else(|| GraphError::unknown_type(type_name))?;
    for node in include {
        let rel = ty
            .relationship(&node.accessor)
            .ok_or_else(|| GraphError::UnknownInclude {
                type_name: type_name.to_string(),
                accessor: node.accessor.clone(),
            })?;
        match rel.kind {
            RelationKind::BelongsTo | RelationKind::HasOne | RelationKind::HasMany => {
                validate_include(schema, &rel.target, &node.children)?;
            }
            RelationKind::BelongsToMany => {
                return Err(GraphError::NotEmbeddable {
                    type_name: type_name.to_string(),
                    accessor: node.accessor.clone(),
                });
            }
        }
    }
    Ok(())
}
