use std::collections::BTreeMap;

use crate::block::{BlockId, GroupId};
use crate::error::NavigateError;
use crate::workspace::Workspace;

/// The renderer-owned map from block to render group. The core never creates
/// or destroys groups; it only reads this registry when resolving navigation
/// queries. Hosts reassign entries after every structural change.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    next_id: u32,
    members: BTreeMap<BlockId, GroupId>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self) -> GroupId {
        let id = GroupId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, block: BlockId, group: GroupId) {
        self.members.insert(block, group);
    }

    /// Puts the block in a freshly created group.
    pub fn assign(&mut self, block: BlockId) -> GroupId {
        let group = self.create();
        self.insert(block, group);
        group
    }

    pub fn remove(&mut self, block: BlockId) {
        self.members.remove(&block);
    }

    pub fn group_of(&self, block: BlockId) -> Option<GroupId> {
        self.members.get(&block).copied()
    }
}

/// Whether `block` heads its own render group: nothing is stacked above it
/// through its previous connection. Blocks plugged in as values have no
/// previous link to a parent, so they always head a group.
fn is_group_head(workspace: &Workspace, block: BlockId) -> bool {
    stacked_parent(workspace, block).is_none()
}

/// The parent reached through the previous connection only. Value plugs do
/// not count: they cross a group boundary.
fn stacked_parent(workspace: &Workspace, block: BlockId) -> Option<BlockId> {
    let previous = workspace.block(block)?.previous?;
    let target = workspace.connection(previous)?.target?;
    Some(workspace.connection(target)?.owner)
}

/// Resolves the render group enclosing `block`: walks up stacked-parent links
/// until the head of the stack, then reads that head's group from the
/// registry. Errs only when the head was never assigned a group, which is a
/// caller bug, not a reachable user state.
pub fn nearest_parent_group(
    workspace: &Workspace,
    registry: &GroupRegistry,
    block: BlockId,
) -> Result<GroupId, NavigateError> {
    let mut current = block;
    while let Some(parent) = stacked_parent(workspace, current) {
        current = parent;
    }
    debug_assert!(is_group_head(workspace, current));
    registry
        .group_of(current)
        .ok_or(NavigateError::DetachedBlock(current))
}

/// Resolves the group at the top of `block`'s whole connected component,
/// walking every parent link (stacking and value plugs alike) past group
/// boundaries.
pub fn root_group(
    workspace: &Workspace,
    registry: &GroupRegistry,
    block: BlockId,
) -> Result<GroupId, NavigateError> {
    let root = workspace.stack_root(block);
    registry
        .group_of(root)
        .ok_or(NavigateError::DetachedBlock(root))
}
