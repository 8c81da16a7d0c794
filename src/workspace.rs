use std::collections::{BTreeMap, BTreeSet};

use crate::block::{Block, BlockId, BlockTemplate, ConnectionId, InputSlot};
use crate::config::WorkspaceConfig;
use crate::connection::{Connection, ConnectionKind};
use crate::error::ConnectError;
use crate::geometry::Point;
use crate::manager::ConnectionManager;

/// The workspace-wide registry: owns every block and connection (arenas keyed
/// by id), plus the spatial index over connection positions. All mutation of
/// the block graph goes through here so both sides of an edge and the index
/// stay in step.
///
/// Single-threaded by design; hosts that touch the workspace from more than
/// one thread must serialize access themselves.
#[derive(Debug)]
pub struct Workspace {
    config: WorkspaceConfig,
    blocks: BTreeMap<BlockId, Block>,
    connections: BTreeMap<ConnectionId, Connection>,
    manager: ConnectionManager,
    next_block_id: u32,
    next_connection_id: u32,
}

impl Workspace {
    pub fn new(config: WorkspaceConfig) -> Self {
        let manager = ConnectionManager::new(config.grid_cell_size);
        Self {
            config,
            blocks: BTreeMap::new(),
            connections: BTreeMap::new(),
            manager,
            next_block_id: 0,
            next_connection_id: 0,
        }
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn tracked_connections(&self) -> usize {
        self.manager.len()
    }

    fn fresh_connection(
        &mut self,
        kind: ConnectionKind,
        owner: BlockId,
        origin: Point,
        offset: Point,
        input_name: Option<String>,
    ) -> ConnectionId {
        let id = ConnectionId(self.next_connection_id);
        self.next_connection_id += 1;
        let position = origin.plus(offset);
        self.connections.insert(
            id,
            Connection {
                id,
                kind,
                owner,
                offset,
                position,
                target: None,
                input_name,
            },
        );
        self.manager.track(id, position);
        id
    }

    /// Instantiates a block from its type's template at `position` and
    /// indexes all of its connections. The block starts fully detached.
    pub fn register_block(&mut self, template: &BlockTemplate, position: Point) -> BlockId {
        let id = BlockId(self.next_block_id);
        self.next_block_id += 1;

        let previous = template.previous.map(|point| {
            self.fresh_connection(ConnectionKind::Previous, id, position, point.offset, None)
        });
        let next = template.next.map(|point| {
            self.fresh_connection(ConnectionKind::Next, id, position, point.offset, None)
        });
        let output = template.output.map(|point| {
            self.fresh_connection(ConnectionKind::OutputValue, id, position, point.offset, None)
        });
        let inputs = template
            .inputs
            .iter()
            .map(|input| {
                debug_assert!(
                    matches!(
                        input.kind,
                        ConnectionKind::InputValue | ConnectionKind::InputStatement
                    ),
                    "input slot {} declared with non-input kind {:?}",
                    input.name,
                    input.kind
                );
                InputSlot {
                    name: input.name.clone(),
                    connection: self.fresh_connection(
                        input.kind,
                        id,
                        position,
                        input.point.offset,
                        Some(input.name.clone()),
                    ),
                }
            })
            .collect();

        self.blocks.insert(
            id,
            Block {
                id,
                position,
                previous,
                next,
                output,
                inputs,
            },
        );
        self.assert_consistent();
        id
    }

    /// Detaches the block from all neighbors, drops its connections from the
    /// index and the arena, and removes it. Neighboring blocks are left with
    /// cleanly cleared targets, never dangling ones.
    pub fn unregister_block(&mut self, id: BlockId) {
        let Some(block) = self.blocks.get(&id) else {
            debug_assert!(false, "unregistering unknown block {id:?}");
            return;
        };
        let connection_ids = block.connection_ids();
        for connection_id in &connection_ids {
            self.disconnect(*connection_id);
        }
        for connection_id in connection_ids {
            let Some(connection) = self.connections.remove(&connection_id) else {
                continue;
            };
            self.manager.untrack(connection_id, connection.position);
        }
        self.blocks.remove(&id);
        self.assert_consistent();
    }

    /// Pairs two connections, updating both targets atomically. Checks run in
    /// the order the drag handler wants to report them: kind compatibility,
    /// occupancy, then stack membership.
    pub fn connect(&mut self, a: ConnectionId, b: ConnectionId) -> Result<(), ConnectError> {
        let (Some(conn_a), Some(conn_b)) =
            (self.connections.get(&a), self.connections.get(&b))
        else {
            debug_assert!(false, "connecting unknown connection {a:?} or {b:?}");
            return Ok(());
        };
        if !self.config.compatibility.compatible(conn_a.kind, conn_b.kind) {
            return Err(ConnectError::IncompatibleKind(conn_a.kind, conn_b.kind));
        }
        if conn_a.is_connected() {
            return Err(ConnectError::AlreadyConnected(a));
        }
        if conn_b.is_connected() {
            return Err(ConnectError::AlreadyConnected(b));
        }
        // A block hangs off at most one parent. Whichever side of this pair
        // is the child end must not already be attached through its other
        // inferior connection (a block owning both previous and output could
        // otherwise end up with two parents in one component).
        if !conn_a.kind.is_superior() && self.parent_block(conn_a.owner).is_some() {
            return Err(ConnectError::AlreadyHasParent(conn_a.owner));
        }
        if !conn_b.kind.is_superior() && self.parent_block(conn_b.owner).is_some() {
            return Err(ConnectError::AlreadyHasParent(conn_b.owner));
        }
        // Two connections inside one stack can never legally pair: it would
        // either close a cycle or give a block a second parent.
        if self.stack_root(conn_a.owner) == self.stack_root(conn_b.owner) {
            return Err(ConnectError::SelfConnection);
        }

        if let Some(conn) = self.connections.get_mut(&a) {
            conn.target = Some(b);
        }
        if let Some(conn) = self.connections.get_mut(&b) {
            conn.target = Some(a);
        }
        self.assert_consistent();
        Ok(())
    }

    /// Clears both sides of an edge. No-op when the connection is already
    /// untargeted.
    pub fn disconnect(&mut self, id: ConnectionId) {
        let Some(target) = self.connections.get(&id).and_then(|c| c.target) else {
            return;
        };
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.target = None;
        }
        if let Some(conn) = self.connections.get_mut(&target) {
            conn.target = None;
        }
        self.assert_consistent();
    }

    /// Moves a block and its whole downstream subtree, refreshing cached
    /// connection positions and re-bucketing the spatial index.
    pub fn move_block(&mut self, id: BlockId, new_position: Point) {
        let Some(block) = self.blocks.get(&id) else {
            debug_assert!(false, "moving unknown block {id:?}");
            return;
        };
        let dx = new_position.x - block.position.x;
        let dy = new_position.y - block.position.y;
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        for member in self.subtree(id) {
            let Some(block) = self.blocks.get_mut(&member) else {
                continue;
            };
            block.position = block.position.offset_by(dx, dy);
            let origin = block.position;
            let connection_ids = block.connection_ids();
            for connection_id in connection_ids {
                if let Some(conn) = self.connections.get_mut(&connection_id) {
                    let old = conn.position;
                    conn.position = origin.plus(conn.offset);
                    self.manager.move_connection(connection_id, old, conn.position);
                }
            }
        }
    }

    /// Best snap candidate for `dragged` within `radius`: compatible kind,
    /// untargeted, and outside the dragged block's own stack. `None` is the
    /// ordinary outcome of most drag-move frames.
    pub fn find_best_connection(
        &self,
        dragged: ConnectionId,
        radius: f32,
    ) -> Option<ConnectionId> {
        let Some(dragged_conn) = self.connections.get(&dragged) else {
            debug_assert!(false, "searching from unknown connection {dragged:?}");
            return None;
        };
        let excluded: BTreeSet<BlockId> = self
            .subtree(self.stack_root(dragged_conn.owner))
            .into_iter()
            .collect();
        self.manager.closest_compatible(
            &self.connections,
            dragged_conn,
            radius,
            &excluded,
            &self.config.compatibility,
        )
    }

    /// The drag-and-drop entry point: search, then connect to the winner.
    /// `radius` of `None` uses the configured snap radius.
    pub fn try_connect(
        &mut self,
        dragged: ConnectionId,
        radius: Option<f32>,
    ) -> Result<Option<ConnectionId>, ConnectError> {
        let radius = radius.unwrap_or(self.config.snap_radius);
        let Some(best) = self.find_best_connection(dragged, radius) else {
            return Ok(None);
        };
        self.connect(dragged, best)?;
        Ok(Some(best))
    }

    /// The block stacked or nested directly under this one via its next
    /// connection, if any.
    pub fn next_block(&self, id: BlockId) -> Option<BlockId> {
        let next = self.blocks.get(&id)?.next?;
        let target = self.connections.get(&next)?.target?;
        Some(self.connections.get(&target)?.owner)
    }

    /// The block this one hangs off, through either its previous connection
    /// or its output plug. Derived from connection targets on every call;
    /// nothing stores a parent pointer.
    pub fn parent_block(&self, id: BlockId) -> Option<BlockId> {
        let block = self.blocks.get(&id)?;
        for inferior in [block.previous, block.output].into_iter().flatten() {
            if let Some(target) = self.connections.get(&inferior).and_then(|c| c.target) {
                return Some(self.connections[&target].owner);
            }
        }
        None
    }

    /// The block plugged into the named input slot, if any.
    pub fn input_target(&self, id: BlockId, name: &str) -> Option<BlockId> {
        let slot = self.blocks.get(&id)?.input_by_name(name)?;
        let target = self.connections.get(&slot.connection)?.target?;
        Some(self.connections.get(&target)?.owner)
    }

    /// Walks parent links (previous and output alike) to the top of the
    /// connected component.
    pub fn stack_root(&self, id: BlockId) -> BlockId {
        let mut current = id;
        while let Some(parent) = self.parent_block(current) {
            current = parent;
        }
        current
    }

    /// The block plus everything reachable downstream of it: the next chain
    /// and all input children, recursively.
    pub fn subtree(&self, id: BlockId) -> Vec<BlockId> {
        let mut members = Vec::new();
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            members.push(current);
            let Some(block) = self.blocks.get(&current) else {
                continue;
            };
            if let Some(next) = self.next_block(block.id) {
                pending.push(next);
            }
            for slot in &block.inputs {
                if let Some(target) = self.connections.get(&slot.connection).and_then(|c| c.target)
                    && let Some(conn) = self.connections.get(&target)
                {
                    pending.push(conn.owner);
                }
            }
        }
        members
    }

    /// Structural self-check, active in debug builds only. A failure here
    /// means the graph got corrupted, which is never recoverable.
    fn assert_consistent(&self) {
        if !cfg!(debug_assertions) {
            return;
        }
        for (id, conn) in &self.connections {
            assert!(
                self.blocks.contains_key(&conn.owner),
                "connection {id:?} owned by unknown block {:?}",
                conn.owner
            );
            if let Some(target) = conn.target {
                let other = self
                    .connections
                    .get(&target)
                    .unwrap_or_else(|| panic!("connection {id:?} targets missing {target:?}"));
                assert_eq!(
                    other.target,
                    Some(*id),
                    "target symmetry broken between {id:?} and {target:?}"
                );
            }
        }
        for &id in self.blocks.keys() {
            let mut seen = BTreeSet::new();
            let mut pending = vec![id];
            while let Some(current) = pending.pop() {
                assert!(
                    seen.insert(current),
                    "block {current:?} reachable twice from {id:?}"
                );
                let Some(block) = self.blocks.get(&current) else {
                    continue;
                };
                pending.extend(self.next_block(block.id));
                for slot in &block.inputs {
                    if let Some(target) =
                        self.connections.get(&slot.connection).and_then(|c| c.target)
                    {
                        pending.push(self.connections[&target].owner);
                    }
                }
            }
        }
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(WorkspaceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement_at(ws: &mut Workspace, x: f32, y: f32) -> BlockId {
        ws.register_block(&BlockTemplate::statement(24.0), Point::new(x, y))
    }

    fn prev_of(ws: &Workspace, id: BlockId) -> ConnectionId {
        ws.block(id).unwrap().previous.unwrap()
    }

    fn next_of(ws: &Workspace, id: BlockId) -> ConnectionId {
        ws.block(id).unwrap().next.unwrap()
    }

    #[test]
    fn connect_sets_both_targets_symmetrically() {
        let mut ws = Workspace::default();
        let a = statement_at(&mut ws, 0.0, 0.0);
        let b = statement_at(&mut ws, 0.0, 24.0);
        ws.connect(next_of(&ws, a), prev_of(&ws, b)).unwrap();

        let next = ws.connection(next_of(&ws, a)).unwrap();
        let prev = ws.connection(prev_of(&ws, b)).unwrap();
        assert_eq!(next.target, Some(prev.id));
        assert_eq!(prev.target, Some(next.id));
        assert_eq!(ws.next_block(a), Some(b));
        assert_eq!(ws.parent_block(b), Some(a));
    }

    #[test]
    fn connect_rejects_incompatible_kinds() {
        let mut ws = Workspace::default();
        let a = statement_at(&mut ws, 0.0, 0.0);
        let b = statement_at(&mut ws, 0.0, 24.0);
        let err = ws.connect(next_of(&ws, a), next_of(&ws, b)).unwrap_err();
        assert_eq!(
            err,
            ConnectError::IncompatibleKind(ConnectionKind::Next, ConnectionKind::Next)
        );
    }

    #[test]
    fn connect_rejects_an_occupied_side() {
        let mut ws = Workspace::default();
        let a = statement_at(&mut ws, 0.0, 0.0);
        let b = statement_at(&mut ws, 0.0, 24.0);
        let c = statement_at(&mut ws, 50.0, 0.0);
        ws.connect(next_of(&ws, a), prev_of(&ws, b)).unwrap();

        let err = ws.connect(next_of(&ws, c), prev_of(&ws, b)).unwrap_err();
        assert_eq!(err, ConnectError::AlreadyConnected(prev_of(&ws, b)));
    }

    #[test]
    fn disconnect_clears_both_sides_and_is_idempotent() {
        let mut ws = Workspace::default();
        let a = statement_at(&mut ws, 0.0, 0.0);
        let b = statement_at(&mut ws, 0.0, 24.0);
        ws.connect(next_of(&ws, a), prev_of(&ws, b)).unwrap();

        ws.disconnect(next_of(&ws, a));
        assert_eq!(ws.connection(next_of(&ws, a)).unwrap().target, None);
        assert_eq!(ws.connection(prev_of(&ws, b)).unwrap().target, None);

        // Second call is a no-op, not an error.
        ws.disconnect(next_of(&ws, a));
        assert_eq!(ws.next_block(a), None);
    }

    #[test]
    fn connect_to_a_descendant_is_refused() {
        let mut ws = Workspace::default();
        let outer = ws.register_block(
            &BlockTemplate::expression().with_value_input("inner", Point::new(30.0, 4.0)),
            Point::new(0.0, 0.0),
        );
        let nested = ws.register_block(
            &BlockTemplate::expression().with_value_input("leaf", Point::new(30.0, 4.0)),
            Point::new(32.0, 4.0),
        );
        let inner_slot = ws.block(outer).unwrap().input_by_name("inner").unwrap().connection;
        let nested_output = ws.block(nested).unwrap().output.unwrap();
        ws.connect(inner_slot, nested_output).unwrap();

        // outer's own output into an input of its descendant would close a cycle.
        let outer_output = ws.block(outer).unwrap().output.unwrap();
        let leaf_slot = ws.block(nested).unwrap().input_by_name("leaf").unwrap().connection;
        let err = ws.connect(outer_output, leaf_slot).unwrap_err();
        assert_eq!(err, ConnectError::SelfConnection);
    }

    #[test]
    fn a_block_never_acquires_a_second_parent() {
        use crate::block::ConnectionPoint;

        let mut ws = Workspace::default();
        // A template owning both a previous connection and an output plug,
        // the one shape that could reach two parents at once.
        let template = BlockTemplate {
            previous: Some(ConnectionPoint {
                offset: Point::new(0.0, 0.0),
            }),
            next: None,
            output: Some(ConnectionPoint {
                offset: Point::new(-4.0, 4.0),
            }),
            inputs: Vec::new(),
        };
        let hybrid = ws.register_block(&template, Point::new(0.0, 50.0));
        let upper = statement_at(&mut ws, 0.0, 0.0);
        let holder = ws.register_block(
            &BlockTemplate::statement(24.0).with_value_input("value", Point::new(40.0, 8.0)),
            Point::new(100.0, 0.0),
        );
        let slot = ws.block(holder).unwrap().input_by_name("value").unwrap().connection;
        let output = ws.block(hybrid).unwrap().output.unwrap();

        ws.connect(next_of(&ws, upper), prev_of(&ws, hybrid)).unwrap();
        let err = ws.connect(slot, output).unwrap_err();
        assert_eq!(err, ConnectError::AlreadyHasParent(hybrid));
        assert_eq!(ws.connection(output).unwrap().target, None);
        assert_eq!(ws.stack_root(hybrid), upper);

        // Same guard with the attachment order reversed.
        ws.disconnect(prev_of(&ws, hybrid));
        ws.connect(slot, output).unwrap();
        let err = ws
            .connect(next_of(&ws, upper), prev_of(&ws, hybrid))
            .unwrap_err();
        assert_eq!(err, ConnectError::AlreadyHasParent(hybrid));
        assert_eq!(ws.stack_root(hybrid), holder);
    }

    #[test]
    #[should_panic(expected = "connecting unknown connection")]
    fn connect_with_a_stale_id_trips_the_debug_check() {
        let mut ws = Workspace::default();
        let a = statement_at(&mut ws, 0.0, 0.0);
        let stale = next_of(&ws, a);
        ws.unregister_block(a);
        let b = statement_at(&mut ws, 0.0, 24.0);
        let _ = ws.connect(stale, prev_of(&ws, b));
    }

    #[test]
    fn move_block_carries_the_subtree_and_connection_positions() {
        let mut ws = Workspace::default();
        let a = statement_at(&mut ws, 0.0, 0.0);
        let b = statement_at(&mut ws, 0.0, 24.0);
        ws.connect(next_of(&ws, a), prev_of(&ws, b)).unwrap();

        ws.move_block(a, Point::new(100.0, 50.0));
        assert_eq!(ws.block(a).unwrap().position, Point::new(100.0, 50.0));
        // b was stacked 24 below a and moves with it.
        assert_eq!(ws.block(b).unwrap().position, Point::new(100.0, 74.0));
        let b_prev = ws.connection(prev_of(&ws, b)).unwrap();
        assert_eq!(b_prev.position, Point::new(100.0, 74.0));
    }

    #[test]
    fn unregister_detaches_neighbors_cleanly() {
        let mut ws = Workspace::default();
        let a = statement_at(&mut ws, 0.0, 0.0);
        let b = statement_at(&mut ws, 0.0, 24.0);
        ws.connect(next_of(&ws, a), prev_of(&ws, b)).unwrap();
        let tracked_before = ws.tracked_connections();

        ws.unregister_block(b);
        assert_eq!(ws.next_block(a), None);
        assert_eq!(ws.connection(next_of(&ws, a)).unwrap().target, None);
        assert!(ws.block(b).is_none());
        assert_eq!(ws.tracked_connections(), tracked_before - 2);
    }

    #[test]
    fn subtree_covers_next_chain_and_input_children() {
        let mut ws = Workspace::default();
        let a = ws.register_block(
            &BlockTemplate::statement(24.0).with_value_input("value", Point::new(40.0, 8.0)),
            Point::new(0.0, 0.0),
        );
        let b = statement_at(&mut ws, 0.0, 24.0);
        let v = ws.register_block(&BlockTemplate::expression(), Point::new(42.0, 8.0));
        ws.connect(next_of(&ws, a), prev_of(&ws, b)).unwrap();
        let slot = ws.block(a).unwrap().input_by_name("value").unwrap().connection;
        ws.connect(slot, ws.block(v).unwrap().output.unwrap()).unwrap();

        let mut members = ws.subtree(a);
        members.sort();
        assert_eq!(members, vec![a, b, v]);
        assert_eq!(ws.stack_root(v), a);
        assert_eq!(ws.stack_root(b), a);
    }
}
