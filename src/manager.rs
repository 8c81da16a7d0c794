use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::block::{BlockId, ConnectionId};
use crate::connection::{CompatibilityTable, Connection};
use crate::geometry::Point;

/// Spatial index over every live connection in the workspace. Connections
/// are hashed into square grid cells; with the cell size equal to the snap
/// radius a radius query never touches more than a 3x3 neighborhood.
///
/// The manager stores only ids and positions. Kind, target, and owner checks
/// happen against the workspace's connection arena at query time, so the
/// index never goes stale on connect/disconnect, only on movement.
#[derive(Debug)]
pub struct ConnectionManager {
    cell_size: f32,
    grid: HashMap<(i32, i32), Vec<ConnectionId>>,
    len: usize,
}

impl ConnectionManager {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(1.0),
            grid: HashMap::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn cell_of(&self, point: Point) -> (i32, i32) {
        (
            (point.x / self.cell_size).floor() as i32,
            (point.y / self.cell_size).floor() as i32,
        )
    }

    pub fn track(&mut self, id: ConnectionId, position: Point) {
        let cell = self.cell_of(position);
        let bucket = self.grid.entry(cell).or_default();
        debug_assert!(!bucket.contains(&id), "connection tracked twice");
        bucket.push(id);
        self.len += 1;
    }

    pub fn untrack(&mut self, id: ConnectionId, position: Point) {
        let cell = self.cell_of(position);
        if let Some(bucket) = self.grid.get_mut(&cell)
            && let Some(index) = bucket.iter().position(|&c| c == id)
        {
            bucket.remove(index);
            self.len -= 1;
            if bucket.is_empty() {
                self.grid.remove(&cell);
            }
            return;
        }
        debug_assert!(false, "untracked connection was not in its bucket");
    }

    /// Re-buckets a connection after its owner moved. Cheap no-op when the
    /// move stays inside one cell.
    pub fn move_connection(&mut self, id: ConnectionId, from: Point, to: Point) {
        if self.cell_of(from) == self.cell_of(to) {
            return;
        }
        self.untrack(id, from);
        self.track(id, to);
    }

    /// Finds the closest connection to `dragged` within `radius` that its
    /// kind can pair with, skipping occupied connections and anything owned
    /// by a block in `excluded` (the dragged stack). Ties at equal distance
    /// go to the earliest-tracked connection, which keeps per-frame results
    /// deterministic.
    pub fn closest_compatible(
        &self,
        connections: &BTreeMap<ConnectionId, Connection>,
        dragged: &Connection,
        radius: f32,
        excluded: &BTreeSet<BlockId>,
        table: &CompatibilityTable,
    ) -> Option<ConnectionId> {
        if radius <= 0.0 {
            return None;
        }
        let min_cell = self.cell_of(dragged.position.offset_by(-radius, -radius));
        let max_cell = self.cell_of(dragged.position.offset_by(radius, radius));

        let mut best: Option<(f32, ConnectionId)> = None;
        for cx in min_cell.0..=max_cell.0 {
            for cy in min_cell.1..=max_cell.1 {
                let Some(bucket) = self.grid.get(&(cx, cy)) else {
                    continue;
                };
                for &id in bucket {
                    if id == dragged.id {
                        continue;
                    }
                    let Some(candidate) = connections.get(&id) else {
                        debug_assert!(false, "index holds a connection the arena does not");
                        continue;
                    };
                    if excluded.contains(&candidate.owner)
                        || candidate.is_connected()
                        || !table.compatible(dragged.kind, candidate.kind)
                    {
                        continue;
                    }
                    let distance = candidate.distance_to(dragged.position);
                    if distance > radius {
                        continue;
                    }
                    let closer = match best {
                        None => true,
                        Some((best_distance, best_id)) => {
                            distance < best_distance
                                || (distance == best_distance && id < best_id)
                        }
                    };
                    if closer {
                        best = Some((distance, id));
                    }
                }
            }
        }
        best.map(|(_, id)| id)
    }
}
