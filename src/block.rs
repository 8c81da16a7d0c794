use serde::{Deserialize, Serialize};

use crate::connection::ConnectionKind;
use crate::geometry::Point;

/// Handle to a block in the workspace arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u32);

/// Handle to a connection in the workspace arena. Ids are assigned
/// monotonically, so ordering by id is insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u32);

/// Handle to a render group. Group objects themselves are owned by the
/// rendering layer; the core only passes ids around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u32);

/// A named input slot and the connection that serves it.
#[derive(Debug, Clone)]
pub struct InputSlot {
    pub name: String,
    pub connection: ConnectionId,
}

/// A node in the block graph. Blocks own their connections by id; every
/// block-to-block relationship (next, parent, input child) is derived from
/// connection targets and never stored a second time.
#[derive(Debug, Clone)]
pub struct Block {
    pub id: BlockId,
    pub position: Point,
    pub previous: Option<ConnectionId>,
    pub next: Option<ConnectionId>,
    pub output: Option<ConnectionId>,
    pub inputs: Vec<InputSlot>,
}

impl Block {
    pub fn input_by_name(&self, name: &str) -> Option<&InputSlot> {
        self.inputs.iter().find(|slot| slot.name == name)
    }

    /// All connections owned by this block, fixed order: previous, next,
    /// output, then inputs in declaration order.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids = Vec::with_capacity(3 + self.inputs.len());
        ids.extend(self.previous);
        ids.extend(self.next);
        ids.extend(self.output);
        ids.extend(self.inputs.iter().map(|slot| slot.connection));
        ids
    }
}

/// Geometry for one connection point, supplied by the block-type definition
/// (the geometry provider owns these numbers, not the core).
#[derive(Debug, Clone, Copy)]
pub struct ConnectionPoint {
    pub offset: Point,
}

/// Describes which connections a block type owns and where they sit relative
/// to the block origin. Built once per block type by the host, then passed to
/// `Workspace::register_block` for each instance.
#[derive(Debug, Clone, Default)]
pub struct BlockTemplate {
    pub previous: Option<ConnectionPoint>,
    pub next: Option<ConnectionPoint>,
    pub output: Option<ConnectionPoint>,
    pub inputs: Vec<InputTemplate>,
}

#[derive(Debug, Clone)]
pub struct InputTemplate {
    pub name: String,
    pub kind: ConnectionKind,
    pub point: ConnectionPoint,
}

impl BlockTemplate {
    /// A plain statement block: previous on the top edge, next on the bottom.
    pub fn statement(height: f32) -> Self {
        Self {
            previous: Some(ConnectionPoint {
                offset: Point::new(0.0, 0.0),
            }),
            next: Some(ConnectionPoint {
                offset: Point::new(0.0, height),
            }),
            output: None,
            inputs: Vec::new(),
        }
    }

    /// An expression block: a single output plug on the left edge.
    pub fn expression() -> Self {
        Self {
            previous: None,
            next: None,
            output: Some(ConnectionPoint {
                offset: Point::new(0.0, 0.0),
            }),
            inputs: Vec::new(),
        }
    }

    pub fn with_value_input(mut self, name: &str, offset: Point) -> Self {
        self.inputs.push(InputTemplate {
            name: name.to_string(),
            kind: ConnectionKind::InputValue,
            point: ConnectionPoint { offset },
        });
        self
    }

    pub fn with_statement_input(mut self, name: &str, offset: Point) -> Self {
        self.inputs.push(InputTemplate {
            name: name.to_string(),
            kind: ConnectionKind::InputStatement,
            point: ConnectionPoint { offset },
        });
        self
    }
}
