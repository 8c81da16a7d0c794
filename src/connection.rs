use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::block::{BlockId, ConnectionId};
use crate::geometry::Point;

/// The closed set of attachment-point kinds. Pairing rules between kinds are
/// data (`CompatibilityTable`), not behavior, so block-type definitions can
/// override them without touching this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConnectionKind {
    Previous,
    Next,
    InputValue,
    OutputValue,
    InputStatement,
}

impl ConnectionKind {
    /// Whether this kind sits on the parent (superior) side of a pairing.
    /// The block owning the superior connection is the parent of the block
    /// owning the inferior one.
    pub fn is_superior(&self) -> bool {
        matches!(
            self,
            ConnectionKind::Next | ConnectionKind::InputValue | ConnectionKind::InputStatement
        )
    }

    /// Whether connecting through this kind starts a new render group on the
    /// inferior side. Value plugs do; stacking and statement nesting do not.
    pub fn is_value_boundary(&self) -> bool {
        matches!(
            self,
            ConnectionKind::InputValue | ConnectionKind::OutputValue
        )
    }
}

static DEFAULT_PAIRS: Lazy<Vec<(ConnectionKind, ConnectionKind)>> = Lazy::new(|| {
    vec![
        (ConnectionKind::Previous, ConnectionKind::Next),
        (ConnectionKind::Previous, ConnectionKind::InputStatement),
        (ConnectionKind::OutputValue, ConnectionKind::InputValue),
    ]
});

/// Which connection kinds may pair. Order-insensitive: `(a, b)` in the table
/// also allows `(b, a)`. Supplied by block-type definitions via
/// `WorkspaceConfig`; the default table covers standard statement stacking,
/// statement nesting, and value plugs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityTable {
    pub pairs: Vec<(ConnectionKind, ConnectionKind)>,
}

impl CompatibilityTable {
    pub fn compatible(&self, a: ConnectionKind, b: ConnectionKind) -> bool {
        self.pairs
            .iter()
            .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
    }
}

impl Default for CompatibilityTable {
    fn default() -> Self {
        Self {
            pairs: DEFAULT_PAIRS.clone(),
        }
    }
}

/// A typed attachment point on a block. Position is cached in workspace
/// coordinates and refreshed whenever the owning block moves; `target` is
/// always symmetric with the other side.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub kind: ConnectionKind,
    pub owner: BlockId,
    /// Offset from the owning block's origin, fixed at registration.
    pub offset: Point,
    /// Absolute position, equal to owner origin plus offset.
    pub position: Point,
    pub target: Option<ConnectionId>,
    /// Slot name for `InputValue`/`InputStatement` connections.
    pub input_name: Option<String>,
}

impl Connection {
    pub fn is_connected(&self) -> bool {
        self.target.is_some()
    }

    pub fn distance_to(&self, point: Point) -> f32 {
        self.position.distance_to(point)
    }
}
