pub mod block;
pub mod config;
pub mod connection;
pub mod error;
pub mod geometry;
pub mod manager;
pub mod navigator;
pub mod workspace;

pub use block::{Block, BlockId, BlockTemplate, ConnectionId, GroupId, InputSlot};
pub use config::{WorkspaceConfig, load_config};
pub use connection::{CompatibilityTable, Connection, ConnectionKind};
pub use error::{ConnectError, NavigateError};
pub use geometry::Point;
pub use manager::ConnectionManager;
pub use navigator::{GroupRegistry, nearest_parent_group, root_group};
pub use workspace::Workspace;
