mod node_error;

pub use node_error::NodeError;
pub type Result<T> = std::result::Result<T, NodeError>;
