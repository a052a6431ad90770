pub mod normalize;
pub mod tree;
pub mod index;
pub mod comparison;

pub use normalize::{normalize, DirectoryListing};
pub use tree::{display_path, DirNode, DirectoryTree, NodeId, TreeBuilder};
pub use index::{FileIndex, IndexLookup};
pub use comparison::{ComparisonEngine, Snapshot};
