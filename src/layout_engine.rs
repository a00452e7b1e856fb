pub mod engine;
pub(crate) mod graph;

pub use engine::{LayoutTree, Painter, Style};
pub use graph::{Direction, Orientation};
