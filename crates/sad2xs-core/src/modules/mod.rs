pub mod compare;
pub mod lattice;
pub mod line;
pub mod pipeline;
pub mod serialization;
pub mod twiss;

mod helpers;
mod traits;

pub use pipeline::{ConvertOutcome, convert_lattice};
pub use traits::ModuleExecutor;
