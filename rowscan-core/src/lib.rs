/// Rowscan core: the row model and the pure state machines of a streaming read
///
/// Nothing in this crate performs I/O. The client crate feeds transport
/// responses through these types.

pub mod error;
pub mod types;
pub mod range;
pub mod row_set;
pub mod chunk;
pub mod reassembler;
pub mod resume;

pub use error::{Error, Result};
pub use types::*;
pub use range::RowRange;
pub use row_set::RowSet;
pub use chunk::{CellChunk, ChunkStatus};
pub use reassembler::{ChunkReassembler, ReassemblerState};
pub use resume::{Completion, ReadState, ResumePlan, ResumePlanner};
