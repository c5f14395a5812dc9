pub mod browser;
pub mod detail;
pub mod driver;
pub mod error;
pub mod events;
pub mod job;
pub mod list;
pub mod list_parse;
pub mod parse_helpers;
pub mod poll;
pub mod session;
pub mod table;

#[cfg(test)]
mod testing;

pub use browser::ChromeLauncher;
pub use driver::{Driver, Launcher};
pub use error::{AuthError, DetailError, DriverError, JobError, ListError};
pub use events::{
    BufferedSink, ChannelSink, DoneEvent, EventSink, ExtractionEvent, ItemOutcome, ItemRef,
    JobReport, LogLine, NdjsonDecoder, Reporter, RowEvent, WriterSink,
};
pub use job::{run_job, JobSettings};
pub use list::ListStrategy;
pub use parse_helpers::parse_quantity;
pub use poll::Timings;
