pub mod parser;
pub mod record;

pub use parser::{EventReceiver, ParserConfig, ParserEvent, ParserState, StreamParser};
pub use record::Record;
