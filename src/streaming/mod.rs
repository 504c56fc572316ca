pub mod decoder;
pub mod frame;
pub mod parser;
pub mod session;

pub use decoder::Utf8Decoder;
pub use frame::FrameAssembler;
pub use parser::{DecodedFrame, decode_frame};
pub use session::{DeliberationStream, EventHandler, SessionId, SessionOutcome, SessionState};
