pub mod event;
pub mod request;

pub use event::{
    AggregateRanking, DeliberationEvent, EventDecodeError, EventKind, Stage1Response,
    Stage2Metadata, Stage2Ranking, Stage3Result, TitleData,
};
pub use request::{ChatRequest, DeliberationScope, MessageRequest, ResponseMode, StreamRequest};
