pub mod composer;
pub mod context;
pub mod guard;
pub mod responder;

pub use context::BotContext;
pub use responder::{Outcome, Responder};
