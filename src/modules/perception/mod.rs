pub mod structs;
pub mod forum;
pub mod reddit;
pub mod scanner;
pub mod fund;

pub use reddit::RedditClient;
pub use fund::FundFetcher;
