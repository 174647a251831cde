pub mod perception;
pub mod action;
pub mod watch;
