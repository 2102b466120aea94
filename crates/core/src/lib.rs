pub mod config;
pub mod detect;
pub mod lang;
pub mod pipeline;
pub mod reply;
pub mod translate;
pub mod util;
pub mod webhook;
