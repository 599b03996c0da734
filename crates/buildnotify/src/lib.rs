//! Buildnotify composes a CI pipeline status message and delivers it to the
//! commit author (signed user push) and to the team chat (group webhook).

pub mod cli;
pub mod config;
pub mod error;
pub mod links;
pub mod lookup;
pub mod notifier;
pub mod request;
pub mod run;
pub mod template;
