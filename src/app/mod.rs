pub mod dedup;
pub mod dispatcher;
pub mod notifications;
pub mod recorder;
pub mod scanner;
pub mod template;
pub mod users;
