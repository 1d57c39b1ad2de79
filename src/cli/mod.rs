pub(crate) mod account;
pub(crate) mod command;
pub(crate) mod connect;
pub(crate) mod picker;
pub(crate) mod scan;
pub(crate) mod ui;

pub use self::command::{
    Args, Command, ConnectArgs, FakeArgs, FakeFailureArg, LogLevel, LoginArgs, OutputFormat,
    ScanArgs,
};
