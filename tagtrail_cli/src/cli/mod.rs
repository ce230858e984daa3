mod common;
mod latest;
mod login;
mod root;
mod run;
mod sync;
mod trajectory;

pub(crate) use root::get_args;
