pub mod account;
pub mod session;
pub mod taxonomy;
pub mod test_run;
