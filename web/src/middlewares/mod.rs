pub mod read_only;
pub mod trusted_host;
