mod ingest;
mod init;
mod show;
mod status;

pub use ingest::ingest_dump;
pub use init::init_config;
pub use show::show_patent;
pub use status::show_ingest_status;
