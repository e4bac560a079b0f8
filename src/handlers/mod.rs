// One module per resource; route table lives in server.rs
pub mod classes;
pub mod files;
pub mod functions;
pub mod query;
pub mod queues;
pub mod sessions;
pub mod status;
pub mod users;
