pub mod audit;
pub mod egress;
pub mod executor;
pub mod logger;
pub mod memory;
pub mod native;
pub mod registry;
pub mod request;
pub mod security;
pub mod token;
