pub mod context;
pub mod envelope;
pub mod role;
pub mod session;
