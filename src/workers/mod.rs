pub mod expiry_worker;

pub use expiry_worker::spawn_expiry_worker;
