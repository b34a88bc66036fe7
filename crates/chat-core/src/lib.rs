pub mod cancel;
pub mod controller;
pub mod decoder;
pub mod event_bus;
pub mod ports;
pub mod store;
