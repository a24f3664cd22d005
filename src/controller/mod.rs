pub mod actions;
pub mod computer_use;
pub mod registry;
pub mod service;
