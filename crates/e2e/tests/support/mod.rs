pub mod sim_app;
pub mod steps;
