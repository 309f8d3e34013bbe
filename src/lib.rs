pub mod adapters;
pub mod configuration;
pub mod domain;
pub mod linker;
pub mod processor;
pub mod queue;
pub mod registries;
pub mod router;
pub mod routes;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod utils;
pub mod validator;
pub mod worker;
