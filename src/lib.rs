pub mod accounts;
pub mod auth;
pub mod configuration;
pub mod cookies;
pub mod error;
pub mod media;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod uploads;
pub mod validators;
