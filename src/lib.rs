pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod form;
pub mod model;
pub mod phones;
pub mod resource;
pub mod server;
pub mod validate;
pub mod view;
