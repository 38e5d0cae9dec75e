pub mod controller;
pub mod model;
pub mod route;
pub mod schema;
