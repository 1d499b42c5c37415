pub mod buddy;
pub mod dive;
pub mod site;
pub mod user;
