//! Provider adapter implementations.

pub mod hotels;
pub mod shopping;
pub mod stub;
pub mod web;

mod search_api;

pub use hotels::HotelsProvider;
pub use shopping::ShoppingProvider;
pub use stub::StubProvider;
pub use web::WebProvider;
