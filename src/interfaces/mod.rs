//! Adapters that feed the application layer from the outside world: the
//! HTTP router, a JSON-lines replay reader for recorded gateway
//! notifications, and the catalog seed loader.

pub mod http;
pub mod replay;
pub mod seed;
