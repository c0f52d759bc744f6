// handlers/public/mod.rs - Public handlers (no authentication)
//
// Liveness and service description only. Everything that touches the
// elevation flow lives under protected/.
pub mod health;

pub use health::{health_get, root_get};
