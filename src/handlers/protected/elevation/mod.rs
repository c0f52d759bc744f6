// handlers/protected/elevation/mod.rs - Temporary privilege elevation routes
pub mod activate;
pub mod challenge;
pub mod deactivate;
pub mod grant;
pub mod status;
pub mod verify;

pub use activate::activate_post;
pub use challenge::challenge_post;
pub use deactivate::deactivate_post;
pub use grant::grant_delete;
pub use status::status_get;
pub use verify::verify_post;
