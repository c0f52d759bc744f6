pub mod challenge;
pub mod grant;
pub mod privilege;
pub mod token;
