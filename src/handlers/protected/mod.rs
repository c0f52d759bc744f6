// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Security Level: JWT Authentication Required
// Route Prefix: /api/*
// Middleware: jwt_auth_middleware (AuthUser), require_grant_middleware on
//             routes that need an elevated session
pub mod elevation;

pub use elevation::*;
