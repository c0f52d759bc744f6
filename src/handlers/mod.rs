// handlers/mod.rs - 2-Tier Handler Architecture
//
// Public (no auth) → Protected (session JWT, some routes also need a grant)
pub mod protected; // JWT authentication required (/api/*)
pub mod public; // No authentication required (/health, /)

/*
HANDLER LAYOUT:

src/handlers/
├── public/
│   └── health.rs          ← GET /, GET /health
└── protected/
    └── elevation/
        ├── challenge.rs   ← POST /api/elevation/challenge
        ├── verify.rs      ← POST /api/elevation/verify
        ├── activate.rs    ← POST /api/elevation/activate
        ├── status.rs      ← GET /api/elevation/status
        ├── grant.rs       ← DELETE /api/elevation/grant
        └── deactivate.rs  ← POST /api/elevation/deactivate (grant required)

Handlers stay thin: pull AuthUser from the request extensions, call the
matching ElevationService operation, turn the outcome into a response.
*/
