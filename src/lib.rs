pub mod cli;
pub mod completions;
pub mod config;
pub mod context;
pub mod docs;
pub mod errors;
pub mod filter;
pub mod github;
pub mod http;
pub mod mcp;
pub mod params;
pub mod resources;
pub mod sanitize;
pub mod server;
pub mod tools;
pub mod toolsets;
pub mod translations;
pub mod uritemplate;
