//! Tenant Portal: multi-tenant web front door with passcode sign-in,
//! onboarding wizards and subdomain routing.

pub mod auth;
pub mod config;
pub mod error;
pub mod flow;
pub mod identity;
pub mod pages;
pub mod routing;
pub mod server;
