//! Identity: who is making a request, and what their profile says.

pub mod provider;
pub mod session;
pub mod supabase;

pub use provider::{IdentityProvider, Organization, Profile, ProfileUpdate, Session, User};
pub use session::{SessionToken, SetCookie, cookie_value};
pub use supabase::SupabaseClient;
