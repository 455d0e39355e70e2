//! HTTP surface, split by audience the way
//! `demos/example-multi-tenant/src/controllers/` separates `admin_controller`
//! from `tenant_controller`: public auth endpoints, the caller-protected
//! admin surface, and the unguarded service-to-service `/remote/*` surface.

pub mod auth_controller;
pub mod remote_controller;
pub mod resource_admin_controller;
pub mod user_admin_controller;
