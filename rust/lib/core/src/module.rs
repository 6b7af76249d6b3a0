use axum::Router;

/// A service module that contributes HTTP routes.
///
/// The binary entry point collects all modules and nests each router
/// under `/{name}`.
pub trait Module: Send + Sync {
    /// Module name, used for logging and as the route prefix.
    fn name(&self) -> &str;

    /// Return the module's routes with state already applied.
    fn routes(&self) -> Router;
}
