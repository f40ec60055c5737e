pub mod core;
pub mod hooks;


// Re-export the primary types so `crate::binder::*` is enough for consumers.
pub use self::core::Binder;
pub(crate) use self::core::BinderInner;
pub use self::hooks::{GroupHooks, Lifecycle};
