#![doc = r"Reactive binding engine for the Weft UI toolkit.

Converts property-access expressions into stable dependency paths, keeps
path subscriptions correct as intermediate objects are replaced at runtime,
and fans change notifications out to per-node update actions. The render
side (invalidation aggregation and frame scheduling) lives in `weft-frame`;
std-backed timers and dispatchers live in `weft-runtime-std`."]

pub mod collections;
pub mod expr;
pub mod observe;
pub mod path;
pub mod platform;
pub mod registry;
pub mod tracker;

pub use expr::{compile, CompiledPath, Expr, PathExpr};
pub use observe::{ChangeGuard, ChangeSource, Observable, PropertyValue};
pub use path::{PathSet, PropertyPath};
pub use platform::{Clock, Dispatcher, TimerDriver, TimerHandle};
pub use registry::BindingRegistry;
pub use tracker::PathBinding;
