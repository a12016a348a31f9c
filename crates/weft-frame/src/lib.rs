#![doc = r"Render-need aggregation and frame scheduling for the Weft UI toolkit.

Everything that mutates visual state funnels into one
[`InvalidationAggregator`]: one-shot render requests and continuous-need
reporters such as running animations. A [`RenderScheduler`] watches the
aggregator's edge event and drives a periodic render callback only while
something actually needs drawing."]

pub mod aggregate;
pub mod scheduler;
pub mod signal;

pub use aggregate::{InvalidationAggregator, Invalidator, DEBOUNCE_WINDOW};
pub use scheduler::{RenderScheduler, FRAME_INTERVAL};
pub use signal::{Signal, SignalGuard};
