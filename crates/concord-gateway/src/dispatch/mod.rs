//! Dispatch pipeline
//!
//! Turns DISPATCH frames into listener calls: transformer lookup, cache writes ordered by the
//! cache policy, interaction collectors, then the compiled listeners.

mod defaults;
mod event;
mod pipeline;
mod transformer;

pub use event::{EventArgs, EventValue, FromEventValue};
pub use pipeline::{DispatchEvent, DispatchPipeline};
pub use transformer::{
    ReturnArity, TransformContext, TransformError, TransformFn, Transformed, TransformerEntry,
    TransformerRegistry,
};

pub(crate) use transformer::panic_message;
