pub mod attribute;
pub mod event;
pub mod span;

pub use attribute::{AttributeMap, AttributeValue};
pub use event::{Event, EventBag};
pub use span::{InstrumentationScope, Link, NormalizedSpan, SpanDataBag, SpanKind, SpanView};
