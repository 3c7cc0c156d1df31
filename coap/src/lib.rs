pub mod cache;
pub mod config;
pub mod context;
pub mod dedup;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod options;
pub mod pdu;
pub mod session;
pub mod transmission;
pub mod transport;

pub use cache::CacheKey;
pub use config::Config;
pub use context::Context;
pub use dispatch::{Outcome, ResourceHandler};
pub use error::{CodecError, Reason};
pub use handler::{EventHandler, HandlerResult};
pub use options::KnownOptions;
pub use pdu::{Code, Kind, Opt, Pdu};
pub use session::{Session, SessionState, Variant};
