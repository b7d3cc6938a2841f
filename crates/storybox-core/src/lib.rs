//! Storybox Core - page model, host protocol, and error handling

pub mod error;
pub mod page;
pub mod protocol;

pub use error::{Error, Result};
pub use page::{Page, Region, RegionKind};
pub use protocol::{HostEvent, SettingsEvent};
