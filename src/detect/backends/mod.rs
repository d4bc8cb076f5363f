pub mod scripted;
pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use scripted::{ScriptStep, ScriptedAdapter};
pub use stub::StubAdapter;

#[cfg(feature = "backend-tract")]
pub use tract::TractAdapter;
