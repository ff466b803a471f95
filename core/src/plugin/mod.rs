//! The plug-in contract, registry, and manager: identification, ordered
//! loading, per-plug-in runtime capabilities, and teardown.

mod contract;
mod descriptor;
mod identity;
mod instance;
mod manager;
mod registry;
mod resource;
mod runtime;

pub use contract::{Plugin, PluginError};
pub use descriptor::{PluginDescriptor, PluginDescriptorBuilder};
pub use identity::{IdentityError, PluginIdentity};
pub use instance::{PluginInstance, PluginState};
pub use manager::{LoadFailure, LoadReport, ManagerError, PluginManager, UnloadFailure};
pub use registry::{PluginRegistry, RegistryError};
pub use resource::{ResourceStats, ResourceTable, REQUIRED_UPSTREAMS_READY};
pub use runtime::{PluginEvent, RuntimeHandle};
