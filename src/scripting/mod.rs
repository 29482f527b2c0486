//! Lua scripting bridge.
//!
//! - [`runtime`] - sandboxed interpreter and event triggering
//! - [`events`] - per-run listener table
//! - [`host_api`] - `addEventListener`, `readFile`, `writeFile`, `log`, `json`
//! - [`scriptable`] - Map / Layer / Grid / Tile wrappers
//! - [`marshal`] - host values passed to listeners, argument checks
//! - [`api_meta`] - API description used for editor stubs
//!
//! # Example
//!
//! ```lua
//! addEventListener("map", function(m)
//!     local grid = m:GetLayer("layer1"):GetGrid()
//!     for _, tile in ipairs(grid:TileList()) do
//!         tile.Id = tile.Id + 1
//!     end
//!     grid:Save()
//! end)
//! ```

pub mod api_meta;
mod events;
mod host_api;
mod marshal;
mod runtime;
mod scriptable;

pub use events::EventRegistry;
pub use marshal::{HostValue, convert_args};
pub use runtime::ScriptRuntime;
pub use scriptable::{ScriptableGrid, ScriptableLayer, ScriptableMap, ScriptableTile};
