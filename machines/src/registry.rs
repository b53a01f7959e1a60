//! Machine registry for automatic front-end discovery.
//!
//! Each machine self-registers via [`inventory::submit!`] with a
//! [`MachineEntry`] containing its CLI name and a factory function. The
//! front-end discovers available machines at runtime without any central
//! list.

use omniframe_core::native::NativeCore;

/// Describes a machine a session can be started on.
pub struct MachineEntry {
    /// CLI name used to select this machine (e.g., "generic6502").
    pub name: &'static str,
    /// One-line summary for machine listings.
    pub description: &'static str,
    /// Factory: construct an unstarted native core.
    pub create: fn() -> Box<dyn NativeCore>,
}

impl MachineEntry {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        create: fn() -> Box<dyn NativeCore>,
    ) -> Self {
        Self {
            name,
            description,
            create,
        }
    }
}

inventory::collect!(MachineEntry);

/// Return all registered machines, sorted by name.
pub fn all() -> Vec<&'static MachineEntry> {
    let mut entries: Vec<_> = inventory::iter::<MachineEntry>.into_iter().collect();
    entries.sort_by_key(|e| e.name);
    entries
}

/// Look up a machine by its CLI name.
pub fn find(name: &str) -> Option<&'static MachineEntry> {
    inventory::iter::<MachineEntry>
        .into_iter()
        .find(|e| e.name == name)
}
