//! The wire contract between `unique-daemon` and `unique-client`: the bus
//! name, object path, interface name, and a typed client-side proxy for
//! `org.freedesktop.portal.Unique` (spec §6). Kept in its own crate so
//! neither side can drift on these strings — the one place both the
//! service and its callers agree on wire shapes, the "proto" here being
//! D-Bus introspection generated by `zbus::proxy` rather than a build-time
//! codegen step.

#![warn(missing_docs)]

use zbus::zvariant::OwnedFd;

/// Well-known bus name the daemon owns.
pub const BUS_NAME: &str = "org.freedesktop.portal.Unique";
/// Object path the interface is exported on.
pub const OBJECT_PATH: &str = "/org/freedesktop/portal/unique";
/// D-Bus interface name.
pub const INTERFACE_NAME: &str = "org.freedesktop.portal.Unique";

/// Client-side proxy for `org.freedesktop.portal.Unique`.
///
/// `zbus::proxy` derives the method call marshalling from these signatures;
/// the resulting introspection must match spec §6's XML exactly (`h` in,
/// `ah`+`u` out for `MakeUnique`; `u` in, nothing out for `Forget`).
#[zbus::proxy(
    interface = "org.freedesktop.portal.Unique",
    default_path = "/org/freedesktop/portal/unique"
)]
pub trait Unique {
    /// Submit a sealed memfd for deduplication. Returns a descriptor list
    /// (empty on miss, one canonical fd on hit) and a per-peer handle.
    fn make_unique(&self, memfd: zbus::zvariant::Fd<'_>) -> zbus::Result<(Vec<OwnedFd>, u32)>;

    /// Release a previously-returned handle.
    fn forget(&self, handle: u32) -> zbus::Result<()>;
}
