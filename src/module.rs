// Copyright (c) 2025, BlockProject 3D
//
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without modification,
// are permitted provided that the following conditions are met:
//
//     * Redistributions of source code must retain the above copyright notice,
//       this list of conditions and the following disclaimer.
//     * Redistributions in binary form must reproduce the above copyright notice,
//       this list of conditions and the following disclaimer in the documentation
//       and/or other materials provided with the distribution.
//     * Neither the name of BlockProject 3D nor the names of its contributors
//       may be used to endorse or promote products derived from this software
//       without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS
// "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT
// LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR
// A PARTICULAR PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT OWNER OR
// CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL,
// EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO,
// PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE, DATA, OR
// PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF
// LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING
// NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE OF THIS
// SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! The module table (C1): one record per plugin, realized or not.

use crate::library::OsLibrary;
use std::ffi::c_void;
use std::path::{Path, PathBuf};

/// An opaque factory function exported by a plugin for a single class.
///
/// What the returned pointer represents is outside this crate's scope; the registry only stores
/// and hands back the pointer a module provided for a clsid.
pub type FactoryFn = unsafe extern "C" fn() -> *mut c_void;

/// The small FFI vtable a realized module exposes for class enumeration and cleanup.
///
/// Resolved once, at registration time, from the module's capability-getter symbol
/// (`x3GetModule`). Mirrors the original `Ix_Module` interface as a table of function pointers
/// rather than a C++ vtable, so this crate never assumes a particular ABI for calling through a
/// trait object across the library boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ModuleCapability {
    /// Returns how many classes this module exports.
    pub factory_count: unsafe extern "C" fn() -> usize,
    /// Returns the clsid (as a NUL-terminated UTF-8 C string), class name (same), and factory
    /// function for the class at `index`. Returns false if `index` is out of range.
    pub factory_at: unsafe extern "C" fn(
        index: usize,
        clsid: *mut *const std::os::raw::c_char,
        class_name: *mut *const std::os::raw::c_char,
        factory: *mut Option<FactoryFn>,
    ) -> bool,
    /// Releases any items this module's `factory_at` calls have allocated.
    pub clear_module_items: unsafe extern "C" fn(),
}

/// One factory entry advertised by a module for a single class identifier.
#[derive(Debug, Clone)]
pub struct FactoryDescriptor {
    /// The class identifier.
    pub clsid: crate::clsid::Clsid,
    /// A human-readable class name, as reported by the module.
    pub class_name: String,
    /// The creator function, or `None` for a cache-only placeholder entry that has not yet been
    /// backed by a realized module.
    pub factory: Option<FactoryFn>,
}

/// The state of one entry in the module table.
///
/// `handle` is `None` exactly when the module is a delay-load placeholder: its basename, clsids,
/// and (if cached) class names are known from the class cache, but the shared library has not
/// been opened yet.
#[derive(Debug)]
pub struct ModuleRecord {
    /// The shared-library handle, once realized.
    pub handle: Option<OsLibrary>,
    /// The on-disk path of the plugin file.
    pub filename: PathBuf,
    /// Whether this loader owns the handle (and must release it on unload) as opposed to having
    /// observed a library opened and owned elsewhere.
    pub owned: bool,
    /// Whether `x3InitializePlugin` has run successfully for this module.
    pub inited: bool,
    /// The clsids this module advertises, whether realized or known only from the cache.
    pub clsids: Vec<crate::clsid::Clsid>,
    /// The module's capability vtable, once realized.
    pub module_iface: Option<ModuleCapability>,
}

impl ModuleRecord {
    /// Creates an unrealized (delay-load) record from cached data.
    pub fn placeholder(filename: PathBuf, clsids: Vec<crate::clsid::Clsid>) -> Self {
        ModuleRecord {
            handle: None,
            filename,
            owned: false,
            inited: false,
            clsids,
            module_iface: None,
        }
    }

    /// Returns whether this record's library has been opened.
    pub fn is_realized(&self) -> bool {
        self.handle.is_some()
    }

    /// Returns the file basename, used for case-insensitive identity comparisons.
    pub fn basename(&self) -> &std::ffi::OsStr {
        self.filename
            .file_name()
            .unwrap_or_else(|| self.filename.as_os_str())
    }
}

/// Compares two filesystem paths by basename, ignoring ASCII case.
///
/// Matches the original loader's case-insensitive basename identity rule (two distinct
/// directories may not both provide a plugin of the same filename).
pub fn same_basename(a: &Path, b: &Path) -> bool {
    let a = a.file_name().map(|v| v.to_string_lossy().to_lowercase());
    let b = b.file_name().map(|v| v.to_string_lossy().to_lowercase());
    a.is_some() && a == b
}

/// The module table (C1): an ordered, index-stable collection of [ModuleRecord]s.
///
/// Order is preserved because unload passes iterate in reverse registration order (spec
/// invariant); [indexmap::IndexMap] keeps insertion order across removals, unlike a plain
/// `HashMap`.
#[derive(Debug, Default)]
pub struct ModuleTable {
    records: indexmap::IndexMap<usize, ModuleRecord>,
    next_id: usize,
}

/// A stable identifier for one row of the [ModuleTable], independent of position.
pub type ModuleId = usize;

impl ModuleTable {
    /// Creates an empty module table.
    pub fn new() -> Self {
        ModuleTable {
            records: indexmap::IndexMap::new(),
            next_id: 0,
        }
    }

    /// Appends a new record, returning its stable id.
    pub fn append(&mut self, record: ModuleRecord) -> ModuleId {
        let id = self.next_id;
        self.next_id += 1;
        self.records.insert(id, record);
        id
    }

    /// Looks up a record by basename (case-insensitive), returning its id.
    pub fn find_by_basename(&self, path: &Path) -> Option<ModuleId> {
        self.records
            .iter()
            .find(|(_, r)| same_basename(&r.filename, path))
            .map(|(id, _)| *id)
    }

    /// Returns a reference to the record with the given id.
    pub fn get(&self, id: ModuleId) -> Option<&ModuleRecord> {
        self.records.get(&id)
    }

    /// Returns a mutable reference to the record with the given id.
    pub fn get_mut(&mut self, id: ModuleId) -> Option<&mut ModuleRecord> {
        self.records.get_mut(&id)
    }

    /// Removes the record with the given id, returning it.
    pub fn remove(&mut self, id: ModuleId) -> Option<ModuleRecord> {
        self.records.shift_remove(&id)
    }

    /// The number of plugins currently tracked (realized or delay-load placeholders).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates ids and records in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (ModuleId, &ModuleRecord)> {
        self.records.iter().map(|(id, r)| (*id, r))
    }

    /// Iterates ids and records in reverse registration order, for unload passes.
    pub fn iter_rev(&self) -> impl Iterator<Item = (ModuleId, &ModuleRecord)> {
        self.records.iter().rev().map(|(id, r)| (*id, r))
    }

    /// Collects the ids of all records, in registration order.
    pub fn ids(&self) -> Vec<ModuleId> {
        self.records.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_increasing_stable_ids() {
        let mut table = ModuleTable::new();
        let a = table.append(ModuleRecord::placeholder(PathBuf::from("a.so"), vec![]));
        let b = table.append(ModuleRecord::placeholder(PathBuf::from("b.so"), vec![]));
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn find_by_basename_is_case_insensitive() {
        let mut table = ModuleTable::new();
        table.append(ModuleRecord::placeholder(
            PathBuf::from("/plugins/Foo.so"),
            vec![],
        ));
        assert!(table.find_by_basename(Path::new("/other/foo.SO")).is_some());
        assert!(table.find_by_basename(Path::new("/other/bar.so")).is_none());
    }

    #[test]
    fn remove_keeps_remaining_order_stable() {
        let mut table = ModuleTable::new();
        let a = table.append(ModuleRecord::placeholder(PathBuf::from("a.so"), vec![]));
        let b = table.append(ModuleRecord::placeholder(PathBuf::from("b.so"), vec![]));
        let c = table.append(ModuleRecord::placeholder(PathBuf::from("c.so"), vec![]));
        table.remove(b);
        let ids: Vec<_> = table.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![a, c]);
    }

    #[test]
    fn iter_rev_visits_in_reverse_registration_order() {
        let mut table = ModuleTable::new();
        table.append(ModuleRecord::placeholder(PathBuf::from("a.so"), vec![]));
        table.append(ModuleRecord::placeholder(PathBuf::from("b.so"), vec![]));
        let names: Vec<_> = table
            .iter_rev()
            .map(|(_, r)| r.filename.to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["b.so", "a.so"]);
    }

    #[test]
    fn same_basename_ignores_case_and_directory() {
        assert!(same_basename(
            Path::new("/a/Plugin.so"),
            Path::new("/b/plugin.SO")
        ));
        assert!(!same_basename(Path::new("/a/plugin.so"), Path::new("/b/other.so")));
    }
}
