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

//! The class map (C2): clsid to owning module and factory descriptor.

use crate::clsid::Clsid;
use crate::module::{FactoryDescriptor, ModuleId};
use bp3d_debug::warn;
use std::collections::HashMap;

/// Maps each known clsid to the module that owns it and the advertised factory descriptor.
///
/// First-writer-wins: a module that declares a clsid already owned by another module has its
/// duplicate entry dropped, matching spec invariant 3 ("first writer wins; duplicate clsids
/// discovered later are dropped with a logged warning").
#[derive(Debug, Default)]
pub struct ClassMap {
    entries: HashMap<Clsid, (ModuleId, FactoryDescriptor)>,
}

impl ClassMap {
    /// Creates an empty class map.
    pub fn new() -> Self {
        ClassMap {
            entries: HashMap::new(),
        }
    }

    /// Attempts to register a factory descriptor for a module.
    ///
    /// Returns `true` if the entry was inserted (or replaced a placeholder for the same module),
    /// `false` if it was rejected as a collision with another module's clsid.
    pub fn register(&mut self, owner: ModuleId, descriptor: FactoryDescriptor) -> bool {
        match self.entries.get(&descriptor.clsid) {
            Some((existing_owner, _)) if *existing_owner != owner => {
                warn!(
                    "clsid {} already registered by another plugin, dropping duplicate",
                    descriptor.clsid
                );
                false
            }
            _ => {
                self.entries.insert(descriptor.clsid.clone(), (owner, descriptor));
                true
            }
        }
    }

    /// Looks up the module and factory descriptor owning a clsid.
    pub fn get(&self, clsid: &Clsid) -> Option<&(ModuleId, FactoryDescriptor)> {
        self.entries.get(clsid)
    }

    /// Whether any module has registered this clsid.
    pub fn contains(&self, clsid: &Clsid) -> bool {
        self.entries.contains_key(clsid)
    }

    /// Removes every entry owned by the given module, returning how many were removed.
    ///
    /// Called when a module is unloaded, so stale entries never outlive their owning module
    /// (spec invariant: the class map never points at a module no longer in the table).
    pub fn remove_owned_by(&mut self, owner: ModuleId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, (o, _)| *o != owner);
        before - self.entries.len()
    }

    /// The number of distinct clsids currently registered.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(clsid: &str) -> FactoryDescriptor {
        FactoryDescriptor {
            clsid: Clsid::new(clsid),
            class_name: clsid.to_string(),
            factory: None,
        }
    }

    #[test]
    fn register_accepts_first_writer() {
        let mut map = ClassMap::new();
        assert!(map.register(0, descriptor("x3::a")));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&Clsid::new("x3::a")).unwrap().0, 0);
    }

    #[test]
    fn register_rejects_collision_from_another_module() {
        let mut map = ClassMap::new();
        assert!(map.register(0, descriptor("x3::a")));
        assert!(!map.register(1, descriptor("x3::a")));
        assert_eq!(map.get(&Clsid::new("x3::a")).unwrap().0, 0);
    }

    #[test]
    fn register_allows_same_module_to_overwrite_its_own_placeholder() {
        let mut map = ClassMap::new();
        assert!(map.register(0, descriptor("x3::a")));
        let mut real = descriptor("x3::a");
        real.factory = Some(|| std::ptr::null_mut());
        assert!(map.register(0, real));
        assert!(map.get(&Clsid::new("x3::a")).unwrap().1.factory.is_some());
    }

    #[test]
    fn remove_owned_by_drops_only_that_modules_entries() {
        let mut map = ClassMap::new();
        map.register(0, descriptor("x3::a"));
        map.register(1, descriptor("x3::b"));
        let removed = map.remove_owned_by(0);
        assert_eq!(removed, 1);
        assert!(!map.contains(&Clsid::new("x3::a")));
        assert!(map.contains(&Clsid::new("x3::b")));
    }
}
