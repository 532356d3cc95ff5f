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

//! The observer bus (C5): fans out a first-fire event to the plugins that declared interest.

use std::collections::HashSet;

/// Tracks which `(event type, subtype)` pairs have already fired once.
///
/// Per spec, firing an event for the first time is what forces delayed materialization of every
/// plugin that declared interest via the class cache's observer section; re-arming (clearing the
/// fired marker so the event can trigger delayed loads again) is left to the host, via
/// [Self::rearm].
#[derive(Debug, Default)]
pub struct ObserverBus {
    fired: HashSet<(String, String)>,
}

impl ObserverBus {
    /// Creates a fresh observer bus with nothing yet fired.
    pub fn new() -> Self {
        ObserverBus {
            fired: HashSet::new(),
        }
    }

    /// Returns whether `(obtype, subtype)` has already fired once.
    pub fn has_fired(&self, obtype: &str, subtype: &str) -> bool {
        self.fired.contains(&(obtype.to_string(), subtype.to_string()))
    }

    /// Marks `(obtype, subtype)` as fired, returning `true` if this is the first time.
    ///
    /// The caller (the loader's `FireFirstEvent`) only performs delayed-load materialization when
    /// this returns `true`.
    pub fn mark_fired(&mut self, obtype: &str, subtype: &str) -> bool {
        self.fired.insert((obtype.to_string(), subtype.to_string()))
    }

    /// Clears the fired marker for `(obtype, subtype)`, allowing the next fire to trigger delayed
    /// loads again.
    pub fn rearm(&mut self, obtype: &str, subtype: &str) {
        self.fired.remove(&(obtype.to_string(), subtype.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_fired_is_true_only_the_first_time() {
        let mut bus = ObserverBus::new();
        assert!(bus.mark_fired("x3::complugin", ""));
        assert!(!bus.mark_fired("x3::complugin", ""));
    }

    #[test]
    fn distinct_subtypes_fire_independently() {
        let mut bus = ObserverBus::new();
        assert!(bus.mark_fired("x3::complugin", "a"));
        assert!(bus.mark_fired("x3::complugin", "b"));
    }

    #[test]
    fn rearm_allows_refiring() {
        let mut bus = ObserverBus::new();
        bus.mark_fired("x3::complugin", "");
        assert!(bus.has_fired("x3::complugin", ""));
        bus.rearm("x3::complugin", "");
        assert!(!bus.has_fired("x3::complugin", ""));
        assert!(bus.mark_fired("x3::complugin", ""));
    }
}
