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

//! The class identifier (CLSID) type.

use std::fmt::{Display, Formatter};

/// An opaque, value-equatable class identifier with a stable textual form.
///
/// Carries no ordering requirement beyond equality; the canonical string form is used for
/// hashing in the class map while the structured value is kept around for display and equality.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Clsid(String);

impl Clsid {
    /// Creates a new [Clsid] from its textual form.
    pub fn new(value: impl Into<String>) -> Self {
        Clsid(value.into())
    }

    /// Returns the canonical string form of this clsid.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Clsid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Clsid {
    fn from(value: &str) -> Self {
        Clsid(value.into())
    }
}

impl From<String> for Clsid {
    fn from(value: String) -> Self {
        Clsid(value)
    }
}

#[cfg(test)]
mod tests {
    use super::Clsid;

    #[test]
    fn equality_is_by_value() {
        assert_eq!(Clsid::new("a1"), Clsid::new("a1".to_string()));
        assert_ne!(Clsid::new("a1"), Clsid::new("a2"));
    }

    #[test]
    fn display_round_trips_the_string() {
        let id = Clsid::new("x3::sample");
        assert_eq!(id.to_string(), "x3::sample");
        assert_eq!(id.as_str(), "x3::sample");
    }
}
