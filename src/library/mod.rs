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

//! OS shared-library handles: open, resolve a symbol, close.

pub mod symbol;
#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

pub use symbol::Symbol;

/// The platform's default shared-library extension (without the leading dot).
#[cfg(unix)]
pub const OS_EXT: &str = unix::EXT;

/// The platform's default shared-library extension (without the leading dot).
#[cfg(windows)]
pub const OS_EXT: &str = windows::EXT;

/// The concrete OS-backed [Library] implementation for the current target.
#[cfg(unix)]
pub use unix::Library as OsLibrary;

/// The concrete OS-backed [Library] implementation for the current target.
#[cfg(windows)]
pub use windows::Library as OsLibrary;

/// A handle to a loaded shared library.
///
/// Unloading is always explicit and consuming (`unload`): nothing here relies on `Drop` to
/// release the underlying OS handle, because the registry needs to track whether a library is
/// eligible for unload (the `owned` flag on a module record) independently of Rust scoping.
pub trait Library: Sized {
    /// Opens a handle to the currently running program (the main executable image), without
    /// loading anything new.
    fn open_self() -> crate::Result<Self>;

    /// Loads a shared library from the given path.
    ///
    /// # Safety
    ///
    /// Assumes the library being loaded is trusted code: if loading it runs a constructor that
    /// causes UB, this call is UB.
    unsafe fn load(path: impl AsRef<std::path::Path>) -> crate::Result<Self>;

    /// Resolves a symbol by name, returning `None` if the symbol does not exist.
    ///
    /// # Safety
    ///
    /// Assumes the caller's choice of `T` matches the symbol's real signature; if it does not,
    /// this is UB.
    unsafe fn load_symbol<T>(&self, name: impl AsRef<str>) -> crate::Result<Option<Symbol<T>>>;

    /// Returns the on-disk path this handle was loaded from.
    ///
    /// Used to resolve a relative plugin directory against the host library's own directory
    /// (see `Loader::load_from_directory`).
    fn path(&self) -> crate::Result<std::path::PathBuf>;

    /// Releases the underlying OS handle.
    ///
    /// # Safety
    ///
    /// Assumes no [Symbol] obtained from this library is still in use.
    unsafe fn unload(self);
}
