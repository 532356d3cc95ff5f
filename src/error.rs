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

//! Errors produced while loading, registering, or unloading plugins.

use bp3d_util::simple_error;

simple_error! {
    /// Type of error produced by the loader.
    ///
    /// Per design, most per-library failures are folded into a boolean return with a logged
    /// cause rather than propagated here; only failures that abort the calling operation before
    /// any library-specific work could start are returned as [Error].
    pub Error {
        /// A loader mutation was attempted from a thread other than the one that created the
        /// [Loader](crate::loader::Loader).
        WrongThread => "loader operations must run on the thread that created the Loader",

        /// The plugin directory could not be resolved to an absolute path.
        PathResolutionFailed(String) => "failed to resolve plugin directory: {}",

        /// The underlying OS library loader rejected the file.
        OsLoadFailed(std::io::Error) => "failed to load library: {}",

        /// A library was rejected during registration (no module capability).
        RegistrationRejected(String) => "library does not export a module capability: {}",

        /// A library's init hook ran and returned failure.
        InitHookFailed(String) => "init hook failed for plugin: {}",

        /// A library's can-unload hook vetoed the unload.
        UnloadVetoed(String) => "unload vetoed by plugin: {}",

        /// The class cache is not available (bootstrap support library missing or unusable).
        CacheUnavailable => "class cache is not available",

        /// Two distinct paths resolved to the same basename.
        DuplicateBasename(String) => "basename already registered under a different path: {}",

        /// Two modules declared the same clsid; the second was dropped.
        ClsidCollision(String) => "clsid already registered by another plugin: {}",

        /// The named plugin is not currently known to the loader.
        NotFound(String) => "plugin not found: {}",

        /// An unexpected NUL byte was found inside a path or symbol name.
        Null => "unexpected null character in string",

        /// An IO error occurred (file read, directory scan, cache persistence).
        Io(std::io::Error) => "io error: {}",

        /// The persisted class cache document could not be parsed.
        InvalidCacheFormat(String) => "invalid class cache format: {}"
    }
}
