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

use crate::error::Error;
use crate::library::symbol::Symbol;
use libc::{dladdr, dlclose, dlopen, dlsym, Dl_info, RTLD_LAZY};
use std::ffi::{c_void, CStr, CString};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

#[cfg(target_vendor = "apple")]
pub const EXT: &str = "dylib";

#[cfg(all(unix, not(target_vendor = "apple")))]
pub const EXT: &str = "so";

/// A `dlopen`-backed shared library handle.
#[derive(Debug)]
#[repr(transparent)]
pub struct Library(*mut c_void);

unsafe impl Send for Library {}

impl super::Library for Library {
    fn open_self() -> crate::Result<Self> {
        let handle = unsafe { dlopen(std::ptr::null(), RTLD_LAZY) };
        if handle.is_null() {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }
        Ok(Library(handle))
    }

    unsafe fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = CString::new(path.as_ref().as_os_str().as_bytes()).map_err(|_| Error::Null)?;
        let handle = dlopen(path.as_ptr(), RTLD_LAZY);
        if handle.is_null() {
            return Err(Error::OsLoadFailed(std::io::Error::last_os_error()));
        }
        Ok(Library(handle))
    }

    unsafe fn load_symbol<T>(&self, name: impl AsRef<str>) -> crate::Result<Option<Symbol<T>>> {
        let name = CString::new(name.as_ref().as_bytes()).map_err(|_| Error::Null)?;
        let sym = dlsym(self.0, name.as_ptr());
        if sym.is_null() {
            Ok(None)
        } else {
            Ok(Some(Symbol::from_raw(sym)))
        }
    }

    unsafe fn unload(self) {
        dlclose(self.0);
    }

    /// Resolves the on-disk path of the shared object containing a given address, by reverse
    /// symbol-table lookup. The `dlopen` handle itself is opaque and not a valid `dladdr`
    /// argument, so this resolves the module containing a marker function defined in this crate
    /// instead; for a plugin opened via [Library::load], the caller already knows the real path
    /// and never needs to call this. It exists for `open_self()`'s handle, to resolve the host
    /// executable's own directory for relative plugin-directory resolution.
    fn path(&self) -> crate::Result<PathBuf> {
        extern "C" fn marker() {}
        let mut info: Dl_info = unsafe { std::mem::zeroed() };
        let addr = marker as usize as *const c_void;
        let ok = unsafe { dladdr(addr, &mut info) };
        if ok == 0 || info.dli_fname.is_null() {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }
        let name = unsafe { CStr::from_ptr(info.dli_fname) };
        Ok(PathBuf::from(std::ffi::OsStr::from_bytes(name.to_bytes())))
    }
}
