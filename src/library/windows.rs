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
use std::ffi::CString;
use std::os::windows::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};
use windows_sys::Win32::Foundation::{FreeLibrary, HMODULE};
use windows_sys::Win32::System::LibraryLoader::{
    DisableThreadLibraryCalls, GetModuleFileNameW, GetModuleHandleW, GetProcAddress, LoadLibraryW,
};

pub const EXT: &str = "dll";

/// A `LoadLibraryW`-backed shared library handle.
#[derive(Debug)]
pub struct Library(HMODULE);

unsafe impl Send for Library {}

impl super::Library for Library {
    fn open_self() -> crate::Result<Self> {
        let handle = unsafe { GetModuleHandleW(std::ptr::null()) };
        if handle.is_null() {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }
        Ok(Library(handle))
    }

    /// # Safety
    ///
    /// It is UB to load a library with a `DllMain` that depends on running on first attach;
    /// thread-library-call notifications are disabled immediately after a successful load.
    unsafe fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let mut wide = path.as_ref().as_os_str().encode_wide().collect::<Vec<_>>();
        if wide.iter().any(|v| *v == 0x0) {
            return Err(Error::Null);
        }
        wide.push(0);
        let handle = LoadLibraryW(wide.as_ptr());
        if handle.is_null() {
            return Err(Error::OsLoadFailed(std::io::Error::last_os_error()));
        }
        DisableThreadLibraryCalls(handle);
        Ok(Library(handle))
    }

    unsafe fn load_symbol<T>(&self, name: impl AsRef<str>) -> crate::Result<Option<Symbol<T>>> {
        let name = CString::new(name.as_ref().as_bytes()).map_err(|_| Error::Null)?;
        let sym = GetProcAddress(self.0, name.as_ptr() as _);
        match sym {
            None => Ok(None),
            Some(sym) => Ok(Some(Symbol::from_raw(sym as *const _))),
        }
    }

    unsafe fn unload(self) {
        FreeLibrary(self.0);
    }

    /// Mirrors the original loader's own use of `GetModuleFileNameW(instance, ...)` to resolve
    /// a module handle's own path (`Cx_PluginLoader::MakeFullPath`).
    fn path(&self) -> crate::Result<PathBuf> {
        let mut buf = vec![0u16; 260];
        loop {
            let len = unsafe { GetModuleFileNameW(self.0, buf.as_mut_ptr(), buf.len() as u32) };
            if len == 0 {
                return Err(Error::Io(std::io::Error::last_os_error()));
            }
            if (len as usize) < buf.len() {
                buf.truncate(len as usize);
                return Ok(PathBuf::from(std::ffi::OsString::from_wide(&buf)));
            }
            buf.resize(buf.len() * 2, 0);
        }
    }
}
