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

//! The plugin ABI (§6.1): well-known symbol names a plugin may export, resolved dynamically by
//! name rather than through a linked vtable, matching the "dynamic dispatch via symbol names"
//! design this loader is built around.

use crate::library::Library;
use crate::module::ModuleCapability;

/// Optional: runs one-time plugin initialization. Returns `false` to veto registration.
pub const SYM_INITIALIZE_PLUGIN: &str = "x3InitializePlugin";

/// Optional: returns `false` to veto an unload attempt. Absence means "always safe to unload".
pub const SYM_CAN_UNLOAD_PLUGIN: &str = "x3CanUnloadPlugin";

/// Optional: runs one-time plugin teardown immediately before the library is released.
pub const SYM_UNINITIALIZE_PLUGIN: &str = "x3UninitializePlugin";

/// Presence-only marker: a plugin exporting this symbol is registered as an observer of
/// `x3::complugin` events (the original component-loading notification).
pub const SYM_GET_CLASS_OBJECT: &str = "DllGetClassObject";

/// Returns a pointer to the module's static [ModuleCapability] vtable.
pub const SYM_GET_MODULE: &str = "x3GetModule";

type InitFn = extern "C" fn() -> bool;
type CanUnloadFn = extern "C" fn() -> bool;
type UninitFn = extern "C" fn();
type GetModuleFn = extern "C" fn() -> *const ModuleCapability;

/// Resolves and calls `x3InitializePlugin`, if the plugin exports it.
///
/// Returns `Ok(None)` if the hook is absent (treated as success with nothing to call), `Ok(Some(b))`
/// with the hook's own verdict otherwise.
///
/// # Safety
///
/// The caller must ensure `lib` stays loaded for the duration of the call.
pub unsafe fn call_initialize(lib: &impl Library) -> crate::Result<Option<bool>> {
    match lib.load_symbol::<InitFn>(SYM_INITIALIZE_PLUGIN)? {
        Some(sym) => Ok(Some(sym.call())),
        None => Ok(None),
    }
}

/// Resolves and calls `x3CanUnloadPlugin`, if present. Absence means "may always unload".
///
/// # Safety
///
/// The caller must ensure `lib` stays loaded for the duration of the call.
pub unsafe fn call_can_unload(lib: &impl Library) -> crate::Result<bool> {
    match lib.load_symbol::<CanUnloadFn>(SYM_CAN_UNLOAD_PLUGIN)? {
        Some(sym) => Ok(sym.call()),
        None => Ok(true),
    }
}

/// Resolves and calls `x3UninitializePlugin`, if present.
///
/// # Safety
///
/// The caller must ensure `lib` stays loaded for the duration of the call.
pub unsafe fn call_uninitialize(lib: &impl Library) -> crate::Result<()> {
    if let Some(sym) = lib.load_symbol::<UninitFn>(SYM_UNINITIALIZE_PLUGIN)? {
        sym.call();
    }
    Ok(())
}

/// Returns whether the plugin exports `DllGetClassObject` (the observer-registration marker).
///
/// # Safety
///
/// The caller must ensure `lib` stays loaded for the duration of the call.
pub unsafe fn has_class_object_export(lib: &impl Library) -> crate::Result<bool> {
    Ok(lib
        .load_symbol::<extern "C" fn()>(SYM_GET_CLASS_OBJECT)?
        .is_some())
}

/// Resolves the module's capability vtable via `x3GetModule`.
///
/// Returns `Ok(None)` if the plugin does not export a module capability at all (the caller treats
/// this as rejection during registration).
///
/// # Safety
///
/// The caller must ensure `lib` stays loaded for as long as the returned vtable may be used, and
/// that the vtable's function pointers follow the documented `ModuleCapability` signatures.
pub unsafe fn get_module_capability(lib: &impl Library) -> crate::Result<Option<ModuleCapability>> {
    match lib.load_symbol::<GetModuleFn>(SYM_GET_MODULE)? {
        Some(sym) => {
            let ptr = sym.call();
            if ptr.is_null() {
                Ok(None)
            } else {
                Ok(Some(*ptr))
            }
        }
        None => Ok(None),
    }
}
