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

//! A typed handle onto a raw symbol address resolved from a [Library](super::Library).

use std::ffi::c_void;
use std::marker::PhantomData;

/// A symbol resolved from a [Library](super::Library), typed by its expected signature `T`.
pub struct Symbol<'a, T> {
    ptr: *const T,
    useless: PhantomData<&'a ()>,
}

impl<'a, T> Symbol<'a, T> {
    /// Creates a new [Symbol] from a raw pointer.
    ///
    /// # Safety
    ///
    /// UB if `val` does not match the signature of `T`.
    #[inline(always)]
    pub unsafe fn from_raw(val: *const c_void) -> Self {
        Self {
            ptr: val as *const T,
            useless: PhantomData,
        }
    }

    /// Returns the raw pointer behind this symbol.
    #[inline(always)]
    pub fn as_ptr(&self) -> *const T {
        self.ptr
    }

    /// Extends this symbol's lifetime to `'static`.
    ///
    /// # Safety
    ///
    /// Assumes the owning library outlives every use of the returned symbol.
    #[inline(always)]
    pub unsafe fn as_static(&self) -> Symbol<'static, T> {
        Symbol {
            ptr: self.ptr,
            useless: PhantomData,
        }
    }
}

impl<'a, T, R> Symbol<'a, extern "C" fn(T) -> R> {
    /// Calls this symbol as a 1-argument `extern "C"` function.
    pub fn call(&self, val: T) -> R {
        let f: extern "C" fn(T) -> R = unsafe { std::mem::transmute(self.ptr) };
        f(val)
    }
}

impl<'a, T, T1, R> Symbol<'a, extern "C" fn(T, T1) -> R> {
    /// Calls this symbol as a 2-argument `extern "C"` function.
    pub fn call(&self, val: T, val1: T1) -> R {
        let f: extern "C" fn(T, T1) -> R = unsafe { std::mem::transmute(self.ptr) };
        f(val, val1)
    }
}

impl<'a, T, T1, T2, R> Symbol<'a, extern "C" fn(T, T1, T2) -> R> {
    /// Calls this symbol as a 3-argument `extern "C"` function.
    pub fn call(&self, val: T, val1: T1, val2: T2) -> R {
        let f: extern "C" fn(T, T1, T2) -> R = unsafe { std::mem::transmute(self.ptr) };
        f(val, val1, val2)
    }
}

impl<'a, R> Symbol<'a, extern "C" fn() -> R> {
    /// Calls this symbol as a 0-argument `extern "C"` function.
    pub fn call(&self) -> R {
        let f: extern "C" fn() -> R = unsafe { std::mem::transmute(self.ptr) };
        f()
    }
}
