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

//! The class cache (C4): a small persisted document enabling delay-loading.
//!
//! The document is a generic attributed tree, matching how the corpus reaches for a real
//! document crate (`quick-xml`) rather than a hand-rolled parser wherever a config/cache file
//! format is needed. The logical layout is:
//!
//! ```text
//! <cache>
//!   <plugins>
//!     <plugin name="foo.so">
//!       <clsids>
//!         <clsid id="x3::foo" name="Foo"/>
//!       </clsids>
//!     </plugin>
//!   </plugins>
//!   <observers>
//!     <observer type="x3::complugin" subtype="">
//!       <plugin name="foo.so"/>
//!     </observer>
//!   </observers>
//! </cache>
//! ```

use crate::clsid::Clsid;
use crate::error::Error;
use bp3d_debug::debug;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;
use std::path::Path;

/// A generic attributed tree node: the concrete shape behind the class cache's external,
/// otherwise-opaque hierarchical document contract.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    /// The element's tag name.
    pub tag: String,
    /// Attributes, in insertion order.
    pub attrs: Vec<(String, String)>,
    /// Child elements, in document order.
    pub children: Vec<Element>,
}

impl Element {
    /// Creates a new, childless, attribute-less element.
    pub fn new(tag: impl Into<String>) -> Self {
        Element {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Sets (or replaces) an attribute, returning `self` for chaining.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Sets (or replaces) an attribute.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value.into(),
            None => self.attrs.push((key, value.into())),
        }
    }

    /// Returns an attribute's value, if present.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Finds the first direct child with the given tag.
    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// Finds the first direct child with the given tag, inserting an empty one if absent.
    pub fn child_or_insert(&mut self, tag: &str) -> &mut Element {
        if !self.children.iter().any(|c| c.tag == tag) {
            self.children.push(Element::new(tag));
        }
        self.children.iter_mut().find(|c| c.tag == tag).unwrap()
    }

    /// Iterates direct children with the given tag.
    pub fn children_tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    fn write<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<(), quick_xml::Error> {
        let mut start = BytesStart::new(self.tag.clone());
        for (k, v) in &self.attrs {
            start.push_attribute((k.as_str(), v.as_str()));
        }
        if self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
        } else {
            writer.write_event(Event::Start(start))?;
            for child in &self.children {
                child.write(writer)?;
            }
            writer.write_event(Event::End(BytesEnd::new(self.tag.clone())))?;
        }
        Ok(())
    }

    fn to_xml_string(&self) -> Result<String, quick_xml::Error> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        self.write(&mut writer)?;
        let bytes = writer.into_inner().into_inner();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn from_xml_str(xml: &str) -> Result<Element, Error> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        loop {
            match reader
                .read_event()
                .map_err(|e| Error::InvalidCacheFormat(e.to_string()))?
            {
                Event::Start(e) => {
                    stack.push(start_to_element(&e)?);
                }
                Event::Empty(e) => {
                    let el = start_to_element(&e)?;
                    push_child(&mut stack, &mut root, el);
                }
                Event::End(_) => {
                    let el = stack.pop().ok_or_else(|| {
                        Error::InvalidCacheFormat("unbalanced end tag".to_string())
                    })?;
                    push_child(&mut stack, &mut root, el);
                }
                Event::Eof => break,
                _ => {}
            }
        }
        root.ok_or_else(|| Error::InvalidCacheFormat("empty document".to_string()))
    }
}

fn start_to_element(e: &BytesStart) -> Result<Element, Error> {
    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut el = Element::new(tag);
    for attr in e.attributes() {
        let attr = attr.map_err(|e| Error::InvalidCacheFormat(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::InvalidCacheFormat(e.to_string()))?
            .into_owned();
        el.set_attr(key, value);
    }
    Ok(el)
}

fn push_child(stack: &mut Vec<Element>, root: &mut Option<Element>, el: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None => *root = Some(el),
    }
}

/// The class cache: a persisted record of every plugin's advertised clsids and observer
/// subscriptions, enabling the loader to delay-open a library until one of its classes or
/// observed events is actually needed.
#[derive(Debug)]
pub struct ClassCache {
    root: Element,
}

const TAG_CACHE: &str = "cache";
const TAG_PLUGINS: &str = "plugins";
const TAG_PLUGIN: &str = "plugin";
const TAG_CLSIDS: &str = "clsids";
const TAG_CLSID: &str = "clsid";
const TAG_OBSERVERS: &str = "observers";
const TAG_OBSERVER: &str = "observer";

impl ClassCache {
    /// Creates a new, empty class cache (as if no cache file existed yet).
    pub fn empty() -> Self {
        ClassCache {
            root: Element::new(TAG_CACHE),
        }
    }

    /// Loads a class cache document from disk.
    ///
    /// Per spec, a missing cache file is not an error: a fresh, empty cache is returned so the
    /// loader falls through to eager loading for everything.
    pub fn load_cache_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("no class cache at {}, starting empty", path.display());
            return Ok(Self::empty());
        }
        let data = std::fs::read_to_string(path).map_err(Error::Io)?;
        let root = Element::from_xml_str(&data)?;
        Ok(ClassCache { root })
    }

    /// Whether this cache currently holds any plugin entries.
    pub fn is_available(&self) -> bool {
        self.root
            .child(TAG_PLUGINS)
            .map(|p| !p.children.is_empty())
            .unwrap_or(false)
    }

    /// Returns the cached `(clsid, class_name)` pairs for a plugin basename, if the plugin is
    /// known to the cache at all.
    ///
    /// Per `LoadClsids`, a plugin counts as known (and gets `Some`, possibly an empty vec) if it
    /// has at least one recorded clsid **or** at least one recorded observer subscription: a
    /// pure event-observer plugin with no classes of its own must still be delay-registered as an
    /// unrealized placeholder so `FireFirstEvent` can later materialize it.
    pub fn load_clsids_from_cache(&self, basename: &str) -> Option<Vec<(Clsid, String)>> {
        let plugins = self.root.child(TAG_PLUGINS)?;
        let plugin = plugins
            .children_tagged(TAG_PLUGIN)
            .find(|p| p.attr("name") == Some(basename))?;
        let entries: Vec<(Clsid, String)> = plugin
            .child(TAG_CLSIDS)
            .map(|clsids| {
                clsids
                    .children_tagged(TAG_CLSID)
                    .filter_map(|c| {
                        let id = c.attr("id")?;
                        let name = c.attr("name").unwrap_or(id).to_string();
                        Some((Clsid::new(id), name))
                    })
                    .collect()
            })
            .unwrap_or_default();
        let has_observers = plugin
            .child(TAG_OBSERVERS)
            .map(|o| !o.children.is_empty())
            .unwrap_or(false);
        if entries.is_empty() && !has_observers {
            return None;
        }
        Some(entries)
    }

    /// Records (or replaces) a plugin's clsid list in the cache.
    ///
    /// This is the in-memory half of `BuildPluginCache`/`SaveClsids`; call [Self::save] to
    /// persist. The plugin's own `observers` subsection (if any, written by
    /// [Self::record_observer]) is preserved across the rewrite.
    pub fn build_plugin_cache(&mut self, basename: &str, entries: &[(Clsid, String)]) {
        let plugins = self.root.child_or_insert(TAG_PLUGINS);
        let existing_observers = plugins
            .children_tagged(TAG_PLUGIN)
            .find(|p| p.attr("name") == Some(basename))
            .and_then(|p| p.child(TAG_OBSERVERS))
            .cloned();
        plugins.children.retain(|p| p.attr("name") != Some(basename));
        let mut plugin = Element::new(TAG_PLUGIN).with_attr("name", basename);
        let mut clsids = Element::new(TAG_CLSIDS);
        for (clsid, name) in entries {
            clsids.children.push(
                Element::new(TAG_CLSID)
                    .with_attr("id", clsid.as_str())
                    .with_attr("name", name.clone()),
            );
        }
        plugin.children.push(clsids);
        if let Some(observers) = existing_observers {
            plugin.children.push(observers);
        }
        plugins.children.push(plugin);
    }

    /// Removes a plugin's entry entirely (used when a plugin no longer exports `DllGetClassObject`
    /// or was dropped during registration).
    pub fn remove_plugin(&mut self, basename: &str) {
        if let Some(plugins) = self
            .root
            .children
            .iter_mut()
            .find(|c| c.tag == TAG_PLUGINS)
        {
            plugins.children.retain(|p| p.attr("name") != Some(basename));
        }
    }

    /// Records that a plugin observes a given (event type, subtype) pair.
    ///
    /// Writes both the global `observers/observer[type,subtype]/plugin[name]` index (read by
    /// [Self::observers_for] to drive `FireFirstEvent`) and the plugin's own
    /// `plugins/plugin[name]/observers/observer[type]` subsection (read by
    /// [Self::load_clsids_from_cache] so an event-only subscriber still counts as known to the
    /// cache), mirroring the original `AddObserverPlugin`.
    pub fn record_observer(&mut self, obtype: &str, subtype: &str, basename: &str) {
        let observers = self.root.child_or_insert(TAG_OBSERVERS);
        let observer = match observers.children.iter_mut().find(|o| {
            o.attr("type") == Some(obtype) && o.attr("subtype") == Some(subtype)
        }) {
            Some(o) => o,
            None => {
                observers.children.push(
                    Element::new(TAG_OBSERVER)
                        .with_attr("type", obtype)
                        .with_attr("subtype", subtype),
                );
                observers.children.last_mut().unwrap()
            }
        };
        if !observer
            .children_tagged(TAG_PLUGIN)
            .any(|p| p.attr("name") == Some(basename))
        {
            observer
                .children
                .push(Element::new(TAG_PLUGIN).with_attr("name", basename));
        }

        let plugins = self.root.child_or_insert(TAG_PLUGINS);
        let plugin = match plugins
            .children
            .iter_mut()
            .find(|p| p.attr("name") == Some(basename))
        {
            Some(p) => p,
            None => {
                plugins
                    .children
                    .push(Element::new(TAG_PLUGIN).with_attr("name", basename));
                plugins.children.last_mut().unwrap()
            }
        };
        let plugin_observers = plugin.child_or_insert(TAG_OBSERVERS);
        if !plugin_observers
            .children_tagged(TAG_OBSERVER)
            .any(|o| o.attr("type") == Some(obtype))
        {
            plugin_observers
                .children
                .push(Element::new(TAG_OBSERVER).with_attr("type", obtype));
        }
    }

    /// Returns the basenames of every plugin observing a given (event type, subtype) pair.
    pub fn observers_for(&self, obtype: &str, subtype: &str) -> Vec<String> {
        let Some(observers) = self.root.child(TAG_OBSERVERS) else {
            return Vec::new();
        };
        observers
            .children_tagged(TAG_OBSERVER)
            .find(|o| o.attr("type") == Some(obtype) && o.attr("subtype") == Some(subtype))
            .map(|o| {
                o.children_tagged(TAG_PLUGIN)
                    .filter_map(|p| p.attr("name").map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Persists the cache to disk, transactionally: the document is serialized to a temporary
    /// file in the same directory, and only a successful write is rotated into place via
    /// `rename`. A failed write leaves the previous on-disk cache untouched.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let xml = self
            .root
            .to_xml_string()
            .map_err(|e| Error::InvalidCacheFormat(e.to_string()))?;
        let tmp = path.with_extension("clsbuf.tmp");
        std::fs::write(&tmp, xml).map_err(Error::Io)?;
        std::fs::rename(&tmp, path).map_err(Error::Io)?;
        debug!("saved class cache to {}", path.display());
        Ok(())
    }
}

impl Default for ClassCache {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cache_has_no_clsids_and_is_unavailable() {
        let cache = ClassCache::empty();
        assert!(!cache.is_available());
        assert!(cache.load_clsids_from_cache("foo.so").is_none());
    }

    #[test]
    fn build_then_load_clsids_round_trips_in_memory() {
        let mut cache = ClassCache::empty();
        cache.build_plugin_cache(
            "foo.so",
            &[(Clsid::new("x3::foo"), "Foo".to_string())],
        );
        assert!(cache.is_available());
        let entries = cache.load_clsids_from_cache("foo.so").unwrap();
        assert_eq!(entries, vec![(Clsid::new("x3::foo"), "Foo".to_string())]);
    }

    #[test]
    fn build_plugin_cache_replaces_previous_entry_for_same_basename() {
        let mut cache = ClassCache::empty();
        cache.build_plugin_cache("foo.so", &[(Clsid::new("x3::a"), "A".to_string())]);
        cache.build_plugin_cache("foo.so", &[(Clsid::new("x3::b"), "B".to_string())]);
        let entries = cache.load_clsids_from_cache("foo.so").unwrap();
        assert_eq!(entries, vec![(Clsid::new("x3::b"), "B".to_string())]);
    }

    #[test]
    fn observers_round_trip_and_dedupe() {
        let mut cache = ClassCache::empty();
        cache.record_observer("x3::complugin", "", "foo.so");
        cache.record_observer("x3::complugin", "", "foo.so");
        cache.record_observer("x3::complugin", "", "bar.so");
        let obs = cache.observers_for("x3::complugin", "");
        assert_eq!(obs, vec!["foo.so".to_string(), "bar.so".to_string()]);
        assert!(cache.observers_for("x3::other", "").is_empty());
    }

    #[test]
    fn save_then_load_cache_file_round_trips_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.clsbuf");
        let mut cache = ClassCache::empty();
        cache.build_plugin_cache("foo.so", &[(Clsid::new("x3::foo"), "Foo".to_string())]);
        cache.record_observer("x3::complugin", "", "foo.so");
        cache.save(&path).unwrap();

        let loaded = ClassCache::load_cache_file(&path).unwrap();
        assert_eq!(
            loaded.load_clsids_from_cache("foo.so").unwrap(),
            vec![(Clsid::new("x3::foo"), "Foo".to_string())]
        );
        assert_eq!(
            loaded.observers_for("x3::complugin", ""),
            vec!["foo.so".to_string()]
        );
    }

    #[test]
    fn load_cache_file_missing_file_returns_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.clsbuf");
        let cache = ClassCache::load_cache_file(&path).unwrap();
        assert!(!cache.is_available());
    }

    #[test]
    fn remove_plugin_drops_its_entry() {
        let mut cache = ClassCache::empty();
        cache.build_plugin_cache("foo.so", &[(Clsid::new("x3::foo"), "Foo".to_string())]);
        cache.remove_plugin("foo.so");
        assert!(cache.load_clsids_from_cache("foo.so").is_none());
    }

    #[test]
    fn observer_only_plugin_is_known_to_the_cache_with_no_clsids() {
        let mut cache = ClassCache::empty();
        cache.record_observer("x3::startup", "", "bar.so");
        assert!(cache.is_available());
        let entries = cache.load_clsids_from_cache("bar.so").unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn unknown_plugin_with_no_clsids_and_no_observers_is_none() {
        let cache = ClassCache::empty();
        assert!(cache.load_clsids_from_cache("nobody.so").is_none());
    }

    #[test]
    fn build_plugin_cache_preserves_observers_recorded_before_it() {
        let mut cache = ClassCache::empty();
        cache.record_observer("x3::startup", "", "foo.so");
        cache.build_plugin_cache("foo.so", &[(Clsid::new("x3::foo"), "Foo".to_string())]);
        let entries = cache.load_clsids_from_cache("foo.so").unwrap();
        assert_eq!(entries, vec![(Clsid::new("x3::foo"), "Foo".to_string())]);
        assert_eq!(
            cache.observers_for("x3::startup", ""),
            vec!["foo.so".to_string()]
        );
    }

    #[test]
    fn record_observer_writes_both_global_and_per_plugin_sections() {
        let mut cache = ClassCache::empty();
        cache.record_observer("x3::startup", "", "foo.so");
        let plugins = cache.root.child(TAG_PLUGINS).unwrap();
        let plugin = plugins
            .children_tagged(TAG_PLUGIN)
            .find(|p| p.attr("name") == Some("foo.so"))
            .unwrap();
        let observers = plugin.child(TAG_OBSERVERS).unwrap();
        assert!(observers
            .children_tagged(TAG_OBSERVER)
            .any(|o| o.attr("type") == Some("x3::startup")));
        assert_eq!(cache.observers_for("x3::startup", ""), vec!["foo.so".to_string()]);
    }
}
