//! Optional behaviours that entities can expose on demand.
//!
//! An entity answers two questions for a [`CapabilityType`]: whether it can
//! provide the capability, and a freshly built instance of it. Both answers
//! usually come from the same [`CapabilityDelegate`] table so they cannot
//! disagree. Callers use the typed helpers of [`CapabilityExt`]:
//!
//! ```
//! use amkmeta::{ActionsCapability, CapabilityDelegate, CapabilityExt, MemoryTrack};
//!
//! let track = MemoryTrack::builder("file:///music/a.ogg".parse().unwrap())
//!     .capabilities(CapabilityDelegate::new().with(|| ActionsCapability::default()))
//!     .build();
//!
//! assert!(track.has::<ActionsCapability>());
//! let actions = track.create::<ActionsCapability>().unwrap();
//! assert!(actions.actions().is_empty());
//! ```

use std::{any::Any, collections::HashMap, fmt};

use url::Url;

use crate::entity::Base;

/// Tag identifying a capability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CapabilityType {
    Actions,
    BookmarkThis,
    MultiSource,
    BoundedPlayback,
    ReadLabel,
    WriteLabel,
    CollectionScan,
    SourceInfo,
    FindInSource,
    Buyable,
    Organisable,
    Editable,
    StreamInfo,
    Transcode,
}

/// Type-erased capability object, as returned by
/// [`Base::create_capability_interface`].
pub trait Capability: Any + Send + Sync {
    fn capability_type(&self) -> CapabilityType;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
}

/// A concrete capability type bound to its tag.
pub trait CapabilityInterface: Any + Send + Sync {
    const TYPE: CapabilityType;
}

impl<C: CapabilityInterface> Capability for C {
    fn capability_type(&self) -> CapabilityType {
        C::TYPE
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }
}

impl fmt::Debug for dyn Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Capability")
            .field(&self.capability_type())
            .finish()
    }
}

/// Typed capability queries, available on every entity.
pub trait CapabilityExt {
    fn has<C: CapabilityInterface>(&self) -> bool;

    /// Builds a capability of type `C`; `None` if the entity does not
    /// provide it or produced an object of another type.
    fn create<C: CapabilityInterface>(&self) -> Option<Box<C>>;
}

impl<B: Base + ?Sized> CapabilityExt for B {
    fn has<C: CapabilityInterface>(&self) -> bool {
        self.has_capability_interface(C::TYPE)
    }

    fn create<C: CapabilityInterface>(&self) -> Option<Box<C>> {
        self.create_capability_interface(C::TYPE)?
            .into_any()
            .downcast::<C>()
            .ok()
    }
}

type Factory = Box<dyn Fn() -> Box<dyn Capability> + Send + Sync>;

/// Table of capability factories an entity delegates its capability
/// queries to.
#[derive(Default)]
pub struct CapabilityDelegate {
    factories: HashMap<CapabilityType, Factory>,
}

impl CapabilityDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`CapabilityDelegate::register`].
    pub fn with<C, F>(mut self, factory: F) -> Self
    where
        C: CapabilityInterface,
        F: Fn() -> C + Send + Sync + 'static,
    {
        self.register(factory);
        self
    }

    /// Registers the factory for `C`, replacing any previous one.
    pub fn register<C, F>(&mut self, factory: F)
    where
        C: CapabilityInterface,
        F: Fn() -> C + Send + Sync + 'static,
    {
        self.factories
            .insert(C::TYPE, Box::new(move || Box::new(factory()) as Box<dyn Capability>));
    }

    pub fn has(&self, kind: CapabilityType) -> bool {
        self.factories.contains_key(&kind)
    }

    pub fn create(&self, kind: CapabilityType) -> Option<Box<dyn Capability>> {
        self.factories.get(&kind).map(|factory| factory())
    }

    pub fn types(&self) -> Vec<CapabilityType> {
        let mut types: Vec<_> = self.factories.keys().copied().collect();
        types.sort();
        types
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for CapabilityDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDelegate")
            .field("types", &self.types())
            .finish()
    }
}

/// Context menu entry contributed by an entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Action {
    pub id: String,
    pub text: String,
}

impl Action {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Extra actions offered for an entity.
#[derive(Clone, Debug, Default)]
pub struct ActionsCapability {
    actions: Vec<Action>,
}

impl ActionsCapability {
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }
}

impl CapabilityInterface for ActionsCapability {
    const TYPE: CapabilityType = CapabilityType::Actions;
}

/// Lets the user bookmark an entity in a collection browser.
#[derive(Clone, Debug, Default)]
pub struct BookmarkThisCapability {
    pub browser_name: String,
    pub collection_name: String,
    /// Whether the collection only supports simple text filters.
    pub simple_filtering: bool,
}

impl BookmarkThisCapability {
    pub fn is_bookmarkable(&self) -> bool {
        !self.browser_name.is_empty()
    }
}

impl CapabilityInterface for BookmarkThisCapability {
    const TYPE: CapabilityType = CapabilityType::BookmarkThis;
}

/// Several alternative sources for one track, one of them current.
#[derive(Clone, Debug, Default)]
pub struct MultiSourceCapability {
    sources: Vec<Url>,
    current: usize,
}

impl MultiSourceCapability {
    pub fn new(sources: Vec<Url>) -> Self {
        Self {
            sources,
            current: 0,
        }
    }

    pub fn sources(&self) -> &[Url] {
        &self.sources
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn current_source(&self) -> Option<&Url> {
        self.sources.get(self.current)
    }

    /// Selects source `index`; out of range indexes are rejected.
    pub fn set_source(&mut self, index: usize) -> bool {
        if index < self.sources.len() {
            self.current = index;
            true
        } else {
            false
        }
    }

    /// Advances to the next source and returns it, `None` at the end.
    pub fn next_source(&mut self) -> Option<&Url> {
        if self.current + 1 < self.sources.len() {
            self.current += 1;
            self.sources.get(self.current)
        } else {
            None
        }
    }
}

impl CapabilityInterface for MultiSourceCapability {
    const TYPE: CapabilityType = CapabilityType::MultiSource;
}

/// Restricts playback to a slice of the underlying media, in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoundedPlaybackCapability {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl BoundedPlaybackCapability {
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    pub fn length(&self) -> i64 {
        self.end_ms.saturating_sub(self.start_ms).max(0)
    }
}

impl CapabilityInterface for BoundedPlaybackCapability {
    const TYPE: CapabilityType = CapabilityType::BoundedPlayback;
}

#[derive(Clone, Debug, Default)]
pub struct ReadLabelCapability {
    labels: Vec<String>,
}

impl ReadLabelCapability {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl CapabilityInterface for ReadLabelCapability {
    const TYPE: CapabilityType = CapabilityType::ReadLabel;
}

/// Describes where an entity comes from (a service, a stream directory...).
#[derive(Clone, Debug, Default)]
pub struct SourceInfoCapability {
    pub source_name: String,
    pub source_description: String,
}

impl SourceInfoCapability {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            source_name: name.into(),
            source_description: description.into(),
        }
    }

    pub fn has_source_info(&self) -> bool {
        !self.source_name.is_empty()
    }
}

impl CapabilityInterface for SourceInfoCapability {
    const TYPE: CapabilityType = CapabilityType::SourceInfo;
}
