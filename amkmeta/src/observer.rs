//! Subscription bookkeeping between entities and observers.
//!
//! Two components carry the whole protocol:
//!
//! - [`Observable`] lives inside every entity and owns the subscriber
//!   registry. It only keeps [`Weak`] handles on observers, so an entity
//!   never keeps a subscriber alive.
//! - [`Subscriptions`] lives inside every observer and remembers which
//!   registries the observer is listed in, so that dropping the observer
//!   removes it everywhere even if the caller forgot to unsubscribe.
//!
//! The registry is guarded by a re-entrant mutex that stays locked for the
//! whole fan-out of [`Observable::notify`]. A callback running on the
//! notifying thread may therefore subscribe or unsubscribe (itself or any
//! other observer) on the very entity being notified, while other threads
//! wait until the fan-out is over.

use std::{
    cell::RefCell,
    collections::HashMap,
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, trace};

use crate::entity::{
    AlbumPtr, ArtistPtr, Base, ComposerPtr, EntityPtr, GenrePtr, TrackPtr, YearPtr,
};

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an [`Observable`] (and thus of its entity).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    fn next() -> Self {
        EntityId(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Process-unique identity of a [`Subscriptions`] component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    fn next() -> Self {
        ObserverId(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

/// Receiver of entity change notifications.
///
/// Implementors embed a [`Subscriptions`] value and return it from
/// [`Observer::subscriptions`]; every other method has a no-op default so
/// only the hooks of interest need overriding.
///
/// Callbacks are invoked synchronously on the thread that mutated the
/// entity, while the entity's registry lock is held.
pub trait Observer: Send + Sync {
    /// The observer's own subscription record.
    fn subscriptions(&self) -> &Subscriptions;

    /// Entry point of every change notification.
    ///
    /// The default forwards to the typed hook matching the entity kind.
    fn metadata_changed(&self, entity: &EntityPtr) {
        match entity {
            EntityPtr::Track(track) => self.track_changed(track),
            EntityPtr::Artist(artist) => self.artist_changed(artist),
            EntityPtr::Album(album) => self.album_changed(album),
            EntityPtr::Genre(genre) => self.genre_changed(genre),
            EntityPtr::Composer(composer) => self.composer_changed(composer),
            EntityPtr::Year(year) => self.year_changed(year),
        }
    }

    fn track_changed(&self, _track: &TrackPtr) {}

    fn artist_changed(&self, _artist: &ArtistPtr) {}

    fn album_changed(&self, _album: &AlbumPtr) {}

    fn genre_changed(&self, _genre: &GenrePtr) {}

    fn composer_changed(&self, _composer: &ComposerPtr) {}

    fn year_changed(&self, _year: &YearPtr) {}

    /// Called once per subscribed entity that is being destroyed.
    ///
    /// The subscription record for that entity is already gone when this
    /// runs.
    fn entity_destroyed(&self) {}
}

type SubscriberMap = HashMap<ObserverId, Weak<dyn Observer>>;

/// Shared part of an [`Observable`], reachable weakly from observers.
pub(crate) struct Registry {
    entity: EntityId,
    subscribers: ReentrantMutex<RefCell<SubscriberMap>>,
}

impl Registry {
    fn insert(&self, id: ObserverId, observer: Weak<dyn Observer>) -> bool {
        let guard = self.subscribers.lock();
        let mut subscribers = guard.borrow_mut();
        subscribers.insert(id, observer).is_none()
    }

    fn remove(&self, id: ObserverId) -> bool {
        let guard = self.subscribers.lock();
        let mut subscribers = guard.borrow_mut();
        subscribers.remove(&id).is_some()
    }
}

/// Subscriber registry embedded in every entity.
pub struct Observable {
    registry: Arc<Registry>,
}

impl Observable {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                entity: EntityId::next(),
                subscribers: ReentrantMutex::new(RefCell::new(HashMap::new())),
            }),
        }
    }

    /// Identity of the owning entity.
    pub fn id(&self) -> EntityId {
        self.registry.entity
    }

    /// Adds `observer` to the subscriber set. Subscribing twice is harmless.
    pub fn subscribe(&self, observer: &Arc<dyn Observer>) {
        let id = observer.subscriptions().id();
        if self.registry.insert(id, Arc::downgrade(observer)) {
            trace!(entity=%self.id(), observer=%id, "subscribed");
        }
        observer
            .subscriptions()
            .remember(self.id(), Arc::downgrade(&self.registry));
    }

    /// Removes `observer` from the subscriber set if it is present.
    ///
    /// Safe to call from inside a notification callback of this entity.
    pub fn unsubscribe(&self, observer: &dyn Observer) {
        let id = observer.subscriptions().id();
        if self.registry.remove(id) {
            trace!(entity=%self.id(), observer=%id, "unsubscribed");
        }
        observer.subscriptions().forget(self.id());
    }

    pub fn is_subscribed(&self, observer: &dyn Observer) -> bool {
        let guard = self.registry.subscribers.lock();
        let subscribers = guard.borrow();
        subscribers.contains_key(&observer.subscriptions().id())
    }

    pub fn subscriber_count(&self) -> usize {
        let guard = self.registry.subscribers.lock();
        let subscribers = guard.borrow();
        subscribers.len()
    }

    /// Fans `subject` out to every subscriber.
    ///
    /// Iterates over a snapshot taken when the fan-out starts and skips
    /// observers removed from the live set before their turn, as well as
    /// observers already being dropped.
    pub fn notify(&self, subject: &EntityPtr) {
        let guard = self.registry.subscribers.lock();
        let snapshot: Vec<(ObserverId, Weak<dyn Observer>)> = guard
            .borrow()
            .iter()
            .map(|(id, observer)| (*id, observer.clone()))
            .collect();

        trace!(entity=%self.id(), subscribers=snapshot.len(), "notifying observers");

        for (id, observer) in snapshot {
            if !guard.borrow().contains_key(&id) {
                continue;
            }
            let Some(observer) = observer.upgrade() else {
                continue;
            };
            observer.metadata_changed(subject);
        }
    }
}

impl Default for Observable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("id", &self.id())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl Drop for Observable {
    fn drop(&mut self) {
        let subscribers: Vec<Weak<dyn Observer>> = {
            let guard = self.registry.subscribers.lock();
            let mut subscribers = guard.borrow_mut();
            subscribers.drain().map(|(_, observer)| observer).collect()
        };
        if subscribers.is_empty() {
            return;
        }

        debug!(entity=%self.id(), subscribers=subscribers.len(), "entity destroyed");
        for observer in subscribers {
            if let Some(observer) = observer.upgrade() {
                observer.subscriptions().forget(self.id());
                observer.entity_destroyed();
            }
        }
    }
}

/// Subscription record embedded in every observer.
pub struct Subscriptions {
    id: ObserverId,
    entities: Mutex<HashMap<EntityId, Weak<Registry>>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self {
            id: ObserverId::next(),
            entities: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.lock().contains_key(&entity)
    }

    pub fn len(&self) -> usize {
        self.entities.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.lock().is_empty()
    }

    /// Removes the owning observer from every entity it is subscribed to.
    pub fn unsubscribe_all(&self) {
        let entities = std::mem::take(&mut *self.entities.lock());
        for registry in entities.into_values() {
            if let Some(registry) = registry.upgrade() {
                registry.remove(self.id);
            }
        }
    }

    fn remember(&self, entity: EntityId, registry: Weak<Registry>) {
        self.entities.lock().insert(entity, registry);
    }

    fn forget(&self, entity: EntityId) {
        self.entities.lock().remove(&entity);
    }
}

impl Default for Subscriptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Subscriptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriptions")
            .field("id", &self.id)
            .field("entities", &self.len())
            .finish()
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        self.unsubscribe_all();
    }
}

/// Subscription helpers on reference-counted observers.
///
/// ```
/// use std::sync::Arc;
/// use amkmeta::{Base, MemoryTrack, Observer, ObserverExt, Subscriptions, TrackPtr};
///
/// #[derive(Default)]
/// struct Printer {
///     subscriptions: Subscriptions,
/// }
///
/// impl Observer for Printer {
///     fn subscriptions(&self) -> &Subscriptions {
///         &self.subscriptions
///     }
///
///     fn track_changed(&self, track: &TrackPtr) {
///         println!("changed: {}", track.pretty_name());
///     }
/// }
///
/// let track = MemoryTrack::builder("file:///music/song.ogg".parse().unwrap())
///     .title("Song")
///     .build();
/// let printer = Arc::new(Printer::default());
/// printer.subscribe_to(&track);
/// track.set_title("Other song");
/// ```
pub trait ObserverExt {
    fn subscribe_to<E: Base + ?Sized>(&self, entity: &Arc<E>);

    fn unsubscribe_from<E: Base + ?Sized>(&self, entity: &Arc<E>);
}

impl<O: Observer + 'static> ObserverExt for Arc<O> {
    fn subscribe_to<E: Base + ?Sized>(&self, entity: &Arc<E>) {
        let observer: Arc<dyn Observer> = self.clone();
        entity.observable().subscribe(&observer);
    }

    fn unsubscribe_from<E: Base + ?Sized>(&self, entity: &Arc<E>) {
        entity.observable().unsubscribe(self.as_ref());
    }
}
