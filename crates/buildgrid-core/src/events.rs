//! Change events delivered to collection listeners

/// Kind of change applied to a map entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryEventKind {
    /// Key was absent and now has a value
    Added,
    /// Existing value was replaced
    Updated,
    /// Key was removed
    Removed,
}

impl std::fmt::Display for EntryEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "entry_added"),
            Self::Updated => write!(f, "entry_updated"),
            Self::Removed => write!(f, "entry_removed"),
        }
    }
}

/// A change to a single map entry, carrying the affected key and values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryEvent<K, V> {
    /// `key` was absent and now maps to `value`
    Added { key: K, value: V },
    /// `key` mapped to `old_value` and now maps to `value`
    Updated { key: K, old_value: V, value: V },
    /// `key` mapped to `old_value` and is now absent
    Removed { key: K, old_value: V },
}

impl<K, V> EntryEvent<K, V> {
    /// The kind of change this event describes
    #[must_use]
    pub const fn kind(&self) -> EntryEventKind {
        match self {
            Self::Added { .. } => EntryEventKind::Added,
            Self::Updated { .. } => EntryEventKind::Updated,
            Self::Removed { .. } => EntryEventKind::Removed,
        }
    }

    /// The key the event refers to
    #[must_use]
    pub const fn key(&self) -> &K {
        match self {
            Self::Added { key, .. } | Self::Updated { key, .. } | Self::Removed { key, .. } => key,
        }
    }
}

/// An element entering or leaving a queue or set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemEvent<T> {
    Added(T),
    Removed(T),
}

impl<T> ItemEvent<T> {
    /// The element the event refers to
    #[must_use]
    pub const fn item(&self) -> &T {
        match self {
            Self::Added(item) | Self::Removed(item) => item,
        }
    }

    /// Event name used in log output
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Added(_) => "item_added",
            Self::Removed(_) => "item_removed",
        }
    }
}
