//! Durability-ordering wrapper (spec §4.6: "On every transition,
//! persist any term/vote change *before* emitting outbound
//! messages"; spec §3 "every write to `voted_for` and every log
//! append must be durable before any outbound message reflecting
//! that state is released").
//!
//! Grounded on the teacher's `MustPersistMetadata<T>` — kept under
//! its original intent (a self-check that the API caller has
//! actually durably persisted something before using the value it
//! wraps) but generalized to any `T`, since this crate needs the same
//! wrapper around both vote responses and append-entries responses
//! carrying a log position.

/// Wraps a value that must not be released to the I/O boundary (sent
/// as a response, etc.) until whatever state it depends on has been
/// made durable. There is no way to construct one outside this crate
/// except by calling [`MustPersist::new`] at the exact point the
/// corresponding write was queued, and no way to get the inner value
/// out except [`MustPersist::persisted`] — the type itself carries no
/// enforcement beyond documenting and naming the obligation, which is
/// also all the teacher's version did.
#[derive(Debug, Clone)]
pub struct MustPersist<T> {
    inner: T,
}

impl<T> MustPersist<T> {
    pub(crate) fn new(inner: T) -> Self {
        MustPersist { inner }
    }

    /// Call this only once the corresponding durable write has been
    /// acknowledged by the I/O collaborator.
    pub fn persisted(self) -> T {
        self.inner
    }
}
