//! Crate-wide error type.
//!
//! A single `error_chain!` invocation following the teacher crate's
//! `errors` module: one `Error`/`ErrorKind`/`Result` triple shared by
//! every component, with `std::io::Error` linked in verbatim from the
//! I/O boundary.

error_chain! {
    foreign_links {
        Io(::std::io::Error);
    }

    errors {
        /// A client operation (propose, membership change) requires
        /// leadership. Carries the id of the server we currently
        /// believe to be the leader, if known.
        NotLeader(leader_hint: Option<crate::protos::ServerId>) {
            description("this server is not the leader")
            display("not the leader, current leader hint: {:?}", leader_hint)
        }

        /// An invariant violation was detected: a committed entry in
        /// our log disagrees with an incoming AppendEntries. This is
        /// impossible in a correct cluster. The instance is marked
        /// permanently shut down and refuses all further entry-point
        /// calls.
        Shutdown(index: u64, our_term: u64, their_term: u64) {
            description("fatal: committed entry conflicts with leader's request")
            display(
                "fatal: committed entry at index {} has term {} locally but \
                 {} was expected by the request; this server is now shut down",
                index, our_term, their_term
            )
        }

        /// Membership operation referenced an id already present in
        /// the configuration.
        DuplicateId(id: crate::protos::ServerId) {
            description("duplicate server id")
            display("server id {} already present in configuration", id)
        }

        /// Membership or lookup operation referenced an id absent
        /// from the configuration.
        NotFound(id: crate::protos::ServerId) {
            description("server id not found")
            display("server id {} not present in configuration", id)
        }

        /// A malformed request: an unknown message type, a message
        /// whose sender isn't in the configuration, or invalid
        /// options.
        BadRequest(reason: String) {
            description("malformed request")
            display("bad request: {}", reason)
        }

        /// An attempt was made to truncate a log suffix that has
        /// already been committed.
        CommittedTruncation(from: u64, commit_index: u64) {
            description("refusing to truncate committed entries")
            display(
                "refusing to truncate from index {} at or before commit index {}",
                from, commit_index
            )
        }
    }
}
