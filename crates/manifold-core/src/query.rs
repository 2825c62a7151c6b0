//! Asynchronous state queries
//!
//! A [`Query`] observes audio-thread state without locking: `capture`
//! runs at the end of a cycle on the audio thread, then the object rides
//! the outbound ring back to the control thread, which calls `publish`.
//! Returning `true` from `publish` re-arms the query for another round,
//! the usual shape for periodically polled meters.
//!
//! An engine with no queries pays nothing beyond one empty ring check per
//! cycle.

/// A two-phase state observation.
pub trait Query: Send {
    /// Read whatever audio-thread state this query is after. Runs on the
    /// audio thread; must not allocate or block.
    fn capture(&mut self);

    /// Deliver the captured data. Runs on the control thread; return
    /// `true` to capture again next cycle.
    fn publish(&mut self) -> bool;
}

pub(crate) type BoxedQuery = Box<dyn Query>;

pub(crate) fn query_channel(capacity: usize) -> (QueryControl, QueryRt) {
    let (to_rt, from_ctl) = rtrb::RingBuffer::new(capacity);
    let (to_ctl, from_rt) = rtrb::RingBuffer::new(capacity);
    (QueryControl { to_rt, from_rt }, QueryRt { from_ctl, to_ctl })
}

/// Control-thread half of the query channel.
pub(crate) struct QueryControl {
    to_rt: rtrb::Producer<BoxedQuery>,
    from_rt: rtrb::Consumer<BoxedQuery>,
}

impl QueryControl {
    pub(crate) fn push(&mut self, query: BoxedQuery) {
        let mut query = query;
        loop {
            match self.to_rt.push(query) {
                Ok(()) => return,
                Err(rtrb::PushError::Full(rejected)) => {
                    query = rejected;
                    std::hint::spin_loop();
                }
            }
        }
    }

    /// Publish every captured query; re-arm the ones that ask for it.
    pub(crate) fn pump(&mut self) -> usize {
        let mut published = 0;
        while let Ok(mut query) = self.from_rt.pop() {
            published += 1;
            if query.publish() {
                self.push(query);
            }
        }
        published
    }

    /// Publish pending captures without re-arming (deactivation path).
    pub(crate) fn pump_discard(&mut self) -> usize {
        let mut published = 0;
        while let Ok(mut query) = self.from_rt.pop() {
            let _ = query.publish();
            published += 1;
        }
        published
    }
}

/// Audio-thread half of the query channel.
pub(crate) struct QueryRt {
    from_ctl: rtrb::Consumer<BoxedQuery>,
    to_ctl: rtrb::Producer<BoxedQuery>,
}

impl QueryRt {
    /// Capture and forward every pending query. Does not allocate.
    pub(crate) fn process_queries(&mut self) {
        while let Ok(mut query) = self.from_ctl.pop() {
            query.capture();
            loop {
                match self.to_ctl.push(query) {
                    Ok(()) => break,
                    Err(rtrb::PushError::Full(rejected)) => {
                        query = rejected;
                        std::hint::spin_loop();
                    }
                }
            }
        }
    }
}
