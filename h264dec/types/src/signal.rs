/*!
    Stream control signals.
*/

use crate::RefTime;

/**
    Control signals arriving out of band, typically on a control thread.
*/
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StreamSignal {
    /**
        A new segment begins (e.g. after seeking).

        Recipients discard buffered and reorder state.
    */
    NewSegment {
        start: RefTime,
        stop: RefTime,
        rate: f64,
    },
    /**
        End of stream. No more samples will arrive.

        Recipients emit any frames they still hold.
    */
    EndOfStream,
}

impl StreamSignal {
    /**
        Returns true if this signal discards in-flight state.
    */
    pub fn is_flush(&self) -> bool {
        matches!(self, Self::NewSegment { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_segment_flushes() {
        let s = StreamSignal::NewSegment {
            start: RefTime(0),
            stop: RefTime::UNKNOWN,
            rate: 1.0,
        };
        assert!(s.is_flush());
        assert!(!StreamSignal::EndOfStream.is_flush());
    }
}
