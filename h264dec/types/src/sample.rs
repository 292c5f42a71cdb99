/*!
    Compressed input sample type.
*/

use crate::RefTime;

/**
    Kind of data a sample carries.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleStream {
    /// Compressed media data
    Media,
    /// Out-of-band control data, passed through untouched
    Control,
}

/**
    A compressed media sample delivered by the upstream filter.

    `data` may be longer than `actual_len`; the region after the payload is
    scratch space used for the codec's read-ahead padding.
*/
#[derive(Clone, Debug)]
pub struct MediaSample {
    /// Sample buffer (payload followed by scratch space).
    pub data: Vec<u8>,
    /// Number of valid payload bytes at the start of `data`.
    pub actual_len: usize,
    /// Presentation start time.
    pub start: RefTime,
    /// Presentation stop time, possibly [`RefTime::UNKNOWN`].
    pub stop: RefTime,
    /// Kind of data.
    pub stream: SampleStream,
    /// Whether this sample starts a decodable point.
    pub is_sync_point: bool,
}

impl MediaSample {
    /**
        Create a media sample whose whole buffer is payload.
    */
    pub fn new(data: Vec<u8>, start: RefTime, stop: RefTime) -> Self {
        let actual_len = data.len();
        Self {
            data,
            actual_len,
            start,
            stop,
            stream: SampleStream::Media,
            is_sync_point: false,
        }
    }

    /**
        Create a control sample.
    */
    pub fn control(data: Vec<u8>) -> Self {
        Self {
            stream: SampleStream::Control,
            ..Self::new(data, RefTime(0), RefTime::UNKNOWN)
        }
    }

    /**
        The valid payload bytes.
    */
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.actual_len.min(self.data.len())]
    }

    /**
        Returns true if this sample carries media data.
    */
    pub fn is_media(&self) -> bool {
        self.stream == SampleStream::Media
    }

    /**
        Zero `padding` bytes after the payload, growing the buffer when it is
        too small to hold them.

        Returns true if the buffer had to grow.
    */
    pub fn zero_padding(&mut self, padding: usize) -> bool {
        let len = self.actual_len.min(self.data.len());
        let needed = len + padding;
        let grew = self.data.len() < needed;
        if grew {
            self.data.resize(needed, 0);
        }
        self.data[len..needed].fill(0);
        grew
    }
}

static_assertions::assert_impl_all!(MediaSample: Send, Sync);
