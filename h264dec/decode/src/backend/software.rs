use h264dec_types::{DecoderId, Error, Result, Subtype};

use crate::backend::{BackendKind, DecodeStatus, DecoderBackend, complete};
use crate::buffer::OutputBuffer;
use crate::codec::{BitstreamContext, DecodeTarget, SampleTimes};

/**
    Host-memory decoding through the codec library.

    The codec reconstructs pictures in display order itself, so this backend
    never holds frames.
*/
#[derive(Debug, Default)]
pub struct SoftwareBackend;

impl SoftwareBackend {
    pub fn new() -> Self {
        Self
    }
}

impl DecoderBackend for SoftwareBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn decoder_id(&self) -> Option<DecoderId> {
        None
    }

    fn accepts_output(&self, subtype: Subtype) -> bool {
        subtype.is_planar_420() || subtype == Subtype::Yuy2
    }

    fn decode(
        &mut self,
        ctx: &mut dyn BitstreamContext,
        input: &[u8],
        times: SampleTimes,
        out: &mut OutputBuffer,
    ) -> Result<DecodeStatus> {
        let Some(host) = out.host_mut() else {
            return Err(Error::unexpected(
                "software decoding needs a host memory buffer",
            ));
        };
        let len = host.len();
        let status = ctx.decode(input, DecodeTarget::Host(host.as_mut_slice()))?;
        let (status, picture) = complete(status, times, out);
        if picture.is_some() {
            out.actual_len = len;
        }
        Ok(status)
    }

    fn flush(&mut self) {}
}
