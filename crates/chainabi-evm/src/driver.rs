//! Suspend/resume driver.
//!
//! A decode job is a pure function of its inputs and the responses
//! collected so far. [`Decoding::step`] runs it; when it suspends, the
//! caller fetches the requested bytes, hands them to [`Decoding::resume`],
//! and steps again. Responses are kept, so each request is made once and
//! requests come out in structural order.

use crate::decode::{DecodeFlow, Decoder, DecoderInfo, Interrupt, Responses};
use alloy_primitives::Bytes;
use chainabi_core::constants::WORD_SIZE;
use chainabi_core::{DecoderRequest, DecodingError, ResumeError, StopDecodingError};
use std::future::Future;
use tracing::{debug, warn};

/// Outcome of one [`Decoding::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeStep<T> {
    NeedsBytes(DecoderRequest),
    Done(Result<T, StopDecodingError>),
}

type Job<'a, T> = Box<dyn Fn(&Decoder<'_>) -> DecodeFlow<T> + 'a>;

pub struct Decoding<'a, T> {
    info: DecoderInfo<'a>,
    job: Job<'a, T>,
    responses: Responses,
    pending: Option<DecoderRequest>,
}

impl<'a, T> Decoding<'a, T> {
    pub fn new(info: DecoderInfo<'a>, job: impl Fn(&Decoder<'_>) -> DecodeFlow<T> + 'a) -> Self {
        Self { info, job: Box::new(job), responses: Responses::default(), pending: None }
    }

    /// Start from responses gathered elsewhere, such as a previous decode
    /// against the same chain state.
    pub fn with_responses(mut self, responses: Responses) -> Self {
        self.responses = responses;
        self
    }

    pub fn step(&mut self) -> DecodeStep<T> {
        let decoder = Decoder::new(self.info, &self.responses);
        match (self.job)(&decoder) {
            Ok(value) => {
                self.pending = None;
                DecodeStep::Done(Ok(value))
            }
            Err(Interrupt::Stop(stop)) => {
                self.pending = None;
                DecodeStep::Done(Err(stop))
            }
            Err(Interrupt::Suspend(request)) => {
                debug!(%request, "decode suspended");
                self.pending = Some(request.clone());
                DecodeStep::NeedsBytes(request)
            }
        }
    }

    pub fn pending(&self) -> Option<&DecoderRequest> {
        self.pending.as_ref()
    }

    pub fn responses(&self) -> &Responses {
        &self.responses
    }

    /// Answer the pending request.
    ///
    /// Storage words shorter than 32 bytes are left-padded.
    pub fn resume(&mut self, bytes: &[u8]) -> Result<(), ResumeError> {
        let request = self.pending.as_ref().ok_or(ResumeError::NothingPending)?;
        match request {
            DecoderRequest::Code { address } => {
                self.responses.code.insert(*address, Bytes::copy_from_slice(bytes));
            }
            DecoderRequest::Storage { slot } => {
                if bytes.len() > WORD_SIZE {
                    return Err(ResumeError::MalformedStorageWord { length: bytes.len() });
                }
                self.responses.storage.insert(*slot, crate::decode::to_word(bytes));
            }
        }
        self.pending = None;
        Ok(())
    }

    fn unexpected(request: &DecoderRequest, length: usize, err: &ResumeError) -> StopDecodingError {
        warn!(%request, length, error = %err, "rejected response");
        StopDecodingError::new(DecodingError::UnexpectedResponse {
            request: request.to_string(),
            length,
        })
    }

    /// Drive to completion, answering requests with `resolve`.
    pub fn run(
        mut self,
        mut resolve: impl FnMut(&DecoderRequest) -> Vec<u8>,
    ) -> Result<T, StopDecodingError> {
        loop {
            match self.step() {
                DecodeStep::Done(result) => return result,
                DecodeStep::NeedsBytes(request) => {
                    let bytes = resolve(&request);
                    if let Err(err) = self.resume(&bytes) {
                        return Err(Self::unexpected(&request, bytes.len(), &err));
                    }
                }
            }
        }
    }

    /// [`Decoding::run`] with an asynchronous resolver.
    pub async fn run_async<F, Fut>(mut self, mut resolve: F) -> Result<T, StopDecodingError>
    where
        F: FnMut(DecoderRequest) -> Fut,
        Fut: Future<Output = Vec<u8>>,
    {
        loop {
            match self.step() {
                DecodeStep::Done(result) => return result,
                DecodeStep::NeedsBytes(request) => {
                    let bytes = resolve(request.clone()).await;
                    if let Err(err) = self.resume(&bytes) {
                        return Err(Self::unexpected(&request, bytes.len(), &err));
                    }
                }
            }
        }
    }
}
