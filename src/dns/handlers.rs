use crate::clock::SharedClock;
use crate::dns::tsig::TsigKey;
use crate::dns::{query, update, Response, Zone};
use crate::error::Error;
use crate::txt_store::DynTxtStore;
use std::sync::Arc;
use trust_dns_proto::op::{Header, Message, MessageType, OpCode, ResponseCode};
use trust_dns_proto::serialize::binary::{BinDecodable, BinDecoder};

/// Turns one wire request into at most one wire response.
///
/// Cloning is cheap; every transport task holds its own clone and they all share one
/// [`DynTxtStore`].
#[derive(Clone)]
pub struct Handler {
    zone: Arc<Zone>,
    tsig_key: Arc<TsigKey>,
    txt_store: DynTxtStore,
    clock: SharedClock,
}

impl Handler {
    #[must_use]
    pub fn new(zone: Zone, tsig_key: TsigKey, txt_store: DynTxtStore, clock: SharedClock) -> Self {
        Handler {
            zone: Arc::new(zone),
            tsig_key: Arc::new(tsig_key),
            txt_store,
            clock,
        }
    }

    /// Handle a wire request. Returns `None` when nothing should be sent back, e.g. for
    /// messages that are themselves responses or whose header can't be read.
    #[must_use]
    pub fn handle(&self, request: &[u8]) -> Option<Vec<u8>> {
        let message = match Message::from_vec(request) {
            Ok(message) => message,
            Err(err) => return self.handle_undecodable(request, &err),
        };

        if message.message_type() != MessageType::Query {
            tracing::debug!("ignoring response message {}", message.id());
            return None;
        }

        let response = self.dispatch_request(&message, request);
        self.encode_or_servfail(message.id(), message.op_code(), response)
    }

    fn dispatch_request(&self, request: &Message, raw: &[u8]) -> Response {
        match request.op_code() {
            OpCode::Query => {
                Response::unsigned(query::respond(&self.zone, self.txt_store.as_ref(), request))
            }
            OpCode::Update => update::process(
                &self.zone,
                &self.tsig_key,
                self.txt_store.as_ref(),
                request,
                raw,
                self.clock.now(),
            ),
            op_code => {
                tracing::debug!("unsupported opcode {op_code:?} in {}", request.id());
                Response::unsigned(Message::error_msg(
                    request.id(),
                    op_code,
                    ResponseCode::NotImp,
                ))
            }
        }
    }

    fn encode_or_servfail(
        &self,
        id: u16,
        op_code: OpCode,
        response: Response,
    ) -> Option<Vec<u8>> {
        match self.encode(response) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                tracing::error!("error encoding response to {id}: {err:?}");
                Message::error_msg(id, op_code, ResponseCode::ServFail)
                    .to_vec()
                    .ok()
            }
        }
    }

    fn encode(&self, response: Response) -> Result<Vec<u8>, Error> {
        let bytes = response.message.to_vec()?;
        match response.request_mac {
            None => Ok(bytes),
            Some(request_mac) => self
                .tsig_key
                .sign(bytes, Some(&request_mac), self.clock.now())
                .map_err(Error::from),
        }
    }

    /// A request that didn't fully decode. Updates whose only problem is a class value the codec
    /// can't represent are still processed; anything else with a readable header is FORMERR.
    fn handle_undecodable(
        &self,
        request: &[u8],
        err: &trust_dns_proto::error::ProtoError,
    ) -> Option<Vec<u8>> {
        let Ok(header) = Header::read(&mut BinDecoder::new(request)) else {
            tracing::debug!("dropping undecodable message: {err}");
            return None;
        };
        if header.message_type() != MessageType::Query {
            return None;
        }

        if header.op_code() == OpCode::Update {
            let response = update::process_undecodable(
                &self.zone,
                &self.tsig_key,
                self.txt_store.as_ref(),
                request,
                self.clock.now(),
            );
            if let Some(response) = response {
                return self.encode_or_servfail(header.id(), header.op_code(), response);
            }
        }

        tracing::debug!("malformed message {}: {err}", header.id());
        Message::error_msg(header.id(), header.op_code(), ResponseCode::FormErr)
            .to_vec()
            .ok()
    }
}
