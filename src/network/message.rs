use serde::Deserialize;
use serde::Serialize;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio_serde::formats::Bincode;
use tokio_serde::formats::SymmetricalBincode;
use tokio_serde::SymmetricallyFramed;
use tokio_util::codec::Framed;
use tokio_util::codec::LengthDelimitedCodec;

use crate::gossip::traits::SynAck;
use crate::models::peer::Peer;
use crate::models::peer::PeerDigest;

/// Largest frame accepted from or sent to a peer.
pub const MAX_GOSSIP_FRAME_LENGTH_IN_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum GossipMessage {
    /// Digests of every peer the sender knows.
    Syn(Vec<PeerDigest>),
    SynAck(SynAck),

    /// Full records the receiver asked for in its [`SynAck`].
    Ack(Vec<Peer>),
    AckReceived,
}

impl GossipMessage {
    pub fn get_type(&self) -> String {
        match self {
            GossipMessage::Syn(_) => "syn",
            GossipMessage::SynAck(_) => "syn ack",
            GossipMessage::Ack(_) => "ack",
            GossipMessage::AckReceived => "ack received",
        }
        .to_string()
    }
}

pub type GossipFramed<S> = SymmetricallyFramed<
    Framed<S, LengthDelimitedCodec>,
    GossipMessage,
    Bincode<GossipMessage, GossipMessage>,
>;

/// Use this function to ensure that the same rules apply for both
/// ingoing and outgoing connections.
pub fn get_codec_rules() -> LengthDelimitedCodec {
    let mut codec_rules = LengthDelimitedCodec::new();
    codec_rules.set_max_frame_length(MAX_GOSSIP_FRAME_LENGTH_IN_BYTES);
    codec_rules
}

pub fn frame<S>(stream: S) -> GossipFramed<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let length_delimited = Framed::new(stream, get_codec_rules());
    SymmetricallyFramed::new(length_delimited, SymmetricalBincode::default())
}
