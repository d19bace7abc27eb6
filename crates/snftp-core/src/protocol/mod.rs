//! Protocol module: stream framing, the file metadata payload, and the
//! discovery datagram alphabet.

pub mod discovery;
pub mod framer;
pub mod metadata;

pub use discovery::{DiscoveryMessage, DISCOVERY_PORT, OFFLINE_BYTE, QUERY_BYTE};
pub use framer::{encode_frame, FrameDecoder, FramingError, LEN_PREFIX, MAX_FRAME_LEN};
pub use metadata::{FileMetadata, MetadataError, SIZE_FIELD_LEN};
