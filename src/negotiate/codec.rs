//! Wire codec for relational sync opinions.
//!
//! Layout: magic string, u32 codec version, u32 entry count, pad to 8; then
//! per entry the table name string, u32 permit flag, u32 convert flag, pad
//! to 8. Only the two flags a peer acts on travel; `check_on_receive` is a
//! local concern and stays home.

use tracing::error;

use crate::errors::CodecError;

use super::parcel::{eight_byte_align, string_len, ParcelReader, ParcelWriter, U32_LEN};
use super::{RelationalSyncOpinion, SyncOpinion};

const MAGIC: &str = "relational_opinion";
const SYNC_OPINION_VERSION: u32 = 1;

/// Entries beyond this are a malformed or hostile message.
const MAX_OPINION_SIZE: u32 = 1024;

/// Exact wire length of a serialized opinion map.
pub fn calculate_parcel_len(opinions: &RelationalSyncOpinion) -> usize {
    let mut len = string_len(MAGIC) + U32_LEN + U32_LEN;
    len = eight_byte_align(len);
    for table_name in opinions.keys() {
        len += string_len(table_name) + U32_LEN + U32_LEN;
        len = eight_byte_align(len);
    }
    len
}

/// Serializes an opinion map for transfer.
pub fn serialize_data(opinions: &RelationalSyncOpinion) -> Result<Vec<u8>, CodecError> {
    if opinions.len() > MAX_OPINION_SIZE as usize {
        error!(count = opinions.len(), "too many opinions to serialize");
        return Err(CodecError::InvalidArgs(format!(
            "opinion count {} over limit",
            opinions.len()
        )));
    }
    let mut writer = ParcelWriter::with_capacity(calculate_parcel_len(opinions));
    writer.write_string(MAGIC)?;
    writer.write_u32(SYNC_OPINION_VERSION);
    writer.write_u32(opinions.len() as u32);
    writer.eight_byte_align();
    for (table_name, opinion) in opinions {
        writer.write_string(table_name)?;
        writer.write_u32(opinion.permit_sync as u32);
        writer.write_u32(opinion.require_peer_convert as u32);
        writer.eight_byte_align();
    }
    Ok(writer.into_bytes())
}

/// Deserializes an opinion map received from a peer.
pub fn deserialize_data(buf: &[u8]) -> Result<RelationalSyncOpinion, CodecError> {
    let mut reader = ParcelReader::new(buf);
    let magic = reader.read_string()?;
    if magic != MAGIC {
        error!(magic = %magic, "bad opinion magic");
        return Err(CodecError::InvalidArgs(format!("bad magic '{}'", magic)));
    }
    let version = reader.read_u32()?;
    if version != SYNC_OPINION_VERSION {
        error!(version, "unsupported opinion codec version");
        return Err(CodecError::NotSupport(version));
    }
    let count = reader.read_u32()?;
    reader.eight_byte_align()?;
    if count > MAX_OPINION_SIZE {
        error!(count, "opinion count over limit");
        return Err(CodecError::InvalidArgs(format!(
            "opinion count {} over limit",
            count
        )));
    }
    let mut opinions = RelationalSyncOpinion::new();
    for _ in 0..count {
        let table_name = reader.read_string()?;
        let permit_sync = reader.read_u32()? != 0;
        let require_peer_convert = reader.read_u32()? != 0;
        reader.eight_byte_align()?;
        opinions.insert(
            table_name,
            SyncOpinion {
                permit_sync,
                require_peer_convert,
                check_on_receive: false,
            },
        );
    }
    Ok(opinions)
}
