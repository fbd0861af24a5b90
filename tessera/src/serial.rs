use prost::Message;
use tessera_core::state::Grid;
use std::io::{Read, Write};
use crate::error::UpdateError;
use flate2::{Compression, read::ZlibDecoder, write::ZlibEncoder};

///
/// A grid ready for upload: zlib-compressed protobuf plus the Castagnoli
/// checksum the uploader records against the object.
///
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub crc32c: u32,
}

///
/// The canonical wire form: protobuf, zlib at the default level, CRC32C over
/// the compressed payload.
///
pub fn serialize(grid: &Grid) -> Result<Encoded, std::io::Error> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&grid.encode_to_vec())?;
    let bytes = encoder.finish()?;

    let crc32c = crc32c::crc32c(&bytes);
    Ok(Encoded { bytes, crc32c })
}

///
/// Inverse of serialize, used to verify what was written and by the tests.
///
pub fn deserialize(bytes: &[u8]) -> Result<Grid, UpdateError> {
    let mut inflated = Vec::new();
    ZlibDecoder::new(bytes).read_to_end(&mut inflated)?;

    Grid::decode(inflated.as_slice()).map_err(|source| UpdateError::DecodeGrid { source })
}
