use crate::error::{CodecError, CodecResult};

/// Reject envelopes claiming more files than this (§4.2 "Parsing").
pub const MAX_FILE_COUNT: usize = 10_000;

/// One still-encrypted file entry as it appears on the wire.
pub struct EncryptedFileEntry {
    pub name: String,
    pub nonce: [u8; sanctuary_crypto::NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

/// `[headerLen][headerJSON][fileCount]` then `fileCount` repeats of
/// `[nameLen][name][dataLen][encryptedFile]`, all lengths little-endian u32.
pub fn encode_frame(header_json: &[u8], files: &[EncryptedFileEntry]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(header_json.len() as u32).to_le_bytes());
    out.extend_from_slice(header_json);
    out.extend_from_slice(&(files.len() as u32).to_le_bytes());

    for file in files {
        out.extend_from_slice(&(file.name.len() as u32).to_le_bytes());
        out.extend_from_slice(file.name.as_bytes());

        let mut encrypted = Vec::with_capacity(file.nonce.len() + file.ciphertext.len());
        encrypted.extend_from_slice(&file.nonce);
        encrypted.extend_from_slice(&file.ciphertext);

        out.extend_from_slice(&(encrypted.len() as u32).to_le_bytes());
        out.extend_from_slice(&encrypted);
    }

    out
}

/// Bounds-checked cursor over the envelope bytes. Every read validates the
/// claimed length against the remaining buffer before slicing — a malformed
/// length field always yields `BackupCorrupted`, never a read past the end.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn read_u32(&mut self) -> CodecResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn take(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or_else(|| CodecError::BackupCorrupted("length overflow".to_string()))?;
        if end > self.buf.len() {
            return Err(CodecError::BackupCorrupted(
                "length field exceeds remaining buffer".to_string(),
            ));
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_len_prefixed(&mut self) -> CodecResult<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.take(len)
    }
}

pub fn decode_frame(bytes: &[u8]) -> CodecResult<(Vec<u8>, Vec<EncryptedFileEntry>)> {
    let mut cursor = Cursor::new(bytes);

    let header_json = cursor.take_len_prefixed()?.to_vec();
    let file_count = cursor.read_u32()? as usize;
    if file_count > MAX_FILE_COUNT {
        return Err(CodecError::FileCountExceeded(file_count, MAX_FILE_COUNT));
    }

    let mut files = Vec::with_capacity(file_count);
    for _ in 0..file_count {
        let name_bytes = cursor.take_len_prefixed()?;
        let name = String::from_utf8(name_bytes.to_vec())
            .map_err(|_| CodecError::BackupCorrupted("file name not valid utf-8".to_string()))?;

        let encrypted = cursor.take_len_prefixed()?;
        if encrypted.len() < sanctuary_crypto::NONCE_LEN {
            return Err(CodecError::BackupCorrupted(
                "encrypted file entry shorter than nonce".to_string(),
            ));
        }
        let mut nonce = [0u8; sanctuary_crypto::NONCE_LEN];
        nonce.copy_from_slice(&encrypted[..sanctuary_crypto::NONCE_LEN]);
        let ciphertext = encrypted[sanctuary_crypto::NONCE_LEN..].to_vec();

        files.push(EncryptedFileEntry {
            name,
            nonce,
            ciphertext,
        });
    }

    Ok((header_json, files))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_header_length_is_corrupted_not_panic() {
        let bytes = [0xff, 0xff, 0xff, 0xff]; // claims a 4GB header, buffer is 4 bytes
        let err = decode_frame(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::BackupCorrupted(_)));
    }

    #[test]
    fn empty_buffer_is_corrupted() {
        let err = decode_frame(&[]).unwrap_err();
        assert!(matches!(err, CodecError::BackupCorrupted(_)));
    }

    #[test]
    fn excessive_file_count_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0u32.to_le_bytes()); // empty header
        bytes.extend_from_slice(&(MAX_FILE_COUNT as u32 + 1).to_le_bytes());
        let err = decode_frame(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::FileCountExceeded(_, _)));
    }

    #[test]
    fn round_trip_empty_files() {
        let header = b"{}".to_vec();
        let bytes = encode_frame(&header, &[]);
        let (decoded_header, files) = decode_frame(&bytes).unwrap();
        assert_eq!(decoded_header, header);
        assert!(files.is_empty());
    }
}
