//! Chunked stream encryption.
//!
//! An unbounded byte sequence is encrypted chunk by chunk under a single
//! session. The session header carries the random nonce prefix; each chunk's
//! nonce folds a strictly increasing counter into the tail, and a one-byte
//! tag (Message or Final) is authenticated as associated data. Chunks must be
//! produced and consumed in order; a reordered or duplicated chunk fails
//! authentication because its counter no longer matches.
//!
//! A stream that ends without a Final chunk is a detectable error
//! ([`StreamDecryptError::Truncated`]), never a silently short result.

use crate::error::{CryptoError, StreamDecryptError};
use crate::exchange::{Nonce24, SymmetricKey};
use crate::symmetric::stretch;
use rand::RngCore;

/// Size of the session header in bytes.
pub const STREAM_HEADER_BYTES: usize = 16;

/// Tag byte for an ordinary chunk.
const TAG_MESSAGE: u8 = 0x01;

/// Tag byte for the terminal chunk.
const TAG_FINAL: u8 = 0x02;

/// One decrypted chunk pulled from a [`StreamDecryptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// An ordinary chunk of plaintext.
    Message(Vec<u8>),
    /// The terminal chunk; the stream is complete.
    Final,
}

/// Build the nonce for chunk `counter` of a session.
fn chunk_nonce(header: &[u8; STREAM_HEADER_BYTES], counter: u64) -> Nonce24 {
    let mut nonce = [0u8; 24];
    nonce[..STREAM_HEADER_BYTES].copy_from_slice(header);
    nonce[STREAM_HEADER_BYTES..].copy_from_slice(&counter.to_be_bytes());
    Nonce24::from_bytes(nonce)
}

/// Encrypts a sequence of chunks under one session.
pub struct StreamEncryptor {
    key: SymmetricKey,
    header: [u8; STREAM_HEADER_BYTES],
    counter: u64,
    finalized: bool,
}

impl StreamEncryptor {
    /// Start a new encryption session.
    ///
    /// The session [`header`](Self::header) must be transmitted alongside
    /// the encrypted chunks; the decryptor needs it to reconstruct the
    /// chunk nonces.
    pub fn new(password: &[u8]) -> Self {
        let mut header = [0u8; STREAM_HEADER_BYTES];
        rand::thread_rng().fill_bytes(&mut header);
        Self {
            key: stretch(password),
            header,
            counter: 0,
            finalized: false,
        }
    }

    /// The session header.
    pub fn header(&self) -> &[u8; STREAM_HEADER_BYTES] {
        &self.header
    }

    /// Encrypt the next chunk.
    pub fn push(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if self.finalized {
            return Err(CryptoError::StreamEncrypt(
                "stream already finalized".into(),
            ));
        }
        self.push_tagged(plaintext, TAG_MESSAGE)
    }

    /// Finish the session, producing the terminal chunk.
    pub fn finalize(mut self) -> Result<Vec<u8>, CryptoError> {
        self.finalized = true;
        self.push_tagged(&[], TAG_FINAL)
    }

    fn push_tagged(&mut self, plaintext: &[u8], tag: u8) -> Result<Vec<u8>, CryptoError> {
        let nonce = chunk_nonce(&self.header, self.counter);
        self.counter += 1;

        let ciphertext = self.key.encrypt_with_aad(plaintext, &nonce, &[tag])?;

        let mut chunk = Vec::with_capacity(1 + ciphertext.len());
        chunk.push(tag);
        chunk.extend_from_slice(&ciphertext);
        Ok(chunk)
    }
}

/// Decrypts a sequence of chunks produced by [`StreamEncryptor`].
pub struct StreamDecryptor {
    key: SymmetricKey,
    header: [u8; STREAM_HEADER_BYTES],
    counter: u64,
    finished: bool,
}

impl StreamDecryptor {
    /// Start a decryption session from a header.
    pub fn new(header: &[u8; STREAM_HEADER_BYTES], password: &[u8]) -> Self {
        Self {
            key: stretch(password),
            header: *header,
            counter: 0,
            finished: false,
        }
    }

    /// Decrypt the next chunk.
    pub fn pull(&mut self, chunk: &[u8]) -> Result<StreamChunk, CryptoError> {
        if self.finished {
            return Err(StreamDecryptError::AfterFinal.into());
        }

        let (&tag, ciphertext) = chunk
            .split_first()
            .ok_or(StreamDecryptError::TooShort)?;

        if tag != TAG_MESSAGE && tag != TAG_FINAL {
            return Err(StreamDecryptError::UnknownTag(tag).into());
        }

        let nonce = chunk_nonce(&self.header, self.counter);
        let plaintext = self
            .key
            .decrypt_with_aad(ciphertext, &nonce, &[tag])
            .map_err(|_| StreamDecryptError::BadChunk)?;
        self.counter += 1;

        if tag == TAG_FINAL {
            self.finished = true;
            Ok(StreamChunk::Final)
        } else {
            Ok(StreamChunk::Message(plaintext))
        }
    }

    /// Whether the Final chunk has been consumed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Encrypt an entire chunk sequence at once.
///
/// Returns the session header and the encrypted chunks (including the
/// terminal chunk).
pub fn encrypt_bytes_stream<I>(
    chunks: I,
    password: &[u8],
) -> Result<([u8; STREAM_HEADER_BYTES], Vec<Vec<u8>>), CryptoError>
where
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    let mut encryptor = StreamEncryptor::new(password);
    let header = *encryptor.header();

    let mut out = Vec::new();
    for chunk in chunks {
        out.push(encryptor.push(chunk.as_ref())?);
    }
    out.push(encryptor.finalize()?);

    Ok((header, out))
}

/// Decrypt an entire chunk sequence at once.
///
/// Fails with [`StreamDecryptError::Truncated`] if the input ends before the
/// terminal chunk.
pub fn decrypt_bytes_stream<I>(
    header: &[u8; STREAM_HEADER_BYTES],
    chunks: I,
    password: &[u8],
) -> Result<Vec<Vec<u8>>, CryptoError>
where
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    let mut decryptor = StreamDecryptor::new(header, password);

    let mut out = Vec::new();
    for chunk in chunks {
        match decryptor.pull(chunk.as_ref())? {
            StreamChunk::Message(plaintext) => out.push(plaintext),
            StreamChunk::Final => break,
        }
    }

    if !decryptor.is_finished() {
        return Err(StreamDecryptError::Truncated.into());
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_roundtrip() {
        let chunks = vec![b"first chunk".to_vec(), b"second".to_vec(), b"".to_vec()];
        let (header, encrypted) = encrypt_bytes_stream(&chunks, b"password").unwrap();

        // All chunks plus the terminal chunk.
        assert_eq!(encrypted.len(), chunks.len() + 1);

        let decrypted = decrypt_bytes_stream(&header, &encrypted, b"password").unwrap();
        assert_eq!(decrypted, chunks);
    }

    #[test]
    fn test_stream_empty() {
        let chunks: Vec<Vec<u8>> = vec![];
        let (header, encrypted) = encrypt_bytes_stream(&chunks, b"password").unwrap();
        let decrypted = decrypt_bytes_stream(&header, &encrypted, b"password").unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_stream_wrong_password_fails() {
        let chunks = vec![b"data".to_vec()];
        let (header, encrypted) = encrypt_bytes_stream(&chunks, b"right").unwrap();

        let result = decrypt_bytes_stream(&header, &encrypted, b"wrong");
        assert!(matches!(
            result,
            Err(CryptoError::StreamDecrypt(StreamDecryptError::BadChunk))
        ));
    }

    #[test]
    fn test_stream_truncation_detected() {
        let chunks = vec![b"one".to_vec(), b"two".to_vec()];
        let (header, mut encrypted) = encrypt_bytes_stream(&chunks, b"password").unwrap();

        // Drop the terminal chunk.
        encrypted.pop();

        let result = decrypt_bytes_stream(&header, &encrypted, b"password");
        assert!(matches!(
            result,
            Err(CryptoError::StreamDecrypt(StreamDecryptError::Truncated))
        ));
    }

    #[test]
    fn test_stream_tamper_detected() {
        let chunks = vec![b"sensitive data".to_vec()];
        let (header, mut encrypted) = encrypt_bytes_stream(&chunks, b"password").unwrap();

        // Flip a bit in the first chunk's ciphertext.
        encrypted[0][5] ^= 0x01;

        let result = decrypt_bytes_stream(&header, &encrypted, b"password");
        assert!(matches!(
            result,
            Err(CryptoError::StreamDecrypt(StreamDecryptError::BadChunk))
        ));
    }

    #[test]
    fn test_stream_unknown_tag_rejected() {
        let chunks = vec![b"data".to_vec()];
        let (header, mut encrypted) = encrypt_bytes_stream(&chunks, b"password").unwrap();

        encrypted[0][0] = 0x7f;

        let result = decrypt_bytes_stream(&header, &encrypted, b"password");
        assert!(matches!(
            result,
            Err(CryptoError::StreamDecrypt(StreamDecryptError::UnknownTag(0x7f)))
        ));
    }

    #[test]
    fn test_stream_reorder_detected() {
        let chunks = vec![b"one".to_vec(), b"two".to_vec()];
        let (header, mut encrypted) = encrypt_bytes_stream(&chunks, b"password").unwrap();

        encrypted.swap(0, 1);

        // The swapped chunk's counter no longer matches its nonce.
        let result = decrypt_bytes_stream(&header, &encrypted, b"password");
        assert!(matches!(
            result,
            Err(CryptoError::StreamDecrypt(StreamDecryptError::BadChunk))
        ));
    }

    #[test]
    fn test_push_after_finalize_fails() {
        let mut encryptor = StreamEncryptor::new(b"password");
        encryptor.push(b"chunk").unwrap();

        // finalize consumes the encryptor, so misuse is mostly prevented by
        // the type system; the flag guards the incremental path.
        let chunk_after = {
            let mut enc2 = StreamEncryptor::new(b"password");
            enc2.finalized = true;
            enc2.push(b"late")
        };
        assert!(matches!(chunk_after, Err(CryptoError::StreamEncrypt(_))));
    }
}
