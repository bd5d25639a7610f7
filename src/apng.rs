//! Rewrites the play count of an animated PNG so that it loops forever.
//!
//! The store serves APNGs that play a fixed number of times. The count lives
//! in the `acTL` chunk as a big-endian `num_plays` field, right after
//! `num_frames`, and a value of zero means "repeat indefinitely".
//!
//! The chunk CRC is left as it was. Browsers and `apng2gif` accept the
//! mismatch for this chunk.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use fs_err::OpenOptions;
use thiserror::Error;

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const ANIMATION_CONTROL: [u8; 4] = *b"acTL";
const CRC_LEN: i64 = 4;
const NUM_FRAMES_LEN: i64 = 4;
const NUM_PLAYS_LEN: u64 = 4;

#[derive(Debug, Error)]
pub enum ApngError {
    #[error("not a PNG file")]
    InvalidFormat,

    #[error("no animation control chunk found")]
    ChunkNotFound,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Patches the stream in place so the animation loops forever. The stream
/// must be positioned at the start of the PNG signature.
///
/// Only the four bytes of `num_plays` are ever written, and only once an
/// `acTL` chunk has been found.
pub fn loop_forever<S>(stream: &mut S) -> Result<(), ApngError>
where
    S: Read + Write + Seek,
{
    let mut signature = [0; 8];
    match stream.read_exact(&mut signature) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(ApngError::InvalidFormat)
        }
        Err(err) => return Err(err.into()),
    }

    if signature != PNG_SIGNATURE {
        return Err(ApngError::InvalidFormat);
    }

    let chunks_start = stream.stream_position()?;
    let stream_len = stream.seek(SeekFrom::End(0))?;
    stream.seek(SeekFrom::Start(chunks_start))?;

    loop {
        let Some(length) = read_word(stream)? else {
            return Err(ApngError::ChunkNotFound);
        };
        let Some(chunk_type) = read_word(stream)? else {
            return Err(ApngError::ChunkNotFound);
        };

        if chunk_type == ANIMATION_CONTROL {
            // A file cut inside the chunk has no play count to patch, and
            // writing past the end would grow it.
            let num_plays_end =
                stream.stream_position()? + NUM_FRAMES_LEN as u64 + NUM_PLAYS_LEN;
            if num_plays_end > stream_len {
                return Err(ApngError::ChunkNotFound);
            }

            stream.seek(SeekFrom::Current(NUM_FRAMES_LEN))?;
            stream.write_all(&0u32.to_be_bytes())?;
            stream.flush()?;
            return Ok(());
        }

        let length = u32::from_be_bytes(length);
        log::trace!(
            "skipping {} chunk of {} bytes",
            String::from_utf8_lossy(&chunk_type),
            length
        );
        stream.seek(SeekFrom::Current(i64::from(length) + CRC_LEN))?;
    }
}

/// Opens the file at `path` and patches it with [`loop_forever`].
pub fn loop_file(path: &Path) -> Result<(), ApngError> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    loop_forever(&mut file)
}

/// Reads a four byte word, returning `None` if the stream ended first.
fn read_word<R: Read>(reader: &mut R) -> io::Result<Option<[u8; 4]>> {
    let mut word = [0; 4];
    match reader.read_exact(&mut word) {
        Ok(()) => Ok(Some(word)),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::io::Cursor;

    /// Appends a chunk with a fake CRC to `buffer`.
    fn push_chunk(buffer: &mut Vec<u8>, chunk_type: &[u8; 4], payload: &[u8]) {
        buffer.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buffer.extend_from_slice(chunk_type);
        buffer.extend_from_slice(payload);
        buffer.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    /// Builds a minimal APNG-shaped byte stream that plays `num_plays` times.
    pub(crate) fn sample_apng(num_plays: u32) -> Vec<u8> {
        let mut buffer = PNG_SIGNATURE.to_vec();
        push_chunk(&mut buffer, b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 6, 0, 0, 0]);

        let mut actl = 12u32.to_be_bytes().to_vec();
        actl.extend_from_slice(&num_plays.to_be_bytes());
        push_chunk(&mut buffer, b"acTL", &actl);

        push_chunk(&mut buffer, b"IDAT", &[1, 2, 3, 4, 5]);
        push_chunk(&mut buffer, b"IEND", &[]);
        buffer
    }

    fn still_png() -> Vec<u8> {
        let mut buffer = PNG_SIGNATURE.to_vec();
        push_chunk(&mut buffer, b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 6, 0, 0, 0]);
        push_chunk(&mut buffer, b"IDAT", &[9, 9, 9]);
        push_chunk(&mut buffer, b"IEND", &[]);
        buffer
    }

    /// Offset of `num_plays` in [`sample_apng`] output.
    const NUM_PLAYS_OFFSET: usize = 8 + (12 + 13) + 8 + 4;

    /// Wraps a cursor and counts calls that write at least one byte.
    struct WriteCounter {
        inner: Cursor<Vec<u8>>,
        writes: usize,
    }

    impl Read for WriteCounter {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl Write for WriteCounter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if !buf.is_empty() {
                self.writes += 1;
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    impl Seek for WriteCounter {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn zeroes_play_count_only() {
        let original = sample_apng(3);
        let mut cursor = Cursor::new(original.clone());

        loop_forever(&mut cursor).unwrap();
        let patched = cursor.into_inner();

        assert_eq!(patched.len(), original.len());
        assert_eq!(
            &patched[NUM_PLAYS_OFFSET..NUM_PLAYS_OFFSET + 4],
            &[0, 0, 0, 0]
        );
        assert_eq!(
            &patched[..NUM_PLAYS_OFFSET],
            &original[..NUM_PLAYS_OFFSET]
        );
        assert_eq!(
            &patched[NUM_PLAYS_OFFSET + 4..],
            &original[NUM_PLAYS_OFFSET + 4..]
        );
    }

    #[test]
    fn patching_twice_is_a_no_op() {
        let mut cursor = Cursor::new(sample_apng(1));
        loop_forever(&mut cursor).unwrap();
        let once = cursor.get_ref().clone();

        cursor.set_position(0);
        loop_forever(&mut cursor).unwrap();

        assert_eq!(cursor.into_inner(), once);
    }

    #[test]
    fn rejects_missing_signature() {
        let mut bytes = sample_apng(2);
        bytes[1] = b'J';

        let mut stream = WriteCounter {
            inner: Cursor::new(bytes.clone()),
            writes: 0,
        };

        let result = loop_forever(&mut stream);
        assert!(matches!(result, Err(ApngError::InvalidFormat)));
        assert_eq!(stream.writes, 0);
        assert_eq!(stream.inner.into_inner(), bytes);
    }

    #[test]
    fn rejects_truncated_signature() {
        let mut cursor = Cursor::new(vec![0x89, 0x50, 0x4E]);
        assert!(matches!(
            loop_forever(&mut cursor),
            Err(ApngError::InvalidFormat)
        ));
    }

    #[test]
    fn reports_missing_animation_control() {
        let bytes = still_png();
        let mut stream = WriteCounter {
            inner: Cursor::new(bytes.clone()),
            writes: 0,
        };

        let result = loop_forever(&mut stream);
        assert!(matches!(result, Err(ApngError::ChunkNotFound)));
        assert_eq!(stream.writes, 0);
        assert_eq!(stream.inner.into_inner(), bytes);
    }

    #[test]
    fn chunk_stream_cut_mid_header() {
        let mut bytes = still_png();
        bytes.truncate(8 + 2);

        let mut cursor = Cursor::new(bytes);
        assert!(matches!(
            loop_forever(&mut cursor),
            Err(ApngError::ChunkNotFound)
        ));
    }

    #[test]
    fn animation_control_cut_short_is_left_alone() {
        let mut bytes = sample_apng(3);
        // Keep the acTL header and num_frames, drop the rest.
        bytes.truncate(NUM_PLAYS_OFFSET);
        let mut stream = WriteCounter {
            inner: Cursor::new(bytes.clone()),
            writes: 0,
        };

        let result = loop_forever(&mut stream);
        assert!(matches!(result, Err(ApngError::ChunkNotFound)));
        assert_eq!(stream.writes, 0);
        assert_eq!(stream.inner.into_inner(), bytes);
    }

    #[test]
    fn patches_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.png");
        fs_err::write(&path, sample_apng(5)).unwrap();

        loop_file(&path).unwrap();

        let patched = fs_err::read(&path).unwrap();
        assert_eq!(
            &patched[NUM_PLAYS_OFFSET..NUM_PLAYS_OFFSET + 4],
            &[0, 0, 0, 0]
        );
    }
}
