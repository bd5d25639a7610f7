//! Writes response bodies to disk without leaving half-written files behind.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use futures::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;

/// Streams `body` into `dest`, replacing any file already there.
///
/// Chunks are written to a `.part` file next to `dest`, which is renamed
/// into place once the body is complete. If the body or a write fails, or
/// the returned future is dropped before it finishes, the partial file is
/// removed and `dest` is left untouched.
pub async fn save_stream<S, B>(body: S, dest: &Path) -> io::Result<u64>
where
    S: Stream<Item = io::Result<B>>,
    B: AsRef<[u8]>,
{
    let mut partial = PartialFile::new(partial_path(dest));

    let written = write_body(body, &partial.path).await?;
    fs_err::tokio::rename(&partial.path, dest).await?;
    partial.renamed = true;

    Ok(written)
}

/// Removes the file at `path` when dropped, unless it was renamed into place.
struct PartialFile {
    path: PathBuf,
    renamed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            renamed: false,
        }
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.renamed {
            return;
        }

        if let Err(err) = fs_err::remove_file(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                log::debug!("could not remove partial download: {err}");
            }
        }
    }
}

async fn write_body<S, B>(body: S, path: &Path) -> io::Result<u64>
where
    S: Stream<Item = io::Result<B>>,
    B: AsRef<[u8]>,
{
    let file = fs_err::tokio::File::create(path).await?;
    let mut writer = tokio::io::BufWriter::new(file);
    let mut body = std::pin::pin!(body);
    let mut written = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        let chunk = chunk.as_ref();
        writer.write_all(chunk).await?;
        written += chunk.len() as u64;
    }

    writer.flush().await?;
    Ok(written)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| OsString::from("download"));
    name.push(".part");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures::stream;

    fn chunks(
        parts: Vec<io::Result<&'static [u8]>>,
    ) -> impl Stream<Item = io::Result<&'static [u8]>> {
        stream::iter(parts)
    }

    fn ok(bytes: &'static [u8]) -> io::Result<&'static [u8]> {
        Ok(bytes)
    }

    #[tokio::test]
    async fn writes_every_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("1.png");

        let written = save_stream(chunks(vec![ok(b"abc"), ok(b""), ok(b"de")]), &dest)
            .await
            .unwrap();

        assert_eq!(written, 5);
        assert_eq!(fs_err::read(&dest).unwrap(), b"abcde");
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("1.png");
        fs_err::write(&dest, b"an older and longer download").unwrap();

        save_stream(chunks(vec![ok(b"new")]), &dest).await.unwrap();

        assert_eq!(fs_err::read(&dest).unwrap(), b"new");
    }

    #[tokio::test]
    async fn failed_body_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("2.png");

        let body = chunks(vec![
            ok(b"first half"),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ]);

        let err = save_stream(body, &dest).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn interrupted_download_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("3.png");
        let partial = partial_path(&dest);

        // The body never ends, like a stalled connection.
        let body = chunks(vec![ok(b"some frames")]).chain(stream::pending());
        let mut download = Box::pin(save_stream(body, &dest));

        // File creation runs on the blocking pool, so give it a moment.
        for _ in 0..200 {
            assert!(futures::poll!(download.as_mut()).is_pending());
            if partial.exists() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(partial.exists());

        drop(download);
        assert!(!partial.exists());
        assert!(!dest.exists());
    }

    #[test]
    fn partial_file_sits_next_to_destination() {
        let dest = Path::new("out/APNG/12.png");
        assert_eq!(partial_path(dest), Path::new("out/APNG/12.png.part"));
    }
}
