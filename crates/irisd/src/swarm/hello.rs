//! Hello exchange — the first bytes on every connection.

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use iris_core::wire::{Hello, HELLO_HEADER_LEN};
use iris_core::PeerIdentity;

/// Send our hello and read the peer's.
///
/// Both sides write first, so neither waits on the other. Reads exactly
/// the hello and nothing more; chat bytes that follow stay in the stream.
pub async fn exchange<S>(stream: &mut S, ours: &Hello) -> Result<Hello>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let bytes = ours.encode().context("encode hello")?;
    stream.write_all(&bytes).await.context("send hello")?;
    stream.flush().await.context("flush hello")?;

    let mut header = [0u8; HELLO_HEADER_LEN];
    stream
        .read_exact(&mut header)
        .await
        .context("read hello header")?;
    let (topic, id_len) = Hello::decode_header(&header)?;

    let mut identity = vec![0u8; id_len];
    stream
        .read_exact(&mut identity)
        .await
        .context("read hello identity")?;

    Ok(Hello::new(topic, PeerIdentity::from_bytes(identity)))
}
