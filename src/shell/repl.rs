use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, info};

use crate::host::HostStore;
use crate::mirror::KeyValueMirror;
use crate::shell::command::Command;

/// Read commands line by line from `reader` until EOF or QUIT, writing
/// each reply to `writer`
pub async fn run<R, W, H>(reader: R, mut writer: W, mirror: &mut KeyValueMirror<H>) -> std::io::Result<()>
where
  R: AsyncBufRead + Unpin,
  W: AsyncWrite + Unpin,
  H: HostStore,
{
  let mut lines = reader.lines();

  loop {
    match lines.next_line().await {
      Ok(None) => {
        info!("Input closed");
        break;
      }
      Ok(Some(line)) => {
        let Some(cmd) = Command::parse(&line) else {
          continue;
        };
        info!("Received command: {:?}", cmd);

        let response = cmd.execute(mirror);
        writer.write_all(response.encode().as_bytes()).await?;
        writer.flush().await?;

        if cmd == Command::Quit {
          break;
        }
      }
      Err(e) => {
        error!("Error reading input: {}", e);
        return Err(e);
      }
    }
  }

  info!("Shell ended with {} entries in the mirror", mirror.len());
  Ok(())
}
