use crate::model::{CommandLine, JobEvent, Stream};
use anyhow::{Context, Result};
use log::debug;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("failed to start `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}")]
    Failed { command: String, status: ExitStatus },
}

/// Copy one child pipe line by line into `log` and the event channel.
///
/// The log receives the raw bytes; events carry a lossy UTF-8 rendering.
async fn pump<R>(
    pipe: R,
    stream: Stream,
    log: &Path,
    event_tx: mpsc::UnboundedSender<JobEvent>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut file = tokio::fs::File::create(log)
        .await
        .with_context(|| format!("create {}", log.display()))?;
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        file.write_all(&buf).await?;
        let raw = buf.strip_suffix(b"\n").unwrap_or(&buf);
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = String::from_utf8_lossy(raw).into_owned();
        let _ = event_tx.send(JobEvent::Output { stream, line });
    }
    file.flush().await?;
    Ok(())
}

/// Run `cmd` in `cwd` and wait for it to exit.
///
/// stdout and stderr are captured into `stdout_log` and `stderr_log` while
/// the process runs. A non-zero exit is returned as [`JobError::Failed`].
pub async fn run_job(
    cmd: &CommandLine,
    cwd: &Path,
    stdout_log: &Path,
    stderr_log: &Path,
    event_tx: &mpsc::UnboundedSender<JobEvent>,
) -> Result<ExitStatus> {
    let rendered = cmd.to_string();
    debug!("running `{rendered}` in {}", cwd.display());

    let mut child = tokio::process::Command::new(&cmd.executable)
        .arg(&cmd.script)
        .args(&cmd.args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| JobError::Spawn {
            command: rendered.clone(),
            source,
        })?;

    let stdout = child.stdout.take().context("child stdout not captured")?;
    let stderr = child.stderr.take().context("child stderr not captured")?;

    // Both pipes are drained concurrently so neither can fill up and stall the child.
    let (out_res, err_res) = tokio::join!(
        pump(stdout, Stream::Stdout, stdout_log, event_tx.clone()),
        pump(stderr, Stream::Stderr, stderr_log, event_tx.clone()),
    );
    let status = child.wait().await.context("wait for external program")?;
    out_res?;
    err_res?;

    if !status.success() {
        return Err(JobError::Failed {
            command: rendered,
            status,
        }
        .into());
    }
    Ok(status)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandLine {
        CommandLine {
            executable: "sh".into(),
            script: "-c".into(),
            args: vec![script.into()],
        }
    }

    #[tokio::test]
    async fn captures_both_streams() {
        let dir = tempfile::tempdir().unwrap();
        let (out, err) = (dir.path().join("o"), dir.path().join("e"));
        let (tx, mut rx) = mpsc::unbounded_channel();

        run_job(&sh("echo hello; echo oops >&2; pwd"), dir.path(), &out, &err, &tx)
            .await
            .unwrap();
        drop(tx);

        let stdout = std::fs::read_to_string(&out).unwrap();
        assert!(stdout.starts_with("hello\n"));
        assert_eq!(std::fs::read_to_string(&err).unwrap(), "oops\n");

        let mut lines = Vec::new();
        while let Some(JobEvent::Output { line, .. }) = rx.recv().await {
            lines.push(line);
        }
        assert_eq!(lines.len(), 3);
    }

    #[tokio::test]
    async fn non_zero_exit_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = run_job(
            &sh("echo partial; exit 3"),
            dir.path(),
            &dir.path().join("o"),
            &dir.path().join("e"),
            &tx,
        )
        .await
        .unwrap_err();
        let job = err.downcast_ref::<JobError>().unwrap();
        assert!(matches!(job, JobError::Failed { status, .. } if status.code() == Some(3)));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("o")).unwrap(),
            "partial\n"
        );
    }

    #[tokio::test]
    async fn invalid_utf8_output_is_kept_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let (out, err) = (dir.path().join("o"), dir.path().join("e"));
        let (tx, mut rx) = mpsc::unbounded_channel();

        run_job(&sh("printf 'Resolution 2.0 \\305\\n'; exit 0"), dir.path(), &out, &err, &tx)
            .await
            .unwrap();
        drop(tx);

        assert_eq!(std::fs::read(&out).unwrap(), b"Resolution 2.0 \xc5\n");
        match rx.recv().await {
            Some(JobEvent::Output { line, .. }) => assert_eq!(line, "Resolution 2.0 \u{fffd}"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let cmd = CommandLine {
            executable: "/nonexistent/python".into(),
            script: "x.py".into(),
            args: vec![],
        };
        let err = run_job(&cmd, dir.path(), &dir.path().join("o"), &dir.path().join("e"), &tx)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JobError>(),
            Some(JobError::Spawn { .. })
        ));
    }
}
