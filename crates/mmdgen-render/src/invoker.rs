//! External renderer invocation.
//!
//! The renderer is any executable honoring the `mmdc` command line:
//!
//! ```text
//! <program> [args...] -w <W> -H <H> -i <source> -o <destination>
//! ```
//!
//! It writes into a temporary sibling of the destination which is renamed
//! into place only after a successful exit, so a concurrent reader sees either
//! the previous artifact or the complete new one.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use mmdgen_config::{ConfigError, RendererConfig};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::atomic::{publish, temp_sibling};
use crate::consts::{DEFAULT_TIMEOUT, STDERR_GRACE};
use crate::error::RenderError;

/// Handle to the configured external renderer.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use mmdgen_render::Renderer;
///
/// let renderer = Renderer::new("mmdc", vec!["-p".into(), "puppeteer.json".into()])
///     .timeout(Duration::from_secs(5));
/// renderer.render(dest, source, "980", "1080").await?;
/// ```
#[derive(Debug, Clone)]
pub struct Renderer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl Renderer {
    /// Create a renderer running `program` with `args` placed before the
    /// size and path flags.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build a renderer from the `[renderer]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the command line is empty.
    pub fn from_config(config: &RendererConfig) -> Result<Self, ConfigError> {
        let (program, args) = config.split_command()?;
        Ok(Self::new(program, args).timeout(config.timeout()))
    }

    /// Set the wall-clock limit for one run (default: 10 seconds).
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Render `source` into `destination` at `width` x `height` pixels.
    ///
    /// # Errors
    ///
    /// - [`RenderError::Spawn`] if the program cannot be started.
    /// - [`RenderError::Failed`] on a non-zero exit, with captured stderr.
    /// - [`RenderError::Timeout`] if the deadline passed; the process is killed.
    /// - [`RenderError::Io`] if the temporary output cannot be created or moved.
    pub async fn render(
        &self,
        destination: &Path,
        source: &Path,
        width: &str,
        height: &str,
    ) -> Result<(), RenderError> {
        let started_at = Instant::now();
        let output = temp_sibling(destination)?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("-w")
            .arg(width)
            .arg("-H")
            .arg(height)
            .arg("-i")
            .arg(source)
            .arg("-o")
            .arg(output.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // The renderer gets its own process group so a timeout can take down
        // the browser processes it launches as well.
        #[cfg(unix)]
        {
            command.process_group(0);
        }

        let mut child = command
            .spawn()
            .map_err(|source| {
                tracing::warn!(program = %self.program, error = %source, "Failed to spawn renderer");
                RenderError::Spawn {
                    program: self.program.clone(),
                    source,
                }
            })?;

        let stderr = child.stderr.take().map(drain);

        let waited = tokio::time::timeout(self.timeout, child.wait()).await;
        let status = match waited {
            Ok(status) => status.map_err(|e| RenderError::io(destination, e))?,
            Err(_) => {
                #[cfg(unix)]
                {
                    if let Some(pid) = child.id() {
                        kill_process_group(pid);
                    }
                }
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "Failed to kill timed out renderer");
                }
                if let Some(task) = stderr {
                    task.abort();
                }
                tracing::warn!(
                    source = %source.display(),
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "Renderer timed out"
                );
                return Err(RenderError::Timeout {
                    timeout: self.timeout,
                });
            }
        };

        let stderr = collect(stderr).await;

        if !status.success() {
            tracing::warn!(
                source = %source.display(),
                exit_code = status.code().unwrap_or(-1),
                stderr = %stderr,
                "Renderer failed"
            );
            return Err(RenderError::Failed {
                exit_code: status.code(),
                stderr,
            });
        }

        publish(output, destination)?;

        tracing::info!(
            source = %source.display(),
            artifact = %destination.display(),
            elapsed_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Rendered diagram"
        );
        Ok(())
    }
}

/// Send `SIGKILL` to every process in the group led by `pid`.
#[cfg(unix)]
fn kill_process_group(pid: u32) {
    let Ok(pgid) = i32::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) with a negative pid only signals the renderer's own group.
    let result = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if result != 0 {
        tracing::debug!(
            pgid,
            error = %std::io::Error::last_os_error(),
            "Failed to kill renderer process group"
        );
    }
}

fn drain<R>(mut reader: R) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Err(e) = reader.read_to_end(&mut buf).await {
            tracing::debug!(error = %e, "Failed to read renderer stderr");
        }
        buf
    })
}

/// Wait briefly for the stderr reader; a grandchild holding the pipe open
/// must not stall the request.
async fn collect(task: Option<JoinHandle<Vec<u8>>>) -> String {
    let Some(mut task) = task else {
        return String::new();
    };
    match tokio::time::timeout(STDERR_GRACE, &mut task).await {
        Ok(Ok(buf)) => String::from_utf8_lossy(&buf).trim_end().to_owned(),
        Ok(Err(_)) => String::new(),
        Err(_) => {
            task.abort();
            String::new()
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::*;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    /// Fake renderer: appends its arguments to `args.log` and writes the `-o` file.
    const ECHO_RENDERER: &str = r#"
echo "$@" >> "$(dirname "$0")/args.log"
out=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    -o) shift; out="$1" ;;
  esac
  shift
done
echo "rendered" > "$out"
"#;

    #[tokio::test]
    async fn test_render_passes_flags_and_writes_destination() {
        let tmp = TempDir::new().unwrap();
        let script = write_script(tmp.path(), "fake-mmdc", ECHO_RENDERER);
        let source = tmp.path().join("d.mmd");
        let dest = tmp.path().join("d.300x200.svg");
        fs::write(&source, "graph TD\n").unwrap();

        let renderer = Renderer::new(
            script.to_string_lossy(),
            vec!["-p".to_owned(), "cfg.json".to_owned()],
        );
        renderer.render(&dest, &source, "300", "200").await.unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "rendered\n");
        let args = fs::read_to_string(tmp.path().join("args.log")).unwrap();
        let expected_prefix = format!("-p cfg.json -w 300 -H 200 -i {} -o ", source.display());
        assert!(args.starts_with(&expected_prefix), "args: {args}");
        assert!(args.trim_end().ends_with(".svg"), "temp output keeps extension: {args}");
    }

    #[tokio::test]
    async fn test_render_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let script = write_script(tmp.path(), "fake-mmdc", ECHO_RENDERER);
        let source = tmp.path().join("d.mmd");
        fs::write(&source, "graph TD\n").unwrap();

        Renderer::new(script.to_string_lossy(), Vec::new())
            .render(&tmp.path().join("d.png"), &source, "1", "1")
            .await
            .unwrap();

        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(crate::consts::TEMP_PREFIX))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[tokio::test]
    async fn test_render_failure_captures_stderr() {
        let tmp = TempDir::new().unwrap();
        let script = write_script(
            tmp.path(),
            "bad-mmdc",
            "echo 'Parse error on line 1' >&2\nexit 3\n",
        );
        let dest = tmp.path().join("d.png");
        fs::write(&dest, "previous").unwrap();

        let err = Renderer::new(script.to_string_lossy(), Vec::new())
            .render(&dest, &tmp.path().join("d.mmd"), "10", "10")
            .await
            .unwrap_err();

        match err {
            RenderError::Failed { exit_code, stderr } => {
                assert_eq!(exit_code, Some(3));
                assert!(stderr.contains("Parse error on line 1"), "{stderr}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // The previous artifact is untouched.
        assert_eq!(fs::read_to_string(&dest).unwrap(), "previous");
    }

    #[test]
    fn test_from_config_splits_command() {
        let config = RendererConfig {
            command: "npx mmdc -p puppeteer.json".to_owned(),
            timeout_secs: 3,
            ..RendererConfig::default()
        };
        let renderer = Renderer::from_config(&config).unwrap();
        assert_eq!(renderer.program, "npx");
        assert_eq!(renderer.args, ["mmdc", "-p", "puppeteer.json"]);
        assert_eq!(renderer.timeout, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let tmp = TempDir::new().unwrap();
        let err = Renderer::new("/nonexistent/mmdgen-renderer", Vec::new())
            .render(&tmp.path().join("d.png"), &tmp.path().join("d.mmd"), "1", "1")
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Spawn { .. }), "{err:?}");
    }

    /// State letter from `/proc/<pid>/stat`, `None` once the process is gone.
    #[cfg(target_os = "linux")]
    fn process_state(pid: &str) -> Option<char> {
        let stat = fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
        stat.rsplit_once(") ")?.1.chars().next()
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_grandchildren() {
        let tmp = TempDir::new().unwrap();
        let pid_file = tmp.path().join("grandchild.pid");
        let script = write_script(
            tmp.path(),
            "forking-mmdc",
            &format!("sleep 30 &\necho $! > {}\nwait\n", pid_file.display()),
        );

        let err = Renderer::new(script.to_string_lossy(), Vec::new())
            .timeout(Duration::from_millis(300))
            .render(&tmp.path().join("d.png"), &tmp.path().join("d.mmd"), "1", "1")
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Timeout { .. }), "{err:?}");

        let pid = fs::read_to_string(&pid_file).unwrap().trim().to_owned();
        let deadline = Instant::now() + Duration::from_secs(3);
        loop {
            match process_state(&pid) {
                None | Some('Z' | 'X') => break,
                Some(state) => {
                    assert!(
                        Instant::now() < deadline,
                        "grandchild {pid} still running (state {state})"
                    );
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_renderer() {
        let tmp = TempDir::new().unwrap();
        let script = write_script(tmp.path(), "slow-mmdc", "exec sleep 30\n");
        let timeout = Duration::from_millis(300);

        let started = Instant::now();
        let err = Renderer::new(script.to_string_lossy(), Vec::new())
            .timeout(timeout)
            .render(&tmp.path().join("d.png"), &tmp.path().join("d.mmd"), "1", "1")
            .await
            .unwrap_err();

        assert!(matches!(err, RenderError::Timeout { .. }), "{err:?}");
        assert!(
            started.elapsed() < timeout + Duration::from_secs(3),
            "took {:?}",
            started.elapsed()
        );
        assert!(!tmp.path().join("d.png").exists());
    }
}
